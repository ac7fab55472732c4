//! warden-health: watchdog aggregation and health hysteresis for Warden.
//!
//! Two independent pieces, both fed from pod watchdog metadata:
//!
//! ```text
//! status::aggregate(metadata)      -> worst watchdog level label
//! HealthMonitor
//!   ├── probe(pod)                 -> fetch watchdogs, advance HealthRecord
//!   └── is_healthy(pod)            -> HealthySince(t) held longer than minimum
//! ```
//!
//! # Hysteresis
//!
//! A failing watchdog flips a pod to `Failing` at once. The first clean
//! probe afterwards starts a new `HealthySince(now)` period, and the pod
//! only reports healthy once that period exceeds the configured minimum.
//! Later clean probes never move the start of the period.

pub mod monitor;
pub mod source;
pub mod status;

pub use monitor::{HealthMonitor, HealthRecord};
pub use source::WatchdogSource;
pub use status::{UNKNOWN_STATUS, aggregate, more_critical_status};
