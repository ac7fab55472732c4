//! Warden rollouts: per-slot content version decisions.
//!
//! The oracle is rebuilt every control cycle from an immutable snapshot
//! (known-good set, latest set, every pod's data state and watchdogs) and
//! answers one question per `(pod, slot)`: which version token, if any,
//! should the pod be told to run next.
//!
//! # Components
//!
//! - **`policy`**: rollout timing (soak window)
//! - **`oracle`**: decision function (fallback, soak, canary, safety gate)

pub mod oracle;
pub mod policy;

pub use oracle::{DataRequest, Decision, HoldReason, RolloutSnapshot, UpgradeOracle};
pub use policy::RolloutPolicy;
