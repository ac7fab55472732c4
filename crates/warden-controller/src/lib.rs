//! warden-controller: the orchestration loop.
//!
//! One cycle per period, strictly sequential:
//!
//! ```text
//! for namespace in allow-list:
//!     manifest  = ProviderRegistry::fetch(source, namespace)
//!     latest   <- newest manifest version per repo (persisted on change)
//!     pods      = FleetClient::list_pods(namespace)
//!     failing  += pods whose watchdogs aggregate to "error"
//!     UpgradeOracle(known_good, latest, pods).plan()
//!         -> FleetClient::write_request(pod, slot, token)   (ready pods only)
//! EvictionConsensus::observe(failing)
//!     -> FleetClient::evict_pod(pod, grace)
//! ```
//!
//! A failed cycle is logged and retried after the normal delay. After
//! `max_consecutive_errors` failures in a row the loop gives up with
//! `WardenError::Fatal`.

pub mod consensus;
pub mod controller;
pub mod fleet;
pub mod manifest;

pub use consensus::EvictionConsensus;
pub use controller::{Controller, ControllerSettings, CycleReport};
pub use fleet::{FileFleet, FleetClient, MemoryFleet};
pub use manifest::{FileManifestProvider, ManifestProvider, ProviderRegistry};
