//! warden-state: persistent version store for Warden.
//!
//! Backed by [redb](https://docs.rs/redb). Holds the two per-namespace
//! version maps the decision engine reads every cycle: the known-good set
//! (safe fallback per repo) and the latest set (rollout target per repo).
//!
//! Keys are `{namespace}/{repo}`; values are JSON-serialized
//! [`VersionEntry`] records carrying the opaque version token.
//!
//! The `VersionStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::{VersionEntry, VersionStore};
