//! Rollout timing policy.

use std::time::Duration;

use warden_core::WardenConfig;

/// Timing knobs for the upgrade oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RolloutPolicy {
    /// Seconds a pod must stay on a freshly assigned known-good version
    /// before it may be promoted further.
    pub soak_secs: u64,
}

impl RolloutPolicy {
    pub fn new(soak: Duration) -> Self {
        Self {
            soak_secs: soak.as_secs(),
        }
    }

    pub fn from_config(config: &WardenConfig) -> Self {
        Self::new(config.soak_duration())
    }

    /// Whether a version issued `age` seconds ago is still soaking.
    pub fn is_soaking(&self, age: u64) -> bool {
        age < self.soak_secs
    }
}

impl Default for RolloutPolicy {
    fn default() -> Self {
        Self { soak_secs: 3600 }
    }
}
