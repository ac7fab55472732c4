//! Collaborator trait for reading pod watchdog metadata.

use async_trait::async_trait;

use warden_core::{Metadata, PodId, WardenResult};

/// Supplies the current metadata entries of a pod.
///
/// Implemented by fleet clients; the health monitor only reads.
#[async_trait]
pub trait WatchdogSource: Send + Sync {
    async fn pod_metadata(&self, pod: &PodId) -> WardenResult<Metadata>;
}
