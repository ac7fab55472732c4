//! Fleet collaborators: listing pods, writing requests, evicting.
//!
//! The decision engine never talks to the cluster itself. `FleetClient`
//! is the seam; `MemoryFleet` backs tests and embedding, `FileFleet`
//! reads and rewrites a JSON pod list on disk. Both refuse namespaces
//! that are not allow-listed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use warden_core::{Metadata, PodId, PodSnapshot, WardenError, WardenResult};
use warden_health::WatchdogSource;

/// Cluster-facing operations the control loop depends on.
#[async_trait]
pub trait FleetClient: Send + Sync {
    /// All pods of a namespace, in a stable order.
    async fn list_pods(&self, namespace: &str) -> WardenResult<Vec<PodSnapshot>>;

    /// Set the request token of one slot.
    async fn write_request(&self, pod: &PodId, slot: &str, token: &str) -> WardenResult<()>;

    /// Evict a pod. Must be idempotent: evicting a pod that is already
    /// gone succeeds.
    async fn evict_pod(&self, pod: &PodId, grace: Duration) -> WardenResult<()>;
}

fn ensure_allowed(allowed: &BTreeSet<String>, namespace: &str) -> WardenResult<()> {
    if allowed.contains(namespace) {
        Ok(())
    } else {
        Err(WardenError::Forbidden(namespace.to_string()))
    }
}

fn set_request(pods: &mut [PodSnapshot], pod: &PodId, slot: &str, token: &str) -> WardenResult<()> {
    let target = pods
        .iter_mut()
        .find(|p| p.id == *pod)
        .ok_or_else(|| WardenError::NotFound(pod.to_string()))?;
    target.data.requests.insert(slot.to_string(), token.to_string());
    Ok(())
}

// ── In-memory fleet ────────────────────────────────────────────────

/// In-process fleet. Evicted pods are removed and remembered.
pub struct MemoryFleet {
    allowed: BTreeSet<String>,
    pods: RwLock<Vec<PodSnapshot>>,
    evictions: RwLock<Vec<PodId>>,
}

impl MemoryFleet {
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: namespaces.into_iter().map(Into::into).collect(),
            pods: RwLock::new(Vec::new()),
            evictions: RwLock::new(Vec::new()),
        }
    }

    /// Add or replace a pod.
    pub async fn upsert(&self, pod: PodSnapshot) {
        let mut pods = self.pods.write().await;
        match pods.iter_mut().find(|p| p.id == pod.id) {
            Some(existing) => *existing = pod,
            None => pods.push(pod),
        }
    }

    /// Set one metadata entry on a pod, if present.
    pub async fn set_metadata(&self, pod: &PodId, key: &str, value: &str) {
        let mut pods = self.pods.write().await;
        if let Some(p) = pods.iter_mut().find(|p| p.id == *pod) {
            p.metadata.insert(key.to_string(), value.to_string());
        }
    }

    pub async fn remove_metadata(&self, pod: &PodId, key: &str) {
        let mut pods = self.pods.write().await;
        if let Some(p) = pods.iter_mut().find(|p| p.id == *pod) {
            p.metadata.remove(key);
        }
    }

    pub async fn get(&self, pod: &PodId) -> Option<PodSnapshot> {
        self.pods.read().await.iter().find(|p| p.id == *pod).cloned()
    }

    /// Pods evicted so far, in order.
    pub async fn evictions(&self) -> Vec<PodId> {
        self.evictions.read().await.clone()
    }
}

#[async_trait]
impl FleetClient for MemoryFleet {
    async fn list_pods(&self, namespace: &str) -> WardenResult<Vec<PodSnapshot>> {
        ensure_allowed(&self.allowed, namespace)?;
        let pods = self.pods.read().await;
        Ok(pods.iter().filter(|p| p.id.namespace == namespace).cloned().collect())
    }

    async fn write_request(&self, pod: &PodId, slot: &str, token: &str) -> WardenResult<()> {
        ensure_allowed(&self.allowed, &pod.namespace)?;
        let mut pods = self.pods.write().await;
        set_request(&mut pods, pod, slot, token)
    }

    async fn evict_pod(&self, pod: &PodId, grace: Duration) -> WardenResult<()> {
        ensure_allowed(&self.allowed, &pod.namespace)?;
        let mut pods = self.pods.write().await;
        let before = pods.len();
        pods.retain(|p| p.id != *pod);
        if pods.len() < before {
            self.evictions.write().await.push(pod.clone());
            info!(%pod, grace_secs = grace.as_secs(), "pod evicted");
        } else {
            debug!(%pod, "evict: pod already gone");
        }
        Ok(())
    }
}

#[async_trait]
impl WatchdogSource for MemoryFleet {
    async fn pod_metadata(&self, pod: &PodId) -> WardenResult<Metadata> {
        ensure_allowed(&self.allowed, &pod.namespace)?;
        self.get(pod)
            .await
            .map(|p| p.metadata)
            .ok_or_else(|| WardenError::NotFound(pod.to_string()))
    }
}

// ── File-backed fleet ──────────────────────────────────────────────

/// On-disk layout of the fleet file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FleetFile {
    #[serde(default)]
    pub pods: Vec<PodSnapshot>,
}

/// Fleet stored as a JSON file. Every read goes to disk so external edits
/// (watchdog updates, new pods) are picked up on the next cycle.
pub struct FileFleet {
    path: PathBuf,
    allowed: BTreeSet<String>,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl FileFleet {
    pub fn new<I, S>(path: &Path, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.to_path_buf(),
            allowed: namespaces.into_iter().map(Into::into).collect(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> WardenResult<FleetFile> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "fleet file missing; treating as empty");
                Ok(FleetFile::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, file: &FleetFile) -> WardenResult<()> {
        let bytes = serde_json::to_vec_pretty(file)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl FleetClient for FileFleet {
    async fn list_pods(&self, namespace: &str) -> WardenResult<Vec<PodSnapshot>> {
        ensure_allowed(&self.allowed, namespace)?;
        let file = self.load().await?;
        Ok(file
            .pods
            .into_iter()
            .filter(|p| p.id.namespace == namespace)
            .collect())
    }

    async fn write_request(&self, pod: &PodId, slot: &str, token: &str) -> WardenResult<()> {
        ensure_allowed(&self.allowed, &pod.namespace)?;
        let _guard = self.write_lock.lock().await;
        let mut file = self.load().await?;
        set_request(&mut file.pods, pod, slot, token)?;
        self.save(&file).await
    }

    async fn evict_pod(&self, pod: &PodId, grace: Duration) -> WardenResult<()> {
        ensure_allowed(&self.allowed, &pod.namespace)?;
        let _guard = self.write_lock.lock().await;
        let mut file = self.load().await?;
        let before = file.pods.len();
        file.pods.retain(|p| p.id != *pod);
        if file.pods.len() == before {
            debug!(%pod, "evict: pod already gone");
            return Ok(());
        }
        self.save(&file).await?;
        info!(%pod, grace_secs = grace.as_secs(), "pod evicted");
        Ok(())
    }
}

#[async_trait]
impl WatchdogSource for FileFleet {
    async fn pod_metadata(&self, pod: &PodId) -> WardenResult<Metadata> {
        ensure_allowed(&self.allowed, &pod.namespace)?;
        let file = self.load().await?;
        file.pods
            .into_iter()
            .find(|p| p.id == *pod)
            .map(|p| p.metadata)
            .ok_or_else(|| WardenError::NotFound(pod.to_string()))
    }
}
