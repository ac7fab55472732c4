//! The control loop: fetch → decide → act → sleep.
//!
//! Cycles never overlap. Shutdown is observed between cycles and while
//! sleeping, never in the middle of one.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use warden_core::{
    ContentManifest, PodId, VersionDescriptor, WardenConfig, WardenError, WardenResult,
    epoch_secs,
};
use warden_health::aggregate;
use warden_rollout::{RolloutPolicy, RolloutSnapshot, UpgradeOracle};
use warden_state::VersionStore;

use crate::consensus::EvictionConsensus;
use crate::fleet::FleetClient;
use crate::manifest::ProviderRegistry;

/// Static knobs of the control loop, threaded in at construction.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub namespaces: Vec<String>,
    pub cycle_period: Duration,
    pub window_depth: usize,
    pub max_consecutive_errors: u32,
    pub eviction_grace: Duration,
    /// Manifest source string; may contain `{namespace}`.
    pub manifest_source: String,
    pub policy: RolloutPolicy,
}

impl ControllerSettings {
    pub fn from_config(config: &WardenConfig) -> Self {
        Self {
            namespaces: config.controller.namespaces.clone(),
            cycle_period: config.cycle_period(),
            window_depth: config.controller.window_depth,
            max_consecutive_errors: config.controller.max_consecutive_errors,
            eviction_grace: config.eviction_grace_period(),
            manifest_source: config.fleet.manifest.clone(),
            policy: RolloutPolicy::from_config(config),
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub namespaces: usize,
    /// Repos whose latest version changed.
    pub latest_updated: usize,
    pub requests_written: usize,
    /// Requests decided but not written because the pod is not ready.
    pub requests_deferred: usize,
    pub pods_failing: usize,
    pub evictions_requested: usize,
}

pub struct Controller {
    settings: ControllerSettings,
    fleet: Arc<dyn FleetClient>,
    store: VersionStore,
    registry: ProviderRegistry,
    consensus: EvictionConsensus,
}

impl Controller {
    pub fn new(
        settings: ControllerSettings,
        fleet: Arc<dyn FleetClient>,
        store: VersionStore,
        registry: ProviderRegistry,
    ) -> Self {
        let consensus = EvictionConsensus::new(settings.window_depth);
        Self {
            settings,
            fleet,
            store,
            registry,
            consensus,
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    /// Run cycles until shutdown or until the error budget is spent.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> WardenResult<()> {
        info!(
            namespaces = ?self.settings.namespaces,
            period_ms = self.settings.cycle_period.as_millis() as u64,
            window = self.settings.window_depth,
            "controller started"
        );

        let mut consecutive_errors: u32 = 0;
        loop {
            if *shutdown.borrow() {
                info!("controller shutting down");
                return Ok(());
            }

            match self.run_cycle().await {
                Ok(report) => {
                    consecutive_errors = 0;
                    info!(
                        requests = report.requests_written,
                        deferred = report.requests_deferred,
                        failing = report.pods_failing,
                        evictions = report.evictions_requested,
                        latest_updated = report.latest_updated,
                        "cycle complete"
                    );
                }
                Err(e) => {
                    consecutive_errors += 1;
                    warn!(
                        error = %e,
                        consecutive = consecutive_errors,
                        budget = self.settings.max_consecutive_errors,
                        "cycle failed"
                    );
                    if consecutive_errors >= self.settings.max_consecutive_errors {
                        error!(last_error = %e, "consecutive error budget exhausted");
                        return Err(WardenError::Fatal(format!(
                            "{consecutive_errors} consecutive cycle failures, last: {e}"
                        )));
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.cycle_period) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("controller shutting down");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// One full pass over every allow-listed namespace, then eviction.
    pub async fn run_cycle(&mut self) -> WardenResult<CycleReport> {
        let mut report = CycleReport::default();
        let mut failing = BTreeSet::new();

        for namespace in &self.settings.namespaces {
            self.reconcile_namespace(namespace, &mut failing, &mut report)
                .await?;
            report.namespaces += 1;
        }

        report.pods_failing = failing.len();
        let evict = self.consensus.observe(failing);
        for pod in evict {
            report.evictions_requested += 1;
            match self
                .fleet
                .evict_pod(&pod, self.settings.eviction_grace)
                .await
            {
                Ok(()) => info!(%pod, "evicted persistently failing pod"),
                Err(e) => warn!(%pod, error = %e, "eviction failed"),
            }
        }

        Ok(report)
    }

    async fn reconcile_namespace(
        &self,
        namespace: &str,
        failing: &mut BTreeSet<PodId>,
        report: &mut CycleReport,
    ) -> WardenResult<()> {
        let manifest = self
            .registry
            .fetch(&self.settings.manifest_source, namespace)
            .await?;
        report.latest_updated += self.refresh_latest(namespace, &manifest)?;

        let known_good = self.store.known_good(namespace)?;
        let latest = self.store.latest(namespace)?;
        let pods = self.fleet.list_pods(namespace).await?;
        debug!(namespace, pods = pods.len(), repos = latest.len(), "namespace snapshot");

        for pod in &pods {
            let label = aggregate(&pod.metadata);
            if label.eq_ignore_ascii_case("error") {
                failing.insert(pod.id.clone());
            }
        }

        let ready: BTreeSet<PodId> = pods
            .iter()
            .filter(|p| p.containers_ready)
            .map(|p| p.id.clone())
            .collect();

        let oracle = UpgradeOracle::new(
            RolloutSnapshot {
                known_good,
                latest,
                pods,
                taken_at: epoch_secs(),
            },
            self.settings.policy,
        );

        for request in oracle.plan() {
            if !ready.contains(&request.pod) {
                debug!(pod = %request.pod, slot = %request.slot, "containers not ready; deferring request");
                report.requests_deferred += 1;
                continue;
            }
            match self
                .fleet
                .write_request(&request.pod, &request.slot, &request.token)
                .await
            {
                Ok(()) => {
                    info!(pod = %request.pod, slot = %request.slot, "data request written");
                    report.requests_written += 1;
                }
                Err(e) => {
                    warn!(pod = %request.pod, slot = %request.slot, error = %e, "writing data request failed");
                }
            }
        }
        Ok(())
    }

    /// Persist the newest manifest version of each repo when it differs
    /// from the stored latest. Returns how many changed.
    fn refresh_latest(&self, namespace: &str, manifest: &ContentManifest) -> WardenResult<usize> {
        let stored = self.store.latest(namespace)?;
        let mut changed = 0;
        for (repo, newest) in manifest.newest_versions() {
            let unchanged = stored
                .get(&repo)
                .and_then(|token| VersionDescriptor::decode(token).ok())
                .is_some_and(|current| current == newest);
            if unchanged {
                continue;
            }
            self.store.put_latest(namespace, &repo, &newest.encode())?;
            info!(namespace, %repo, version = %newest, "new latest version");
            changed += 1;
        }
        Ok(changed)
    }
}
