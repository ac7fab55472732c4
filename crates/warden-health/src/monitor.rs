//! Health monitor: per-pod hysteresis over watchdog probes.
//!
//! Records live in a `DashMap` keyed by pod. Each probe updates its pod's
//! record under that key's shard lock only, so concurrent health checks
//! for different pods never wait on each other and a reader never sees a
//! half-applied transition.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use warden_core::{PodId, WatchdogLevel, WatchdogStatus, epoch_secs, watchdogs_from_metadata};

use crate::source::WatchdogSource;

/// Health state of a single pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "since", rename_all = "snake_case")]
pub enum HealthRecord {
    /// No probe has completed yet.
    NeverProbed,
    /// The most recent probe saw an error-level watchdog.
    Failing,
    /// Clean since the given Unix second.
    HealthySince(u64),
}

impl HealthRecord {
    /// Transition after one probe.
    pub fn after_probe(self, failing: bool, now: u64) -> Self {
        match (self, failing) {
            (_, true) => HealthRecord::Failing,
            (HealthRecord::HealthySince(since), false) => HealthRecord::HealthySince(since),
            (HealthRecord::NeverProbed | HealthRecord::Failing, false) => {
                HealthRecord::HealthySince(now)
            }
        }
    }

    /// Healthy only once the clean period strictly exceeds `min_healthy`.
    pub fn is_healthy_at(self, now: u64, min_healthy: Duration) -> bool {
        match self {
            HealthRecord::NeverProbed | HealthRecord::Failing => false,
            HealthRecord::HealthySince(since) => now.saturating_sub(since) > min_healthy.as_secs(),
        }
    }
}

/// Tracks probe-driven health for every pod that has been asked about.
pub struct HealthMonitor {
    source: Arc<dyn WatchdogSource>,
    records: DashMap<PodId, HealthRecord>,
    min_healthy: Duration,
}

impl HealthMonitor {
    pub fn new(source: Arc<dyn WatchdogSource>, min_healthy: Duration) -> Self {
        Self {
            source,
            records: DashMap::new(),
            min_healthy,
        }
    }

    /// Fetch the pod's watchdogs and advance its record.
    ///
    /// A source failure leaves the record untouched.
    pub async fn probe(&self, pod: &PodId) -> HealthRecord {
        match self.source.pod_metadata(pod).await {
            Ok(metadata) => self.observe(pod, &watchdogs_from_metadata(&metadata), epoch_secs()),
            Err(e) => {
                warn!(%pod, error = %e, "watchdog fetch failed; health record unchanged");
                self.record(pod)
            }
        }
    }

    /// Apply one probe result observed at `now`.
    pub fn observe(
        &self,
        pod: &PodId,
        watchdogs: &BTreeMap<String, WatchdogStatus>,
        now: u64,
    ) -> HealthRecord {
        let failing: Vec<&str> = watchdogs
            .values()
            .filter(|w| w.level == WatchdogLevel::Error)
            .map(|w| w.name.as_str())
            .collect();

        let mut entry = self
            .records
            .entry(pod.clone())
            .or_insert(HealthRecord::NeverProbed);
        let prev = *entry;
        let next = prev.after_probe(!failing.is_empty(), now);
        *entry = next;
        drop(entry);

        match (prev, next) {
            (HealthRecord::Failing, HealthRecord::Failing) => {}
            (_, HealthRecord::Failing) => {
                warn!(%pod, watchdogs = ?failing, "pod failing");
            }
            (HealthRecord::Failing, HealthRecord::HealthySince(_)) => {
                info!(%pod, "pod recovered; healthy period restarted");
            }
            (HealthRecord::NeverProbed, HealthRecord::HealthySince(_)) => {
                debug!(%pod, "first clean probe");
            }
            _ => {}
        }
        next
    }

    /// Current record for a pod (`NeverProbed` if unknown).
    pub fn record(&self, pod: &PodId) -> HealthRecord {
        self.records
            .get(pod)
            .map(|r| *r)
            .unwrap_or(HealthRecord::NeverProbed)
    }

    pub fn is_healthy(&self, pod: &PodId) -> bool {
        self.is_healthy_at(pod, epoch_secs())
    }

    pub fn is_healthy_at(&self, pod: &PodId, now: u64) -> bool {
        self.record(pod).is_healthy_at(now, self.min_healthy)
    }

    pub fn min_healthy(&self) -> Duration {
        self.min_healthy
    }

    /// Number of pods with a record.
    pub fn tracked(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use warden_core::{Metadata, WardenError, WardenResult};

    #[derive(Default)]
    struct StubSource {
        pods: Mutex<BTreeMap<PodId, Metadata>>,
    }

    impl StubSource {
        fn set(&self, pod: &PodId, entries: &[(&str, &str)]) {
            let md = entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            self.pods.lock().unwrap().insert(pod.clone(), md);
        }
    }

    #[async_trait]
    impl WatchdogSource for StubSource {
        async fn pod_metadata(&self, pod: &PodId) -> WardenResult<Metadata> {
            self.pods
                .lock()
                .unwrap()
                .get(pod)
                .cloned()
                .ok_or_else(|| WardenError::NotFound(pod.to_string()))
        }
    }

    const MIN: Duration = Duration::from_secs(30);

    fn monitor() -> HealthMonitor {
        HealthMonitor::new(Arc::new(StubSource::default()), MIN)
    }

    fn clean() -> BTreeMap<String, WatchdogStatus> {
        let mut m = BTreeMap::new();
        m.insert("sync".into(), WatchdogStatus::parse("sync", "Info/ok").unwrap());
        m
    }

    fn broken() -> BTreeMap<String, WatchdogStatus> {
        let mut m = clean();
        m.insert("disk".into(), WatchdogStatus::parse("disk", "error/full").unwrap());
        m
    }

    #[test]
    fn never_probed_is_unhealthy() {
        let m = monitor();
        let pod = PodId::new("ns", "p");
        assert_eq!(m.record(&pod), HealthRecord::NeverProbed);
        assert!(!m.is_healthy_at(&pod, 1_000_000));
    }

    #[test]
    fn healthy_only_after_minimum_elapses() {
        let m = monitor();
        let pod = PodId::new("ns", "p");
        let t0 = 1_000;

        m.observe(&pod, &clean(), t0);
        assert!(!m.is_healthy_at(&pod, t0));
        assert!(!m.is_healthy_at(&pod, t0 + MIN.as_secs()));
        assert!(m.is_healthy_at(&pod, t0 + MIN.as_secs() + 2));
        assert!(m.is_healthy_at(&pod, t0 + 10 * 365 * 86_400));
    }

    #[test]
    fn later_clean_probes_keep_original_start() {
        let m = monitor();
        let pod = PodId::new("ns", "p");
        m.observe(&pod, &clean(), 100);
        m.observe(&pod, &clean(), 200);
        assert_eq!(m.observe(&pod, &clean(), 300), HealthRecord::HealthySince(100));
    }

    #[test]
    fn failure_is_immediate_and_restarts_clock() {
        let m = monitor();
        let pod = PodId::new("ns", "p");
        let t0 = 1_000;

        m.observe(&pod, &clean(), t0);
        assert!(m.is_healthy_at(&pod, t0 + 100));

        m.observe(&pod, &broken(), t0 + 100);
        assert!(!m.is_healthy_at(&pod, t0 + 100));
        assert!(!m.is_healthy_at(&pod, t0 + 100_000));

        let t1 = t0 + 200;
        assert_eq!(m.observe(&pod, &clean(), t1), HealthRecord::HealthySince(t1));
        assert!(!m.is_healthy_at(&pod, t1 + 1));
        assert!(m.is_healthy_at(&pod, t1 + MIN.as_secs() + 2));
    }

    #[test]
    fn warnings_do_not_fail_a_pod() {
        let m = monitor();
        let pod = PodId::new("ns", "p");
        let mut wds = clean();
        wds.insert("lag".into(), WatchdogStatus::parse("lag", "Warning/behind").unwrap());
        assert_eq!(m.observe(&pod, &wds, 5), HealthRecord::HealthySince(5));
    }

    #[test]
    fn records_are_per_pod() {
        let m = monitor();
        let a = PodId::new("ns", "a");
        let b = PodId::new("ns", "b");
        m.observe(&a, &broken(), 10);
        m.observe(&b, &clean(), 10);
        assert_eq!(m.record(&a), HealthRecord::Failing);
        assert_eq!(m.record(&b), HealthRecord::HealthySince(10));
        assert_eq!(m.tracked(), 2);
    }

    #[tokio::test]
    async fn probe_reads_source() {
        let source = Arc::new(StubSource::default());
        let m = HealthMonitor::new(source.clone(), MIN);
        let pod = PodId::new("ns", "p");

        source.set(&pod, &[("wd.disk", "Error/full")]);
        assert_eq!(m.probe(&pod).await, HealthRecord::Failing);

        source.set(&pod, &[("wd.disk", "Info/ok"), ("note", "Error/ignored")]);
        assert!(matches!(m.probe(&pod).await, HealthRecord::HealthySince(_)));
    }

    #[tokio::test]
    async fn source_error_leaves_record() {
        let m = monitor();
        let pod = PodId::new("ns", "ghost");
        assert_eq!(m.probe(&pod).await, HealthRecord::NeverProbed);
        assert_eq!(m.tracked(), 0);
    }

    #[tokio::test]
    async fn concurrent_probes_agree() {
        let source = Arc::new(StubSource::default());
        let m = Arc::new(HealthMonitor::new(source.clone(), MIN));
        let pods: Vec<PodId> = (0..8).map(|i| PodId::new("ns", format!("p{i}"))).collect();
        for pod in &pods {
            source.set(pod, &[("wd.a", "Info/ok")]);
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            for pod in pods.clone() {
                let m = m.clone();
                handles.push(tokio::spawn(async move { m.probe(&pod).await }));
            }
        }
        for h in handles {
            assert!(matches!(h.await.unwrap(), HealthRecord::HealthySince(_)));
        }
        assert_eq!(m.tracked(), pods.len());
    }
}
