//! warden-api: HTTP surface for health checks.
//!
//! Kubelet-style probes hit these routes; each health request probes the
//! pod's watchdogs before answering.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/healthz` | Process liveness |
//! | GET | `/pods/{namespace}/{name}/health` | Probe, then 200 healthy / 503 unhealthy |
//! | GET | `/pods/{namespace}/{name}/status` | Aggregated watchdog level |
//!
//! Namespaces outside the allow-list answer 403.

pub mod handlers;

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use warden_health::{HealthMonitor, WatchdogSource};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub monitor: Arc<HealthMonitor>,
    pub source: Arc<dyn WatchdogSource>,
    pub namespaces: Arc<BTreeSet<String>>,
}

impl ApiState {
    pub fn new<I, S>(monitor: Arc<HealthMonitor>, source: Arc<dyn WatchdogSource>, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            monitor,
            source,
            namespaces: Arc::new(namespaces.into_iter().map(Into::into).collect()),
        }
    }

    pub fn is_allowed(&self, namespace: &str) -> bool {
        self.namespaces.contains(namespace)
    }
}

/// Build the complete router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/pods/{namespace}/{name}/health", get(handlers::pod_health))
        .route("/pods/{namespace}/{name}/status", get(handlers::pod_status))
        .with_state(state)
}
