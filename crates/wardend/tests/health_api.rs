//! Health endpoint regression tests.
//!
//! Drives the assembled router in-process against an in-memory fleet,
//! the same wiring the daemon uses with the file fleet.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;
use warden_api::{ApiState, build_router};
use warden_controller::MemoryFleet;
use warden_core::{PodId, PodSnapshot, WatchdogStatus, epoch_secs};
use warden_health::HealthMonitor;

const NS: &str = "content";

struct Harness {
    fleet: Arc<MemoryFleet>,
    monitor: Arc<HealthMonitor>,
    router: axum::Router,
}

fn harness(min_healthy: Duration) -> Harness {
    let fleet = Arc::new(MemoryFleet::new([NS]));
    let monitor = Arc::new(HealthMonitor::new(fleet.clone(), min_healthy));
    let router = build_router(ApiState::new(monitor.clone(), fleet.clone(), [NS]));
    Harness {
        fleet,
        monitor,
        router,
    }
}

async fn add_pod(fleet: &MemoryFleet, name: &str, watchdogs: &[(&str, &str)]) -> PodId {
    let mut pod = PodSnapshot::new(PodId::new(NS, name));
    for (key, value) in watchdogs {
        pod.metadata.insert(key.to_string(), value.to_string());
    }
    let id = pod.id.clone();
    fleet.upsert(pod).await;
    id
}

async fn get(router: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn liveness_is_always_ok() {
    let h = harness(Duration::from_secs(30));
    let (status, body) = get(&h.router, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn first_clean_probe_is_not_healthy_yet() {
    let h = harness(Duration::from_secs(30));
    add_pod(&h.fleet, "p", &[("wd.sync", "Info/ok")]).await;

    let (status, body) = get(&h.router, "/pods/content/p/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["data"]["healthy"], false);
    assert_eq!(body["data"]["record"]["state"], "healthy_since");
}

#[tokio::test]
async fn long_clean_pod_is_healthy() {
    let h = harness(Duration::from_secs(30));
    let pod = add_pod(&h.fleet, "p", &[("wd.sync", "Info/ok")]).await;
    let clean: BTreeMap<String, WatchdogStatus> = BTreeMap::new();
    h.monitor.observe(&pod, &clean, epoch_secs() - 120);

    let (status, body) = get(&h.router, "/pods/content/p/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["healthy"], true);
}

#[tokio::test]
async fn error_watchdog_fails_health_immediately() {
    let h = harness(Duration::from_secs(30));
    let pod = add_pod(&h.fleet, "p", &[("wd.sync", "Info/ok")]).await;
    h.monitor.observe(&pod, &BTreeMap::new(), epoch_secs() - 120);

    h.fleet.set_metadata(&pod, "wd.disk", "Error/full").await;
    let (status, body) = get(&h.router, "/pods/content/p/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["data"]["record"]["state"], "failing");
}

#[tokio::test]
async fn unknown_pod_is_unhealthy() {
    let h = harness(Duration::ZERO);
    let (status, body) = get(&h.router, "/pods/content/ghost/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["data"]["record"]["state"], "never_probed");
}

#[tokio::test]
async fn namespace_outside_allow_list_is_forbidden() {
    let h = harness(Duration::ZERO);
    let (status, body) = get(&h.router, "/pods/kube-system/p/health").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, _) = get(&h.router, "/pods/kube-system/p/status").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn status_is_worst_watchdog_level() {
    let h = harness(Duration::ZERO);
    add_pod(
        &h.fleet,
        "p",
        &[
            ("a", "Error/not a watchdog"),
            ("wd.a", "Info/ok"),
            ("wd.b", "Warning/lagging"),
            ("wd.c", "Unknown/?"),
        ],
    )
    .await;

    let (status, body) = get(&h.router, "/pods/content/p/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Warning");
}

#[tokio::test]
async fn status_without_watchdogs_is_unknown() {
    let h = harness(Duration::ZERO);
    add_pod(&h.fleet, "quiet", &[]).await;
    let (status, body) = get(&h.router, "/pods/content/quiet/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Unknown");
}

#[tokio::test]
async fn status_of_missing_pod_is_not_found() {
    let h = harness(Duration::ZERO);
    let (status, _) = get(&h.router, "/pods/content/ghost/status").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
