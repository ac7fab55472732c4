//! HTTP handlers.
//!
//! Responses share one JSON envelope. Health answers carry the status
//! code kubelet acts on; the body is informational.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::{debug, warn};

use warden_core::{PodId, WardenError};
use warden_health::{HealthRecord, aggregate};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn forbidden(namespace: &str) -> axum::response::Response {
    warn!(namespace, "request for namespace outside allow-list");
    error_response(
        &WardenError::Forbidden(namespace.to_string()).to_string(),
        StatusCode::FORBIDDEN,
    )
    .into_response()
}

#[derive(Debug, Serialize)]
struct PodHealth {
    pod: String,
    healthy: bool,
    record: HealthRecord,
}

#[derive(Debug, Serialize)]
struct PodStatus {
    pod: String,
    status: String,
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    ApiResponse::ok(serde_json::json!({ "status": "ok" }))
}

/// GET /pods/{namespace}/{name}/health
pub async fn pod_health(
    State(state): State<ApiState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    if !state.is_allowed(&namespace) {
        return forbidden(&namespace);
    }
    let pod = PodId::new(namespace, name);
    let record = state.monitor.probe(&pod).await;
    let healthy = state.monitor.is_healthy(&pod);
    debug!(%pod, healthy, ?record, "health check");

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        ApiResponse::ok(PodHealth {
            pod: pod.to_string(),
            healthy,
            record,
        }),
    )
        .into_response()
}

/// GET /pods/{namespace}/{name}/status
pub async fn pod_status(
    State(state): State<ApiState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    if !state.is_allowed(&namespace) {
        return forbidden(&namespace);
    }
    let pod = PodId::new(namespace, name);
    match state.source.pod_metadata(&pod).await {
        Ok(metadata) => ApiResponse::ok(PodStatus {
            pod: pod.to_string(),
            status: aggregate(&metadata),
        })
        .into_response(),
        Err(WardenError::NotFound(msg)) => {
            error_response(&format!("pod not found: {msg}"), StatusCode::NOT_FOUND).into_response()
        }
        Err(WardenError::Forbidden(ns)) => forbidden(&ns),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use warden_core::{Metadata, WardenResult};
    use warden_health::{HealthMonitor, WatchdogSource};

    #[derive(Default)]
    struct StubSource {
        pods: Mutex<BTreeMap<PodId, Metadata>>,
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

    fn test_state(min_healthy: Duration) -> (ApiState, Arc<StubSource>) {
        let source = Arc::new(StubSource::default());
        let monitor = Arc::new(HealthMonitor::new(source.clone(), min_healthy));
        (ApiState::new(monitor, source.clone(), ["content"]), source)
    }

    fn path(ns: &str, name: &str) -> Path<(String, String)> {
        Path((ns.to_string(), name.to_string()))
    }

    #[tokio::test]
    async fn healthz_ok() {
        let resp = healthz().await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_forbidden_outside_allow_list() {
        let (state, _) = test_state(Duration::ZERO);
        let resp = pod_health(State(state), path("kube-system", "p")).await.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn freshly_clean_pod_is_not_yet_healthy() {
        let (state, source) = test_state(Duration::from_secs(30));
        let pod = PodId::new("content", "p");
        source
            .pods
            .lock()
            .unwrap()
            .insert(pod, [("wd.a".to_string(), "Info/ok".to_string())].into());

        let resp = pod_health(State(state), path("content", "p")).await.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn failing_pod_is_unavailable() {
        let (state, source) = test_state(Duration::ZERO);
        let pod = PodId::new("content", "p");
        source
            .pods
            .lock()
            .unwrap()
            .insert(pod, [("wd.a".to_string(), "Error/broken".to_string())].into());

        let resp = pod_health(State(state), path("content", "p")).await.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn status_reports_worst_level() {
        let (state, source) = test_state(Duration::ZERO);
        let pod = PodId::new("content", "p");
        source.pods.lock().unwrap().insert(
            pod,
            [
                ("wd.a".to_string(), "Info/ok".to_string()),
                ("wd.b".to_string(), "Warning/slow".to_string()),
            ]
            .into(),
        );

        let resp = pod_status(State(state), path("content", "p")).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_of_unknown_pod_is_not_found() {
        let (state, _) = test_state(Duration::ZERO);
        let resp = pod_status(State(state), path("content", "ghost")).await.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
