use axum::{extract::State, response::Response, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    logger::{self, LogTag},
    webserver::{
        state::AppState,
        utils::success_response,
        ws::{metrics::HubMetricsSnapshot, producers::JobCounters, HubState},
    },
};

/// GET /api/status response
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub hub_state: HubState,
    pub websocket_clients: usize,
    pub hub: HubMetricsSnapshot,
    pub jobs: JobCounters,
    pub uptime_seconds: u64,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

/// Create status routes
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/status", get(hub_status))
}

/// GET /api/status
async fn hub_status(State(state): State<Arc<AppState>>) -> Response {
    logger::debug(LogTag::Webserver, "Status endpoint called");

    success_response(StatusResponse {
        hub_state: state.hub.state(),
        websocket_clients: state.hub.client_count(),
        hub: state.hub.metrics().snapshot(),
        jobs: state.jobs.counters(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::jobs::{JobBoard, JobStatus, JobUpdate};
    use crate::webserver::routes::create_router;
    use crate::webserver::ws::health::LivenessCell;
    use crate::webserver::ws::hub::ClientRegistration;
    use crate::webserver::ws::signal::Signal;
    use crate::webserver::ws::WsHub;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_status_reports_hub_and_jobs() {
        let config = Config::default();
        let hub = WsHub::new(&config.hub);
        hub.start().unwrap();
        let state = Arc::new(AppState::new(config, Arc::clone(&hub), JobBoard::new()));
        state.jobs.apply(
            "job-1",
            JobUpdate {
                name: None,
                status: JobStatus::Running,
                progress: Some(10),
                error: None,
            },
        );

        let (tx, _rx) = mpsc::channel(16);
        hub.register(ClientRegistration {
            id: hub.next_client_id(),
            sender: tx,
            closer: Signal::new(),
            liveness: Arc::new(LivenessCell::new()),
            initial: Vec::new(),
        })
        .await
        .unwrap();

        let response = create_router(Arc::clone(&state))
            .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["hub_state"], "running");
        assert_eq!(body["websocket_clients"], hub.client_count());
        assert_eq!(body["websocket_clients"], 1);
        assert_eq!(body["hub"]["clients_registered"], 1);
        assert_eq!(body["jobs"]["running_jobs"], 1);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

        hub.shutdown();
    }
}
