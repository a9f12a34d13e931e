/// Job and schedule routes
///
/// These are the HTTP entry points of the discrete producers: every
/// accepted request ends in exactly one broadcast.
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::{
    jobs::JobUpdate,
    logger::{self, LogTag},
    webserver::{
        state::AppState,
        utils::{error_response, success_response},
        ws::producers::publish_schedule_event,
    },
};

#[derive(Debug, Deserialize)]
pub struct ScheduleEventRequest {
    pub schedule_id: String,
    pub event: String,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    /// False when the hub dropped the event (stopped or dispatch queue full)
    pub published: bool,
}

/// Create job routes
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/:id", put(upsert_job).get(get_job))
        .route("/schedule-events", post(schedule_event))
}

/// GET /api/jobs
async fn list_jobs(State(state): State<Arc<AppState>>) -> Response {
    success_response(state.jobs.list())
}

/// GET /api/jobs/:id
async fn get_job(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.jobs.get(&id) {
        Some(job) => success_response(job),
        None => error_response(
            StatusCode::NOT_FOUND,
            "JOB_NOT_FOUND",
            &format!("Job {} not found", id),
            None,
        ),
    }
}

/// PUT /api/jobs/:id
async fn upsert_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<JobUpdate>,
) -> Response {
    let record = state.jobs.upsert(&state.hub, &id, update);
    success_response(record)
}

/// POST /api/schedule-events
async fn schedule_event(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScheduleEventRequest>,
) -> Response {
    let published = publish_schedule_event(
        &state.hub,
        &request.event,
        &request.schedule_id,
        request.data,
    );

    logger::debug(
        LogTag::Webserver,
        &format!(
            "Schedule event '{}' for {} (published={})",
            request.event, request.schedule_id, published
        ),
    );

    success_response(PublishResponse { published })
}
