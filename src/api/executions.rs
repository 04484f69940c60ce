/// Execution endpoints
///
/// - POST /api/workflows/{id}/execute: enqueue a manual run
/// - GET /api/jobs/{id}: queue position, executing, or terminal result
/// - GET /api/runs/{id}: persisted run record with its ordered log

use crate::{
    api::AppState,
    run::types::{RunRecord, TriggerSource},
    runtime::dispatcher::{EnqueueError, EnqueueReceipt},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

pub fn create_execution_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflows/{id}/execute", post(execute_workflow))
        .route("/api/jobs/{id}", get(get_job))
        .route("/api/runs/{id}", get(get_run))
}

/// Map an enqueue failure onto the HTTP status callers branch on
pub(crate) fn enqueue_status(error: &EnqueueError) -> StatusCode {
    match error {
        EnqueueError::WorkflowNotFound(id) => {
            tracing::warn!("❌ Execution requested for unknown workflow: {}", id);
            StatusCode::NOT_FOUND
        }
        EnqueueError::Storage(e) => {
            tracing::error!("❌ Failed to enqueue run: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// POST /api/workflows/{id}/execute
/// Returns: { "jobId": "...", "runId": "...", "queuePosition": 1 }
async fn execute_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EnqueueReceipt>, StatusCode> {
    state
        .dispatcher
        .enqueue_run(&id, TriggerSource::Manual)
        .await
        .map(Json)
        .map_err(|e| enqueue_status(&e))
}

/// GET /api/jobs/{id}
async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    let job_id = Uuid::parse_str(&id).map_err(|_| StatusCode::NOT_FOUND)?;
    let status = state.dispatcher.job_status(job_id).await.ok_or(StatusCode::NOT_FOUND)?;

    let mut body = serde_json::to_value(&status).map_err(|e| {
        tracing::error!("Failed to serialise job status: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    body["jobId"] = json!(job_id);
    Ok(Json(body))
}

/// GET /api/runs/{id}
async fn get_run(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<RunRecord>, StatusCode> {
    let run_id = Uuid::parse_str(&id).map_err(|_| StatusCode::NOT_FOUND)?;
    match state.runs.get_run(run_id).await {
        Ok(Some(run)) => Ok(Json(run)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to get run {}: {:#}", run_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
