/// Webhook trigger receiver
///
/// `ANY /webhook/{workflow_id}/{*path}` enqueues the workflow when it has a
/// webhook trigger whose configured path matches. The request only starts a
/// run; callers poll the job for its result.

use crate::{
    api::{executions::enqueue_status, AppState},
    run::types::TriggerSource,
    runtime::dispatcher::EnqueueReceipt,
    workflow::{
        config::WebhookConfig,
        types::{NodeKind, Workflow},
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::any,
    Router,
};

pub fn create_webhook_routes() -> Router<AppState> {
    Router::new().route("/webhook/{workflow_id}/{*path}", any(receive_webhook))
}

async fn receive_webhook(
    State(state): State<AppState>,
    Path((workflow_id, webhook_path)): Path<(String, String)>,
) -> Result<(StatusCode, Json<EnqueueReceipt>), StatusCode> {
    tracing::info!("📥 Webhook request received: {}/{}", workflow_id, webhook_path);

    let workflow = match state.storage.get_workflow(&workflow_id).await {
        Ok(Some(workflow)) if workflow.enabled => workflow,
        Ok(Some(_)) => {
            tracing::warn!("⏸️ Webhook called for disabled workflow: {}", workflow_id);
            return Err(StatusCode::NOT_FOUND);
        }
        Ok(None) => {
            tracing::warn!("❌ Webhook called for unknown workflow: {}", workflow_id);
            return Err(StatusCode::NOT_FOUND);
        }
        Err(e) => {
            tracing::error!("Failed to load workflow {}: {:#}", workflow_id, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let requested = if webhook_path.starts_with('/') {
        webhook_path
    } else {
        format!("/{}", webhook_path)
    };
    if !has_matching_trigger(&workflow, &requested) {
        tracing::warn!("❌ No webhook trigger for path '{}' in workflow '{}'", requested, workflow_id);
        return Err(StatusCode::NOT_FOUND);
    }

    let receipt = state
        .dispatcher
        .enqueue_workflow(workflow, TriggerSource::Webhook)
        .await
        .map_err(|e| enqueue_status(&e))?;

    Ok((StatusCode::ACCEPTED, Json(receipt)))
}

/// A webhook trigger without a configured path accepts any path
fn has_matching_trigger(workflow: &Workflow, requested: &str) -> bool {
    workflow
        .nodes
        .iter()
        .filter(|node| node.kind == NodeKind::Trigger && node.subtype == "webhook")
        .any(|node| match WebhookConfig::parse(&node.config).path {
            Some(path) => path == requested,
            None => true,
        })
}
