/// HTTP API Layer
///
/// REST surface over the engine:
/// - Workflow CRUD operations
/// - Execute-now requests, job status, and run records
/// - Webhook receiver that enqueues matching workflows

use crate::{
    run::storage::RunStorage,
    runtime::dispatcher::Dispatcher,
    workflow::storage::WorkflowStorage,
};
use std::sync::Arc;

// Workflow management endpoints (POST/GET/PUT/DELETE)
pub mod workflows;

// Execution endpoints (execute, job status, run records)
pub mod executions;

// Inbound webhook triggers
pub mod webhooks;

pub use executions::create_execution_routes;
pub use webhooks::create_webhook_routes;
pub use workflows::create_workflow_routes;

/// Application state shared by every handler
#[derive(Debug, Clone)]
pub struct AppState {
    /// Workflow definitions
    pub storage: WorkflowStorage,
    /// Run records and logs
    pub runs: RunStorage,
    /// Enqueue service and job status
    pub dispatcher: Arc<Dispatcher>,
}
