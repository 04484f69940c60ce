/// Nodeflow server entry point
///
/// Serves:
/// - Workflow management API at /api/workflows/*
/// - Execution and job status at /api/workflows/{id}/execute, /api/jobs/{id}, /api/runs/{id}
/// - Webhook triggers at /webhook/{workflow_id}/*
/// - Health check at /healthz

use nodeflow::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Defaults come from NODEFLOW_* environment variables
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
