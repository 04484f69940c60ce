/// Server setup and initialization
///
/// Wires together storage, the handler registry, the execution engine, the
/// job queue and its dispatcher, the interval scheduler, and the HTTP routes.

use crate::{
    api::{create_execution_routes, create_webhook_routes, create_workflow_routes, AppState},
    config::{Config, EngineConfig},
    database::Database,
    run::storage::RunStorage,
    runtime::{
        dispatcher::Dispatcher,
        engine::ExecutionEngine,
        executor::NodeExecutor,
        queue::JobQueue,
        registry::{ConnectorDeps, HandlerRegistry},
        scheduler::IntervalScheduler,
    },
    workflow::storage::WorkflowStorage,
};
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// The long-lived engine components behind the HTTP surface
#[derive(Clone)]
pub struct Services {
    pub state: AppState,
    pub dispatcher: Arc<Dispatcher>,
    pub scheduler: Arc<IntervalScheduler>,
}

/// Build every engine component on top of opened databases
pub fn build_services(engine_config: &EngineConfig, database: &Database) -> Result<Services> {
    tracing::info!("⚙️ Initializing node handlers");
    let http = reqwest::Client::builder()
        .timeout(engine_config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let registry = HandlerRegistry::with_builtins(ConnectorDeps {
        http,
        http_timeout: engine_config.http_timeout,
        datastore: database.datastore.clone(),
    });

    let workflow_storage = WorkflowStorage::new(database.engine.clone());
    let run_storage = RunStorage::new(database.engine.clone());

    tracing::info!("🚀 Initializing execution engine and job queue");
    let engine = ExecutionEngine::new(Arc::new(NodeExecutor::new(registry)));
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(JobQueue::new(engine_config.job_retention)),
        engine,
        workflow_storage.clone(),
        run_storage.clone(),
        engine_config.idle_gap,
    ));

    let scheduler = Arc::new(IntervalScheduler::new(
        workflow_storage.clone(),
        Arc::clone(&dispatcher),
        engine_config.scheduler_period,
    ));

    Ok(Services {
        state: AppState {
            storage: workflow_storage,
            runs: run_storage,
            dispatcher: Arc::clone(&dispatcher),
        },
        dispatcher,
        scheduler,
    })
}

/// Create the main Axum router over the shared application state
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .merge(create_workflow_routes())
        .merge(create_execution_routes())
        .merge(create_webhook_routes())
        .with_state(state)
}

/// Start the HTTP server with the given configuration
///
/// Runs until ctrl-c; the dispatcher loop and the scheduler live for the
/// lifetime of the server.
pub async fn start_server(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting Nodeflow server...");

    tracing::info!("📁 Opening databases in {}", config.database.data_dir);
    let database = Database::open(&config.database.data_dir).await?;
    let services = build_services(&config.engine, &database)?;

    let dispatcher_task = tokio::spawn(Arc::clone(&services.dispatcher).run());
    services.scheduler.start().await?;

    let app = create_app(services.state.clone());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down...");
    services.scheduler.stop().await?;
    dispatcher_task.abort();
    database.engine.close().await;
    database.datastore.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
