/// Nodeflow: single-process workflow automation engine
///
/// Workflows are ordered lists of trigger, action, and logic nodes. Runs are
/// queued in arrival order and executed one at a time; a scheduler re-queues
/// workflows with a schedule trigger once their interval has elapsed.

// Core configuration and setup
pub mod config;

// SQLite pools for the engine and the connector data store
pub mod database;

// Workflow definitions, typed node configuration, and storage
pub mod workflow;

// Run records, run storage, and the incremental run logger
pub mod run;

// Action connectors and trigger handlers
pub mod connectors;

// In-process logic nodes
pub mod logic;

// Handler registry, run state machine, job queue, dispatcher, and scheduler
pub mod runtime;

// HTTP API layer - workflow CRUD, execution, and webhook triggers
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use run::{NodeResult, RunRecord, RunStatus, TriggerSource};
pub use runtime::{Dispatcher, ExecutionEngine, JobQueue, JobStatus};
pub use server::start_server;
pub use workflow::{Connection, Node, NodeKind, Workflow};
