/// Runtime Execution
///
/// Everything that turns a stored workflow into a finished run:
/// - Handler registry and node executor
/// - Run state machine walking the node array
/// - FIFO job queue with a single executing slot
/// - Dispatcher that enqueues runs and drains the queue
/// - Interval scheduler re-queueing scheduled workflows

pub mod registry;

pub mod executor;

pub mod engine;

pub mod queue;

pub mod dispatcher;

pub mod scheduler;

pub use dispatcher::{Dispatcher, EnqueueError, EnqueueReceipt};
pub use engine::ExecutionEngine;
pub use executor::{NodeExecutor, NodeHandler, RunContext};
pub use queue::{JobQueue, JobStatus};
pub use registry::{ConnectorDeps, HandlerRegistry};
pub use scheduler::IntervalScheduler;
