/// Run Records
///
/// One workflow execution attempt and everything it leaves behind:
/// - Run, log entry, and node result types
/// - SQLite persistence for runs and their logs
/// - An incremental logger used while the run executes

pub mod types;

pub mod storage;

pub mod logger;

pub use logger::RunLogger;
pub use storage::RunStorage;
pub use types::{LogEntry, LogLevel, NodeResult, RunRecord, RunStatus, TriggerSource};
