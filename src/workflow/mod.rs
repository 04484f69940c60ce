/// Workflow Management Layer
///
/// This module handles workflow definitions and their persistence:
/// - Type definitions (Workflow, Node, Connection)
/// - Typed per-subtype node configuration
/// - SQLite persistence with sqlx

// Core workflow type definitions
pub mod types;

// Per-subtype configuration parsed before a run
pub mod config;

// SQLite persistence layer for workflow storage
pub mod storage;

// Re-export commonly used types
pub use config::{ConfigError, NodeConfig};
pub use storage::WorkflowStorage;
pub use types::{Connection, Node, NodeKind, Workflow};
