/// Configuration management for the Nodeflow engine
///
/// Handles server configuration, database location, and runtime tuning for the
/// job queue, scheduler, and connectors. Every value can be overridden with an
/// environment variable so the engine runs unchanged inside containers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Execution engine tuning
    pub engine: EngineConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding the engine database and the connector data store
    /// Creates: {data_dir}/nodeflow.db, {data_dir}/datastore.db
    pub data_dir: String,
}

/// Runtime knobs for the queue consumer, scheduler, and connectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Period between scheduler due-ness sweeps
    pub scheduler_period: Duration,
    /// Minimum idle gap between two successive dequeues
    pub idle_gap: Duration,
    /// Upper bound on any single connector network call
    pub http_timeout: Duration,
    /// How long terminal job results stay queryable
    pub job_retention: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheduler_period: Duration::from_secs(60),
            idle_gap: Duration::from_millis(1000),
            http_timeout: Duration::from_secs(30),
            job_retention: Duration::from_secs(3600),
        }
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        let defaults = EngineConfig::default();

        Self {
            server: ServerConfig {
                host: std::env::var("NODEFLOW_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_number("NODEFLOW_PORT").unwrap_or(3004),
            },
            database: DatabaseConfig {
                data_dir: std::env::var("NODEFLOW_DATA_DIR")
                    .unwrap_or_else(|_| "data".to_string()),
            },
            engine: EngineConfig {
                scheduler_period: env_number("NODEFLOW_SCHEDULER_PERIOD_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.scheduler_period),
                idle_gap: env_number("NODEFLOW_IDLE_GAP_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.idle_gap),
                http_timeout: env_number("NODEFLOW_HTTP_TIMEOUT_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.http_timeout),
                job_retention: env_number("NODEFLOW_JOB_RETENTION_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.job_retention),
            },
        }
    }
}

/// Read a numeric environment variable, ignoring absent or malformed values
fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|raw| raw.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_defaults_match_documented_values() {
        let engine = EngineConfig::default();
        assert_eq!(engine.scheduler_period, Duration::from_secs(60));
        assert_eq!(engine.idle_gap, Duration::from_secs(1));
        assert_eq!(engine.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn malformed_numbers_fall_back() {
        std::env::set_var("NODEFLOW_TEST_BOGUS_NUMBER", "not-a-number");
        assert_eq!(env_number::<u64>("NODEFLOW_TEST_BOGUS_NUMBER"), None);
        std::env::set_var("NODEFLOW_TEST_GOOD_NUMBER", " 42 ");
        assert_eq!(env_number::<u64>("NODEFLOW_TEST_GOOD_NUMBER"), Some(42));
    }
}
