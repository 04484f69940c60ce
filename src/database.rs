/// SQLite database bootstrap
///
/// Opens the two databases the engine uses:
/// - {data_dir}/nodeflow.db: workflows, runs, run logs
/// - {data_dir}/datastore.db: document tables written by the database connector
///
/// Both files are created on first use and the engine schema is applied on open.

use crate::{run::storage::RunStorage, workflow::storage::WorkflowStorage};
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::{path::Path, str::FromStr};

/// Connection pools for the engine and the connector data store
#[derive(Debug, Clone)]
pub struct Database {
    /// Workflow definitions and run records
    pub engine: SqlitePool,
    /// Connector-managed document tables
    pub datastore: SqlitePool,
}

impl Database {
    /// Open (or create) both databases under the given directory
    pub async fn open(data_dir: &str) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory '{}'", data_dir))?;

        let engine = Self::file_pool(&Path::new(data_dir).join("nodeflow.db")).await?;
        let datastore = Self::file_pool(&Path::new(data_dir).join("datastore.db")).await?;

        let database = Self { engine, datastore };
        database.init_schema().await?;
        Ok(database)
    }

    /// Private in-memory databases, one connection each so the data survives
    /// for the lifetime of the pool
    pub async fn in_memory() -> Result<Self> {
        let database = Self {
            engine: Self::memory_pool().await?,
            datastore: Self::memory_pool().await?,
        };
        database.init_schema().await?;
        Ok(database)
    }

    async fn file_pool(path: &Path) -> Result<SqlitePool> {
        tracing::info!("🗄️ Opening database: {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        SqlitePool::connect_with(options)
            .await
            .with_context(|| format!("Failed to open database '{}'", path.display()))
    }

    async fn memory_pool() -> Result<SqlitePool> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(pool)
    }

    async fn init_schema(&self) -> Result<()> {
        WorkflowStorage::new(self.engine.clone()).init_schema().await?;
        RunStorage::new(self.engine.clone()).init_schema().await?;
        Ok(())
    }
}
