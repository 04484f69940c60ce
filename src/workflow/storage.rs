/// SQLite persistence layer for workflow storage
///
/// Handles workflow CRUD operations in the engine database. The node list and
/// connections are stored as a JSON definition; the enabled flag and the
/// last-run timestamp live in their own columns because the scheduler reads
/// and updates them independently of editor saves.

use crate::workflow::types::Workflow;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqlitePool, sqlite::SqliteRow, Row};

/// SQLite-based workflow storage manager
#[derive(Debug, Clone)]
pub struct WorkflowStorage {
    /// SQLite connection pool for the engine database
    pool: SqlitePool,
}

impl WorkflowStorage {
    /// Create new storage instance with database connection
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the workflow storage schema
    ///
    /// Safe to call multiple times (uses IF NOT EXISTS).
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflows (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                definition JSON NOT NULL,
                last_run_at TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_workflows_enabled
            ON workflows(enabled)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store a new workflow or update existing one
    ///
    /// Editor saves never move the last-run timestamp backwards: on update the
    /// stored value is kept.
    pub async fn save_workflow(&self, workflow: &Workflow) -> Result<()> {
        let definition_json = serde_json::to_string(workflow)?;

        sqlx::query(
            r#"
            INSERT INTO workflows (id, name, enabled, definition, last_run_at, updated_at)
            VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                enabled = excluded.enabled,
                definition = excluded.definition,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&workflow.id)
        .bind(&workflow.name)
        .bind(workflow.enabled)
        .bind(&definition_json)
        .bind(workflow.last_run_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Retrieve a workflow by ID
    pub async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>> {
        let row = sqlx::query("SELECT definition, enabled, last_run_at FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| workflow_from_row(&row)).transpose()
    }

    /// List all workflows with basic metadata
    pub async fn list_workflows(&self) -> Result<Vec<WorkflowMetadata>> {
        let rows = sqlx::query(
            "SELECT id, name, enabled, last_run_at, updated_at FROM workflows ORDER BY updated_at DESC, id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut workflows = Vec::with_capacity(rows.len());
        for row in rows {
            workflows.push(WorkflowMetadata {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                enabled: row.try_get("enabled")?,
                last_run_at: row.try_get("last_run_at")?,
                updated_at: row.try_get("updated_at")?,
            });
        }

        Ok(workflows)
    }

    /// Load every enabled workflow (scheduler sweep)
    pub async fn load_enabled_workflows(&self) -> Result<Vec<Workflow>> {
        let rows = sqlx::query(
            "SELECT definition, enabled, last_run_at FROM workflows WHERE enabled = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(workflow_from_row).collect()
    }

    /// Record the completion time of the latest run
    pub async fn record_last_run(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE workflows SET last_run_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a workflow by ID
    pub async fn delete_workflow(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Rebuild a workflow from its JSON definition, overlaying the column-backed fields
fn workflow_from_row(row: &SqliteRow) -> Result<Workflow> {
    let definition_json: String = row.try_get("definition")?;
    let mut workflow: Workflow =
        serde_json::from_str(&definition_json).context("Stored workflow definition is not valid JSON")?;
    workflow.enabled = row.try_get("enabled")?;
    workflow.last_run_at = row.try_get("last_run_at")?;
    Ok(workflow)
}

/// Basic workflow metadata for listing operations
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetadata {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub updated_at: String,
}
