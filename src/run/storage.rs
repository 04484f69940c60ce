/// SQLite persistence for run records and their logs
///
/// Runs are written incrementally: the record is created at enqueue time, log
/// lines are appended while the run executes, and the terminal status is
/// written once at the end.

use crate::run::types::{LogEntry, NodeResult, RunRecord, RunStatus, TriggerSource};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RunStorage {
    pool: SqlitePool,
}

impl RunStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the runs and run_logs tables
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                status TEXT NOT NULL,
                source TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                error TEXT,
                results JSON
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS run_logs (
                run_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                level TEXT NOT NULL,
                message TEXT NOT NULL,
                node_id TEXT,
                data JSON,
                PRIMARY KEY (run_id, seq)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_runs_workflow ON runs(workflow_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert a new run in the `running` state
    pub async fn create_run(
        &self,
        run_id: Uuid,
        workflow_id: &str,
        source: TriggerSource,
        started_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO runs (id, workflow_id, status, source, started_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(run_id.to_string())
        .bind(workflow_id)
        .bind(RunStatus::Running.as_str())
        .bind(source.as_str())
        .bind(started_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to create run record {}", run_id))?;
        Ok(())
    }

    /// Refresh the start time when the run actually leaves the queue
    pub async fn mark_started(&self, run_id: Uuid, started_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE runs SET started_at = ? WHERE id = ? AND status = 'running'")
            .bind(started_at)
            .bind(run_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Append one log line at the given sequence position
    pub async fn append_log(&self, run_id: Uuid, seq: i64, entry: &LogEntry) -> Result<()> {
        let data = entry.data.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO run_logs (run_id, seq, timestamp, level, message, node_id, data)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run_id.to_string())
        .bind(seq)
        .bind(entry.timestamp)
        .bind(entry.level.as_str())
        .bind(&entry.message)
        .bind(entry.node_id.as_deref())
        .bind(data)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to append log for run {}", run_id))?;
        Ok(())
    }

    /// Write the terminal status; terminal runs are never touched again
    pub async fn finish_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        completed_at: DateTime<Utc>,
        error: Option<&str>,
        results: &[NodeResult],
    ) -> Result<()> {
        let results_json = serde_json::to_string(results)?;

        sqlx::query(
            r#"
            UPDATE runs SET status = ?, completed_at = ?, error = ?, results = ?
            WHERE id = ? AND status = 'running'
            "#,
        )
        .bind(status.as_str())
        .bind(completed_at)
        .bind(error)
        .bind(results_json)
        .bind(run_id.to_string())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to finalize run {}", run_id))?;
        Ok(())
    }

    /// Load a run with its ordered log
    pub async fn get_run(&self, run_id: Uuid) -> Result<Option<RunRecord>> {
        let row = sqlx::query(
            "SELECT workflow_id, status, source, started_at, completed_at, error, results FROM runs WHERE id = ?",
        )
        .bind(run_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: String = row.try_get("status")?;
        let source: String = row.try_get("source")?;
        let results: Option<String> = row.try_get("results")?;
        let results = match results {
            Some(json) => serde_json::from_str(&json).context("Stored run results are not valid JSON")?,
            None => Vec::new(),
        };

        Ok(Some(RunRecord {
            id: run_id,
            workflow_id: row.try_get("workflow_id")?,
            status: status.parse()?,
            source: source.parse()?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            error: row.try_get("error")?,
            results,
            logs: self.get_logs(run_id).await?,
        }))
    }

    /// Next free log sequence number and the latest logged timestamp
    pub async fn log_cursor(&self, run_id: Uuid) -> Result<(i64, Option<DateTime<Utc>>)> {
        let row = sqlx::query("SELECT seq, timestamp FROM run_logs WHERE run_id = ? ORDER BY seq DESC LIMIT 1")
            .bind(run_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let seq: i64 = row.try_get("seq")?;
                Ok((seq + 1, Some(row.try_get("timestamp")?)))
            }
            None => Ok((0, None)),
        }
    }

    async fn get_logs(&self, run_id: Uuid) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query(
            "SELECT timestamp, level, message, node_id, data FROM run_logs WHERE run_id = ? ORDER BY seq",
        )
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut logs = Vec::with_capacity(rows.len());
        for row in rows {
            let level: String = row.try_get("level")?;
            let data: Option<String> = row.try_get("data")?;
            logs.push(LogEntry {
                timestamp: row.try_get("timestamp")?,
                level: level.parse()?,
                message: row.try_get("message")?,
                node_id: row.try_get("node_id")?,
                data: data.map(|json| serde_json::from_str(&json)).transpose()?,
            });
        }
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::run::types::LogLevel;
    use serde_json::json;

    #[tokio::test]
    async fn run_lifecycle_is_persisted() {
        let db = Database::in_memory().await.unwrap();
        let storage = RunStorage::new(db.engine.clone());
        let run_id = Uuid::new_v4();

        storage.create_run(run_id, "wf-1", TriggerSource::Scheduler, Utc::now()).await.unwrap();
        let running = storage.get_run(run_id).await.unwrap().unwrap();
        assert_eq!(running.status, RunStatus::Running);
        assert_eq!(running.source, TriggerSource::Scheduler);
        assert!(running.completed_at.is_none());

        for (seq, message) in ["first", "second"].iter().enumerate() {
            let entry = LogEntry {
                timestamp: Utc::now(),
                level: LogLevel::Info,
                message: message.to_string(),
                node_id: Some("n1".to_string()),
                data: Some(json!({ "seq": seq })),
            };
            storage.append_log(run_id, seq as i64, &entry).await.unwrap();
        }

        storage.finish_run(run_id, RunStatus::Failed, Utc::now(), Some("boom"), &[]).await.unwrap();
        // a second finish is ignored
        storage.finish_run(run_id, RunStatus::Completed, Utc::now(), None, &[]).await.unwrap();

        let done = storage.get_run(run_id).await.unwrap().unwrap();
        assert_eq!(done.status, RunStatus::Failed);
        assert_eq!(done.error.as_deref(), Some("boom"));
        assert_eq!(done.logs.len(), 2);
        assert_eq!(done.logs[0].message, "first");
        assert_eq!(done.logs[1].data, Some(json!({ "seq": 1 })));
    }

    #[tokio::test]
    async fn unknown_run_is_none() {
        let db = Database::in_memory().await.unwrap();
        let storage = RunStorage::new(db.engine.clone());
        assert!(storage.get_run(Uuid::new_v4()).await.unwrap().is_none());
    }
}
