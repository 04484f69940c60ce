/// Incremental run logger
///
/// Appends entries to the run's persisted log as they happen and mirrors each
/// one to `tracing`. Timestamps are clamped so they never go backwards even if
/// the wall clock does.

use crate::run::{
    storage::RunStorage,
    types::{LogEntry, LogLevel},
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug)]
pub struct RunLogger {
    storage: RunStorage,
    run_id: Uuid,
    next_seq: i64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl RunLogger {
    pub fn new(storage: RunStorage, run_id: Uuid) -> Self {
        Self {
            storage,
            run_id,
            next_seq: 0,
            last_timestamp: None,
        }
    }

    /// Continue an existing run's log after the previous logger was lost
    pub async fn resume(storage: RunStorage, run_id: Uuid) -> Result<Self> {
        let (next_seq, last_timestamp) = storage.log_cursor(run_id).await?;
        Ok(Self {
            storage,
            run_id,
            next_seq,
            last_timestamp,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub async fn info(&mut self, message: impl Into<String>, node_id: Option<&str>, data: Option<Value>) -> Result<()> {
        self.log(LogLevel::Info, message, node_id, data).await.map(|_| ())
    }

    pub async fn warn(&mut self, message: impl Into<String>, node_id: Option<&str>, data: Option<Value>) -> Result<()> {
        self.log(LogLevel::Warn, message, node_id, data).await.map(|_| ())
    }

    pub async fn error(&mut self, message: impl Into<String>, node_id: Option<&str>, data: Option<Value>) -> Result<()> {
        self.log(LogLevel::Error, message, node_id, data).await.map(|_| ())
    }

    /// Persist one entry; a storage failure is returned to the caller
    pub async fn log(
        &mut self,
        level: LogLevel,
        message: impl Into<String>,
        node_id: Option<&str>,
        data: Option<Value>,
    ) -> Result<LogEntry> {
        let now = Utc::now();
        let timestamp = match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };

        let entry = LogEntry {
            timestamp,
            level,
            message: message.into(),
            node_id: node_id.map(str::to_string),
            data,
        };

        match level {
            LogLevel::Info => tracing::info!(run_id = %self.run_id, "{}", entry.message),
            LogLevel::Warn => tracing::warn!(run_id = %self.run_id, "{}", entry.message),
            LogLevel::Error => tracing::error!(run_id = %self.run_id, "{}", entry.message),
        }

        self.storage.append_log(self.run_id, self.next_seq, &entry).await?;
        self.next_seq += 1;
        self.last_timestamp = Some(timestamp);

        Ok(entry)
    }
}
