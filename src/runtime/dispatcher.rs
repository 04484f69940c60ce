/// Enqueue service and single queue consumer
///
/// Enqueueing creates the run record first so a job is never queued without
/// one. The consumer loop takes one job at a time, runs it on its own task so
/// a panic in a handler fails the run instead of the process, finalises the
/// run record, stamps the workflow's last run, and then waits the idle gap
/// before the next dequeue.

use crate::{
    run::{
        logger::RunLogger,
        storage::RunStorage,
        types::{NodeResult, RunStatus, TriggerSource},
    },
    runtime::{
        engine::ExecutionEngine,
        queue::{Job, JobOutcome, JobQueue, JobStatus},
    },
    workflow::{storage::WorkflowStorage, types::Workflow},
};
use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::{sync::Arc, time::Duration, time::Instant};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// What an accepted enqueue returns to its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueReceipt {
    pub job_id: Uuid,
    pub run_id: Uuid,
    pub queue_position: usize,
}

#[derive(Debug)]
pub struct Dispatcher {
    queue: Arc<JobQueue>,
    engine: ExecutionEngine,
    workflows: WorkflowStorage,
    runs: RunStorage,
    /// Minimum pause between finishing one job and dequeuing the next
    idle_gap: Duration,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<JobQueue>,
        engine: ExecutionEngine,
        workflows: WorkflowStorage,
        runs: RunStorage,
        idle_gap: Duration,
    ) -> Self {
        Self {
            queue,
            engine,
            workflows,
            runs,
            idle_gap,
        }
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    /// Load the stored workflow and enqueue a run of it
    pub async fn enqueue_run(&self, workflow_id: &str, source: TriggerSource) -> Result<EnqueueReceipt, EnqueueError> {
        let workflow = self
            .workflows
            .get_workflow(workflow_id)
            .await?
            .ok_or_else(|| EnqueueError::WorkflowNotFound(workflow_id.to_string()))?;
        self.enqueue_workflow(workflow, source).await
    }

    /// Enqueue a run of an already loaded workflow snapshot
    pub async fn enqueue_workflow(&self, workflow: Workflow, source: TriggerSource) -> Result<EnqueueReceipt, EnqueueError> {
        let run_id = Uuid::new_v4();
        self.runs.create_run(run_id, &workflow.id, source, Utc::now()).await?;

        let workflow_id = workflow.id.clone();
        let queued = self.queue.enqueue(Arc::new(workflow), run_id, source).await;

        tracing::info!(
            "📥 Enqueued workflow '{}' ({}): job {} run {} position {}",
            workflow_id,
            source,
            queued.job_id,
            run_id,
            queued.position
        );

        Ok(EnqueueReceipt {
            job_id: queued.job_id,
            run_id,
            queue_position: queued.position,
        })
    }

    pub async fn job_status(&self, job_id: Uuid) -> Option<JobStatus> {
        self.queue.status(job_id).await
    }

    /// Run the next job to completion; false when there was nothing to run
    pub async fn process_next(&self) -> bool {
        let Some(job) = self.queue.dequeue().await else {
            return false;
        };

        let clock = Instant::now();
        let started_at = job.started_at.unwrap_or_else(Utc::now);
        tracing::info!("▶️ Executing job {} (workflow '{}', run {})", job.id, job.workflow.id, job.run_id);

        let (mut status, mut results, mut error) = match self.execute_job(&job, started_at).await {
            Ok(results) => (RunStatus::Completed, Some(results), None),
            Err(e) => {
                let message = e.to_string();
                tracing::error!(run_id = %job.run_id, "❌ Workflow '{}' failed: {:#}", job.workflow.id, e);
                self.log_run_failure(job.run_id, &message).await;
                (RunStatus::Failed, None, Some(message))
            }
        };

        let completed_at = Utc::now();
        if let Err(e) = self
            .runs
            .finish_run(job.run_id, status, completed_at, error.as_deref(), results.as_deref().unwrap_or_default())
            .await
        {
            let message = format!("{:#}", e);
            tracing::error!("❌ Failed to finalize run {}: {}", job.run_id, message);
            if status == RunStatus::Completed {
                self.log_run_failure(job.run_id, &message).await;
                if let Err(e) = self
                    .runs
                    .finish_run(job.run_id, RunStatus::Failed, completed_at, Some(&message), &[])
                    .await
                {
                    tracing::error!("❌ Run {} left unfinalized: {:#}", job.run_id, e);
                }
            }
            status = RunStatus::Failed;
            results = None;
            error = Some(message);
        }
        if let Err(e) = self.workflows.record_last_run(&job.workflow.id, completed_at).await {
            tracing::error!("❌ Failed to record last run for '{}': {:#}", job.workflow.id, e);
        }

        let outcome = JobOutcome {
            run_id: job.run_id,
            duration: clock.elapsed().as_millis() as u64,
            results,
            error,
            queued_at: job.queued_at,
            started_at,
            completed_at,
        };
        tracing::info!("🏁 Job {} {} in {}ms", job.id, status.as_str(), outcome.duration);
        self.queue.complete(job.id, status, outcome).await;
        true
    }

    async fn execute_job(&self, job: &Job, started_at: chrono::DateTime<Utc>) -> Result<Vec<NodeResult>> {
        self.runs.mark_started(job.run_id, started_at).await?;

        let engine = self.engine.clone();
        let runs = self.runs.clone();
        let workflow = Arc::clone(&job.workflow);
        let run_id = job.run_id;

        let handle = tokio::spawn(async move {
            let mut logger = RunLogger::new(runs, run_id);
            engine.execute(&workflow, &mut logger).await
        });

        match handle.await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => {
                let panic = join_error.into_panic();
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(anyhow::anyhow!("Run panicked: {}", message))
            }
            Err(join_error) => Err(anyhow::anyhow!("Run task was cancelled: {}", join_error)),
        }
    }

    /// Append the run-level failure to the run's log, continuing after any entries already written
    async fn log_run_failure(&self, run_id: Uuid, message: &str) {
        if let Err(e) = self.append_failure(run_id, message).await {
            tracing::error!("❌ Failed to log failure of run {}: {:#}", run_id, e);
        }
    }

    async fn append_failure(&self, run_id: Uuid, message: &str) -> Result<()> {
        let mut logger = RunLogger::resume(self.runs.clone(), run_id).await?;
        logger.error(format!("Workflow execution failed: {}", message), None, None).await
    }

    /// Consume the queue forever: one job at a time, idle gap between dequeues
    pub async fn run(self: Arc<Self>) {
        tracing::info!("🔄 Job dispatcher started (idle gap {:?})", self.idle_gap);
        loop {
            if self.process_next().await {
                tokio::time::sleep(self.idle_gap).await;
            } else {
                self.queue.wait_for_job().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::Database,
        runtime::{
            executor::{NodeExecutor, NodeHandler, RunContext},
            registry::{ConnectorDeps, HandlerRegistry},
        },
        workflow::{
            config::NodeConfig,
            types::{Node, NodeKind},
        },
    };
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Exploding;

    /// Removes the run table mid-run so finalising the record fails
    struct DropsRunTable(sqlx::SqlitePool);

    #[async_trait]
    impl NodeHandler for DropsRunTable {
        async fn execute(&self, _node: &Node, _config: &NodeConfig, _context: &RunContext) -> Result<Value> {
            sqlx::query("DROP TABLE runs").execute(&self.0).await?;
            Ok(json!({ "dropped": true }))
        }
    }

    #[async_trait]
    impl NodeHandler for Exploding {
        async fn execute(&self, _node: &Node, _config: &NodeConfig, _context: &RunContext) -> Result<Value> {
            panic!("handler blew up");
        }
    }

    async fn dispatcher(db: &Database) -> Dispatcher {
        let registry = HandlerRegistry::with_builtins(ConnectorDeps {
            http: reqwest::Client::new(),
            http_timeout: Duration::from_secs(5),
            datastore: db.datastore.clone(),
        });
        registry.register(NodeKind::Action, "explode", Arc::new(Exploding));
        registry.register(NodeKind::Action, "drop-runs", Arc::new(DropsRunTable(db.engine.clone())));
        Dispatcher::new(
            Arc::new(JobQueue::new(Duration::from_secs(60))),
            ExecutionEngine::new(Arc::new(NodeExecutor::new(registry))),
            WorkflowStorage::new(db.engine.clone()),
            RunStorage::new(db.engine.clone()),
            Duration::from_millis(10),
        )
    }

    fn workflow(id: &str, subtype: &str) -> Workflow {
        Workflow {
            id: id.to_string(),
            name: id.to_string(),
            enabled: true,
            nodes: vec![Node {
                id: "only".to_string(),
                kind: NodeKind::Action,
                subtype: subtype.to_string(),
                label: "Only".to_string(),
                config: json!({}).as_object().cloned().unwrap(),
                position: None,
            }],
            connections: Vec::new(),
            last_run_at: None,
        }
    }

    #[tokio::test]
    async fn unknown_workflow_is_not_found() {
        let db = Database::in_memory().await.unwrap();
        let dispatcher = dispatcher(&db).await;
        let err = dispatcher.enqueue_run("missing", TriggerSource::Manual).await.unwrap_err();
        assert!(matches!(err, EnqueueError::WorkflowNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn completed_run_updates_records() {
        let db = Database::in_memory().await.unwrap();
        let dispatcher = dispatcher(&db).await;
        let storage = WorkflowStorage::new(db.engine.clone());
        storage.save_workflow(&workflow("wf-ok", "email")).await.unwrap();

        let receipt = dispatcher.enqueue_run("wf-ok", TriggerSource::Manual).await.unwrap();
        assert_eq!(receipt.queue_position, 1);
        assert!(dispatcher.process_next().await);
        assert!(!dispatcher.process_next().await);

        let Some(JobStatus::Completed(outcome)) = dispatcher.job_status(receipt.job_id).await else {
            panic!("job should be completed");
        };
        assert_eq!(outcome.results.as_ref().unwrap()[0].result.as_ref().unwrap()["simulated"], json!(true));

        let run = RunStorage::new(db.engine.clone()).get_run(receipt.run_id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.completed_at.is_some());
        assert_eq!(run.results.len(), 1);

        let stored = storage.get_workflow("wf-ok").await.unwrap().unwrap();
        assert!(stored.last_run_at.is_some());
    }

    #[tokio::test]
    async fn panicking_handler_fails_the_run_not_the_process() {
        let db = Database::in_memory().await.unwrap();
        let dispatcher = dispatcher(&db).await;
        let storage = WorkflowStorage::new(db.engine.clone());
        storage.save_workflow(&workflow("wf-panic", "explode")).await.unwrap();

        let receipt = dispatcher.enqueue_run("wf-panic", TriggerSource::Manual).await.unwrap();
        assert!(dispatcher.process_next().await);

        let Some(JobStatus::Failed(outcome)) = dispatcher.job_status(receipt.job_id).await else {
            panic!("job should have failed");
        };
        assert!(outcome.error.as_deref().unwrap().contains("handler blew up"));

        let run = RunStorage::new(db.engine.clone()).get_run(receipt.run_id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        let last = run.logs.last().unwrap();
        assert!(last.message.starts_with("Workflow execution failed"));
        // the node's start entry was written before the panic
        assert_eq!(run.logs.len(), 2);

        let stored = storage.get_workflow("wf-panic").await.unwrap().unwrap();
        assert!(stored.last_run_at.is_some());
    }

    #[tokio::test]
    async fn enqueue_fails_when_run_record_cannot_be_written() {
        let db = Database::in_memory().await.unwrap();
        let dispatcher = dispatcher(&db).await;

        db.engine.close().await;
        let err = dispatcher
            .enqueue_workflow(workflow("wf-closed", "email"), TriggerSource::Manual)
            .await
            .unwrap_err();
        assert!(matches!(err, EnqueueError::Storage(_)));
        assert_eq!(dispatcher.queue().pending_len().await, 0);
    }

    #[tokio::test]
    async fn unwritable_run_record_fails_the_job() {
        let db = Database::in_memory().await.unwrap();
        let dispatcher = dispatcher(&db).await;
        let storage = WorkflowStorage::new(db.engine.clone());
        storage.save_workflow(&workflow("wf-lost", "drop-runs")).await.unwrap();

        let receipt = dispatcher.enqueue_run("wf-lost", TriggerSource::Manual).await.unwrap();
        assert!(dispatcher.process_next().await);

        let Some(JobStatus::Failed(outcome)) = dispatcher.job_status(receipt.job_id).await else {
            panic!("job should have failed");
        };
        assert!(outcome.results.is_none());
        assert!(outcome.error.as_deref().unwrap().contains("Failed to finalize run"));

        let last = RunStorage::new(db.engine.clone()).log_cursor(receipt.run_id).await.unwrap();
        // start, success and the run-level failure
        assert_eq!(last.0, 3);
    }
}
