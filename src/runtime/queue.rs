/// In-process FIFO job queue
///
/// The queue is the only state shared between the scheduler, execute-now
/// requests, and the dispatcher. Producers append concurrently; a single
/// consumer drains it. At most one job is executing at any instant: `dequeue`
/// hands out nothing while a job is still in flight.
///
/// Terminal results stay queryable for the retention window and are evicted
/// lazily on later queue access.

use crate::{
    run::types::{NodeResult, RunStatus, TriggerSource},
    workflow::types::Workflow,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

/// A queued request to perform one run
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub run_id: Uuid,
    /// Snapshot taken at enqueue time; later edits do not affect this job
    pub workflow: Arc<Workflow>,
    pub source: TriggerSource,
    /// Arrival index, strictly increasing
    pub sequence: u64,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Receipt for an accepted job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueuedJob {
    pub job_id: Uuid,
    /// 1-based place in the pending line at enqueue time
    pub position: usize,
}

/// Terminal result of a job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub run_id: Uuid,
    /// Milliseconds from dequeue to completion
    pub duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<NodeResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Externally visible job state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobStatus {
    Queued {
        position: usize,
    },
    Executing {
        #[serde(rename = "startedAt")]
        started_at: DateTime<Utc>,
    },
    Completed(JobOutcome),
    Failed(JobOutcome),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed(_) | JobStatus::Failed(_))
    }
}

#[derive(Debug)]
struct FinishedJob {
    status: JobStatus,
    finished: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Job>,
    executing: Option<Job>,
    finished: HashMap<Uuid, FinishedJob>,
    next_sequence: u64,
}

impl QueueState {
    fn purge_expired(&mut self, retention: Duration) {
        self.finished.retain(|_, job| job.finished.elapsed() < retention);
    }
}

#[derive(Debug)]
pub struct JobQueue {
    state: Mutex<QueueState>,
    available: Notify,
    retention: Duration,
}

impl JobQueue {
    pub fn new(retention: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Notify::new(),
            retention,
        }
    }

    /// Append a job; never blocks on execution and never rejects
    pub async fn enqueue(&self, workflow: Arc<Workflow>, run_id: Uuid, source: TriggerSource) -> EnqueuedJob {
        let mut state = self.state.lock().await;
        state.purge_expired(self.retention);

        let job = Job {
            id: Uuid::new_v4(),
            run_id,
            workflow,
            source,
            sequence: state.next_sequence,
            queued_at: Utc::now(),
            started_at: None,
        };
        state.next_sequence += 1;

        let receipt = EnqueuedJob {
            job_id: job.id,
            position: state.pending.len() + 1,
        };
        tracing::debug!(
            "📥 Queued job {} for workflow '{}' at position {} ({})",
            job.id,
            job.workflow.id,
            receipt.position,
            source
        );
        state.pending.push_back(job);
        drop(state);

        self.available.notify_one();
        receipt
    }

    /// Take the head job, or nothing if the queue is empty or a job is still executing
    pub async fn dequeue(&self) -> Option<Job> {
        let mut state = self.state.lock().await;
        state.purge_expired(self.retention);

        if state.executing.is_some() {
            return None;
        }

        let mut job = state.pending.pop_front()?;
        job.started_at = Some(Utc::now());
        state.executing = Some(job.clone());
        Some(job)
    }

    /// Record the terminal result of the executing job and free the slot
    pub async fn complete(&self, job_id: Uuid, status: RunStatus, outcome: JobOutcome) {
        let mut state = self.state.lock().await;

        if state.executing.as_ref().is_some_and(|job| job.id == job_id) {
            state.executing = None;
        } else {
            tracing::warn!("⚠️ Completed job {} was not the executing job", job_id);
        }

        let status = match status {
            RunStatus::Failed => JobStatus::Failed(outcome),
            _ => JobStatus::Completed(outcome),
        };
        state.finished.insert(
            job_id,
            FinishedJob {
                status,
                finished: Instant::now(),
            },
        );
        state.purge_expired(self.retention);
    }

    /// Current state of a job; `None` for unknown or evicted ids
    pub async fn status(&self, job_id: Uuid) -> Option<JobStatus> {
        let mut state = self.state.lock().await;
        state.purge_expired(self.retention);

        if let Some(job) = state.executing.as_ref().filter(|job| job.id == job_id) {
            return Some(JobStatus::Executing {
                started_at: job.started_at.unwrap_or(job.queued_at),
            });
        }
        if let Some(index) = state.pending.iter().position(|job| job.id == job_id) {
            return Some(JobStatus::Queued { position: index + 1 });
        }
        state.finished.get(&job_id).map(|job| job.status.clone())
    }

    /// Whether the workflow has a queued or executing job
    pub async fn has_active(&self, workflow_id: &str) -> bool {
        let state = self.state.lock().await;
        state.executing.iter().chain(state.pending.iter()).any(|job| job.workflow.id == workflow_id)
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Wait until a job is enqueued
    ///
    /// A notification sent while nobody was waiting is kept, so an enqueue that
    /// races with the consumer going idle is not lost.
    pub async fn wait_for_job(&self) {
        self.available.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow(id: &str) -> Arc<Workflow> {
        Arc::new(Workflow {
            id: id.to_string(),
            name: id.to_string(),
            enabled: true,
            nodes: Vec::new(),
            connections: Vec::new(),
            last_run_at: None,
        })
    }

    fn outcome(run_id: Uuid) -> JobOutcome {
        let now = Utc::now();
        JobOutcome {
            run_id,
            duration: 0,
            results: Some(Vec::new()),
            error: None,
            queued_at: now,
            started_at: now,
            completed_at: now,
        }
    }

    #[tokio::test]
    async fn fifo_with_single_executing_slot() {
        let queue = JobQueue::new(Duration::from_secs(60));
        let first = queue.enqueue(workflow("a"), Uuid::new_v4(), TriggerSource::Manual).await;
        let second = queue.enqueue(workflow("b"), Uuid::new_v4(), TriggerSource::Scheduler).await;
        assert_eq!((first.position, second.position), (1, 2));

        let head = queue.dequeue().await.unwrap();
        assert_eq!(head.id, first.job_id);
        assert!(queue.dequeue().await.is_none(), "second job must wait for the first");

        assert!(matches!(queue.status(first.job_id).await, Some(JobStatus::Executing { .. })));
        assert_eq!(queue.status(second.job_id).await, Some(JobStatus::Queued { position: 1 }));

        queue.complete(head.id, RunStatus::Completed, outcome(head.run_id)).await;
        let next = queue.dequeue().await.unwrap();
        assert_eq!(next.id, second.job_id);
        assert!(next.sequence > head.sequence);
    }

    #[tokio::test]
    async fn terminal_status_is_stable_until_evicted() {
        let queue = JobQueue::new(Duration::from_millis(100));
        let receipt = queue.enqueue(workflow("a"), Uuid::new_v4(), TriggerSource::Manual).await;
        let job = queue.dequeue().await.unwrap();
        queue.complete(job.id, RunStatus::Failed, outcome(job.run_id)).await;

        let first = queue.status(receipt.job_id).await.unwrap();
        let second = queue.status(receipt.job_id).await.unwrap();
        assert!(matches!(first, JobStatus::Failed(_)));
        assert_eq!(first, second);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(queue.status(receipt.job_id).await.is_none());
    }

    #[tokio::test]
    async fn tracks_active_workflows() {
        let queue = JobQueue::new(Duration::from_secs(60));
        queue.enqueue(workflow("a"), Uuid::new_v4(), TriggerSource::Manual).await;
        assert!(queue.has_active("a").await);
        assert!(!queue.has_active("b").await);

        let job = queue.dequeue().await.unwrap();
        assert!(queue.has_active("a").await);
        queue.complete(job.id, RunStatus::Completed, outcome(job.run_id)).await;
        assert!(!queue.has_active("a").await);
        assert_eq!(queue.pending_len().await, 0);
    }

    #[tokio::test]
    async fn status_serialises_with_status_tag() {
        let run_id = Uuid::new_v4();
        let value = serde_json::to_value(JobStatus::Completed(outcome(run_id))).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["duration"], 0);
        assert!(value.get("error").is_none());

        let queued = serde_json::to_value(JobStatus::Queued { position: 3 }).unwrap();
        assert_eq!(queued, serde_json::json!({ "status": "queued", "position": 3 }));
    }

    #[tokio::test]
    async fn enqueue_wakes_a_waiting_consumer() {
        let queue = Arc::new(JobQueue::new(Duration::from_secs(60)));
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.wait_for_job().await })
        };
        queue.enqueue(workflow("a"), Uuid::new_v4(), TriggerSource::Webhook).await;
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }
}
