/// Interval scheduler
///
/// A repeating tokio-cron-scheduler job fires a due-ness sweep once per
/// period. Each sweep loads the enabled workflows, finds their schedule
/// trigger, and enqueues every workflow whose interval has elapsed since its
/// last run. A workflow that already has a queued or executing job is left
/// alone until that job finishes.

use crate::{
    run::types::TriggerSource,
    runtime::dispatcher::{Dispatcher, EnqueueReceipt},
    workflow::{
        config::{ScheduleConfig, ScheduleInterval},
        storage::WorkflowStorage,
    },
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

pub struct IntervalScheduler {
    workflows: WorkflowStorage,
    dispatcher: Arc<Dispatcher>,
    period: Duration,
    cron: Mutex<Option<JobScheduler>>,
}

/// Whether a schedule is due; a workflow that never ran is always due
pub fn is_due(interval: ScheduleInterval, last_run_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_run_at {
        None => true,
        Some(last) => now - last >= interval.period(),
    }
}

impl IntervalScheduler {
    pub fn new(workflows: WorkflowStorage, dispatcher: Arc<Dispatcher>, period: Duration) -> Self {
        Self {
            workflows,
            dispatcher,
            period,
            cron: Mutex::new(None),
        }
    }

    /// One due-ness pass; returns the receipts of the runs it enqueued
    ///
    /// A storage read failure skips the whole sweep.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Vec<EnqueueReceipt> {
        let workflows = match self.workflows.load_enabled_workflows().await {
            Ok(workflows) => workflows,
            Err(e) => {
                tracing::error!("❌ Scheduler sweep skipped, failed to load workflows: {:#}", e);
                return Vec::new();
            }
        };

        let mut receipts = Vec::new();
        for workflow in workflows {
            let Some(trigger) = workflow.find_trigger("schedule") else {
                continue;
            };
            let schedule = ScheduleConfig::parse(&trigger.config);

            if !is_due(schedule.interval, workflow.last_run_at, now) {
                continue;
            }
            if self.dispatcher.queue().has_active(&workflow.id).await {
                tracing::debug!("⏭️ Workflow '{}' is due but already queued", workflow.id);
                continue;
            }

            tracing::info!("⏰ Workflow '{}' is due ({})", workflow.id, schedule.interval.label());
            let workflow_id = workflow.id.clone();
            match self.dispatcher.enqueue_workflow(workflow, TriggerSource::Scheduler).await {
                Ok(receipt) => receipts.push(receipt),
                Err(e) => tracing::error!("❌ Failed to enqueue scheduled workflow '{}': {:#}", workflow_id, e),
            }
        }

        receipts
    }

    /// Start the repeating sweep
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let mut cron = self.cron.lock().await;
        if cron.is_some() {
            return Ok(());
        }

        let scheduler = JobScheduler::new().await?;
        let this = Arc::clone(self);
        let job = CronJob::new_repeated_async(self.period, move |_uuid, _l| {
            let this = Arc::clone(&this);
            Box::pin(async move {
                let receipts = this.sweep(Utc::now()).await;
                tracing::debug!("🔔 Scheduler sweep enqueued {} workflows", receipts.len());
            })
        })?;
        scheduler.add(job).await?;
        scheduler.start().await?;
        *cron = Some(scheduler);

        tracing::info!("⏰ Interval scheduler started (period {:?})", self.period);
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        if let Some(mut scheduler) = self.cron.lock().await.take() {
            scheduler.shutdown().await?;
            tracing::info!("⏹️ Interval scheduler stopped");
        }
        Ok(())
    }
}
