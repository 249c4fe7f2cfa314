//! # Batch Worker
//!
//! Runs one batched job and reports its outcome to the owning batch.
//!
//! ## Job Flow
//!
//! 1. Look up the batch. A missing batch means the dispatch that created the
//!    job was rolled back: the job is dropped without running or reporting.
//!    A batch whose dispatch is still pushing jobs is processed normally; its
//!    counters move, but callbacks wait until the dispatch closes.
//! 2. If the batch is cancelled and `worker.skip_cancelled_jobs` is set, the
//!    job is not run and is reported as successful so the batch can drain.
//! 3. Otherwise run the [`BatchJobHandler`] and report success or failure.
//!
//! A handler error is a *job* failure and is recorded on the batch. A storage
//! error while reporting is returned to the caller so the transport can
//! retry delivery. Callback errors are logged; the report itself committed.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::batch::{Batch, BatchContext};
use crate::constants::events;
use crate::error::{BatchError, Result};
use crate::messaging::{BatchedJob, InMemoryJobQueue};

/// What happened to a job handed to [`BatchWorker::process`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed(String),
    /// Not run because the batch was cancelled; reported as successful
    Skipped,
    /// The batch no longer exists; nothing was run or reported
    Orphaned,
}

impl JobOutcome {
    pub fn is_reported(&self) -> bool {
        !matches!(self, Self::Orphaned)
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Skipped => write!(f, "skipped"),
            Self::Orphaned => write!(f, "orphaned"),
        }
    }
}

/// The work behind a batched job.
///
/// Returning an error marks the job as failed on its batch.
#[async_trait]
pub trait BatchJobHandler: Send + Sync + 'static {
    async fn handle(&self, job: &BatchedJob) -> anyhow::Result<()>;
}

pub struct BatchWorker {
    context: BatchContext,
    handler: Arc<dyn BatchJobHandler>,
}

impl fmt::Debug for BatchWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchWorker")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl BatchWorker {
    pub fn new(context: BatchContext, handler: Arc<dyn BatchJobHandler>) -> Self {
        Self { context, handler }
    }

    pub fn context(&self) -> &BatchContext {
        &self.context
    }

    #[instrument(skip(self, job), fields(batch_id = %job.batch_id, job_id = %job.job_id))]
    pub async fn process(&self, job: &BatchedJob) -> Result<JobOutcome> {
        let Some(batch) = self.context.find(job.batch_id).await? else {
            warn!(
                job_type = %job.job.job_type,
                "Batch not found, dropping job from rolled back dispatch"
            );
            return Ok(JobOutcome::Orphaned);
        };

        let outcome = if batch.cancelled() && self.context.config().worker.skip_cancelled_jobs {
            debug!(event = events::BATCH_JOB_SKIPPED, "Batch cancelled, skipping job");
            JobOutcome::Skipped
        } else {
            match self.handler.handle(job).await {
                Ok(()) => JobOutcome::Succeeded,
                Err(e) => JobOutcome::Failed(format!("{e:#}")),
            }
        };

        if self.report(batch, job.job_id, &outcome).await? {
            Ok(outcome)
        } else {
            warn!("Batch rolled back while the job ran, outcome not counted");
            Ok(JobOutcome::Orphaned)
        }
    }

    /// Record a job outcome on its batch.
    ///
    /// Returns [`JobOutcome::Orphaned`] when the batch no longer exists, and
    /// the given outcome once it has been counted.
    pub async fn on_job_finished(
        &self,
        batch_id: Uuid,
        job_id: Uuid,
        outcome: &JobOutcome,
    ) -> Result<JobOutcome> {
        let Some(batch) = self.context.find(batch_id).await? else {
            return Ok(JobOutcome::Orphaned);
        };
        if self.report(batch, job_id, outcome).await? {
            Ok(outcome.clone())
        } else {
            Ok(JobOutcome::Orphaned)
        }
    }

    /// Report through an already loaded handle. False when nothing was counted.
    async fn report(&self, mut batch: Batch, job_id: Uuid, outcome: &JobOutcome) -> Result<bool> {
        let reported = match outcome {
            JobOutcome::Succeeded | JobOutcome::Skipped => {
                batch.record_successful_job(job_id).await
            }
            JobOutcome::Failed(reason) => {
                batch.record_failed_job(job_id, Some(reason.clone())).await
            }
            JobOutcome::Orphaned => return Ok(false),
        };

        match reported {
            Ok(()) => Ok(true),
            Err(BatchError::BatchNotFound(_)) => Ok(false),
            Err(e @ BatchError::Callback { .. }) => {
                error!(
                    batch_id = %batch.id(),
                    job_id = %job_id,
                    error = %e,
                    "Batch callback failed after job report"
                );
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Process every job waiting on one route of an in-memory queue, in order,
    /// until the route is empty. Returns the outcomes in processing order.
    pub async fn run_until_empty(
        &self,
        queue: &InMemoryJobQueue,
        connection: &str,
        queue_name: &str,
    ) -> Result<Vec<JobOutcome>> {
        let mut outcomes = Vec::new();
        while let Some(queued) = queue.pop(connection, queue_name).await {
            outcomes.push(self.process(&queued.job).await?);
        }
        info!(
            connection = connection,
            queue = queue_name,
            processed = outcomes.len(),
            "Drained job queue"
        );
        Ok(outcomes)
    }
}
