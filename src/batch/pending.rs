//! # Pending Batch
//!
//! Builder that accumulates callbacks, routing and the job list before a batch
//! exists. [`PendingBatch::dispatch`] consumes it and is the only way a batch
//! record comes into being.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tasker_batch::batch::BatchContext;
//! use tasker_batch::callbacks::{CallbackRegistry, StoredCommand};
//! use tasker_batch::config::BatchConfig;
//! use tasker_batch::messaging::{InMemoryJobQueue, JobPayload};
//! use tasker_batch::repository::InMemoryBatchRepository;
//!
//! # async fn example() -> tasker_batch::Result<()> {
//! let context = BatchContext::new(
//!     Arc::new(InMemoryBatchRepository::new()),
//!     Arc::new(InMemoryJobQueue::new()),
//!     Arc::new(CallbackRegistry::new()),
//!     BatchConfig::default(),
//! );
//!
//! let batch = context
//!     .batch(vec![JobPayload::new("import_row", serde_json::json!({"row": 1}))])
//!     .name("csv import")
//!     .success(StoredCommand::new("notify_import_done"))
//!     .catch(StoredCommand::new("alert_import_failed"))
//!     .on_queue("imports")
//!     .dispatch()
//!     .await?;
//! # let _ = batch;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::{error, instrument, warn};

use super::{Batch, BatchContext};
use crate::callbacks::StoredCommand;
use crate::constants::events;
use crate::error::Result;
use crate::logging::log_batch_operation;
use crate::messaging::JobPayload;
use crate::models::BatchOptions;
use crate::repository::BatchUpdate;

#[derive(Debug)]
pub struct PendingBatch {
    context: BatchContext,
    jobs: Vec<JobPayload>,
    name: String,
    options: BatchOptions,
}

impl PendingBatch {
    pub fn new(context: BatchContext, jobs: Vec<JobPayload>) -> Self {
        Self {
            context,
            jobs,
            name: String::new(),
            options: BatchOptions::default(),
        }
    }

    /// Append another job to the batch
    pub fn job(mut self, job: JobPayload) -> Self {
        self.jobs.push(job);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Run after every job has reported, unless the batch was cancelled
    pub fn success(mut self, callback: StoredCommand) -> Self {
        self.options.success.push(callback);
        self
    }

    pub fn then(self, callback: StoredCommand) -> Self {
        self.success(callback)
    }

    /// Run once when the batch is cancelled (first failure or explicit cancel)
    pub fn catch(mut self, callback: StoredCommand) -> Self {
        self.options.catch.push(callback);
        self
    }

    /// Run once when every job has reported, whatever the outcome
    pub fn finally(mut self, callback: StoredCommand) -> Self {
        self.options.finally.push(callback);
        self
    }

    /// Keep going when jobs fail instead of cancelling the batch
    pub fn allow_failures(mut self, allow_failures: bool) -> Self {
        self.options.allow_failures = allow_failures;
        self
    }

    pub fn on_connection(mut self, connection: impl Into<String>) -> Self {
        self.options.connection = Some(connection.into());
        self
    }

    pub fn on_queue(mut self, queue: impl Into<String>) -> Self {
        self.options.queue = Some(queue.into());
        self
    }

    pub fn batch_name(&self) -> &str {
        &self.name
    }

    pub fn jobs(&self) -> &[JobPayload] {
        &self.jobs
    }

    pub fn success_callbacks(&self) -> &[StoredCommand] {
        &self.options.success
    }

    pub fn catch_callbacks(&self) -> &[StoredCommand] {
        &self.options.catch
    }

    pub fn finally_callbacks(&self) -> &[StoredCommand] {
        &self.options.finally
    }

    pub fn allows_failures(&self) -> bool {
        self.options.allows_failures()
    }

    pub fn connection(&self) -> Option<&str> {
        self.options.connection.as_deref()
    }

    pub fn queue(&self) -> Option<&str> {
        self.options.queue.as_deref()
    }

    /// Options as they will be stored: routing resolved against config defaults
    pub fn options_snapshot(&self) -> BatchOptions {
        let defaults = &self.context.config().queue;
        self.options
            .clone()
            .with_default_routing(&defaults.default_connection, &defaults.default_queue)
    }

    /// Create the batch and enqueue every job, or leave no batch behind.
    ///
    /// If storing fails nothing exists. If adding jobs fails the new record is
    /// deleted and the add error is returned. Jobs pushed before the failure
    /// stay on the queue; workers skip them because their batch is gone.
    ///
    /// Workers may report jobs before the last push. Those reports only move
    /// counters: the batch cannot finish or be cancelled, and no callback
    /// runs, until the closing `Dispatched` update commits.
    #[instrument(skip(self), fields(name = %self.name, jobs = self.jobs.len()))]
    pub async fn dispatch(self) -> Result<Batch> {
        let repository = Arc::clone(self.context.repository());
        let record = repository.store(&self).await?;
        let batch_id = record.id;
        log_batch_operation(events::BATCH_CREATED, batch_id, None, 0, 0, None);

        let PendingBatch { context, jobs, .. } = self;
        let mut batch = Batch::new(context, record);

        let enqueued: Result<BatchUpdate> = async {
            batch.enqueue(jobs, false).await?;
            repository.mark_dispatched(batch_id).await
        }
        .await;

        match enqueued {
            Ok(update) => {
                log_batch_operation(
                    events::BATCH_DISPATCHED,
                    batch_id,
                    None,
                    update.record.pending_jobs,
                    update.record.failed_jobs,
                    None,
                );
                // Failures reported mid-dispatch are settled here, against the first of them
                let failure = if update.transition.cancelled {
                    update.record.failed_job_ids.first().map(|id| (*id, None))
                } else {
                    None
                };
                // The batch exists and is dispatched; a failing callback must not undo that
                if let Err(e) = batch.settle(update, failure).await {
                    warn!(batch_id = %batch_id, error = %e, "Callback failed while closing dispatch");
                }
                Ok(batch)
            }
            Err(e) => {
                warn!(batch_id = %batch_id, error = %e, "Adding jobs failed, rolling back batch");
                if let Err(delete_err) = repository.delete(batch_id).await {
                    error!(
                        batch_id = %batch_id,
                        error = %delete_err,
                        "Failed to delete batch during rollback"
                    );
                }
                log_batch_operation(
                    events::BATCH_ROLLED_BACK,
                    batch_id,
                    None,
                    0,
                    0,
                    Some(&e.to_string()),
                );
                Err(e)
            }
        }
    }
}
