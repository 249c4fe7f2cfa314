//! # Batches
//!
//! - [`PendingBatch`] - builder consumed by dispatch
//! - [`Batch`] - live handle over a stored batch record
//! - [`BatchContext`] - injected repository, queue, command executor and config
//!
//! ## Callback Firing
//!
//! Every counter change goes through one repository call that returns the
//! [`Transition`](crate::state_machine::Transition) *this* call caused. Only
//! after that call has committed does the handle run callbacks:
//!
//! - `cancelled` → catch callbacks, in registration order
//! - `finished` → success callbacks, in registration order
//! - `drained` → finally callbacks, in registration order
//!
//! Each flag is true for exactly one caller per batch, so each list runs at
//! most once no matter how many workers report concurrently.

mod context;
mod pending;

pub use context::BatchContext;
pub use pending::PendingBatch;

use chrono::{DateTime, Utc};
use tracing::{error, instrument, warn};
use uuid::Uuid;

use crate::callbacks::{CallbackInvocation, CallbackKind, StoredCommand};
use crate::constants::events;
use crate::error::{BatchError, Result};
use crate::logging::log_batch_operation;
use crate::messaging::{BatchedJob, JobPayload};
use crate::models::{BatchOptions, BatchRecord};
use crate::repository::BatchUpdate;
use crate::state_machine::BatchState;

/// A job that failed, as passed to catch callbacks
type Failure = (Uuid, Option<String>);

#[derive(Debug, Clone)]
pub struct Batch {
    context: BatchContext,
    record: BatchRecord,
}

impl Batch {
    pub(crate) fn new(context: BatchContext, record: BatchRecord) -> Self {
        Self { context, record }
    }

    pub fn id(&self) -> Uuid {
        self.record.id
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// The record as of the last operation through this handle
    pub fn record(&self) -> &BatchRecord {
        &self.record
    }

    pub fn options(&self) -> &BatchOptions {
        &self.record.options
    }

    pub fn total_jobs(&self) -> i32 {
        self.record.total_jobs
    }

    pub fn pending_jobs(&self) -> i32 {
        self.record.pending_jobs
    }

    pub fn failed_jobs(&self) -> i32 {
        self.record.failed_jobs
    }

    pub fn failed_job_ids(&self) -> &[Uuid] {
        &self.record.failed_job_ids
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.record.created_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.record.cancelled_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.record.finished_at
    }

    pub fn processed_jobs(&self) -> i32 {
        self.record.processed_jobs()
    }

    pub fn progress(&self) -> i32 {
        self.record.progress()
    }

    pub fn has_pending_jobs(&self) -> bool {
        self.record.has_pending_jobs()
    }

    pub fn has_failures(&self) -> bool {
        self.record.has_failures()
    }

    pub fn finished(&self) -> bool {
        self.record.finished()
    }

    pub fn cancelled(&self) -> bool {
        self.record.cancelled()
    }

    pub fn state(&self) -> BatchState {
        self.record.state()
    }

    /// Load the current record from the repository
    pub async fn fresh(&self) -> Result<Batch> {
        let record = self
            .context
            .repository()
            .find(self.id())
            .await?
            .ok_or(BatchError::BatchNotFound(self.id()))?;
        Ok(Batch::new(self.context.clone(), record))
    }

    /// Register more jobs with the batch and push them to the queue.
    ///
    /// Jobs that never reach the queue are released from the counters before
    /// the push error is returned.
    pub async fn add(&mut self, jobs: Vec<JobPayload>) -> Result<()> {
        self.enqueue(jobs, true).await
    }

    #[instrument(skip(self, jobs), fields(batch_id = %self.record.id, jobs = jobs.len()))]
    pub(crate) async fn enqueue(&mut self, jobs: Vec<JobPayload>, release_unpushed: bool) -> Result<()> {
        if jobs.is_empty() {
            return Ok(());
        }
        let count = i32::try_from(jobs.len())
            .map_err(|_| BatchError::invalid_state(self.id(), "too many jobs for one add"))?;

        // Count first: a job pushed before its registration could finish and underflow pending
        let update = self
            .context
            .repository()
            .increment_total_jobs(self.id(), count)
            .await?;
        self.record = update.record;

        let defaults = &self.context.config().queue;
        let connection = self
            .record
            .options
            .connection
            .clone()
            .unwrap_or_else(|| defaults.default_connection.clone());
        let queue = self
            .record
            .options
            .queue
            .clone()
            .unwrap_or_else(|| defaults.default_queue.clone());

        let mut pushed = 0;
        for job in jobs {
            let wrapped = BatchedJob::wrap(&self.record, job, &connection, &queue);
            if let Err(e) = self.context.queue().push(&wrapped, &connection, &queue).await {
                let unpushed = count - pushed;
                warn!(
                    batch_id = %self.id(),
                    pushed = pushed,
                    unpushed = unpushed,
                    error = %e,
                    "Queue push failed while adding jobs"
                );
                if release_unpushed {
                    self.release(unpushed).await;
                }
                return Err(e);
            }
            pushed += 1;
        }

        log_batch_operation(
            events::BATCH_JOBS_ADDED,
            self.id(),
            None,
            self.record.pending_jobs,
            self.record.failed_jobs,
            Some(&format!("{count} jobs on {connection}/{queue}")),
        );
        Ok(())
    }

    async fn release(&mut self, unpushed: i32) {
        match self.context.repository().release_jobs(self.id(), unpushed).await {
            Ok(update) => {
                log_batch_operation(
                    events::BATCH_JOBS_RELEASED,
                    self.id(),
                    None,
                    update.record.pending_jobs,
                    update.record.failed_jobs,
                    None,
                );
                if let Err(e) = self.settle(update, None).await {
                    warn!(batch_id = %self.id(), error = %e, "Callback failed after releasing jobs");
                }
            }
            Err(e) => error!(
                batch_id = %self.id(),
                unpushed = unpushed,
                error = %e,
                "Failed to release unpushed jobs; batch cannot finish"
            ),
        }
    }

    pub async fn record_successful_job(&mut self, job_id: Uuid) -> Result<()> {
        let update = self
            .context
            .repository()
            .record_successful_job(self.id(), job_id)
            .await?;
        log_batch_operation(
            events::BATCH_JOB_SUCCEEDED,
            self.id(),
            Some(job_id),
            update.record.pending_jobs,
            update.record.failed_jobs,
            None,
        );
        self.settle(update, None).await
    }

    pub async fn record_failed_job(&mut self, job_id: Uuid, error: Option<String>) -> Result<()> {
        let cancel_batch = !self.record.options.allows_failures();
        let update = self
            .context
            .repository()
            .record_failed_job(self.id(), job_id, cancel_batch)
            .await?;
        log_batch_operation(
            events::BATCH_JOB_FAILED,
            self.id(),
            Some(job_id),
            update.record.pending_jobs,
            update.record.failed_jobs,
            error.as_deref(),
        );
        self.settle(update, Some((job_id, error))).await
    }

    /// Cancel the batch. Only the first cancellation runs catch callbacks.
    pub async fn cancel(&mut self) -> Result<()> {
        let update = self.context.repository().cancel(self.id()).await?;
        self.settle(update, None).await
    }

    /// Adopt a committed update and run the callbacks its transition earned.
    /// Returns the first callback error after every callback has had its turn.
    pub(crate) async fn settle(&mut self, update: BatchUpdate, failure: Option<Failure>) -> Result<()> {
        let BatchUpdate { record, transition } = update;
        self.record = record;

        let mut first_error = None;
        if transition.cancelled {
            log_batch_operation(
                events::BATCH_CANCELLED,
                self.id(),
                failure.as_ref().map(|(job_id, _)| *job_id),
                self.record.pending_jobs,
                self.record.failed_jobs,
                None,
            );
            let mut invocation = CallbackInvocation::new(CallbackKind::Catch, self.record.clone());
            if let Some((job_id, error)) = failure {
                invocation = invocation.with_failure(job_id, error);
            }
            let callbacks = self.record.options.catch.clone();
            Self::keep_first(&mut first_error, self.run_callbacks(&callbacks, &invocation).await);
        }
        if transition.finished {
            log_batch_operation(
                events::BATCH_FINISHED,
                self.id(),
                None,
                self.record.pending_jobs,
                self.record.failed_jobs,
                None,
            );
            let invocation = CallbackInvocation::new(CallbackKind::Success, self.record.clone());
            let callbacks = self.record.options.success.clone();
            Self::keep_first(&mut first_error, self.run_callbacks(&callbacks, &invocation).await);
        }
        if transition.drained {
            let invocation = CallbackInvocation::new(CallbackKind::Finally, self.record.clone());
            let callbacks = self.record.options.finally.clone();
            Self::keep_first(&mut first_error, self.run_callbacks(&callbacks, &invocation).await);
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn run_callbacks(
        &self,
        callbacks: &[StoredCommand],
        invocation: &CallbackInvocation,
    ) -> Result<()> {
        let mut first_error = None;
        for command in callbacks {
            if let Err(e) = self.context.commands().execute(command, invocation).await {
                error!(
                    batch_id = %self.id(),
                    kind = %invocation.kind,
                    command = %command.name,
                    error = %e,
                    "Batch callback failed"
                );
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn keep_first(first_error: &mut Option<BatchError>, result: Result<()>) {
        if let Err(e) = result {
            first_error.get_or_insert(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::CallbackRegistry;
    use crate::config::BatchConfig;
    use crate::messaging::InMemoryJobQueue;
    use crate::repository::{BatchRepository, InMemoryBatchRepository};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Harness {
        context: BatchContext,
        repository: Arc<InMemoryBatchRepository>,
        queue: Arc<InMemoryJobQueue>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    fn harness() -> Harness {
        let repository = Arc::new(InMemoryBatchRepository::new());
        let queue = Arc::new(InMemoryJobQueue::new());
        let registry = CallbackRegistry::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "on_catch", "on_finally"] {
            let calls = Arc::clone(&calls);
            registry.register(name, move |_, invocation| {
                calls.lock().push(format!("{}:{name}", invocation.kind));
                Ok(())
            });
        }
        registry.register("broken", |_, _| Err(anyhow::anyhow!("broken callback")));

        let context = BatchContext::new(
            repository.clone(),
            queue.clone(),
            Arc::new(registry),
            BatchConfig::default(),
        );
        Harness {
            context,
            repository,
            queue,
            calls,
        }
    }

    fn jobs(count: usize) -> Vec<JobPayload> {
        (0..count)
            .map(|i| JobPayload::new("work", serde_json::json!({ "n": i })))
            .collect()
    }

    #[tokio::test]
    async fn test_success_callbacks_run_in_order_once() {
        let h = harness();
        let mut batch = h
            .context
            .batch(jobs(2))
            .success(StoredCommand::new("first"))
            .then(StoredCommand::new("second"))
            .dispatch()
            .await
            .unwrap();

        let queued = h.queue.drain("default", "default").await;
        assert_eq!(queued.len(), 2);

        batch.record_successful_job(queued[0].job.job_id).await.unwrap();
        assert!(h.calls.lock().is_empty());
        assert!(!batch.finished());

        batch.record_successful_job(queued[1].job.job_id).await.unwrap();
        assert!(batch.finished());
        assert_eq!(batch.progress(), 100);
        assert_eq!(*h.calls.lock(), vec!["success:first", "success:second"]);
    }

    #[tokio::test]
    async fn test_explicit_cancel_runs_catch_once() {
        let h = harness();
        let mut batch = h
            .context
            .batch(jobs(1))
            .catch(StoredCommand::new("on_catch"))
            .dispatch()
            .await
            .unwrap();

        batch.cancel().await.unwrap();
        batch.cancel().await.unwrap();

        assert!(batch.cancelled());
        assert_eq!(*h.calls.lock(), vec!["catch:on_catch"]);
    }

    #[tokio::test]
    async fn test_callback_error_reported_after_commit() {
        let h = harness();
        let mut batch = h
            .context
            .batch(jobs(1))
            .success(StoredCommand::new("broken"))
            .success(StoredCommand::new("second"))
            .dispatch()
            .await
            .unwrap();
        let job = h.queue.pop("default", "default").await.unwrap().job;

        let err = batch.record_successful_job(job.job_id).await.unwrap_err();
        assert!(matches!(err, BatchError::Callback { .. }));
        assert_eq!(*h.calls.lock(), vec!["success:second"]);
        assert!(h.repository.find(batch.id()).await.unwrap().unwrap().finished());
    }

    #[tokio::test]
    async fn test_add_releases_unpushed_jobs() {
        let h = harness();
        let mut batch = h
            .context
            .batch(jobs(1))
            .finally(StoredCommand::new("on_finally"))
            .dispatch()
            .await
            .unwrap();

        h.queue.fail_after(1);
        let err = batch.add(jobs(3)).await.unwrap_err();
        assert!(matches!(err, BatchError::Queue(_)));

        let stored = h.repository.find(batch.id()).await.unwrap().unwrap();
        assert_eq!(stored.total_jobs, 2);
        assert_eq!(stored.pending_jobs, 2);
        assert_eq!(h.queue.len("default", "default").await, 2);
    }

    #[tokio::test]
    async fn test_add_to_finished_batch_is_rejected() {
        let h = harness();
        let mut batch = h.context.batch(jobs(1)).dispatch().await.unwrap();
        let job = h.queue.pop("default", "default").await.unwrap().job;
        batch.record_successful_job(job.job_id).await.unwrap();

        let err = batch.add(jobs(1)).await.unwrap_err();
        assert!(matches!(err, BatchError::InvalidState { .. }));
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_fresh_sees_other_handles_updates() {
        let h = harness();
        let batch = h.context.batch(jobs(2)).dispatch().await.unwrap();
        let mut other = h.context.find(batch.id()).await.unwrap().unwrap();
        let job = h.queue.pop("default", "default").await.unwrap().job;
        other.record_failed_job(job.job_id, Some("timeout".into())).await.unwrap();

        assert!(!batch.cancelled());
        let fresh = batch.fresh().await.unwrap();
        assert!(fresh.cancelled());
        assert_eq!(fresh.failed_job_ids(), &[job.job_id]);
        assert_eq!(fresh.processed_jobs(), 1);
    }
}
