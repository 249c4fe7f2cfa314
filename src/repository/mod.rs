//! # Batch Repository
//!
//! Durable storage for batch records plus the atomic mutation primitive the
//! rest of the crate relies on.
//!
//! Implementations provide one serialized operation, [`BatchRepository::update`]:
//! load the record under the storage layer's serialization mechanism, run
//! [`BatchRecord::apply`], persist the result, and release. The returned
//! [`BatchUpdate`] tells the caller which one-shot transitions *its* call
//! caused; everything else (counter helpers, cancel, finish) is expressed in
//! terms of that primitive.
//!
//! - [`PgBatchRepository`] - PostgreSQL, `SELECT ... FOR UPDATE` in a
//!   transaction; safe across independent worker processes
//! - [`InMemoryBatchRepository`] - single process, for tests and development

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::batch::PendingBatch;
use crate::error::Result;
use crate::models::BatchRecord;
use crate::state_machine::{BatchEvent, Transition};

pub use in_memory::InMemoryBatchRepository;
pub use postgres::PgBatchRepository;

/// Result of one atomic mutation
#[derive(Debug, Clone, PartialEq)]
pub struct BatchUpdate {
    /// The record as committed
    pub record: BatchRecord,
    /// Transitions caused by this mutation and no other
    pub transition: Transition,
}

#[async_trait]
pub trait BatchRepository: Send + Sync + 'static {
    /// Create and persist a new, empty batch for the pending batch
    async fn store(&self, batch: &PendingBatch) -> Result<BatchRecord>;

    async fn find(&self, batch_id: Uuid) -> Result<Option<BatchRecord>>;

    /// Remove a batch record. Only used to roll back a failed dispatch.
    async fn delete(&self, batch_id: Uuid) -> Result<()>;

    /// Apply one event atomically with respect to every other caller
    async fn update(&self, batch_id: Uuid, event: BatchEvent) -> Result<BatchUpdate>;

    async fn increment_total_jobs(&self, batch_id: Uuid, count: i32) -> Result<BatchUpdate> {
        self.update(batch_id, BatchEvent::JobsAdded(count)).await
    }

    /// Undo the registration of jobs that were never pushed
    async fn release_jobs(&self, batch_id: Uuid, count: i32) -> Result<BatchUpdate> {
        self.update(batch_id, BatchEvent::JobsReleased(count)).await
    }

    async fn record_successful_job(&self, batch_id: Uuid, job_id: Uuid) -> Result<BatchUpdate> {
        self.update(batch_id, BatchEvent::JobSucceeded(job_id)).await
    }

    async fn record_failed_job(
        &self,
        batch_id: Uuid,
        job_id: Uuid,
        cancel_batch: bool,
    ) -> Result<BatchUpdate> {
        self.update(
            batch_id,
            BatchEvent::JobFailed {
                job_id,
                cancel_batch,
            },
        )
        .await
    }

    /// Close the dispatch: from here on the batch can finish or be cancelled
    async fn mark_dispatched(&self, batch_id: Uuid) -> Result<BatchUpdate> {
        self.update(batch_id, BatchEvent::Dispatched).await
    }

    /// Set cancelled_at once; `transition.cancelled` is true only for the first caller
    async fn cancel(&self, batch_id: Uuid) -> Result<BatchUpdate> {
        self.update(batch_id, BatchEvent::Cancel).await
    }

    /// Set finished_at once for a batch with nothing pending
    async fn finish_if_drained(&self, batch_id: Uuid) -> Result<BatchUpdate> {
        self.update(batch_id, BatchEvent::FinishIfDrained).await
    }
}
