//! # In-Memory Batch Repository
//!
//! Thread-safe repository for tests and single-process development. All
//! mutations run [`BatchRecord::apply`] under one `parking_lot::Mutex`, which
//! gives the same linearizable behaviour as the row lock in PostgreSQL, but
//! only within one process.
//!
//! `set_unavailable(true)` makes every operation fail with
//! [`BatchError::Storage`], to exercise storage outage handling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{BatchRepository, BatchUpdate};
use crate::batch::PendingBatch;
use crate::error::{BatchError, Result};
use crate::models::BatchRecord;
use crate::state_machine::BatchEvent;

#[derive(Debug, Default)]
pub struct InMemoryBatchRepository {
    batches: Mutex<HashMap<Uuid, BatchRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryBatchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a storage outage (for testing)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored batches (for testing)
    pub fn len(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.lock().is_empty()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BatchError::Storage(
                "in-memory batch store is unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl BatchRepository for InMemoryBatchRepository {
    async fn store(&self, batch: &PendingBatch) -> Result<BatchRecord> {
        self.ensure_available()?;
        let record = BatchRecord::new(batch.batch_name(), batch.options_snapshot());
        self.batches.lock().insert(record.id, record.clone());
        debug!(batch_id = %record.id, name = %record.name, "Stored batch in memory");
        Ok(record)
    }

    async fn find(&self, batch_id: Uuid) -> Result<Option<BatchRecord>> {
        self.ensure_available()?;
        Ok(self.batches.lock().get(&batch_id).cloned())
    }

    async fn delete(&self, batch_id: Uuid) -> Result<()> {
        self.ensure_available()?;
        self.batches.lock().remove(&batch_id);
        Ok(())
    }

    async fn update(&self, batch_id: Uuid, event: BatchEvent) -> Result<BatchUpdate> {
        self.ensure_available()?;
        let mut batches = self.batches.lock();
        let stored = batches
            .get_mut(&batch_id)
            .ok_or(BatchError::BatchNotFound(batch_id))?;

        // Apply to a copy so a rejected event cannot leave a partial write
        let mut record = stored.clone();
        let transition = record.apply(&event, Utc::now())?;
        *stored = record.clone();

        Ok(BatchUpdate { record, transition })
    }
}
