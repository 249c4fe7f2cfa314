//! # PostgreSQL Batch Repository
//!
//! Batch storage shared by every worker process through one database.
//!
//! ## Atomic Mutation
//!
//! [`PgBatchRepository::update`] serializes callers with a row lock:
//!
//! 1. `BEGIN`
//! 2. `SELECT ... FROM tasker_job_batches WHERE id = $1 FOR UPDATE`
//! 3. apply the event to the locked row in memory
//! 4. `UPDATE` the counters and timestamps, `COMMIT`
//!
//! A second caller for the same batch waits at step 2 until the first commits
//! and then sees the committed counters, so "reached zero" and "first failure"
//! are each observed by exactly one caller, in commit order. A rejected event
//! drops the transaction, which rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{BatchRepository, BatchUpdate};
use crate::batch::PendingBatch;
use crate::constants::BATCHES_TABLE;
use crate::error::{BatchError, Result};
use crate::models::{BatchOptions, BatchRecord};
use crate::state_machine::BatchEvent;

const SELECT_COLUMNS: &str = "id, name, total_jobs, pending_jobs, failed_jobs, failed_job_ids, \
                              options, created_at, dispatched_at, cancelled_at, finished_at";

#[derive(Debug, FromRow)]
struct BatchRow {
    id: Uuid,
    name: String,
    total_jobs: i32,
    pending_jobs: i32,
    failed_jobs: i32,
    failed_job_ids: Vec<Uuid>,
    options: Json<BatchOptions>,
    created_at: DateTime<Utc>,
    dispatched_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl From<BatchRow> for BatchRecord {
    fn from(row: BatchRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            total_jobs: row.total_jobs,
            pending_jobs: row.pending_jobs,
            failed_jobs: row.failed_jobs,
            failed_job_ids: row.failed_job_ids,
            options: row.options.0,
            created_at: row.created_at,
            dispatched_at: row.dispatched_at,
            cancelled_at: row.cancelled_at,
            finished_at: row.finished_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgBatchRepository {
    pool: PgPool,
}

impl PgBatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BatchRepository for PgBatchRepository {
    #[instrument(skip(self, batch), fields(name = %batch.batch_name()))]
    async fn store(&self, batch: &PendingBatch) -> Result<BatchRecord> {
        let record = BatchRecord::new(batch.batch_name(), batch.options_snapshot());

        sqlx::query(&format!(
            "INSERT INTO {BATCHES_TABLE} \
             (id, name, total_jobs, pending_jobs, failed_jobs, failed_job_ids, options, created_at) \
             VALUES ($1, $2, 0, 0, 0, '{{}}', $3, $4)"
        ))
        .bind(record.id)
        .bind(&record.name)
        .bind(Json(record.options.clone()))
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        debug!(batch_id = %record.id, "Stored batch");
        Ok(record)
    }

    async fn find(&self, batch_id: Uuid) -> Result<Option<BatchRecord>> {
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM {BATCHES_TABLE} WHERE id = $1"
        ))
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(BatchRecord::from))
    }

    async fn delete(&self, batch_id: Uuid) -> Result<()> {
        sqlx::query(&format!("DELETE FROM {BATCHES_TABLE} WHERE id = $1"))
            .bind(batch_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, event), fields(event_type = event.event_type()))]
    async fn update(&self, batch_id: Uuid, event: BatchEvent) -> Result<BatchUpdate> {
        let mut tx = self.pool.begin().await?;

        // Other workers reporting on this batch wait here until we commit
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM {BATCHES_TABLE} WHERE id = $1 FOR UPDATE"
        ))
        .bind(batch_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(BatchError::BatchNotFound(batch_id))?;

        let mut record = BatchRecord::from(row);
        let transition = record.apply(&event, Utc::now())?;

        sqlx::query(&format!(
            "UPDATE {BATCHES_TABLE} \
             SET total_jobs = $2, pending_jobs = $3, failed_jobs = $4, failed_job_ids = $5, \
                 dispatched_at = $6, cancelled_at = $7, finished_at = $8 \
             WHERE id = $1"
        ))
        .bind(record.id)
        .bind(record.total_jobs)
        .bind(record.pending_jobs)
        .bind(record.failed_jobs)
        .bind(&record.failed_job_ids)
        .bind(record.dispatched_at)
        .bind(record.cancelled_at)
        .bind(record.finished_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            batch_id = %batch_id,
            pending_jobs = record.pending_jobs,
            failed_jobs = record.failed_jobs,
            finished = transition.finished,
            cancelled = transition.cancelled,
            "Committed batch update"
        );

        Ok(BatchUpdate { record, transition })
    }
}
