//! # Batch Model
//!
//! The persisted state of one batch.
//!
//! ## Database Schema
//!
//! Maps to the `tasker_job_batches` table:
//! ```sql
//! CREATE TABLE tasker_job_batches (
//!   id UUID PRIMARY KEY,
//!   name VARCHAR NOT NULL,
//!   total_jobs INTEGER NOT NULL DEFAULT 0,
//!   pending_jobs INTEGER NOT NULL DEFAULT 0,
//!   failed_jobs INTEGER NOT NULL DEFAULT 0,
//!   failed_job_ids UUID[] NOT NULL DEFAULT '{}',
//!   options JSONB NOT NULL,
//!   created_at TIMESTAMPTZ NOT NULL,
//!   dispatched_at TIMESTAMPTZ,
//!   cancelled_at TIMESTAMPTZ,
//!   finished_at TIMESTAMPTZ
//! );
//! ```
//!
//! Counters are only ever changed through [`BatchRecord::apply`], which every
//! repository runs while holding its serialization primitive.
//!
//! Until `dispatched_at` is set the batch may still be rolled back: reports
//! move its counters, but it can neither finish nor be cancelled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::BatchOptions;
use crate::state_machine::{batch_state_machine, BatchEvent, BatchState, Transition};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub id: Uuid,
    pub name: String,
    pub total_jobs: i32,
    pub pending_jobs: i32,
    pub failed_jobs: i32,
    pub failed_job_ids: Vec<Uuid>,
    pub options: BatchOptions,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub dispatched_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchRecord {
    /// A fresh record with no jobs
    pub fn new(name: impl Into<String>, options: BatchOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            total_jobs: 0,
            pending_jobs: 0,
            failed_jobs: 0,
            failed_job_ids: Vec::new(),
            options,
            created_at: Utc::now(),
            dispatched_at: None,
            cancelled_at: None,
            finished_at: None,
        }
    }

    /// Apply a counter mutation in place. On error the record is unchanged.
    pub fn apply(&mut self, event: &BatchEvent, now: DateTime<Utc>) -> Result<Transition> {
        batch_state_machine::apply(self, event, now)
    }

    pub fn state(&self) -> BatchState {
        BatchState::from_record(self)
    }

    pub fn dispatched(&self) -> bool {
        self.dispatched_at.is_some()
    }

    pub fn finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled_at.is_some()
    }

    pub fn processed_jobs(&self) -> i32 {
        self.total_jobs - self.pending_jobs
    }

    /// Completion percentage, rounded to the nearest integer
    pub fn progress(&self) -> i32 {
        if self.total_jobs > 0 {
            ((f64::from(self.processed_jobs()) / f64::from(self.total_jobs)) * 100.0).round()
                as i32
        } else {
            0
        }
    }

    pub fn has_pending_jobs(&self) -> bool {
        self.pending_jobs > 0
    }

    pub fn has_failures(&self) -> bool {
        self.failed_jobs > 0
    }
}
