//! Counter mutation for batch records.
//!
//! [`apply`] is the single place counters change. Repositories call it while
//! holding their serialization primitive (a row lock, a mutex), so the
//! [`Transition`] it returns is the authoritative answer to "did *this* call
//! cause the batch to finish / cancel / drain". Callers run callbacks based on
//! that answer after the lock is released.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::events::BatchEvent;
use super::guards;
use crate::error::Result;
use crate::models::BatchRecord;

/// Which one-shot transitions a single mutation caused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transition {
    /// finished_at was set by this mutation
    pub finished: bool,
    /// cancelled_at was set by this mutation
    pub cancelled: bool,
    /// pending_jobs reached zero with this mutation
    pub drained: bool,
}

impl Transition {
    pub fn is_empty(&self) -> bool {
        !(self.finished || self.cancelled || self.drained)
    }
}

pub fn apply(record: &mut BatchRecord, event: &BatchEvent, now: DateTime<Utc>) -> Result<Transition> {
    guards::check(record, event)?;

    let mut transition = Transition::default();
    match event {
        BatchEvent::JobsAdded(count) => {
            record.total_jobs += count;
            record.pending_jobs += count;
        }
        BatchEvent::JobsReleased(count) => {
            let had_pending = record.pending_jobs > 0;
            record.total_jobs -= count;
            record.pending_jobs -= count;
            if record.dispatched() {
                transition.drained = had_pending && record.pending_jobs == 0;
                transition.finished = transition.drained && settle(record, now);
            }
        }
        BatchEvent::JobSucceeded(_) => {
            record.pending_jobs -= 1;
            if record.dispatched() {
                transition.drained = record.pending_jobs == 0;
                transition.finished = transition.drained && settle(record, now);
            }
        }
        BatchEvent::JobFailed {
            job_id,
            cancel_batch,
        } => {
            record.failed_jobs += 1;
            if !record.failed_job_ids.contains(job_id) {
                record.failed_job_ids.push(*job_id);
            }
            record.pending_jobs -= 1;
            if record.dispatched() {
                if *cancel_batch {
                    transition.cancelled = cancel(record, now);
                }
                transition.drained = record.pending_jobs == 0;
                transition.finished = transition.drained && settle(record, now);
            }
        }
        BatchEvent::Dispatched => {
            record.dispatched_at = Some(now);
            // Reports that arrived while jobs were still being pushed only moved counters
            if record.has_failures() && !record.options.allows_failures() {
                transition.cancelled = cancel(record, now);
            }
            transition.drained = record.pending_jobs == 0;
            transition.finished = transition.drained && settle(record, now);
        }
        BatchEvent::Cancel => {
            transition.cancelled = cancel(record, now);
        }
        BatchEvent::FinishIfDrained => {
            transition.finished = record.pending_jobs == 0 && settle(record, now);
            transition.drained = transition.finished;
        }
    }

    Ok(transition)
}

/// Set finished_at once, only for a dispatched, drained batch that was never cancelled
fn settle(record: &mut BatchRecord, now: DateTime<Utc>) -> bool {
    if record.dispatched()
        && record.pending_jobs == 0
        && record.cancelled_at.is_none()
        && record.finished_at.is_none()
    {
        record.finished_at = Some(now);
        true
    } else {
        false
    }
}

/// Set cancelled_at once. A finished batch stays finished.
fn cancel(record: &mut BatchRecord, now: DateTime<Utc>) -> bool {
    if record.cancelled_at.is_none() && record.finished_at.is_none() {
        record.cancelled_at = Some(now);
        true
    } else {
        false
    }
}
