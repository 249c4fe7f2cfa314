//! Preconditions checked before a batch event is applied.
//!
//! Guards only read the record. A failing guard means the event would break a
//! counter invariant, and the mutation is rejected as a whole.

use super::events::BatchEvent;
use super::states::BatchState;
use crate::error::{BatchError, Result};
use crate::models::BatchRecord;

pub fn check(record: &BatchRecord, event: &BatchEvent) -> Result<()> {
    match event {
        BatchEvent::JobsAdded(count) => {
            non_negative(record, *count)?;
            not_terminal(record)?;
            if record.total_jobs.checked_add(*count).is_none() {
                return Err(BatchError::invalid_state(
                    record.id,
                    format!(
                        "adding {count} jobs to {} would overflow the job counter",
                        record.total_jobs
                    ),
                ));
            }
            Ok(())
        }
        BatchEvent::JobsReleased(count) => {
            non_negative(record, *count)?;
            if *count > record.pending_jobs {
                return Err(BatchError::invalid_state(
                    record.id,
                    format!(
                        "cannot release {count} jobs with only {} pending",
                        record.pending_jobs
                    ),
                ));
            }
            Ok(())
        }
        BatchEvent::JobSucceeded(job_id) | BatchEvent::JobFailed { job_id, .. } => {
            if record.pending_jobs == 0 {
                return Err(BatchError::invalid_state(
                    record.id,
                    format!("job {job_id} reported but no jobs are pending"),
                ));
            }
            Ok(())
        }
        BatchEvent::Dispatched => {
            if record.dispatched() {
                return Err(BatchError::invalid_state(record.id, "batch already dispatched"));
            }
            Ok(())
        }
        BatchEvent::Cancel => {
            if !record.dispatched() {
                return Err(BatchError::invalid_state(
                    record.id,
                    "cannot cancel a batch that is still being dispatched",
                ));
            }
            Ok(())
        }
        BatchEvent::FinishIfDrained => Ok(()),
    }
}

fn non_negative(record: &BatchRecord, count: i32) -> Result<()> {
    if count < 0 {
        return Err(BatchError::invalid_state(
            record.id,
            format!("job count must not be negative, got {count}"),
        ));
    }
    Ok(())
}

fn not_terminal(record: &BatchRecord) -> Result<()> {
    let state = BatchState::from_record(record);
    if state.is_terminal() {
        return Err(BatchError::invalid_state(
            record.id,
            format!("cannot add jobs to a {state} batch"),
        ));
    }
    Ok(())
}
