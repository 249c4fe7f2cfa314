use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Counter mutations a batch can undergo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BatchEvent {
    /// Jobs registered ahead of being pushed to the queue
    JobsAdded(i32),
    /// Registered jobs that never reached the queue
    JobsReleased(i32),
    JobSucceeded(Uuid),
    JobFailed { job_id: Uuid, cancel_batch: bool },
    /// Every job of the initial dispatch reached the queue
    Dispatched,
    Cancel,
    /// Finish a batch whose pending count is already zero
    FinishIfDrained,
}

impl BatchEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::JobsAdded(_) => "jobs_added",
            Self::JobsReleased(_) => "jobs_released",
            Self::JobSucceeded(_) => "job_succeeded",
            Self::JobFailed { .. } => "job_failed",
            Self::Dispatched => "dispatched",
            Self::Cancel => "cancel",
            Self::FinishIfDrained => "finish_if_drained",
        }
    }

    /// The job a report event is about
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            Self::JobSucceeded(job_id) | Self::JobFailed { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }
}
