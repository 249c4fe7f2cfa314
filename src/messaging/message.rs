use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::BatchRecord;

/// A caller-supplied unit of work, opaque to batch coordination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    pub job_type: String,
    #[serde(default)]
    pub payload: Value,
}

impl JobPayload {
    pub fn new(job_type: impl Into<String>, payload: Value) -> Self {
        Self {
            job_type: job_type.into(),
            payload,
        }
    }
}

/// A job tagged with the batch it belongs to.
///
/// `job_id` is assigned when the job is wrapped, before it reaches the queue,
/// so the worker can report it without knowing transport ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchedJob {
    pub batch_id: Uuid,
    pub job_id: Uuid,
    pub job: JobPayload,
    pub connection: String,
    pub queue: String,
    pub allow_failures: bool,
}

impl BatchedJob {
    /// Wrap a job with the batch id and routing from the batch's options snapshot
    pub fn wrap(batch: &BatchRecord, job: JobPayload, connection: &str, queue: &str) -> Self {
        Self {
            batch_id: batch.id,
            job_id: Uuid::new_v4(),
            job,
            connection: connection.to_string(),
            queue: queue.to_string(),
            allow_failures: batch.options.allow_failures,
        }
    }
}

/// Transport-assigned job id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueJobId(pub u64);

impl From<u64> for QueueJobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for QueueJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
