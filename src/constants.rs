//! # System Constants
//!
//! Names and defaults shared by the repository, the dispatcher and the
//! configuration layer.

/// Table holding one row per batch.
pub const BATCHES_TABLE: &str = "tasker_job_batches";

/// Queue connection used when neither the batch nor the config names one.
pub const DEFAULT_CONNECTION: &str = "default";

/// Queue used when neither the batch nor the config names one.
pub const DEFAULT_QUEUE: &str = "default";

/// Environment variable selecting the runtime environment.
pub const ENVIRONMENT_VAR: &str = "TASKER_ENV";

/// Batch lifecycle events emitted through structured logging
pub mod events {
    pub const BATCH_CREATED: &str = "batch.created";
    pub const BATCH_DISPATCHED: &str = "batch.dispatched";
    pub const BATCH_JOBS_ADDED: &str = "batch.jobs_added";
    pub const BATCH_JOBS_RELEASED: &str = "batch.jobs_released";
    pub const BATCH_ROLLED_BACK: &str = "batch.rolled_back";
    pub const BATCH_JOB_SUCCEEDED: &str = "batch.job_succeeded";
    pub const BATCH_JOB_FAILED: &str = "batch.job_failed";
    pub const BATCH_JOB_SKIPPED: &str = "batch.job_skipped";
    pub const BATCH_FINISHED: &str = "batch.finished";
    pub const BATCH_CANCELLED: &str = "batch.cancelled";
}
