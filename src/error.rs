//! Error types for batch coordination.
//!
//! Job execution failures are *not* represented here: a job that fails is a
//! normal event reported through [`crate::batch::Batch::record_failed_job`].
//! `BatchError` covers failures of the coordination machinery itself, most
//! importantly [`BatchError::Storage`], which tells the worker layer that the
//! job may have completed but its batch accounting did not.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BatchError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Batch {0} not found")]
    BatchNotFound(Uuid),
    #[error("Invalid state for batch {batch_id}: {reason}")]
    InvalidState { batch_id: Uuid, reason: String },
    #[error("Queue error: {0}")]
    Queue(String),
    #[error("Callback {command} failed: {reason}")]
    Callback { command: String, reason: String },
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BatchError {
    pub fn invalid_state(batch_id: Uuid, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            batch_id,
            reason: reason.into(),
        }
    }

    /// True when the failure happened in the storage layer rather than in
    /// validation of the requested mutation.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<sqlx::Error> for BatchError {
    fn from(err: sqlx::Error) -> Self {
        BatchError::Storage(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for BatchError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        BatchError::Storage(format!("migration failed: {err}"))
    }
}

impl From<serde_json::Error> for BatchError {
    fn from(err: serde_json::Error) -> Self {
        BatchError::Serialization(err.to_string())
    }
}

impl From<::config::ConfigError> for BatchError {
    fn from(err: ::config::ConfigError) -> Self {
        BatchError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;
