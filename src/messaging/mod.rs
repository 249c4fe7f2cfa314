//! # Messaging Module
//!
//! The boundary to the job-queue transport. Batches push [`BatchedJob`]s
//! through a [`JobQueue`]; how the transport stores, retries and delivers
//! them is its own business.
//!
//! [`InMemoryJobQueue`] is a complete in-process implementation for tests and
//! development.

pub mod in_memory;
pub mod message;

use async_trait::async_trait;

use crate::error::Result;

pub use in_memory::{InMemoryJobQueue, QueuedJob};
pub use message::{BatchedJob, JobPayload, QueueJobId};

/// Provider-agnostic job push
#[async_trait]
pub trait JobQueue: Send + Sync + 'static {
    /// Push one job onto `queue` of `connection`, returning the transport's id
    async fn push(&self, job: &BatchedJob, connection: &str, queue: &str) -> Result<QueueJobId>;
}
