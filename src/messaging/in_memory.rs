//! # In-Memory Job Queue
//!
//! Thread-safe in-memory queue for testing and development.
//!
//! ## Features
//!
//! - **Per-route FIFO**: one queue per `(connection, queue)` pair
//! - **Thread-Safe**: Uses `tokio::sync::RwLock` for concurrent access
//! - **Fault Injection**: `fail_after(n)` makes every push after the first `n` fail

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{BatchedJob, JobQueue, QueueJobId};
use crate::error::{BatchError, Result};

/// A job as held by the queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedJob {
    pub id: QueueJobId,
    pub job: BatchedJob,
    pub enqueued_at: DateTime<Utc>,
}

type Route = (String, String);

#[derive(Debug)]
pub struct InMemoryJobQueue {
    queues: RwLock<HashMap<Route, VecDeque<QueuedJob>>>,
    next_id: AtomicU64,
    /// Pushes still allowed before injected failures start (usize::MAX = never fail)
    remaining_pushes: AtomicUsize,
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            remaining_pushes: AtomicUsize::new(usize::MAX),
        }
    }

    /// Accept `pushes` more jobs, then fail every push
    pub fn fail_after(&self, pushes: usize) {
        self.remaining_pushes.store(pushes, Ordering::SeqCst);
    }

    /// Take the oldest job from a route
    pub async fn pop(&self, connection: &str, queue: &str) -> Option<QueuedJob> {
        let mut queues = self.queues.write().await;
        queues
            .get_mut(&(connection.to_string(), queue.to_string()))
            .and_then(VecDeque::pop_front)
    }

    /// Take every job from a route, oldest first
    pub async fn drain(&self, connection: &str, queue: &str) -> Vec<QueuedJob> {
        let mut queues = self.queues.write().await;
        queues
            .get_mut(&(connection.to_string(), queue.to_string()))
            .map(|jobs| jobs.drain(..).collect())
            .unwrap_or_default()
    }

    /// Get the number of jobs waiting on a route (for testing)
    pub async fn len(&self, connection: &str, queue: &str) -> usize {
        let queues = self.queues.read().await;
        queues
            .get(&(connection.to_string(), queue.to_string()))
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.queues.read().await.values().all(VecDeque::is_empty)
    }

    fn take_push_permit(&self) -> bool {
        self.remaining_pushes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| match remaining {
                usize::MAX => Some(usize::MAX),
                0 => None,
                n => Some(n - 1),
            })
            .is_ok()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn push(&self, job: &BatchedJob, connection: &str, queue: &str) -> Result<QueueJobId> {
        if !self.take_push_permit() {
            return Err(BatchError::Queue(format!(
                "push to {connection}/{queue} rejected"
            )));
        }

        let id = QueueJobId::from(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut queues = self.queues.write().await;
        queues
            .entry((connection.to_string(), queue.to_string()))
            .or_default()
            .push_back(QueuedJob {
                id,
                job: job.clone(),
                enqueued_at: Utc::now(),
            });

        Ok(id)
    }
}
