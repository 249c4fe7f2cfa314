#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasker Batch
//!
//! Coordination of batches of background jobs: dispatch a group of jobs,
//! track per-batch counters while independent workers run them, and fire
//! success, catch and finally callbacks exactly once.
//!
//! ## Overview
//!
//! A batch is a stored record of counters (`total_jobs`, `pending_jobs`,
//! `failed_jobs`) plus an immutable options snapshot holding callbacks and
//! routing. Workers report each job's outcome; the report that drains the
//! batch or cancels it is the one that runs the callbacks.
//!
//! ## Module Organization
//!
//! - [`batch`] - pending batch builder, live batch handle, shared context
//! - [`worker`] - job processing and outcome reporting
//! - [`repository`] - atomic batch storage (PostgreSQL, in-memory)
//! - [`state_machine`] - counter mutation, guards, derived states
//! - [`messaging`] - job queue boundary and in-memory queue
//! - [`callbacks`] - stored commands and their executor
//! - [`models`] - batch record and options snapshot
//! - [`database`] - pool construction and migrations
//! - [`config`] - layered configuration
//! - [`error`] - structured error handling
//! - [`logging`] - structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tasker_batch::batch::BatchContext;
//! use tasker_batch::callbacks::{CallbackRegistry, StoredCommand};
//! use tasker_batch::config::ConfigManager;
//! use tasker_batch::database::DatabaseConnection;
//! use tasker_batch::messaging::{InMemoryJobQueue, JobPayload};
//! use tasker_batch::repository::PgBatchRepository;
//!
//! # async fn example() -> tasker_batch::Result<()> {
//! tasker_batch::logging::init_structured_logging();
//! let manager = ConfigManager::load()?;
//! let database = DatabaseConnection::connect(&manager.config().database).await?;
//!
//! let registry = CallbackRegistry::new();
//! registry.register("report_done", |_, invocation| {
//!     println!("batch {} done", invocation.batch.id);
//!     Ok(())
//! });
//!
//! let context = BatchContext::new(
//!     Arc::new(PgBatchRepository::new(database.pool().clone())),
//!     Arc::new(InMemoryJobQueue::new()),
//!     Arc::new(registry),
//!     manager.config().clone(),
//! );
//!
//! let batch = context
//!     .batch(vec![JobPayload::new("resize_image", serde_json::json!({"id": 7}))])
//!     .success(StoredCommand::new("report_done"))
//!     .dispatch()
//!     .await?;
//! println!("dispatched {} with {} jobs", batch.id(), batch.total_jobs());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod callbacks;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod repository;
pub mod state_machine;
pub mod worker;

pub use batch::{Batch, BatchContext, PendingBatch};
pub use callbacks::{CallbackInvocation, CallbackKind, CallbackRegistry, CommandExecutor, StoredCommand};
pub use config::{BatchConfig, ConfigManager};
pub use error::{BatchError, Result};
pub use messaging::{BatchedJob, JobPayload, JobQueue};
pub use models::{BatchOptions, BatchRecord};
pub use repository::{BatchRepository, BatchUpdate};
pub use state_machine::{BatchEvent, BatchState, Transition};
pub use worker::{BatchJobHandler, BatchWorker, JobOutcome};
