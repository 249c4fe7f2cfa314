//! # Database Operations
//!
//! Connection pooling and schema migrations for the PostgreSQL batch store.
//!
//! - [`connection`] - pool construction from [`crate::config::DatabaseConfig`]
//! - [`migrations`] - embedded `sqlx` migrations for `tasker_job_batches`

pub mod connection;
pub mod migrations;

pub use connection::DatabaseConnection;
pub use migrations::run_migrations;
