//! # Batch Models
//!
//! - [`BatchRecord`] - the persisted batch row: identity, counters, timestamps
//! - [`BatchOptions`] - the immutable options snapshot captured at dispatch

pub mod batch;
pub mod batch_options;

pub use batch::BatchRecord;
pub use batch_options::BatchOptions;
