//! # Batch Callbacks
//!
//! Callbacks are stored as data. A [`StoredCommand`] names a command and
//! carries its captured arguments; it is persisted inside the batch options
//! snapshot and executed later, possibly in another process, through a
//! [`CommandExecutor`]. The coordination core never looks inside a command.
//!
//! [`CallbackRegistry`] is the in-process executor: command names map to
//! Rust closures registered at worker startup.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{BatchError, Result};
use crate::models::BatchRecord;

/// Opaque, serializable reference to a caller-supplied callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCommand {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl StoredCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Value::Null,
        }
    }

    pub fn with_arguments(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Which callback list is being run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackKind {
    Success,
    Catch,
    Finally,
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Catch => write!(f, "catch"),
            Self::Finally => write!(f, "finally"),
        }
    }
}

/// Everything a callback gets to see when it runs
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackInvocation {
    pub kind: CallbackKind,
    /// Batch state as committed by the transition that triggered the callback
    pub batch: BatchRecord,
    /// The job whose failure cancelled the batch, for catch callbacks
    pub failed_job_id: Option<Uuid>,
    pub error: Option<String>,
}

impl CallbackInvocation {
    pub fn new(kind: CallbackKind, batch: BatchRecord) -> Self {
        Self {
            kind,
            batch,
            failed_job_id: None,
            error: None,
        }
    }

    pub fn with_failure(mut self, job_id: Uuid, error: Option<String>) -> Self {
        self.failed_job_id = Some(job_id);
        self.error = error;
        self
    }
}

/// Uniform "execute stored command" interface
#[async_trait]
pub trait CommandExecutor: Send + Sync + 'static {
    async fn execute(&self, command: &StoredCommand, invocation: &CallbackInvocation)
        -> Result<()>;
}

type CallbackFn = dyn Fn(&Value, &CallbackInvocation) -> anyhow::Result<()> + Send + Sync;

/// Executes stored commands by looking up closures registered under their name
#[derive(Default)]
pub struct CallbackRegistry {
    callbacks: DashMap<String, Arc<CallbackFn>>,
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.callbacks.iter().map(|e| e.key().clone()).collect();
        names.sort();
        f.debug_struct("CallbackRegistry")
            .field("callbacks", &names)
            .finish()
    }
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the closure behind a command name
    pub fn register<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn(&Value, &CallbackInvocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callbacks.insert(name.into(), Arc::new(callback));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.callbacks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

#[async_trait]
impl CommandExecutor for CallbackRegistry {
    async fn execute(
        &self,
        command: &StoredCommand,
        invocation: &CallbackInvocation,
    ) -> Result<()> {
        // Clone the Arc so no map shard lock is held while user code runs
        let callback = self
            .callbacks
            .get(&command.name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| BatchError::Callback {
                command: command.name.clone(),
                reason: "no callback registered under this name".to_string(),
            })?;

        callback(&command.arguments, invocation).map_err(|e| BatchError::Callback {
            command: command.name.clone(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BatchOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn invocation(kind: CallbackKind) -> CallbackInvocation {
        CallbackInvocation::new(kind, BatchRecord::new("nightly", BatchOptions::default()))
    }

    #[tokio::test]
    async fn test_registry_passes_arguments() {
        let registry = CallbackRegistry::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        registry.register("notify", move |args, invocation| {
            assert_eq!(args["channel"], "ops");
            assert_eq!(invocation.kind, CallbackKind::Success);
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let command =
            StoredCommand::with_arguments("notify", serde_json::json!({"channel": "ops"}));
        registry
            .execute(&command, &invocation(CallbackKind::Success))
            .await
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_command_is_a_callback_error() {
        let registry = CallbackRegistry::new();
        let err = registry
            .execute(&StoredCommand::new("missing"), &invocation(CallbackKind::Catch))
            .await
            .unwrap_err();

        assert!(matches!(err, BatchError::Callback { ref command, .. } if command == "missing"));
    }

    #[tokio::test]
    async fn test_closure_error_is_wrapped() {
        let registry = CallbackRegistry::new();
        registry.register("boom", |_, _| Err(anyhow::anyhow!("smtp unavailable")));

        let err = registry
            .execute(&StoredCommand::new("boom"), &invocation(CallbackKind::Finally))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Callback boom failed: smtp unavailable");
    }

    #[test]
    fn test_stored_command_serde_defaults_arguments() {
        let command: StoredCommand = serde_json::from_str(r#"{"name":"ping"}"#).unwrap();
        assert_eq!(command, StoredCommand::new("ping"));
    }
}
