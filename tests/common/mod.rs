#![allow(dead_code)]

pub mod strategies;

use std::sync::Arc;

use parking_lot::Mutex;
use tasker_batch::callbacks::CallbackRegistry;
use tasker_batch::config::BatchConfig;
use tasker_batch::messaging::{InMemoryJobQueue, JobPayload};
use tasker_batch::repository::{BatchRepository, InMemoryBatchRepository};
use tasker_batch::BatchContext;

/// Names of the recording callbacks registered by [`TestEnv`]
pub const RECORDED_CALLBACKS: &[&str] = &["on_success", "on_then", "on_catch", "on_finally"];

/// In-memory collaborators plus a log of every callback that ran
pub struct TestEnv {
    pub context: BatchContext,
    pub repository: Arc<InMemoryBatchRepository>,
    pub queue: Arc<InMemoryJobQueue>,
    pub fired: Arc<Mutex<Vec<String>>>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(BatchConfig::default())
    }

    pub fn with_config(config: BatchConfig) -> Self {
        let repository = Arc::new(InMemoryBatchRepository::new());
        Self::with_repository(repository.clone(), repository, config)
    }

    /// Use `storage` for the context while keeping a typed handle on the in-memory store
    pub fn with_repository(
        repository: Arc<InMemoryBatchRepository>,
        storage: Arc<dyn BatchRepository>,
        config: BatchConfig,
    ) -> Self {
        let queue = Arc::new(InMemoryJobQueue::new());
        let fired = Arc::new(Mutex::new(Vec::new()));
        let registry = recording_registry(&fired);

        let context = BatchContext::new(storage, queue.clone(), Arc::new(registry), config);
        Self {
            context,
            repository,
            queue,
            fired,
        }
    }

    pub fn fired(&self) -> Vec<String> {
        self.fired.lock().clone()
    }

    pub fn count_fired(&self, name: &str) -> usize {
        self.fired.lock().iter().filter(|f| f.as_str() == name).count()
    }
}

/// Registry whose [`RECORDED_CALLBACKS`] append their name to `fired`, plus an
/// always-failing `failing_callback`
pub fn recording_registry(fired: &Arc<Mutex<Vec<String>>>) -> CallbackRegistry {
    let registry = CallbackRegistry::new();
    for name in RECORDED_CALLBACKS {
        let fired = Arc::clone(fired);
        registry.register(*name, move |_, _| {
            fired.lock().push((*name).to_string());
            Ok(())
        });
    }
    registry.register("failing_callback", |_, _| {
        Err(anyhow::anyhow!("callback target unavailable"))
    });
    registry
}

pub fn jobs(count: usize) -> Vec<JobPayload> {
    (0..count)
        .map(|i| JobPayload::new("process_row", serde_json::json!({ "row": i })))
        .collect()
}
