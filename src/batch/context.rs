use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use super::{Batch, PendingBatch};
use crate::callbacks::CommandExecutor;
use crate::config::BatchConfig;
use crate::error::Result;
use crate::messaging::{JobPayload, JobQueue};
use crate::repository::BatchRepository;

/// Collaborators shared by pending batches, live batches and workers.
///
/// Everything is supplied at construction; nothing is looked up globally.
#[derive(Clone)]
pub struct BatchContext {
    repository: Arc<dyn BatchRepository>,
    queue: Arc<dyn JobQueue>,
    commands: Arc<dyn CommandExecutor>,
    config: Arc<BatchConfig>,
}

impl fmt::Debug for BatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BatchContext {
    pub fn new(
        repository: Arc<dyn BatchRepository>,
        queue: Arc<dyn JobQueue>,
        commands: Arc<dyn CommandExecutor>,
        config: BatchConfig,
    ) -> Self {
        Self {
            repository,
            queue,
            commands,
            config: Arc::new(config),
        }
    }

    /// Start configuring a batch of jobs
    pub fn batch(&self, jobs: Vec<JobPayload>) -> PendingBatch {
        PendingBatch::new(self.clone(), jobs)
    }

    /// Load a live handle for an existing batch
    pub async fn find(&self, batch_id: Uuid) -> Result<Option<Batch>> {
        let record = self.repository.find(batch_id).await?;
        Ok(record.map(|record| Batch::new(self.clone(), record)))
    }

    pub fn repository(&self) -> &Arc<dyn BatchRepository> {
        &self.repository
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    pub fn commands(&self) -> &Arc<dyn CommandExecutor> {
        &self.commands
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }
}
