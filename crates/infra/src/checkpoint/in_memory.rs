use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use indexsync_core::JobConfig;

use super::{CheckpointBackend, CheckpointError, InMemoryCheckpointStore, StagedCheckpointStore};

/// Durable layer kept in a process-local map.
#[derive(Debug, Default)]
pub struct MemoryCheckpoints {
    configs: RwLock<HashMap<String, JobConfig>>,
}

impl MemoryCheckpoints {
    /// Durable value for a job, bypassing the working copy.
    pub fn snapshot(&self, job: &str) -> Option<JobConfig> {
        self.configs.read().unwrap().get(job).cloned()
    }

    /// Overwrite the durable value, as an external edit would.
    pub fn put(&self, job: &str, config: JobConfig) {
        self.configs.write().unwrap().insert(job.to_string(), config);
    }
}

#[async_trait]
impl CheckpointBackend for MemoryCheckpoints {
    async fn read(&self, job: &str) -> Result<Option<JobConfig>, CheckpointError> {
        Ok(self.snapshot(job))
    }

    async fn write(&self, job: &str, config: &JobConfig) -> Result<(), CheckpointError> {
        self.put(job, config.clone());
        Ok(())
    }

    async fn delete(&self, job: &str) -> Result<(), CheckpointError> {
        self.configs.write().unwrap().remove(job);
        Ok(())
    }
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        StagedCheckpointStore::with_backend(MemoryCheckpoints::default())
    }
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}
