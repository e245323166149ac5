//! Per-job checkpoint storage.
//!
//! A checkpoint is the persisted `JobConfig` of one job: trigger expression,
//! batch limit, status and cursor. Stores keep two layers:
//!
//! - a **durable** layer (memory map, JSON file, Postgres row), and
//! - a **working copy**: the last durable value read plus the fields staged
//!   by `set_field` and not yet persisted.
//!
//! Every call for a job holds that job's async lock for its whole duration.
//! `persist` and `update` re-read the durable layer and write back only the
//! fields they were given, so a stale working copy can never overwrite a
//! newer durable value. A run that crashes between `set_field` and `persist`
//! leaves the durable checkpoint at its pre-run value.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use indexsync_core::{ConfigField, ConfigFieldError, JobConfig};

mod file;
mod in_memory;
mod postgres;

pub use file::FileCheckpoints;
pub use in_memory::MemoryCheckpoints;
pub use postgres::PostgresCheckpoints;

/// In-memory checkpoint store for tests/dev.
pub type InMemoryCheckpointStore = StagedCheckpointStore<MemoryCheckpoints>;

/// One `<job>.json` file per job under a directory.
pub type FileCheckpointStore = StagedCheckpointStore<FileCheckpoints>;

/// Checkpoints in a Postgres `sync_job_configs` table.
pub type PostgresCheckpointStore = StagedCheckpointStore<PostgresCheckpoints>;

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("no checkpoint for job: {0}")]
    NotFound(String),

    #[error(transparent)]
    Field(#[from] ConfigFieldError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Checkpoint store contract, scoped by job name.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Re-read the durable config of a job, refreshing the working copy.
    async fn load(&self, job: &str) -> Result<Option<JobConfig>, CheckpointError>;

    /// Stage one field in the working copy.
    async fn set_field(&self, job: &str, field: ConfigField) -> Result<(), CheckpointError>;

    /// Write the staged fields over the current durable config.
    async fn persist(&self, job: &str) -> Result<(), CheckpointError>;

    /// Apply `fields` to the current durable config and write it back in one
    /// step. Fields staged by other callers stay staged.
    async fn update(&self, job: &str, fields: Vec<ConfigField>) -> Result<(), CheckpointError>;

    /// Drop both layers for a job. Missing jobs are not an error.
    async fn remove(&self, job: &str) -> Result<(), CheckpointError>;

    /// Persist `default` if the job has no durable config yet.
    ///
    /// Returns `true` when the default was written.
    async fn initialize(&self, job: &str, default: JobConfig) -> Result<bool, CheckpointError>;
}

#[async_trait]
impl<S> CheckpointStore for Arc<S>
where
    S: CheckpointStore + ?Sized,
{
    async fn load(&self, job: &str) -> Result<Option<JobConfig>, CheckpointError> {
        (**self).load(job).await
    }

    async fn set_field(&self, job: &str, field: ConfigField) -> Result<(), CheckpointError> {
        (**self).set_field(job, field).await
    }

    async fn persist(&self, job: &str) -> Result<(), CheckpointError> {
        (**self).persist(job).await
    }

    async fn update(&self, job: &str, fields: Vec<ConfigField>) -> Result<(), CheckpointError> {
        (**self).update(job, fields).await
    }

    async fn remove(&self, job: &str) -> Result<(), CheckpointError> {
        (**self).remove(job).await
    }

    async fn initialize(&self, job: &str, default: JobConfig) -> Result<bool, CheckpointError> {
        (**self).initialize(job, default).await
    }
}

/// Durable layer behind a [`StagedCheckpointStore`].
#[async_trait]
pub trait CheckpointBackend: Send + Sync {
    async fn read(&self, job: &str) -> Result<Option<JobConfig>, CheckpointError>;
    async fn write(&self, job: &str, config: &JobConfig) -> Result<(), CheckpointError>;
    async fn delete(&self, job: &str) -> Result<(), CheckpointError>;
}

#[derive(Debug, Clone)]
struct Working {
    config: JobConfig,
    staged: Vec<ConfigField>,
}

impl Working {
    /// `durable` with the staged fields that still fit it applied on top.
    fn rebase(durable: JobConfig, staged: Vec<ConfigField>) -> Self {
        let mut config = durable;
        let staged = staged
            .into_iter()
            .filter(|field| config.apply(field.clone()).is_ok())
            .collect();
        Self { config, staged }
    }
}

/// Working-copy layer over a durable backend.
#[derive(Debug)]
pub struct StagedCheckpointStore<B> {
    backend: B,
    working: RwLock<HashMap<String, Working>>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<B: CheckpointBackend> StagedCheckpointStore<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            working: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current working copy (including staged, unpersisted fields).
    pub fn working_copy(&self, job: &str) -> Option<JobConfig> {
        self.working
            .read()
            .unwrap()
            .get(job)
            .map(|working| working.config.clone())
    }

    fn job_lock(&self, job: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        Arc::clone(locks.entry(job.to_string()).or_default())
    }

    fn staged(&self, job: &str) -> Vec<ConfigField> {
        self.working
            .read()
            .unwrap()
            .get(job)
            .map(|working| working.staged.clone())
            .unwrap_or_default()
    }

    // The helpers below expect the caller to hold the job lock.

    async fn refresh(&self, job: &str) -> Result<Option<JobConfig>, CheckpointError> {
        let durable = self.backend.read(job).await?;
        let mut working = self.working.write().unwrap();
        match &durable {
            Some(config) => {
                let staged = working.remove(job).map(|w| w.staged).unwrap_or_default();
                working.insert(job.to_string(), Working::rebase(config.clone(), staged));
            }
            None => {
                working.remove(job);
            }
        }
        Ok(durable)
    }

    /// Apply `fields` to the durable config, write it and rebase the working
    /// copy on the result with `keep_staged` still pending.
    async fn write_through(
        &self,
        job: &str,
        fields: Vec<ConfigField>,
        keep_staged: Vec<ConfigField>,
    ) -> Result<(), CheckpointError> {
        let mut config = self
            .backend
            .read(job)
            .await?
            .ok_or_else(|| CheckpointError::NotFound(job.to_string()))?;
        for field in fields {
            config.apply(field)?;
        }
        self.backend.write(job, &config).await?;
        self.working
            .write()
            .unwrap()
            .insert(job.to_string(), Working::rebase(config, keep_staged));
        Ok(())
    }
}

#[async_trait]
impl<B: CheckpointBackend> CheckpointStore for StagedCheckpointStore<B> {
    async fn load(&self, job: &str) -> Result<Option<JobConfig>, CheckpointError> {
        let lock = self.job_lock(job);
        let _guard = lock.lock().await;
        self.refresh(job).await
    }

    async fn set_field(&self, job: &str, field: ConfigField) -> Result<(), CheckpointError> {
        let lock = self.job_lock(job);
        let _guard = lock.lock().await;

        let cached = self.working.read().unwrap().contains_key(job);
        if !cached && self.refresh(job).await?.is_none() {
            return Err(CheckpointError::NotFound(job.to_string()));
        }

        let mut working = self.working.write().unwrap();
        let entry = working
            .get_mut(job)
            .ok_or_else(|| CheckpointError::NotFound(job.to_string()))?;
        entry.config.apply(field.clone())?;
        entry.staged.push(field);
        Ok(())
    }

    async fn persist(&self, job: &str) -> Result<(), CheckpointError> {
        let lock = self.job_lock(job);
        let _guard = lock.lock().await;

        if !self.working.read().unwrap().contains_key(job) {
            return Err(CheckpointError::NotFound(job.to_string()));
        }
        let staged = self.staged(job);
        self.write_through(job, staged, Vec::new()).await
    }

    async fn update(&self, job: &str, fields: Vec<ConfigField>) -> Result<(), CheckpointError> {
        let lock = self.job_lock(job);
        let _guard = lock.lock().await;

        let staged = self.staged(job);
        self.write_through(job, fields, staged).await
    }

    async fn remove(&self, job: &str) -> Result<(), CheckpointError> {
        let lock = self.job_lock(job);
        let _guard = lock.lock().await;

        self.working.write().unwrap().remove(job);
        self.backend.delete(job).await
    }

    async fn initialize(&self, job: &str, default: JobConfig) -> Result<bool, CheckpointError> {
        let lock = self.job_lock(job);
        let _guard = lock.lock().await;

        if self.backend.read(job).await?.is_some() {
            return Ok(false);
        }
        self.backend.write(job, &default).await?;
        self.working
            .write()
            .unwrap()
            .insert(job.to_string(), Working::rebase(default, Vec::new()));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexsync_core::{CursorState, Status};

    #[tokio::test]
    async fn staged_fields_are_invisible_until_persisted() {
        let store = InMemoryCheckpointStore::new();
        store
            .initialize("products", JobConfig::by_id("*/5 * * * * *", 100))
            .await
            .unwrap();

        store
            .set_field("products", ConfigField::LastProcessedId(42))
            .await
            .unwrap();
        assert_eq!(store.backend().snapshot("products").unwrap().last_processed_id(), Some(0));

        // A reload returns the durable value and keeps the change staged.
        let reloaded = store.load("products").await.unwrap().unwrap();
        assert_eq!(reloaded.last_processed_id(), Some(0));
        assert_eq!(store.working_copy("products").unwrap().last_processed_id(), Some(42));

        store.persist("products").await.unwrap();
        let reloaded = store.load("products").await.unwrap().unwrap();
        assert_eq!(reloaded.last_processed_id(), Some(42));
    }

    #[tokio::test]
    async fn persist_writes_only_staged_fields_over_newer_durable_state() {
        let store = InMemoryCheckpointStore::new();
        store
            .initialize("products", JobConfig::by_id("*/5 * * * * *", 100))
            .await
            .unwrap();
        store.load("products").await.unwrap();

        // The durable cursor moves on after our load.
        let mut advanced = JobConfig::by_id("*/5 * * * * *", 100);
        advanced.apply(ConfigField::LastProcessedId(500)).unwrap();
        store.backend().put("products", advanced);

        store
            .set_field("products", ConfigField::Status(Status::Ready))
            .await
            .unwrap();
        store.persist("products").await.unwrap();

        let durable = store.backend().snapshot("products").unwrap();
        assert_eq!(durable.last_processed_id(), Some(500));
        assert_eq!(durable.status, Status::Ready);
    }

    #[tokio::test]
    async fn update_leaves_other_staged_fields_pending() {
        let store = InMemoryCheckpointStore::new();
        store
            .initialize("products", JobConfig::by_id("*/5 * * * * *", 100))
            .await
            .unwrap();

        store
            .set_field("products", ConfigField::BatchLimit(7))
            .await
            .unwrap();
        store
            .update("products", vec![ConfigField::Status(Status::Ready)])
            .await
            .unwrap();

        let durable = store.backend().snapshot("products").unwrap();
        assert_eq!(durable.status, Status::Ready);
        assert_eq!(durable.batch_limit, 100);
        assert_eq!(store.working_copy("products").unwrap().batch_limit, 7);

        store.persist("products").await.unwrap();
        assert_eq!(store.backend().snapshot("products").unwrap().batch_limit, 7);
    }

    #[tokio::test]
    async fn set_field_on_unknown_job_fails() {
        let store = InMemoryCheckpointStore::new();
        let err = store
            .set_field("missing", ConfigField::Status(Status::Ready))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckpointError::NotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn field_must_match_cursor_shape() {
        let store = InMemoryCheckpointStore::new();
        store
            .initialize("watch", JobConfig::high_water_mark("0 * * * * *"))
            .await
            .unwrap();

        let err = store
            .set_field("watch", ConfigField::LastProcessedId(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckpointError::Field(_)));
    }

    #[tokio::test]
    async fn initialize_keeps_existing_config() {
        let store = InMemoryCheckpointStore::new();
        let seeded = JobConfig::by_id("0 * * * * *", 10).with_status(Status::Ready);
        assert!(store.initialize("prices", seeded.clone()).await.unwrap());
        assert!(
            !store
                .initialize("prices", JobConfig::by_id("1 * * * * *", 99))
                .await
                .unwrap()
        );
        assert_eq!(store.load("prices").await.unwrap(), Some(seeded));
    }

    #[tokio::test]
    async fn remove_drops_both_layers() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        store
            .initialize("cache", JobConfig::limit_only("0 0 * * * *", 0))
            .await
            .unwrap();
        store.remove("cache").await.unwrap();

        assert!(store.load("cache").await.unwrap().is_none());
        assert!(store.working_copy("cache").is_none());
        // Removing twice is fine.
        store.remove("cache").await.unwrap();
    }

    #[tokio::test]
    async fn arc_forwards_to_inner_store() {
        let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());
        let shared = Arc::clone(&store);
        shared
            .initialize("watch", JobConfig::high_water_mark("0 * * * * *"))
            .await
            .unwrap();
        let loaded = store.load("watch").await.unwrap().unwrap();
        assert_eq!(loaded.cursor, CursorState::HighWaterMark { observed_max_id: 0 });
    }
}
