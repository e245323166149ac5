use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use indexsync_core::JobConfig;

use super::{CheckpointBackend, CheckpointError, FileCheckpointStore, StagedCheckpointStore};

/// Durable layer of one pretty-printed JSON file per job.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never observes a half-written checkpoint.
#[derive(Debug, Clone)]
pub struct FileCheckpoints {
    dir: PathBuf,
}

impl FileCheckpoints {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, job: &str) -> PathBuf {
        self.dir.join(format!("{job}.json"))
    }
}

fn io_error(op: &str, path: &Path, err: std::io::Error) -> CheckpointError {
    CheckpointError::Storage(format!("{op} {}: {err}", path.display()))
}

#[async_trait]
impl CheckpointBackend for FileCheckpoints {
    async fn read(&self, job: &str) -> Result<Option<JobConfig>, CheckpointError> {
        let path = self.path_for(job);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("read", &path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CheckpointError::Serialization(format!("{}: {e}", path.display())))
    }

    async fn write(&self, job: &str, config: &JobConfig) -> Result<(), CheckpointError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error("create", &self.dir, e))?;

        let body = serde_json::to_vec_pretty(config)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        let path = self.path_for(job);
        let tmp = self.dir.join(format!(".{job}.json.tmp"));

        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| io_error("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error("rename", &path, e))
    }

    async fn delete(&self, job: &str) -> Result<(), CheckpointError> {
        let path = self.path_for(job);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("remove", &path, e)),
        }
    }
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        StagedCheckpointStore::with_backend(FileCheckpoints::new(dir))
    }
}
