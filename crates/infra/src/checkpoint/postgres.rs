use std::sync::Arc;

use async_trait::async_trait;
use indexsync_core::JobConfig;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::instrument;

use super::{CheckpointBackend, CheckpointError, PostgresCheckpointStore, StagedCheckpointStore};

/// Durable layer of one `jsonb` row per job.
#[derive(Debug, Clone)]
pub struct PostgresCheckpoints {
    pool: Arc<PgPool>,
}

impl PostgresCheckpoints {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the checkpoint table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<(), CheckpointError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_job_configs (
                job_name   TEXT PRIMARY KEY,
                config     JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> CheckpointError {
    match err {
        sqlx::Error::ColumnDecode { source, .. } => {
            CheckpointError::Serialization(format!("decode error in {operation}: {source}"))
        }
        sqlx::Error::Decode(source) => {
            CheckpointError::Serialization(format!("decode error in {operation}: {source}"))
        }
        sqlx::Error::Database(db_err) => {
            CheckpointError::Storage(format!("database error in {operation}: {}", db_err.message()))
        }
        other => CheckpointError::Storage(format!("{operation}: {other}")),
    }
}

#[async_trait]
impl CheckpointBackend for PostgresCheckpoints {
    #[instrument(skip(self), err)]
    async fn read(&self, job: &str) -> Result<Option<JobConfig>, CheckpointError> {
        let row = sqlx::query("SELECT config FROM sync_job_configs WHERE job_name = $1")
            .bind(job)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("read", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Json(config) = row
            .try_get::<Json<JobConfig>, _>("config")
            .map_err(|e| map_sqlx_error("read", e))?;
        Ok(Some(config))
    }

    #[instrument(skip(self, config), err)]
    async fn write(&self, job: &str, config: &JobConfig) -> Result<(), CheckpointError> {
        sqlx::query(
            r#"
            INSERT INTO sync_job_configs (job_name, config, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (job_name)
            DO UPDATE SET config = EXCLUDED.config, updated_at = now()
            "#,
        )
        .bind(job)
        .bind(Json(config))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("write", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, job: &str) -> Result<(), CheckpointError> {
        sqlx::query("DELETE FROM sync_job_configs WHERE job_name = $1")
            .bind(job)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;
        Ok(())
    }
}

impl PostgresCheckpointStore {
    pub fn new(pool: PgPool) -> Self {
        StagedCheckpointStore::with_backend(PostgresCheckpoints::new(pool))
    }
}
