//! Generic extract → transform → load → checkpoint → report lifecycle.
//!
//! A concrete job supplies a [`SyncTask`]; [`SyncJob`] drives it:
//!
//! 1. load the persisted config (failure counts against the retry budget)
//! 2. suspend instead of running once the retry budget is spent
//! 3. report `Running`, fetch one page
//! 4. upsert, then delete (empty batches are skipped)
//! 5. persist the advanced cursor, only after the writes were accepted
//! 6. run the completion hook (its failure does not roll back step 5)
//! 7. report `Ready` with the run description and elapsed time
//!
//! Any step error ends the run as `Failed`. Nothing is persisted before step 5,
//! so a crash mid-run replays the same page on restart.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use indexsync_catalog::{Batch, Document};
use indexsync_core::{ConfigField, Cursor, CursorState, JobConfig, Status, SyncError, SyncResult};
use tracing::debug;

use super::context::RunContext;
use super::registry::{Registry, Runnable};
use crate::checkpoint::CheckpointStore;

/// One fetched and transformed page.
#[derive(Debug, Clone)]
pub struct Page<D> {
    pub batch: Batch<D>,
    /// Position to persist once the batch is written.
    pub next_cursor: Cursor,
    /// Extra line for the run description.
    pub note: Option<String>,
}

impl<D> Page<D> {
    pub fn new(batch: Batch<D>, next_cursor: Cursor) -> Self {
        Self {
            batch,
            next_cursor,
            note: None,
        }
    }

    /// Nothing to write; keep the cursor where it is.
    pub fn idle(cursor: Cursor, note: impl Into<String>) -> Self {
        Self {
            batch: Batch::default(),
            next_cursor: cursor,
            note: Some(note.into()),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Behavior a concrete sync job plugs into the lifecycle.
#[async_trait]
pub trait SyncTask: Send + Sync + 'static {
    type Document: Document;

    async fn fetch_page(&self, config: &JobConfig) -> SyncResult<Page<Self::Document>>;

    async fn upsert(&self, docs: &[Self::Document]) -> SyncResult<()>;

    async fn delete(&self, docs: &[Self::Document]) -> SyncResult<()>;

    async fn on_complete(
        &self,
        _upserts: &[Self::Document],
        _deletes: &[Self::Document],
    ) -> SyncResult<()> {
        Ok(())
    }
}

pub struct SyncJob<T: SyncTask> {
    ctx: RunContext,
    task: T,
}

impl<T: SyncTask> SyncJob<T> {
    pub fn new(name: impl Into<String>, store: Arc<dyn CheckpointStore>, task: T) -> Self {
        Self {
            ctx: RunContext::new(name, store),
            task,
        }
    }

    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn retry_count(&self) -> u32 {
        self.ctx.retry_count()
    }

    async fn execute(&self, config: &JobConfig) -> SyncResult<()> {
        let page = self.task.fetch_page(config).await?;
        if let Some(note) = &page.note {
            self.ctx.note(note);
        }

        let Batch {
            upserts, deletes, ..
        } = &page.batch;

        if upserts.is_empty() {
            self.ctx.note("no pending upserts");
        } else {
            self.task.upsert(upserts).await?;
            self.ctx.note(format!("upserted {} documents", upserts.len()));
        }
        if !deletes.is_empty() {
            self.task.delete(deletes).await?;
            self.ctx.note(format!("deleted {} documents", deletes.len()));
        }

        self.checkpoint(config, &page.next_cursor).await?;
        self.task.on_complete(upserts, deletes).await
    }

    /// Persist `next` if it moves the cursor forward.
    async fn checkpoint(&self, config: &JobConfig, next: &Cursor) -> SyncResult<()> {
        if !next.is_set() {
            return Ok(());
        }

        let fields = match (next, &config.cursor) {
            (
                Cursor::Numeric(id),
                CursorState::ById {
                    max_seen_id,
                    last_processed_id,
                    ..
                },
            ) => {
                if id <= last_processed_id {
                    return Ok(());
                }
                vec![
                    ConfigField::LastProcessedId(*id),
                    ConfigField::MaxSeenId((*max_seen_id).max(*id)),
                    ConfigField::LastRunTimestamp(Utc::now()),
                ]
            }
            // Timestamps are compared as ISO-8601 strings.
            (
                Cursor::Textual(ts),
                CursorState::ByTimestamp {
                    last_processed_timestamp,
                },
            ) => {
                if ts.as_str() <= last_processed_timestamp.as_str() {
                    return Ok(());
                }
                vec![ConfigField::LastProcessedTimestamp(ts.clone())]
            }
            (cursor, state) => {
                return Err(SyncError::checkpoint(format!(
                    "{cursor:?} does not fit a {} config",
                    state.shape()
                )));
            }
        };

        self.ctx.persist(fields).await?;
        debug!(job = %self.ctx.name(), cursor = ?next, "checkpoint advanced");
        Ok(())
    }
}

#[async_trait]
impl<T: SyncTask> Runnable for SyncJob<T> {
    async fn run(&self, registry: &Registry) {
        let Some(started) = self.ctx.begin(registry).await else {
            return;
        };

        match self.execute(&started.config).await {
            Ok(()) => self.ctx.finish(registry, started, Status::Ready),
            Err(e) => self.ctx.fail(registry, e),
        }
    }

    fn reset_retries(&self) {
        self.ctx.reset_retries();
    }
}
