use std::sync::Arc;

use async_trait::async_trait;
use indexsync_core::{ConfigField, JobConfig, Status, SyncError, SyncResult};
use tracing::debug;

use super::high_water_mark::HighWaterMark;
use crate::checkpoint::CheckpointStore;
use crate::jobs::{Registry, RunContext, Runnable};
use crate::source::ProductSource;

/// Tracks the largest product id in the source and publishes it as the
/// product job's high-water mark.
pub struct WatchJob {
    ctx: RunContext,
    source: Arc<dyn ProductSource>,
    mark: HighWaterMark,
}

impl WatchJob {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn CheckpointStore>,
        source: Arc<dyn ProductSource>,
        mark: HighWaterMark,
    ) -> Self {
        Self {
            ctx: RunContext::new(name, store),
            source,
            mark,
        }
    }

    pub fn high_water_mark(&self) -> &HighWaterMark {
        &self.mark
    }

    async fn observe(&self, config: &JobConfig) -> SyncResult<()> {
        let stored = config
            .observed_max_id()
            .ok_or_else(|| SyncError::config_load("watch job needs a high_water_mark cursor"))?;
        self.mark.advance(stored);

        let max_id = self
            .source
            .max_product_id()
            .await
            .map_err(|e| SyncError::fetch(e.to_string()))?;

        if max_id > stored {
            self.ctx.persist(vec![ConfigField::ObservedMaxId(max_id)]).await?;
            self.ctx.note(format!("max product id advanced from {stored} to {max_id}"));
        } else {
            debug!(job = %self.ctx.name(), max_id, "max product id unchanged");
            self.ctx.note(format!("max product id unchanged at {stored}"));
        }

        self.mark.advance(max_id);
        Ok(())
    }
}

#[async_trait]
impl Runnable for WatchJob {
    async fn run(&self, registry: &Registry) {
        let Some(started) = self.ctx.begin(registry).await else {
            return;
        };

        match self.observe(&started.config).await {
            Ok(()) => self.ctx.finish(registry, started, Status::Ready),
            Err(e) => self.ctx.fail(registry, e),
        }
    }

    fn reset_retries(&self) {
        self.ctx.reset_retries();
    }
}
