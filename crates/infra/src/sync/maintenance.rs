use std::sync::Arc;

use async_trait::async_trait;
use indexsync_catalog::keys::AGGREGATE_CACHE_PATTERNS;
use indexsync_core::{Status, SyncError, SyncResult};
use tracing::info;

use crate::checkpoint::CheckpointStore;
use crate::jobs::{Registry, RunContext, Runnable};
use crate::sink::CacheStore;

/// Clears the serving layer's aggregate caches once, then pauses itself.
pub struct MaintenanceJob {
    ctx: RunContext,
    cache: Arc<dyn CacheStore>,
}

impl MaintenanceJob {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn CheckpointStore>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            ctx: RunContext::new(name, store),
            cache,
        }
    }

    async fn clear_aggregates(&self) -> SyncResult<u64> {
        let mut removed = 0;
        for pattern in AGGREGATE_CACHE_PATTERNS {
            removed += self
                .cache
                .remove_pattern(pattern)
                .await
                .map_err(|e| SyncError::write(format!("{pattern}: {e}")))?;
        }
        Ok(removed)
    }
}

#[async_trait]
impl Runnable for MaintenanceJob {
    async fn run(&self, registry: &Registry) {
        let Some(started) = self.ctx.begin(registry).await else {
            return;
        };

        let removed = match self.clear_aggregates().await {
            Ok(removed) => removed,
            Err(e) => {
                self.ctx.fail(registry, e);
                return;
            }
        };
        info!(job = %self.ctx.name(), removed, "aggregate caches cleared");
        self.ctx.note(format!("cleared {removed} cached aggregates"));

        if let Err(e) = registry.pause(self.ctx.name()).await {
            self.ctx.fail(registry, SyncError::hook(e.to_string()));
            return;
        }
        self.ctx.finish(registry, started, Status::Stopped);
    }

    fn reset_retries(&self) {
        self.ctx.reset_retries();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::InMemoryCheckpointStore;
    use crate::jobs::ManualScheduler;
    use crate::sink::InMemoryCacheStore;
    use indexsync_catalog::keys::{
        AggFacet, brand_category_agg_key, category_agg_key, category_index_key, product_index_key,
    };
    use indexsync_core::JobConfig;

    #[tokio::test]
    async fn clears_aggregate_families_and_pauses_itself() {
        let scheduler = Arc::new(ManualScheduler::new());
        let store = Arc::new(InMemoryCheckpointStore::new());
        store
            .initialize(
                "redisCache",
                JobConfig::limit_only("0 0 3 * * *", 0).with_status(Status::Ready),
            )
            .await
            .unwrap();

        let cache = Arc::new(InMemoryCacheStore::new());
        cache.set(category_agg_key("1", "12", AggFacet::Brand), "{}");
        cache.set(brand_category_agg_key(3, 1), "{}");
        cache.set(product_index_key("lm358"), "{}");
        cache.set(category_index_key(12), "{}");
        cache.set("session:42", "keep");

        let registry = Registry::new(scheduler.clone(), store.clone());
        let job = MaintenanceJob::new("redisCache", store.clone(), cache.clone());
        registry.register("redisCache", Arc::new(job)).await.unwrap();
        let handle = registry.trigger_handle("redisCache").unwrap();

        scheduler.fire(handle).await;

        assert_eq!(cache.keys(), vec!["session:42"]);
        let snapshot = registry.get("redisCache").unwrap();
        assert_eq!(snapshot.status, Status::Stopped);
        assert!(snapshot.description.contains("cleared 4 cached aggregates"));
        assert!(!snapshot.attached);
        assert!(!scheduler.is_attached(handle));
        assert_eq!(
            store.load("redisCache").await.unwrap().unwrap().status,
            Status::Stopped
        );
    }
}
