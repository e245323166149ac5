//! Infrastructure wiring: checkpoint store, catalog source, index sinks and
//! the built-in jobs.

use std::sync::Arc;

use anyhow::Context;
use indexsync_catalog::{DistributorType, ProductDocument, StockPriceDocument};
use indexsync_infra::{
    checkpoint::{CheckpointError, CheckpointStore, FileCheckpointStore, PostgresCheckpointStore},
    config::{CheckpointBackendKind, ServiceConfig},
    jobs::{CronScheduler, Registry, RegistryError, SyncJob, TriggerScheduler},
    sink::{CacheStore, DocumentSink, InMemoryCacheStore, InMemoryDocumentSink},
    source::{InMemoryCatalogSource, PostgresCatalogSource, PriceSource, ProductSource},
    sync::{
        self, CACHE_MAINTENANCE_JOB, CRAWL_PRICE_JOB, HighWaterMark, MaintenanceJob,
        PRODUCTS_JOB, PriceSyncTask, ProductSyncTask, STOCK_PRICE_JOB, WATCH_JOB, WatchJob,
    },
};
use sqlx::PgPool;
use tracing::{info, warn};

/// Everything the built-in jobs read from and write to.
#[derive(Clone)]
pub struct JobDeps {
    pub store: Arc<dyn CheckpointStore>,
    pub products: Arc<dyn ProductSource>,
    pub prices: Arc<dyn PriceSource>,
    pub product_sink: Arc<dyn DocumentSink<ProductDocument>>,
    pub price_sink: Arc<dyn DocumentSink<StockPriceDocument>>,
    pub cache: Arc<dyn CacheStore>,
}

impl JobDeps {
    /// In-memory wiring (dev/test) over the given checkpoint store.
    pub fn in_memory(store: Arc<dyn CheckpointStore>) -> Self {
        let source = Arc::new(InMemoryCatalogSource::new());
        Self {
            store,
            products: source.clone(),
            prices: source,
            product_sink: Arc::new(InMemoryDocumentSink::<ProductDocument>::new()),
            price_sink: Arc::new(InMemoryDocumentSink::<StockPriceDocument>::new()),
            cache: Arc::new(InMemoryCacheStore::new()),
        }
    }
}

/// Write the default config of every built-in job that has none yet.
pub async fn seed_default_configs(store: &dyn CheckpointStore) -> Result<(), CheckpointError> {
    for (name, config) in sync::default_configs() {
        if store.initialize(name, config).await? {
            info!(job = name, "seeded default job config");
        }
    }
    Ok(())
}

/// Register the built-in jobs. Configs must already exist.
pub async fn register_jobs(registry: &Registry, deps: &JobDeps) -> Result<(), RegistryError> {
    let mark = HighWaterMark::new();

    let products = ProductSyncTask::new(deps.products.clone(), deps.product_sink.clone(), mark.clone());
    registry
        .register(
            PRODUCTS_JOB,
            Arc::new(SyncJob::new(PRODUCTS_JOB, deps.store.clone(), products)),
        )
        .await?;

    for (name, distributor_type) in [
        (STOCK_PRICE_JOB, DistributorType::Affiliated),
        (CRAWL_PRICE_JOB, DistributorType::NonAffiliated),
    ] {
        let task = PriceSyncTask::new(distributor_type, deps.prices.clone(), deps.price_sink.clone());
        registry
            .register(name, Arc::new(SyncJob::new(name, deps.store.clone(), task)))
            .await?;
    }

    let watch = WatchJob::new(WATCH_JOB, deps.store.clone(), deps.products.clone(), mark);
    registry.register(WATCH_JOB, Arc::new(watch)).await?;

    let maintenance = MaintenanceJob::new(CACHE_MAINTENANCE_JOB, deps.store.clone(), deps.cache.clone());
    registry.register(CACHE_MAINTENANCE_JOB, Arc::new(maintenance)).await?;

    Ok(())
}

/// Seed configs and register every built-in job on a fresh registry.
pub async fn build_registry(
    scheduler: Arc<dyn TriggerScheduler>,
    deps: &JobDeps,
) -> anyhow::Result<Arc<Registry>> {
    seed_default_configs(deps.store.as_ref())
        .await
        .context("seeding default job configs")?;

    let registry = Registry::new(scheduler, deps.store.clone());
    register_jobs(&registry, deps)
        .await
        .context("registering jobs")?;
    Ok(registry)
}

/// Production wiring, driven by [`ServiceConfig`].
pub async fn build_services(config: &ServiceConfig) -> anyhow::Result<Arc<Registry>> {
    let scheduler = CronScheduler::new().await.context("creating cron scheduler")?;

    let pool = match &config.database_url {
        Some(url) => Some(
            PgPool::connect(url)
                .await
                .context("connecting to Postgres")?,
        ),
        None => None,
    };

    let store: Arc<dyn CheckpointStore> = match (config.checkpoint_backend, &pool) {
        (CheckpointBackendKind::Postgres, Some(pool)) => {
            let store = PostgresCheckpointStore::new(pool.clone());
            store
                .backend()
                .ensure_schema()
                .await
                .context("creating checkpoint table")?;
            Arc::new(store)
        }
        _ => Arc::new(FileCheckpointStore::new(&config.checkpoint_dir)),
    };

    let mut deps = JobDeps::in_memory(store);
    match pool {
        Some(pool) => {
            let source = Arc::new(PostgresCatalogSource::new(pool));
            deps.products = source.clone();
            deps.prices = source;
        }
        None => warn!("DATABASE_URL not set; using in-memory catalog source"),
    }
    wire_sinks(config, &mut deps)?;

    build_registry(Arc::new(scheduler), &deps).await
}

#[cfg(feature = "redis")]
fn wire_sinks(config: &ServiceConfig, deps: &mut JobDeps) -> anyhow::Result<()> {
    use indexsync_infra::sink::{RedisCacheStore, RedisDocumentSink};

    let Some(url) = &config.redis_url else {
        warn!("REDIS_URL not set; using in-memory sinks");
        return Ok(());
    };
    deps.product_sink = Arc::new(
        RedisDocumentSink::new(url, &config.product_key_prefix).context("opening product sink")?,
    );
    deps.price_sink = Arc::new(
        RedisDocumentSink::new(url, &config.price_key_prefix).context("opening price sink")?,
    );
    deps.cache = Arc::new(RedisCacheStore::new(url).context("opening cache store")?);
    Ok(())
}

#[cfg(not(feature = "redis"))]
fn wire_sinks(config: &ServiceConfig, _deps: &mut JobDeps) -> anyhow::Result<()> {
    if config.redis_url.is_some() {
        warn!("REDIS_URL set but redis feature not enabled, falling back to in-memory sinks");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexsync_core::Status;
    use indexsync_infra::checkpoint::InMemoryCheckpointStore;
    use indexsync_infra::jobs::ManualScheduler;

    #[tokio::test]
    async fn fresh_start_registers_every_job_dormant() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let scheduler = Arc::new(ManualScheduler::new());
        let registry = build_registry(scheduler.clone(), &JobDeps::in_memory(store))
            .await
            .unwrap();

        let jobs = registry.list();
        let names: Vec<_> = jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, ["crawlPrice", "products", "redisCache", "stockPrice", "watch"]);
        assert!(jobs.iter().all(|j| j.status == Status::Stopped && !j.attached));
        assert_eq!(scheduler.attached_count(), 0);
    }

    #[tokio::test]
    async fn existing_configs_are_not_overwritten() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        store
            .initialize(
                PRODUCTS_JOB,
                indexsync_core::JobConfig::by_id("*/5 * * * * *", 42).with_status(Status::Ready),
            )
            .await
            .unwrap();

        let scheduler = Arc::new(ManualScheduler::new());
        let registry = build_registry(scheduler.clone(), &JobDeps::in_memory(store))
            .await
            .unwrap();

        let products = registry.get(PRODUCTS_JOB).unwrap();
        assert_eq!(products.batch_limit, 42);
        assert_eq!(products.status, Status::Ready);
        assert!(products.attached);
        assert_eq!(scheduler.attached_count(), 1);
    }
}
