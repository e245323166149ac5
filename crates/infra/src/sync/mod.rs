//! The concrete jobs: product and price index sync, the max-id watcher and
//! the cache maintenance job.

pub mod high_water_mark;
pub mod maintenance;
pub mod price;
pub mod product;
pub mod watch;

pub use high_water_mark::HighWaterMark;
pub use maintenance::MaintenanceJob;
pub use price::PriceSyncTask;
pub use product::ProductSyncTask;
pub use watch::WatchJob;

use indexsync_core::JobConfig;

pub const PRODUCTS_JOB: &str = "products";
pub const STOCK_PRICE_JOB: &str = "stockPrice";
pub const CRAWL_PRICE_JOB: &str = "crawlPrice";
pub const WATCH_JOB: &str = "watch";
pub const CACHE_MAINTENANCE_JOB: &str = "redisCache";

/// Config seeded for each built-in job on first start. All start `Stopped`.
pub fn default_configs() -> Vec<(&'static str, JobConfig)> {
    vec![
        (PRODUCTS_JOB, JobConfig::by_id("0 */5 * * * *", 1000)),
        (STOCK_PRICE_JOB, JobConfig::by_id("30 */2 * * * *", 1000)),
        (CRAWL_PRICE_JOB, JobConfig::by_id("45 */2 * * * *", 1000)),
        (WATCH_JOB, JobConfig::high_water_mark("0 * * * * *")),
        (CACHE_MAINTENANCE_JOB, JobConfig::limit_only("0 0 4 * * *", 0)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexsync_core::Status;

    #[test]
    fn defaults_cover_every_job_and_start_stopped() {
        let configs = default_configs();
        let names: Vec<_> = configs.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            [PRODUCTS_JOB, STOCK_PRICE_JOB, CRAWL_PRICE_JOB, WATCH_JOB, CACHE_MAINTENANCE_JOB]
        );
        assert!(configs.iter().all(|(_, c)| c.status == Status::Stopped));
        assert!(configs.iter().all(|(_, c)| c.trigger_expression.split_whitespace().count() == 6));
    }
}
