use std::sync::Arc;

use async_trait::async_trait;
use indexsync_catalog::{DistributorType, StockPriceDocument, transform_prices};
use indexsync_core::{Cursor, JobConfig, SyncError, SyncResult};
use tracing::warn;

use crate::jobs::{Page, SyncTask};
use crate::sink::DocumentSink;
use crate::source::PriceSource;

/// Pages one distributor affiliation's price rows into the price index.
pub struct PriceSyncTask {
    distributor_type: DistributorType,
    source: Arc<dyn PriceSource>,
    sink: Arc<dyn DocumentSink<StockPriceDocument>>,
}

impl PriceSyncTask {
    pub fn new(
        distributor_type: DistributorType,
        source: Arc<dyn PriceSource>,
        sink: Arc<dyn DocumentSink<StockPriceDocument>>,
    ) -> Self {
        Self {
            distributor_type,
            source,
            sink,
        }
    }

    pub fn distributor_type(&self) -> DistributorType {
        self.distributor_type
    }
}

#[async_trait]
impl SyncTask for PriceSyncTask {
    type Document = StockPriceDocument;

    async fn fetch_page(&self, config: &JobConfig) -> SyncResult<Page<StockPriceDocument>> {
        let last_id = config
            .last_processed_id()
            .ok_or_else(|| SyncError::config_load("price sync needs a by_id cursor"))?;

        let rows = self
            .source
            .prices_after(self.distributor_type, last_id, config.batch_limit)
            .await
            .map_err(|e| SyncError::fetch(e.to_string()))?;

        let (batch, rejected) = transform_prices(&rows, self.distributor_type);
        for err in &rejected {
            warn!(distributor_type = self.distributor_type.code(), error = %err, "price row skipped");
        }

        let next = last_id.max(batch.max_id);
        let page = Page::new(batch, Cursor::Numeric(next));

        Ok(if rejected.is_empty() {
            page
        } else {
            page.with_note(format!("skipped {} rows with malformed tier prices", rejected.len()))
        })
    }

    async fn upsert(&self, docs: &[StockPriceDocument]) -> SyncResult<()> {
        self.sink
            .bulk_upsert(docs)
            .await
            .map_err(|e| SyncError::write(e.to_string()))
    }

    async fn delete(&self, docs: &[StockPriceDocument]) -> SyncResult<()> {
        self.sink
            .bulk_delete(docs)
            .await
            .map_err(|e| SyncError::write(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{CheckpointStore, InMemoryCheckpointStore};
    use crate::jobs::{ManualScheduler, Registry, SyncJob};
    use crate::sink::InMemoryDocumentSink;
    use crate::source::InMemoryCatalogSource;
    use indexsync_catalog::PriceRow;
    use indexsync_core::Status;

    fn price(sid: i64, pid: i64, distributor_id: i64, step_price: &str) -> PriceRow {
        PriceRow {
            sid,
            pid,
            distributor_id,
            stock_quantity: 2_500,
            currency: "USD".to_string(),
            step_price: step_price.to_string(),
            update_time: None,
            is_deleted: false,
        }
    }

    async fn setup(
        name: &str,
        distributor_type: DistributorType,
    ) -> (
        Arc<Registry>,
        Arc<ManualScheduler>,
        Arc<InMemoryCatalogSource>,
        Arc<InMemoryDocumentSink<StockPriceDocument>>,
    ) {
        let scheduler = Arc::new(ManualScheduler::new());
        let store = Arc::new(InMemoryCheckpointStore::new());
        store
            .initialize(name, JobConfig::by_id("0 * * * * *", 50).with_status(Status::Ready))
            .await
            .unwrap();
        let source = Arc::new(InMemoryCatalogSource::new());
        let sink = Arc::new(InMemoryDocumentSink::new());

        let registry = Registry::new(scheduler.clone(), store.clone());
        let task = PriceSyncTask::new(distributor_type, source.clone(), sink.clone());
        registry
            .register(name, Arc::new(SyncJob::new(name, store.clone(), task)))
            .await
            .unwrap();

        (registry, scheduler, source, sink)
    }

    #[tokio::test]
    async fn affiliated_rows_are_keyed_by_row_id() {
        let (registry, scheduler, source, sink) = setup("stockPrice", DistributorType::Affiliated).await;
        source.upsert_price(
            DistributorType::Affiliated,
            price(41, 501, 12, r#"[{"Qty":1,"Price":2.0},{"Qty":100,"Price":1.5}]"#),
        );
        source.upsert_price(DistributorType::NonAffiliated, price(42, 501, 12, "[]"));

        scheduler.fire(registry.trigger_handle("stockPrice").unwrap()).await;

        assert_eq!(sink.ids(), vec!["41"]);
        let doc = sink.get("41").unwrap();
        assert_eq!(doc.tier1, "2.0000");
        assert_eq!(doc.tier3, "1.5000");
        assert_eq!(registry.get("stockPrice").unwrap().status, Status::Ready);
    }

    #[tokio::test]
    async fn crawled_rows_use_composite_ids_and_invalid_rows_are_deleted() {
        let (registry, scheduler, source, sink) =
            setup("crawlPrice", DistributorType::NonAffiliated).await;
        source.upsert_price(DistributorType::NonAffiliated, price(1, 501, 12, "[]"));
        source.upsert_price(DistributorType::NonAffiliated, price(2, 0, 12, "[]"));

        scheduler.fire(registry.trigger_handle("crawlPrice").unwrap()).await;

        assert_eq!(sink.ids(), vec!["2-12-501"]);
        let description = registry.get("crawlPrice").unwrap().description;
        assert!(description.contains("upserted 1 documents"));
        assert!(description.contains("deleted 1 documents"));
    }

    #[tokio::test]
    async fn malformed_tiers_are_skipped_but_the_cursor_moves_on() {
        let (registry, scheduler, source, sink) = setup("stockPrice", DistributorType::Affiliated).await;
        source.upsert_price(DistributorType::Affiliated, price(7, 501, 12, "not json"));
        source.upsert_price(DistributorType::Affiliated, price(8, 502, 12, "[]"));

        scheduler.fire(registry.trigger_handle("stockPrice").unwrap()).await;

        assert_eq!(sink.ids(), vec!["8"]);
        let snapshot = registry.get("stockPrice").unwrap();
        assert_eq!(snapshot.status, Status::Ready);
        assert!(snapshot.description.contains("skipped 1 rows with malformed tier prices"));

        let config = registry.store().load("stockPrice").await.unwrap().unwrap();
        assert_eq!(config.last_processed_id(), Some(8));
    }
}
