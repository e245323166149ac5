use std::sync::Arc;

use async_trait::async_trait;
use indexsync_catalog::{ProductDocument, transform_products};
use indexsync_core::{Cursor, JobConfig, SyncError, SyncResult};
use tracing::debug;

use super::high_water_mark::HighWaterMark;
use crate::jobs::{Page, SyncTask};
use crate::sink::DocumentSink;
use crate::source::ProductSource;

/// Pages products by pid into the product index.
pub struct ProductSyncTask {
    source: Arc<dyn ProductSource>,
    sink: Arc<dyn DocumentSink<ProductDocument>>,
    high_water_mark: HighWaterMark,
}

impl ProductSyncTask {
    pub fn new(
        source: Arc<dyn ProductSource>,
        sink: Arc<dyn DocumentSink<ProductDocument>>,
        high_water_mark: HighWaterMark,
    ) -> Self {
        Self {
            source,
            sink,
            high_water_mark,
        }
    }
}

#[async_trait]
impl SyncTask for ProductSyncTask {
    type Document = ProductDocument;

    async fn fetch_page(&self, config: &JobConfig) -> SyncResult<Page<ProductDocument>> {
        let last_id = config
            .last_processed_id()
            .ok_or_else(|| SyncError::config_load("product sync needs a by_id cursor"))?;

        if self.high_water_mark.is_reached_by(last_id) {
            debug!(last_id, mark = self.high_water_mark.get(), "product cursor at high-water mark");
            return Ok(Page::idle(
                Cursor::Numeric(last_id),
                format!("cursor {last_id} at high-water mark {}", self.high_water_mark.get()),
            ));
        }

        let rows = self
            .source
            .products_after(last_id, config.batch_limit)
            .await
            .map_err(|e| SyncError::fetch(e.to_string()))?;
        let batch = transform_products(&rows);
        let next = last_id.max(batch.max_id);

        Ok(Page::new(batch, Cursor::Numeric(next)))
    }

    async fn upsert(&self, docs: &[ProductDocument]) -> SyncResult<()> {
        self.sink
            .bulk_upsert(docs)
            .await
            .map_err(|e| SyncError::write(e.to_string()))
    }

    async fn delete(&self, docs: &[ProductDocument]) -> SyncResult<()> {
        self.sink
            .bulk_delete(docs)
            .await
            .map_err(|e| SyncError::write(e.to_string()))
    }
}
