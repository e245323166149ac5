use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use indexsync_catalog::{DistributorType, PriceRow, ProductRow};

use super::{PriceSource, ProductSource, SourceError};

/// In-memory catalog tables for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCatalogSource {
    products: RwLock<BTreeMap<i64, ProductRow>>,
    prices: RwLock<BTreeMap<(u8, i64), PriceRow>>,
    unavailable: AtomicBool,
}

impl InMemoryCatalogSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a product row (keyed by pid).
    pub fn upsert_product(&self, row: ProductRow) {
        self.products.write().unwrap().insert(row.pid, row);
    }

    /// Insert or replace a price row (keyed by distributor type and sid).
    pub fn upsert_price(&self, distributor_type: DistributorType, row: PriceRow) {
        self.prices
            .write()
            .unwrap()
            .insert((distributor_type.code(), row.sid), row);
    }

    /// Make every query fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), SourceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("in-memory source switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProductSource for InMemoryCatalogSource {
    async fn products_after(&self, last_id: i64, limit: u32) -> Result<Vec<ProductRow>, SourceError> {
        self.check()?;
        let products = self.products.read().unwrap();
        Ok(products
            .range(last_id.saturating_add(1)..)
            .take(limit as usize)
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn max_product_id(&self) -> Result<i64, SourceError> {
        self.check()?;
        Ok(self
            .products
            .read()
            .unwrap()
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0))
    }
}

#[async_trait]
impl PriceSource for InMemoryCatalogSource {
    async fn prices_after(
        &self,
        distributor_type: DistributorType,
        last_id: i64,
        limit: u32,
    ) -> Result<Vec<PriceRow>, SourceError> {
        self.check()?;
        let code = distributor_type.code();
        let prices = self.prices.read().unwrap();
        Ok(prices
            .range((code, last_id.saturating_add(1))..=(code, i64::MAX))
            .map(|(_, row)| row)
            .filter(|row| !row.is_deleted)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
