//! Source readers over the authoritative relational store.

use std::sync::Arc;

use async_trait::async_trait;
use indexsync_catalog::{DistributorType, PriceRow, ProductRow};

mod in_memory;
mod postgres;

pub use in_memory::InMemoryCatalogSource;
pub use postgres::PostgresCatalogSource;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("row decode failed: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ProductSource: Send + Sync {
    /// Products with `pid > last_id`, ascending by pid, including logically
    /// deleted rows.
    async fn products_after(&self, last_id: i64, limit: u32) -> Result<Vec<ProductRow>, SourceError>;

    /// Current maximum product id (0 for an empty table).
    async fn max_product_id(&self) -> Result<i64, SourceError>;
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Live (not deleted) price rows of one distributor type with
    /// `sid > last_id`, ascending by sid.
    async fn prices_after(
        &self,
        distributor_type: DistributorType,
        last_id: i64,
        limit: u32,
    ) -> Result<Vec<PriceRow>, SourceError>;
}

#[async_trait]
impl<S> ProductSource for Arc<S>
where
    S: ProductSource + ?Sized,
{
    async fn products_after(&self, last_id: i64, limit: u32) -> Result<Vec<ProductRow>, SourceError> {
        (**self).products_after(last_id, limit).await
    }

    async fn max_product_id(&self) -> Result<i64, SourceError> {
        (**self).max_product_id().await
    }
}

#[async_trait]
impl<S> PriceSource for Arc<S>
where
    S: PriceSource + ?Sized,
{
    async fn prices_after(
        &self,
        distributor_type: DistributorType,
        last_id: i64,
        limit: u32,
    ) -> Result<Vec<PriceRow>, SourceError> {
        (**self).prices_after(distributor_type, last_id, limit).await
    }
}
