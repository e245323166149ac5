use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexsync_catalog::{DistributorType, PriceRow, ProductRow};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use super::{PriceSource, ProductSource, SourceError};

/// Catalog reader over the relational source.
///
/// Expected tables:
/// - `products(pid, product_name, brand, brand_id, category_id, parent_id, is_deleted)`
/// - `price_stock` (affiliated) and `price_crawl` (non-affiliated), both
///   `(sid, pid, distributor_id, stock_quantity, currency, step_price, update_time, is_deleted)`
#[derive(Debug, Clone)]
pub struct PostgresCatalogSource {
    pool: Arc<PgPool>,
}

impl PostgresCatalogSource {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn price_table(distributor_type: DistributorType) -> &'static str {
    match distributor_type {
        DistributorType::Affiliated => "price_stock",
        DistributorType::NonAffiliated => "price_crawl",
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> SourceError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            SourceError::Unavailable(format!("{operation}: {err}"))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            SourceError::Decode(format!("{operation}: {err}"))
        }
        other => SourceError::Query(format!("{operation}: {other}")),
    }
}

fn product_from_row(row: &PgRow) -> Result<ProductRow, sqlx::Error> {
    Ok(ProductRow {
        pid: row.try_get("pid")?,
        product_name: row.try_get::<Option<String>, _>("product_name")?.unwrap_or_default(),
        brand: row.try_get::<Option<String>, _>("brand")?.unwrap_or_default(),
        brand_id: row.try_get::<Option<i64>, _>("brand_id")?.unwrap_or_default(),
        category_id: row.try_get::<Option<i64>, _>("category_id")?.unwrap_or_default(),
        parent_id: row.try_get::<Option<i64>, _>("parent_id")?.unwrap_or_default(),
        is_deleted: row.try_get("is_deleted")?,
    })
}

fn price_from_row(row: &PgRow) -> Result<PriceRow, sqlx::Error> {
    Ok(PriceRow {
        sid: row.try_get("sid")?,
        pid: row.try_get::<Option<i64>, _>("pid")?.unwrap_or_default(),
        distributor_id: row.try_get::<Option<i64>, _>("distributor_id")?.unwrap_or_default(),
        stock_quantity: row.try_get::<Option<i64>, _>("stock_quantity")?.unwrap_or_default(),
        currency: row.try_get::<Option<String>, _>("currency")?.unwrap_or_default(),
        step_price: row.try_get::<Option<String>, _>("step_price")?.unwrap_or_default(),
        update_time: row.try_get::<Option<DateTime<Utc>>, _>("update_time")?,
        is_deleted: row.try_get("is_deleted")?,
    })
}

#[async_trait]
impl ProductSource for PostgresCatalogSource {
    #[instrument(skip(self), err)]
    async fn products_after(&self, last_id: i64, limit: u32) -> Result<Vec<ProductRow>, SourceError> {
        let rows = sqlx::query(
            r#"
            SELECT pid, product_name, brand, brand_id, category_id, parent_id, is_deleted
            FROM products
            WHERE pid > $1
            ORDER BY pid ASC
            LIMIT $2
            "#,
        )
        .bind(last_id)
        .bind(i64::from(limit))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("products_after", e))?;

        rows.iter()
            .map(product_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("products_after", e))
    }

    #[instrument(skip(self), err)]
    async fn max_product_id(&self) -> Result<i64, SourceError> {
        let row = sqlx::query("SELECT COALESCE(MAX(pid), 0) AS max_pid FROM products")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("max_product_id", e))?;
        row.try_get("max_pid")
            .map_err(|e| map_sqlx_error("max_product_id", e))
    }
}

#[async_trait]
impl PriceSource for PostgresCatalogSource {
    #[instrument(skip(self), err)]
    async fn prices_after(
        &self,
        distributor_type: DistributorType,
        last_id: i64,
        limit: u32,
    ) -> Result<Vec<PriceRow>, SourceError> {
        let sql = format!(
            r#"
            SELECT sid, pid, distributor_id, stock_quantity, currency, step_price, update_time, is_deleted
            FROM {}
            WHERE sid > $1 AND is_deleted = FALSE
            ORDER BY sid ASC
            LIMIT $2
            "#,
            price_table(distributor_type)
        );

        let rows = sqlx::query(&sql)
            .bind(last_id)
            .bind(i64::from(limit))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("prices_after", e))?;

        rows.iter()
            .map(price_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("prices_after", e))
    }
}
