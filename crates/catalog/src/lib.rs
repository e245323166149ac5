//! Catalog transforms (pure, deterministic).
//!
//! Turns raw relational rows into index-ready documents:
//! - products: name/brand standardization, name bucketing, display extension
//! - stock prices: tier reconstruction, rank score, composite identity
//!
//! No I/O lives here; source readers and sinks are in `indexsync-infra`.

pub mod document;
pub mod keys;
pub mod price;
pub mod product;
pub mod text;

pub use document::{Batch, Document};
pub use price::{
    DistributorType, PriceBreak, PriceRow, PriceTiers, StockPriceDocument, TransformError,
    transform_prices,
};
pub use product::{ProductDocument, ProductRow, transform_products};
pub use text::{collapse_whitespace, name_bucket, standardize_product_name, strip_braces};
