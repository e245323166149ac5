//! Distributor price rows → stock price documents.
//!
//! The source row carries a JSON list of `(quantity break, unit price)` pairs.
//! They are folded into five fixed tiers (qty 1, ≤10, ≤100, ≤1000, ≤10000)
//! and a rank score is derived from stock and tier completeness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{Batch, Document};

/// Upper quantity bound of each tier.
const TIER_BOUNDS: [i64; 5] = [1, 10, 100, 1_000, 10_000];

const RANK_STEP: u32 = 10;

/// Distributor affiliation, which decides how a price document is keyed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum DistributorType {
    /// Distributor onboarded on the platform; rows keep their native id.
    Affiliated,
    /// Crawled distributor; rows are keyed by `(type, distributor, product)`.
    NonAffiliated,
}

impl DistributorType {
    pub const fn code(self) -> u8 {
        match self {
            DistributorType::Affiliated => 1,
            DistributorType::NonAffiliated => 2,
        }
    }
}

impl From<DistributorType> for u8 {
    fn from(value: DistributorType) -> Self {
        value.code()
    }
}

impl TryFrom<u8> for DistributorType {
    type Error = TransformError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(DistributorType::Affiliated),
            2 => Ok(DistributorType::NonAffiliated),
            other => Err(TransformError::UnknownDistributorType(other)),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("row {row_id}: malformed tier price list: {reason}")]
    MalformedTiers { row_id: i64, reason: String },

    #[error("unknown distributor type: {0}")]
    UnknownDistributorType(u8),
}

/// Raw price row as read from the relational source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub sid: i64,
    pub pid: i64,
    pub distributor_id: i64,
    pub stock_quantity: i64,
    pub currency: String,
    /// JSON list of `{"Qty": .., "Price": ..}` objects; may be empty.
    pub step_price: String,
    pub update_time: Option<DateTime<Utc>>,
    pub is_deleted: bool,
}

/// One `(quantity break, unit price)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBreak {
    #[serde(alias = "Qty")]
    pub qty: i64,
    #[serde(alias = "Price")]
    pub price: f64,
}

/// The five reconstructed tiers. An empty string means "no price".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTiers(pub [String; 5]);

impl PriceTiers {
    /// Fold price breaks into tiers.
    ///
    /// Breaks are walked from the largest quantity down; each tier keeps the
    /// first positive price seen for its range. Unset tiers then inherit the
    /// next-lower tier, in ascending order.
    pub fn from_breaks(breaks: &[PriceBreak]) -> Self {
        let mut ordered = breaks.to_vec();
        ordered.sort_by(|a, b| b.qty.cmp(&a.qty));

        let mut tiers: [Option<f64>; 5] = [None; 5];
        for step in &ordered {
            if step.price <= 0.0 {
                continue;
            }
            let Some(slot) = tier_index(step.qty) else {
                continue;
            };
            tiers[slot].get_or_insert(step.price);
        }

        for idx in 1..tiers.len() {
            if tiers[idx].is_none() {
                tiers[idx] = tiers[idx - 1];
            }
        }

        Self(tiers.map(|t| t.map(format_price).unwrap_or_default()))
    }

    pub fn populated(&self) -> usize {
        self.0.iter().filter(|t| !t.is_empty()).count()
    }
}

fn tier_index(qty: i64) -> Option<usize> {
    if qty == 1 {
        return Some(0);
    }
    TIER_BOUNDS
        .iter()
        .skip(1)
        .position(|bound| qty <= *bound)
        .map(|idx| idx + 1)
}

fn format_price(price: f64) -> String {
    format!("{:.4}", price as f32)
}

/// Rank by availability and pricing completeness: 10 points for stock on
/// hand plus 10 for each populated tier.
pub fn rank_score(stock_quantity: i64, tiers: &PriceTiers) -> u32 {
    let stock = u32::from(stock_quantity > 0);
    (stock + tiers.populated() as u32) * RANK_STEP
}

/// Search document for a distributor's stock and price on a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPriceDocument {
    pub composite_id: String,
    pub product_id: i64,
    pub distributor_id: i64,
    pub distributor_type: DistributorType,
    pub stock_quantity: i64,
    pub currency: String,
    pub tier1: String,
    pub tier2: String,
    pub tier3: String,
    pub tier4: String,
    pub tier5: String,
    pub rank_score: u32,
    pub update_time: Option<DateTime<Utc>>,
}

impl StockPriceDocument {
    pub fn composite_id(row: &PriceRow, distributor_type: DistributorType) -> String {
        match distributor_type {
            DistributorType::Affiliated => row.sid.to_string(),
            DistributorType::NonAffiliated => format!(
                "{}-{}-{}",
                distributor_type.code(),
                row.distributor_id,
                row.pid
            ),
        }
    }

    fn keyed(row: &PriceRow, distributor_type: DistributorType) -> Self {
        Self {
            composite_id: Self::composite_id(row, distributor_type),
            product_id: row.pid,
            distributor_id: row.distributor_id,
            distributor_type,
            stock_quantity: 0,
            currency: String::new(),
            tier1: String::new(),
            tier2: String::new(),
            tier3: String::new(),
            tier4: String::new(),
            tier5: String::new(),
            rank_score: 0,
            update_time: None,
        }
    }

    /// Build the full document for a row.
    pub fn from_row(row: &PriceRow, distributor_type: DistributorType) -> Result<Self, TransformError> {
        let breaks: Vec<PriceBreak> = if row.step_price.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&row.step_price).map_err(|e| TransformError::MalformedTiers {
                row_id: row.sid,
                reason: e.to_string(),
            })?
        };

        let tiers = PriceTiers::from_breaks(&breaks);
        let rank_score = rank_score(row.stock_quantity, &tiers);
        let [tier1, tier2, tier3, tier4, tier5] = tiers.0;

        Ok(Self {
            stock_quantity: row.stock_quantity,
            currency: row.currency.clone(),
            tier1,
            tier2,
            tier3,
            tier4,
            tier5,
            rank_score,
            update_time: row.update_time,
            ..Self::keyed(row, distributor_type)
        })
    }
}

impl Document for StockPriceDocument {
    fn document_id(&self) -> String {
        self.composite_id.clone()
    }
}

/// Transform a page of price rows.
///
/// Rows without a valid distributor or product go to the delete batch.
/// Rows whose tier list cannot be parsed are returned as errors and belong to
/// neither batch; the caller decides how to report them.
pub fn transform_prices(
    rows: &[PriceRow],
    distributor_type: DistributorType,
) -> (Batch<StockPriceDocument>, Vec<TransformError>) {
    let mut batch = Batch::default();
    let mut rejected = Vec::new();

    for row in rows {
        batch.max_id = batch.max_id.max(row.sid);

        if row.distributor_id < 1 || row.pid < 1 {
            batch.deletes.push(StockPriceDocument::keyed(row, distributor_type));
            continue;
        }

        match StockPriceDocument::from_row(row, distributor_type) {
            Ok(doc) => batch.upserts.push(doc),
            Err(e) => rejected.push(e),
        }
    }

    (batch, rejected)
}
