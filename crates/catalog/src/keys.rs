//! Cache key naming for the serving layer's aggregate caches.
//!
//! The sync jobs never read these entries; the maintenance job only needs the
//! family patterns to invalidate them.

/// Category aggregate facet.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AggFacet {
    Category,
    Brand,
    Distributor,
    AttributeName,
    AttributeValue,
}

impl AggFacet {
    fn suffix(self) -> &'static str {
        match self {
            AggFacet::Category => "categoryagg",
            AggFacet::Brand => "brandagg",
            AggFacet::Distributor => "distributoragg",
            AggFacet::AttributeName => "attrinameagg",
            AggFacet::AttributeValue => "attrivalusagg",
        }
    }
}

fn category_agg_base(parent_category: &str, category: &str) -> String {
    if parent_category.is_empty() {
        format!("aggs-{category}-0")
    } else {
        format!("aggs-{parent_category}:{category}")
    }
}

/// Key of a category-search aggregate. An empty parent means a top-level category.
pub fn category_agg_key(parent_category: &str, category: &str, facet: AggFacet) -> String {
    format!("{}:{}", category_agg_base(parent_category, category), facet.suffix())
}

/// Leading-character product index; `0-0` is the home page index.
pub fn product_index_key(index: &str) -> String {
    format!("pindexs-{index}")
}

/// Leading-character index within a category.
pub fn category_index_key(category_id: i64) -> String {
    format!("indexs-{category_id}")
}

pub fn brand_category_agg_key(brand_id: i64, parent_category_id: i64) -> String {
    format!("brandaggs-{brand_id}:{parent_category_id}")
}

pub fn brand_parent_category_agg_key(brand_id: i64) -> String {
    format!("brandaggs-{brand_id}:pcategoryagg")
}

/// Glob patterns covering every aggregate cache family.
pub const AGGREGATE_CACHE_PATTERNS: [&str; 4] = ["aggs-*", "brandaggs-*", "pindexs-*", "indexs-*"];

/// Minimal glob match supporting `*` (any run) and `?` (one char), as used by
/// cache `KEYS`/`SCAN MATCH` patterns.
pub fn matches_pattern(pattern: &str, key: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let k: Vec<char> = key.chars().collect();
    let (mut pi, mut ki) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ki < k.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == k[ki]) {
            pi += 1;
            ki += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ki));
            pi += 1;
        } else if let Some((sp, sk)) = star {
            pi = sp + 1;
            ki = sk + 1;
            star = Some((sp, sk + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}
