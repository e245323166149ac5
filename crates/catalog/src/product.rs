//! Product rows → product documents.

use serde::{Deserialize, Serialize};

use crate::document::{Batch, Document};
use crate::text::{collapse_whitespace, name_bucket, standardize_product_name, strip_braces};

/// Raw product row as read from the relational source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRow {
    pub pid: i64,
    pub product_name: String,
    pub brand: String,
    pub brand_id: i64,
    pub category_id: i64,
    pub parent_id: i64,
    pub is_deleted: bool,
}

/// Search document for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDocument {
    pub product_id: i64,
    pub standardized_name: String,
    pub standardized_brand: String,
    /// Leading-character partition, `1..=37`.
    pub name_bucket: u8,
    pub brand_id: i64,
    pub category_id: i64,
    pub parent_id: i64,
    /// `{NAME},{brand}` display blob.
    pub extension: String,
}

impl ProductDocument {
    /// Document carrying only the identity, used for deletes.
    pub fn tombstone(product_id: i64) -> Self {
        Self {
            product_id,
            standardized_name: String::new(),
            standardized_brand: String::new(),
            name_bucket: 0,
            brand_id: 0,
            category_id: 0,
            parent_id: 0,
            extension: String::new(),
        }
    }

    pub fn from_row(row: &ProductRow) -> Self {
        let standardized_name = standardize_product_name(&row.product_name);
        let display_name = collapse_whitespace(&row.product_name).to_uppercase();
        let brand = collapse_whitespace(&row.brand);

        Self {
            product_id: row.pid,
            name_bucket: name_bucket(&standardized_name),
            standardized_name,
            extension: format!("{{{}}},{{{}}}", strip_braces(&display_name), strip_braces(&brand)),
            standardized_brand: brand,
            brand_id: row.brand_id,
            category_id: row.category_id,
            parent_id: row.parent_id,
        }
    }
}

impl Document for ProductDocument {
    fn document_id(&self) -> String {
        self.product_id.to_string()
    }
}

/// Split a page of product rows into upserts and deletes.
///
/// Logically deleted rows become tombstones in the delete batch.
pub fn transform_products(rows: &[ProductRow]) -> Batch<ProductDocument> {
    let mut batch = Batch::default();
    for row in rows {
        batch.max_id = batch.max_id.max(row.pid);
        if row.is_deleted {
            batch.deletes.push(ProductDocument::tombstone(row.pid));
        } else {
            batch.upserts.push(ProductDocument::from_row(row));
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pid: i64, name: &str, brand: &str, deleted: bool) -> ProductRow {
        ProductRow {
            pid,
            product_name: name.to_string(),
            brand: brand.to_string(),
            brand_id: 7,
            category_id: 30,
            parent_id: 3,
            is_deleted: deleted,
        }
    }

    #[test]
    fn builds_standardized_document() {
        let doc = ProductDocument::from_row(&row(10, " 74hc00  {d} ", " Texas   Instruments ", false));

        assert_eq!(doc.product_id, 10);
        assert_eq!(doc.standardized_name, "74HC00D");
        assert_eq!(doc.standardized_brand, "Texas Instruments");
        assert_eq!(doc.name_bucket, 8);
        assert_eq!(doc.extension, "{74HC00 D},{Texas Instruments}");
        assert_eq!(doc.document_id(), "10");
    }

    #[test]
    fn symbol_only_name_lands_in_other_bucket() {
        let doc = ProductDocument::from_row(&row(1, "---", "x", false));
        assert_eq!(doc.standardized_name, "");
        assert_eq!(doc.name_bucket, 37);
    }

    #[test]
    fn deleted_rows_go_to_delete_batch() {
        let rows = vec![
            row(3, "LM358", "TI", false),
            row(4, "NE555", "TI", true),
            row(9, "BC547", "NXP", false),
        ];

        let batch = transform_products(&rows);

        assert_eq!(batch.upserts.len(), 2);
        assert_eq!(batch.deletes, vec![ProductDocument::tombstone(4)]);
        assert_eq!(batch.max_id, 9);
    }

    #[test]
    fn empty_page_is_empty_batch() {
        let batch = transform_products(&[]);
        assert!(batch.is_empty());
        assert_eq!(batch.max_id, 0);
    }

    #[test]
    fn transform_is_deterministic() {
        let rows = vec![row(5, "Stm32F103", "ST", false)];
        let first = transform_products(&rows);
        let second = transform_products(&rows);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first.upserts).unwrap(),
            serde_json::to_vec(&second.upserts).unwrap()
        );
    }
}
