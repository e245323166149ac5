use serde::Serialize;

/// A document written to a downstream index or cache.
///
/// `document_id` is the write key: replaying the same document is idempotent.
pub trait Document: Clone + core::fmt::Debug + Serialize + Send + Sync + 'static {
    fn document_id(&self) -> String;
}

/// Result of transforming one page of source rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<D> {
    pub upserts: Vec<D>,
    pub deletes: Vec<D>,
    /// Highest source key observed in the page (0 for an empty page).
    pub max_id: i64,
}

impl<D> Default for Batch<D> {
    fn default() -> Self {
        Self {
            upserts: Vec::new(),
            deletes: Vec::new(),
            max_id: 0,
        }
    }
}

impl<D> Batch<D> {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}
