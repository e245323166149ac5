use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use indexsync_catalog::Document;
use indexsync_catalog::keys::matches_pattern;

use super::{CacheStore, DocumentSink, SinkError};

/// In-memory document index for tests/dev.
#[derive(Debug)]
pub struct InMemoryDocumentSink<D> {
    docs: RwLock<BTreeMap<String, D>>,
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl<D: Document> InMemoryDocumentSink<D> {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
            writes: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn get(&self, id: &str) -> Option<D> {
        self.docs.read().unwrap().get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.docs.read().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of accepted bulk calls (upserts and deletes).
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Reject every write until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), SinkError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SinkError::Connection("in-memory sink switched off".to_string()));
        }
        Ok(())
    }
}

impl<D: Document> Default for InMemoryDocumentSink<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<D: Document> DocumentSink<D> for InMemoryDocumentSink<D> {
    async fn bulk_upsert(&self, docs: &[D]) -> Result<(), SinkError> {
        self.check()?;
        let mut stored = self.docs.write().unwrap();
        for doc in docs {
            stored.insert(doc.document_id(), doc.clone());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn bulk_delete(&self, docs: &[D]) -> Result<(), SinkError> {
        self.check()?;
        let mut stored = self.docs.write().unwrap();
        for doc in docs {
            stored.remove(&doc.document_id());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory string cache for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().unwrap().insert(key.into(), value.into());
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.read().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn remove_pattern(&self, pattern: &str) -> Result<u64, SinkError> {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|key, _| !matches_pattern(pattern, key));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexsync_catalog::ProductDocument;

    #[tokio::test]
    async fn upserts_are_keyed_by_document_id() {
        let sink = InMemoryDocumentSink::<ProductDocument>::new();
        let doc = ProductDocument::tombstone(7);

        sink.bulk_upsert(&[doc.clone(), doc.clone()]).await.unwrap();
        sink.bulk_upsert(&[doc.clone()]).await.unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.write_count(), 2);

        sink.bulk_delete(&[doc]).await.unwrap();
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn unavailable_sink_rejects_writes() {
        let sink = InMemoryDocumentSink::<ProductDocument>::new();
        sink.set_unavailable(true);
        let err = sink
            .bulk_upsert(&[ProductDocument::tombstone(1)])
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Connection(_)));
        assert_eq!(sink.write_count(), 0);
    }

    #[tokio::test]
    async fn cache_removes_matching_keys_only() {
        let cache = InMemoryCacheStore::new();
        cache.set("aggs-1-0:brandagg", "{}");
        cache.set("aggs-2:3:categoryagg", "{}");
        cache.set("session:abc", "{}");

        assert_eq!(cache.remove_pattern("aggs-*").await.unwrap(), 2);
        assert_eq!(cache.keys(), vec!["session:abc".to_string()]);
    }
}
