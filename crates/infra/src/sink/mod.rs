//! Downstream writers: document index sinks and the aggregate cache.

use std::sync::Arc;

use async_trait::async_trait;
use indexsync_catalog::Document;

mod in_memory;
#[cfg(feature = "redis")]
mod redis;

pub use in_memory::{InMemoryCacheStore, InMemoryDocumentSink};
#[cfg(feature = "redis")]
pub use self::redis::{RedisCacheStore, RedisDocumentSink};

#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    #[error("sink connection error: {0}")]
    Connection(String),

    #[error("sink command error: {0}")]
    Command(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Bulk writer keyed by [`Document::document_id`]; replays are idempotent.
#[async_trait]
pub trait DocumentSink<D: Document>: Send + Sync {
    async fn bulk_upsert(&self, docs: &[D]) -> Result<(), SinkError>;
    async fn bulk_delete(&self, docs: &[D]) -> Result<(), SinkError>;
}

#[async_trait]
impl<D, S> DocumentSink<D> for Arc<S>
where
    D: Document,
    S: DocumentSink<D> + ?Sized,
{
    async fn bulk_upsert(&self, docs: &[D]) -> Result<(), SinkError> {
        (**self).bulk_upsert(docs).await
    }

    async fn bulk_delete(&self, docs: &[D]) -> Result<(), SinkError> {
        (**self).bulk_delete(docs).await
    }
}

/// Cache holding the serving layer's aggregate entries.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Delete every key matching a glob pattern, returning how many were removed.
    async fn remove_pattern(&self, pattern: &str) -> Result<u64, SinkError>;
}

#[async_trait]
impl<S> CacheStore for Arc<S>
where
    S: CacheStore + ?Sized,
{
    async fn remove_pattern(&self, pattern: &str) -> Result<u64, SinkError> {
        (**self).remove_pattern(pattern).await
    }
}
