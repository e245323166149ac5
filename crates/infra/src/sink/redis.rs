//! Redis-backed document sink and aggregate cache.
//!
//! Documents are stored as JSON strings under `{prefix}:{document_id}`.

use std::sync::Arc;

use async_trait::async_trait;
use indexsync_catalog::Document;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tracing::{debug, instrument};

use super::{CacheStore, DocumentSink, SinkError};

/// Keys deleted per `DEL` when clearing a pattern.
const DELETE_CHUNK: usize = 500;

fn connect_error(err: redis::RedisError) -> SinkError {
    SinkError::Connection(err.to_string())
}

fn command_error(err: redis::RedisError) -> SinkError {
    SinkError::Command(err.to_string())
}

async fn connection(client: &redis::Client) -> Result<MultiplexedConnection, SinkError> {
    client
        .get_multiplexed_async_connection()
        .await
        .map_err(connect_error)
}

#[derive(Debug, Clone)]
pub struct RedisDocumentSink {
    client: Arc<redis::Client>,
    prefix: String,
}

impl RedisDocumentSink {
    /// `redis_url` e.g. `redis://localhost:6379`; `prefix` namespaces the keys.
    pub fn new(redis_url: impl AsRef<str>, prefix: impl Into<String>) -> Result<Self, SinkError> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(connect_error)?;
        Ok(Self {
            client: Arc::new(client),
            prefix: prefix.into(),
        })
    }

    fn key(&self, id: &str) -> String {
        format!("{}:{}", self.prefix, id)
    }
}

#[async_trait]
impl<D: Document> DocumentSink<D> for RedisDocumentSink {
    #[instrument(skip(self, docs), fields(prefix = %self.prefix, count = docs.len()), err)]
    async fn bulk_upsert(&self, docs: &[D]) -> Result<(), SinkError> {
        let mut pipe = redis::pipe();
        for doc in docs {
            let body =
                serde_json::to_string(doc).map_err(|e| SinkError::Serialization(e.to_string()))?;
            pipe.set(self.key(&doc.document_id()), body).ignore();
        }

        let mut conn = connection(&self.client).await?;
        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(command_error)
    }

    #[instrument(skip(self, docs), fields(prefix = %self.prefix, count = docs.len()), err)]
    async fn bulk_delete(&self, docs: &[D]) -> Result<(), SinkError> {
        let keys: Vec<String> = docs.iter().map(|d| self.key(&d.document_id())).collect();
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = connection(&self.client).await?;
        conn.del::<_, ()>(keys).await.map_err(command_error)
    }
}

#[derive(Debug, Clone)]
pub struct RedisCacheStore {
    client: Arc<redis::Client>,
}

impl RedisCacheStore {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, SinkError> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(connect_error)?;
        Ok(Self {
            client: Arc::new(client),
        })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    #[instrument(skip(self), err)]
    async fn remove_pattern(&self, pattern: &str) -> Result<u64, SinkError> {
        let mut conn = connection(&self.client).await?;

        // Collect first: the scan iterator borrows the connection.
        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter = conn
                .scan_match::<_, String>(pattern)
                .await
                .map_err(command_error)?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        let mut removed = 0u64;
        for chunk in keys.chunks(DELETE_CHUNK) {
            removed += conn.del::<_, u64>(chunk.to_vec()).await.map_err(command_error)?;
        }
        debug!(pattern, removed, "cleared cache pattern");
        Ok(removed)
    }
}
