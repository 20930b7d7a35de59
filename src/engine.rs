//! The retrieval engine: the crate's public surface.
//!
//! Two operations: [`refresh`](RetrievalEngine::refresh) re-indexes one
//! document's transcript wholesale, and [`query`](RetrievalEngine::query)
//! answers a similarity search over an explicit document scope. The engine
//! is stateless between calls and holds no caches; query strings are short,
//! so re-embedding every query is cheaper than any invalidation scheme.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use crate::chunker::ChunkerConfig;
use crate::embeddings::EmbeddingProvider;
use crate::stores::{DocumentScope, SearchMatch, StoreStats, VectorBackend};
use crate::types::{RecallError, Result};

/// Orchestrates chunking, embedding, and vector storage.
///
/// Built via [`RetrievalEngine::builder`]; construction fails if the
/// provider's declared dimension disagrees with the store's.
pub struct RetrievalEngine<B: VectorBackend> {
    store: B,
    provider: Arc<dyn EmbeddingProvider>,
    chunker: ChunkerConfig,
    op_timeout: Option<Duration>,
}

impl<B: VectorBackend> std::fmt::Debug for RetrievalEngine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("op_timeout", &self.op_timeout)
            .finish_non_exhaustive()
    }
}

impl<B: VectorBackend> RetrievalEngine<B> {
    pub fn builder() -> RetrievalEngineBuilder<B> {
        RetrievalEngineBuilder::new()
    }

    /// Re-indexes a document: chunks `text`, embeds the chunks, and replaces
    /// the document's stored chunk set wholesale. Returns the number of
    /// chunks written.
    ///
    /// Unknown document identifiers are rejected with
    /// [`RecallError::NotFound`] before anything is written. Empty or
    /// whitespace-only text clears the document's chunk set, a valid
    /// terminal state.
    #[instrument(skip(self, text), err)]
    pub async fn refresh(&self, document_id: &str, text: &str) -> Result<usize> {
        if !self.store.document_exists(document_id).await? {
            return Err(RecallError::NotFound(document_id.to_string()));
        }

        let chunks = self.chunker.split(text)?;
        if chunks.is_empty() {
            let written = self
                .with_storage_deadline(self.store.replace_chunks(document_id, Vec::new()))
                .await?;
            tracing::info!(document = document_id, "no transcript text, chunk set cleared");
            return Ok(written);
        }

        let vectors = self
            .with_provider_deadline(self.provider.embed_batch(&chunks))
            .await?;
        if vectors.len() != chunks.len() {
            return Err(RecallError::ProviderUnavailable(format!(
                "provider '{}' returned {} vectors for {} chunks",
                self.provider.name(),
                vectors.len(),
                chunks.len()
            )));
        }
        for vector in &vectors {
            if vector.len() != self.provider.dimension() {
                return Err(RecallError::Configuration(format!(
                    "provider '{}' returned a {}-component vector, declared dimension is {}",
                    self.provider.name(),
                    vector.len(),
                    self.provider.dimension()
                )));
            }
        }

        let pairs: Vec<(String, Vec<f32>)> = chunks.into_iter().zip(vectors).collect();
        let written = self
            .with_storage_deadline(self.store.replace_chunks(document_id, pairs))
            .await?;
        tracing::info!(document = document_id, chunks = written, "chunk set refreshed");
        Ok(written)
    }

    /// Answers a similarity query over the permitted document scope,
    /// best match first.
    ///
    /// Every call re-embeds `text`. Result timestamps are normalized to
    /// RFC 3339.
    #[instrument(skip(self, text, scope), err)]
    pub async fn query(
        &self,
        text: &str,
        limit: usize,
        scope: &DocumentScope,
    ) -> Result<Vec<SearchMatch>> {
        if limit == 0 {
            return Err(RecallError::Configuration(
                "query limit must be positive".into(),
            ));
        }

        let query_vector = self
            .with_provider_deadline(self.provider.embed_one(text))
            .await?;
        let mut matches = self
            .with_storage_deadline(self.store.search(&query_vector, limit, scope))
            .await?;
        for item in &mut matches {
            item.document_timestamp = normalize_timestamp(&item.document_timestamp);
        }
        tracing::debug!(results = matches.len(), "query answered");
        Ok(matches)
    }

    /// Storage summary; never touches the embedding provider.
    pub async fn stats(&self) -> Result<StoreStats> {
        self.store.stats().await
    }

    async fn with_provider_deadline<T>(
        &self,
        operation: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match self.op_timeout {
            Some(deadline) => tokio::time::timeout(deadline, operation)
                .await
                .map_err(|_| {
                    RecallError::ProviderUnavailable(format!(
                        "embedding call exceeded {}ms",
                        deadline.as_millis()
                    ))
                })?,
            None => operation.await,
        }
    }

    async fn with_storage_deadline<T>(
        &self,
        operation: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match self.op_timeout {
            Some(deadline) => tokio::time::timeout(deadline, operation)
                .await
                .map_err(|_| {
                    RecallError::Storage(format!(
                        "storage call exceeded {}ms",
                        deadline.as_millis()
                    ))
                })?,
            None => operation.await,
        }
    }
}

/// Converts a stored timestamp to RFC 3339 where possible, passing unknown
/// shapes through untouched.
fn normalize_timestamp(raw: &str) -> String {
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(raw) {
        return parsed.to_rfc3339();
    }
    if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return parsed.and_utc().to_rfc3339();
    }
    raw.to_string()
}

/// Builder for [`RetrievalEngine`].
pub struct RetrievalEngineBuilder<B: VectorBackend> {
    store: Option<B>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    chunker: ChunkerConfig,
    op_timeout: Option<Duration>,
}

impl<B: VectorBackend> RetrievalEngineBuilder<B> {
    fn new() -> Self {
        Self {
            store: None,
            provider: None,
            chunker: ChunkerConfig::default(),
            op_timeout: None,
        }
    }

    /// Sets the vector store. Required.
    #[must_use]
    pub fn store(mut self, store: B) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the embedding provider. Required.
    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Overrides the default chunker parameters.
    #[must_use]
    pub fn chunker(mut self, chunker: ChunkerConfig) -> Self {
        self.chunker = chunker;
        self
    }

    /// Applies a deadline to every provider and storage call. A refresh that
    /// hits the deadline never commits a partial chunk set; the transaction
    /// either completes wholly on the connection's worker thread or rolls
    /// back.
    #[must_use]
    pub fn op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = Some(timeout);
        self
    }

    /// Validates chunker parameters and the provider/store dimension
    /// agreement, then builds the engine.
    pub fn build(self) -> Result<RetrievalEngine<B>> {
        let store = self.store.ok_or_else(|| {
            RecallError::Configuration("retrieval engine requires a vector store".into())
        })?;
        let provider = self.provider.ok_or_else(|| {
            RecallError::Configuration("retrieval engine requires an embedding provider".into())
        })?;
        self.chunker.validate()?;
        if provider.dimension() != store.dimension() {
            return Err(RecallError::Configuration(format!(
                "provider '{}' produces {}-dimensional vectors but the store expects {}",
                provider.name(),
                provider.dimension(),
                store.dimension()
            )));
        }
        Ok(RetrievalEngine {
            store,
            provider,
            chunker: self.chunker,
            op_timeout: self.op_timeout,
        })
    }
}
