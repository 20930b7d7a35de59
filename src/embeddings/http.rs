//! Embedding provider backed by an OpenAI-compatible `/embeddings` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::EmbeddingProvider;
use crate::types::{RecallError, Result};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

/// Remote embedding backend speaking the widely-supported
/// `POST /embeddings` shape (`{"model", "input": [...]}` in,
/// `{"data": [{"embedding": [...]}]}` out).
///
/// Transport, status, and decode failures surface as
/// [`RecallError::ProviderUnavailable`]; a response whose vectors disagree
/// with the declared dimension is a [`RecallError::Configuration`] error.
#[derive(Clone)]
pub struct HttpEmbeddingProvider {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    dimension: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(endpoint: Url, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            model: model.into(),
            api_key: None,
            dimension,
        }
    }

    /// Sends the key as a bearer token on every request.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Reuses an existing HTTP client (connection pools, proxies, timeouts).
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(self.endpoint.clone()).json(&EmbeddingRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| RecallError::ProviderUnavailable(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RecallError::ProviderUnavailable(format!(
                "embedding endpoint returned {status}"
            )));
        }

        let payload: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| RecallError::ProviderUnavailable(err.to_string()))?;
        if payload.data.len() != texts.len() {
            return Err(RecallError::ProviderUnavailable(format!(
                "embedding endpoint returned {} vectors for {} inputs",
                payload.data.len(),
                texts.len()
            )));
        }

        let mut vectors = Vec::with_capacity(payload.data.len());
        for item in payload.data {
            if item.embedding.len() != self.dimension {
                return Err(RecallError::Configuration(format!(
                    "embedding endpoint returned a {}-component vector, declared dimension is {}",
                    item.embedding.len(),
                    self.dimension
                )));
            }
            vectors.push(item.embedding);
        }
        Ok(vectors)
    }
}
