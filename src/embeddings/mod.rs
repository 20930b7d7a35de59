//! The embedding provider seam.
//!
//! The engine never talks to a concrete model. It holds an
//! `Arc<dyn EmbeddingProvider>` supplied at construction, so the model's
//! lifecycle is owned by the caller and swapping backends (remote endpoint,
//! in-process model, deterministic mock) is a wiring change, not an engine
//! change.
//!
//! A provider declares a fixed output width `D`. The store records its own
//! width at creation, and the two are checked against each other when the
//! engine is built; a mismatch is a fatal configuration error, never a
//! write-time surprise.

pub mod http;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::types::{RecallError, Result};

pub use http::HttpEmbeddingProvider;

/// Maps text to fixed-width semantic vectors.
///
/// Implementations performing CPU-heavy inference should offload work
/// (e.g. `tokio::task::spawn_blocking`) so a single-threaded dispatch loop
/// is never blocked by an embedding call.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short identifier used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Output width `D`. Every vector this provider returns has exactly this
    /// many components for the lifetime of the instance.
    fn dimension(&self) -> usize;

    /// Embeds a batch of texts, returning one vector per input in the same
    /// order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embeds a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let batch = [text.to_string()];
        let mut vectors = self.embed_batch(&batch).await?;
        vectors.pop().ok_or_else(|| {
            RecallError::ProviderUnavailable(
                "provider returned no vector for a single input".into(),
            )
        })
    }
}

/// Deterministic embedding provider for tests and demos.
///
/// Vectors are derived from a hash of the input text and normalized to unit
/// length: identical texts embed identically (cosine similarity 1.0 with
/// themselves) and different texts almost surely differ. The default width
/// matches the 384-dimensional sentence-transformer the engine is typically
/// paired with.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self::with_dimension(384)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        // xorshift64 seeded from the text hash keeps the stream deterministic
        // per input.
        let mut state = hasher.finish() | 1;
        let mut vector = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
            vector.push((unit - 0.5) as f32);
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}
