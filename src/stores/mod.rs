//! Storage backends for transcript chunks and their embeddings.
//!
//! The [`VectorBackend`] trait abstracts durable chunk storage so the
//! retrieval engine works with any backend without being tied to a specific
//! database.
//!
//! ```text
//!                     ┌──────────────────┐
//!                     │  VectorBackend   │
//!                     │ (async refresh / │
//!                     │  search / stats) │
//!                     └────────┬─────────┘
//!                              │
//!                     ┌────────▼─────────┐
//!                     │ SqliteChunkStore │
//!                     │    sqlite-vec    │
//!                     └──────────────────┘
//! ```
//!
//! A backend owns the chunk rows exclusively: chunks are created only by a
//! refresh, and destroyed either by the next refresh of the same document or
//! by cascading deletion when the owning document leaves the catalog.

pub mod sqlite;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::Result;

pub use sqlite::SqliteChunkStore;

/// A stored chunk as read back from a backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique identifier for this chunk row.
    pub id: String,
    /// Owning document.
    pub document_id: String,
    /// Zero-based position within the document's current chunk sequence.
    pub chunk_index: usize,
    /// The segment text.
    pub content: String,
    /// The stored embedding (if decoded).
    pub embedding: Option<Vec<f32>>,
    /// RFC 3339 insertion timestamp.
    pub created_at: String,
}

/// Mirror of an externally-owned document catalog entry.
///
/// The engine only ever reads these; the external document store writes them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

/// One ranked similarity match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchMatch {
    pub content: String,
    pub document_id: String,
    pub document_title: String,
    /// RFC 3339 timestamp of the owning document.
    pub document_timestamp: String,
    pub chunk_index: usize,
    /// `1 − cosine distance`; identical vectors score 1.0, orthogonal 0.0.
    pub similarity: f32,
}

/// Storage summary. Pure introspection: computable with the embedding
/// provider completely unavailable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Total stored chunks.
    pub chunk_count: usize,
    /// Documents that currently have at least one chunk.
    pub document_count: usize,
    /// Embedding width the store was created with.
    pub dimension: usize,
}

/// The set of documents a search is permitted to match.
///
/// The scope is always explicit: passing [`DocumentScope::Unrestricted`] is a
/// deliberate, visible choice, and there is no implicit "no filter" path an
/// ambiguous input could fall into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentScope {
    /// Search across every indexed document.
    Unrestricted,
    /// Search only documents whose identifier is in the set.
    Allowed(BTreeSet<String>),
}

impl DocumentScope {
    /// Builds an allow-list scope from any iterable of identifiers.
    pub fn allowed<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DocumentScope::Allowed(ids.into_iter().map(Into::into).collect())
    }
}

/// Durable keyed storage of chunk records with atomic per-document refresh
/// and filtered nearest-neighbor retrieval.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Embedding width `D`; every stored vector has exactly this many
    /// components.
    fn dimension(&self) -> usize;

    /// Whether the document catalog knows this identifier.
    async fn document_exists(&self, document_id: &str) -> Result<bool>;

    /// Atomically replaces the document's chunk set with `chunks`, indexed
    /// `0..n-1` in input order, inside one transaction. A mid-write failure
    /// leaves the prior set intact. An empty input clears the document's
    /// chunks (a valid terminal state). Returns the number of chunks written.
    async fn replace_chunks(
        &self,
        document_id: &str,
        chunks: Vec<(String, Vec<f32>)>,
    ) -> Result<usize>;

    /// Ranked nearest-neighbor search, best match first, at most `limit`
    /// results, restricted to `scope`. Ties are broken by document id then
    /// chunk index so result order is deterministic.
    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        scope: &DocumentScope,
    ) -> Result<Vec<SearchMatch>>;

    /// All chunks for one document, ordered by chunk index.
    async fn chunks_for_document(&self, document_id: &str) -> Result<Vec<ChunkRecord>>;

    /// Chunk and document counts.
    async fn stats(&self) -> Result<StoreStats>;
}
