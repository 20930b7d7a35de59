//! ```text
//! Transcript text ──► chunker ──► embeddings::EmbeddingProvider ──► stores (bulk refresh)
//!
//! Query text ──► embeddings::EmbeddingProvider ──► stores (filtered similarity search)
//!                                                        │
//!                          engine::RetrievalEngine ──► ranked SearchMatch results
//! ```
//!
pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod engine;
pub mod stores;
pub mod types;

pub use chunker::ChunkerConfig;
pub use config::Settings;
pub use embeddings::{EmbeddingProvider, HttpEmbeddingProvider, MockEmbeddingProvider};
pub use engine::{RetrievalEngine, RetrievalEngineBuilder};
pub use stores::{
    ChunkRecord, DocumentRecord, DocumentScope, SearchMatch, SqliteChunkStore, StoreStats,
    VectorBackend,
};
pub use types::RecallError;
