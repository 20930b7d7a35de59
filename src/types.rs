//! Shared error types for the indexing and retrieval engine.

use thiserror::Error;

/// Errors surfaced by chunking, embedding, storage, and retrieval operations.
///
/// Each variant is an explicit channel. In particular, a failed search is an
/// error, never an empty successful result, so callers can always tell "no
/// matches" apart from "search could not run".
#[derive(Debug, Error)]
pub enum RecallError {
    /// Invalid or inconsistent configuration: bad chunker parameters, an
    /// embedding dimension that disagrees with the store, corrupt store
    /// metadata. Fatal; surfaced at startup or on first use, never silently
    /// corrected.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The embedding backend is unreachable, failed, or exceeded its
    /// deadline.
    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The target document is unknown to the document catalog.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Storage-layer failure. A failed refresh leaves the prior chunk set
    /// intact.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RecallError>;
