//! Environment-driven settings for wiring up a store, provider, and engine.
//!
//! Resolution order, later wins:
//!
//! 1. Compiled defaults
//! 2. `.env` file (via `dotenvy`)
//! 3. Process environment (`RECALLSMITH_*`)

use std::str::FromStr;
use std::time::Duration;

use crate::chunker::ChunkerConfig;
use crate::types::{RecallError, Result};

/// Runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path of the SQLite database file.
    pub database_path: String,
    /// Embedding endpoint URL. `None` selects the deterministic mock
    /// provider, which is only suitable for tests and demos.
    pub embedding_endpoint: Option<String>,
    /// Model name sent to the embedding endpoint.
    pub embedding_model: String,
    /// Declared embedding width.
    pub embedding_dimension: usize,
    /// Chunker parameters.
    pub chunker: ChunkerConfig,
    /// Per-operation deadline applied to provider and storage calls.
    pub op_timeout: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: "recallsmith.sqlite".into(),
            embedding_endpoint: None,
            embedding_model: "all-MiniLM-L6-v2".into(),
            embedding_dimension: 384,
            chunker: ChunkerConfig::default(),
            op_timeout: None,
        }
    }
}

impl Settings {
    /// Loads settings from the process environment, honoring a `.env` file.
    /// Invalid values fail fast rather than falling back to defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut settings = Self::default();
        if let Ok(path) = std::env::var("RECALLSMITH_DATABASE") {
            settings.database_path = path;
        }
        if let Ok(endpoint) = std::env::var("RECALLSMITH_EMBEDDING_ENDPOINT") {
            settings.embedding_endpoint = Some(endpoint);
        }
        if let Ok(model) = std::env::var("RECALLSMITH_EMBEDDING_MODEL") {
            settings.embedding_model = model;
        }
        if let Ok(raw) = std::env::var("RECALLSMITH_EMBEDDING_DIMENSION") {
            settings.embedding_dimension = parse_env("RECALLSMITH_EMBEDDING_DIMENSION", &raw)?;
        }
        if let Ok(raw) = std::env::var("RECALLSMITH_CHUNK_TARGET_SIZE") {
            settings.chunker.target_size = parse_env("RECALLSMITH_CHUNK_TARGET_SIZE", &raw)?;
        }
        if let Ok(raw) = std::env::var("RECALLSMITH_CHUNK_OVERLAP") {
            settings.chunker.overlap = parse_env("RECALLSMITH_CHUNK_OVERLAP", &raw)?;
        }
        if let Ok(raw) = std::env::var("RECALLSMITH_OP_TIMEOUT_MS") {
            let millis: u64 = parse_env("RECALLSMITH_OP_TIMEOUT_MS", &raw)?;
            settings.op_timeout = Some(Duration::from_millis(millis));
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Rejects inconsistent settings before any component is constructed.
    pub fn validate(&self) -> Result<()> {
        self.chunker.validate()?;
        if self.embedding_dimension == 0 {
            return Err(RecallError::Configuration(
                "embedding dimension must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|err| {
        RecallError::Configuration(format!("failed to parse {key}={raw}: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Settings::default().validate().unwrap();
    }

    #[test]
    fn parse_env_reports_the_offending_key() {
        let err = parse_env::<usize>("RECALLSMITH_CHUNK_OVERLAP", "not-a-number").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("RECALLSMITH_CHUNK_OVERLAP"));
        assert!(message.contains("not-a-number"));
    }

    #[test]
    fn validate_rejects_zero_dimension() {
        let settings = Settings {
            embedding_dimension: 0,
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(RecallError::Configuration(_))
        ));
    }
}
