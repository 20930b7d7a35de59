//! SQLite chunk store with similarity search via the `sqlite-vec` extension.
//!
//! Layout: a `chunks` table keyed by `(document_id, chunk_index)` holding the
//! segment text and its embedding as a `vec_f32` blob, a `documents` table
//! mirroring the externally-owned catalog (searches join it for titles and
//! timestamps, chunk rows cascade when a document is removed), and a
//! `store_meta` table pinning the embedding dimension the store was created
//! with.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use async_trait::async_trait;
use chrono::Utc;
use tokio_rusqlite::{Connection, OptionalExtension, ffi};
use uuid::Uuid;

use super::{
    ChunkRecord, DocumentRecord, DocumentScope, SearchMatch, StoreStats, VectorBackend,
};
use crate::types::{RecallError, Result};

const META_DIMENSION_KEY: &str = "embedding_dimension";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id         TEXT PRIMARY KEY,
    title      TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS chunks (
    id          TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    chunk_index INTEGER NOT NULL,
    content     TEXT NOT NULL,
    embedding   BLOB NOT NULL,
    created_at  TEXT NOT NULL,
    UNIQUE (document_id, chunk_index)
);
CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
CREATE TABLE IF NOT EXISTS store_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Durable chunk storage on SQLite, searchable through `sqlite-vec`'s
/// `vec_distance_cosine`.
///
/// Cloning shares the underlying connection. All statements execute on the
/// connection's worker thread, so a refresh transaction and a concurrent
/// search on the same document serialize at the storage layer: the search
/// observes either the pre- or post-refresh chunk set, never a partial one.
#[derive(Clone)]
pub struct SqliteChunkStore {
    conn: Connection,
    dimension: usize,
}

impl std::fmt::Debug for SqliteChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteChunkStore")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl SqliteChunkStore {
    /// Opens (creating if necessary) a store at `path` for
    /// `dimension`-component embeddings.
    ///
    /// The dimension is recorded in store metadata on first open; a later
    /// open with a different dimension fails with
    /// [`RecallError::Configuration`] before any write can mix widths.
    pub async fn open(path: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RecallError::Configuration(
                "embedding dimension must be positive".into(),
            ));
        }
        register_sqlite_vec()?;

        let conn = Connection::open(path)
            .await
            .map_err(|err| RecallError::Storage(err.to_string()))?;

        conn.call(|conn| {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(|err: tokio_rusqlite::Error| RecallError::Storage(err.to_string()))?;

        let stored: Option<String> = conn
            .call(|conn| {
                conn.query_row(
                    "SELECT value FROM store_meta WHERE key = ?1",
                    [META_DIMENSION_KEY],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| RecallError::Storage(err.to_string()))?;

        match stored {
            Some(value) => {
                let existing: usize = value.parse().map_err(|_| {
                    RecallError::Configuration(format!(
                        "corrupt {META_DIMENSION_KEY} metadata: {value:?}"
                    ))
                })?;
                if existing != dimension {
                    return Err(RecallError::Configuration(format!(
                        "store holds {existing}-dimensional embeddings, requested {dimension}"
                    )));
                }
            }
            None => {
                let value = dimension.to_string();
                conn.call(move |conn| {
                    conn.execute(
                        "INSERT INTO store_meta (key, value) VALUES (?1, ?2)",
                        (META_DIMENSION_KEY, &value),
                    )?;
                    Ok(())
                })
                .await
                .map_err(|err: tokio_rusqlite::Error| RecallError::Storage(err.to_string()))?;
            }
        }

        Ok(Self { conn, dimension })
    }

    /// Mirrors an externally-owned catalog entry into the store.
    ///
    /// The retrieval engine never calls this: it exists for the document
    /// store that owns the catalog, and for tests and demos that seed it.
    pub async fn upsert_document(&self, document: DocumentRecord) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO documents (id, title, created_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(id) DO UPDATE
                     SET title = excluded.title, created_at = excluded.created_at",
                    (&document.id, &document.title, &document.created_at),
                )?;
                Ok(())
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| RecallError::Storage(err.to_string()))
    }

    /// Removes a catalog entry; its chunks cascade. Returns whether an entry
    /// existed.
    pub async fn remove_document(&self, document_id: &str) -> Result<bool> {
        let id = document_id.to_string();
        self.conn
            .call(move |conn| {
                let removed = conn
                    .execute("DELETE FROM documents WHERE id = ?1", [&id])?;
                Ok(removed > 0)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| RecallError::Storage(err.to_string()))
    }

    /// Underlying connection, for operations outside the [`VectorBackend`]
    /// surface.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[async_trait]
impl VectorBackend for SqliteChunkStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn document_exists(&self, document_id: &str) -> Result<bool> {
        let id = document_id.to_string();
        self.conn
            .call(move |conn| {
                let found = conn
                    .query_row("SELECT 1 FROM documents WHERE id = ?1", [&id], |_| Ok(()))
                    .optional()?;
                Ok(found.is_some())
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| RecallError::Storage(err.to_string()))
    }

    async fn replace_chunks(
        &self,
        document_id: &str,
        chunks: Vec<(String, Vec<f32>)>,
    ) -> Result<usize> {
        for (index, (_, embedding)) in chunks.iter().enumerate() {
            if embedding.len() != self.dimension {
                return Err(RecallError::Configuration(format!(
                    "chunk {index} embedding has {} components, store expects {}",
                    embedding.len(),
                    self.dimension
                )));
            }
        }

        let document = document_id.to_string();
        let created_at = Utc::now().to_rfc3339();
        let mut rows = Vec::with_capacity(chunks.len());
        for (index, (content, embedding)) in chunks.into_iter().enumerate() {
            // Canonical textual encoding handed to vec_f32; serde_json emits
            // shortest-round-trip floats, so decode returns the same f32s.
            let encoded = serde_json::to_string(&embedding)
                .map_err(|err| RecallError::Storage(err.to_string()))?;
            rows.push((Uuid::new_v4().to_string(), index as i64, content, encoded));
        }

        let doc_for_log = document.clone();
        let written = self
            .conn
            .call(move |conn| {
                let tx = conn
                    .transaction()?;
                tx.execute("DELETE FROM chunks WHERE document_id = ?1", [&document])?;
                for (id, index, content, encoded) in &rows {
                    tx.execute(
                        "INSERT INTO chunks
                             (id, document_id, chunk_index, content, embedding, created_at)
                         VALUES (?1, ?2, ?3, ?4, vec_f32(?5), ?6)",
                        (id, &document, index, content, encoded, &created_at),
                    )?;
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| RecallError::Storage(err.to_string()))?;

        tracing::debug!(document = %doc_for_log, chunks = written, "chunk set replaced");
        Ok(written)
    }

    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        scope: &DocumentScope,
    ) -> Result<Vec<SearchMatch>> {
        if limit == 0 {
            return Err(RecallError::Configuration(
                "search limit must be positive".into(),
            ));
        }
        if query.len() != self.dimension {
            return Err(RecallError::Configuration(format!(
                "query vector has {} components, store expects {}",
                query.len(),
                self.dimension
            )));
        }

        let allowed_json = match scope {
            DocumentScope::Unrestricted => None,
            DocumentScope::Allowed(ids) if ids.is_empty() => {
                tracing::debug!("search scoped to an empty allow set; nothing is permitted");
                return Ok(Vec::new());
            }
            DocumentScope::Allowed(ids) => Some(
                serde_json::to_string(&ids.iter().collect::<Vec<_>>())
                    .map_err(|err| RecallError::Storage(err.to_string()))?,
            ),
        };
        let query_json = serde_json::to_string(query)
            .map_err(|err| RecallError::Storage(err.to_string()))?;
        let limit = limit as i64;

        self.conn
            .call(move |conn| {
                // The allow-list binds as a single JSON parameter consumed by
                // json_each, so the statement arity is identical with and
                // without a filter.
                let mut stmt = conn
                    .prepare(
                        "SELECT c.content,
                                c.document_id,
                                d.title,
                                d.created_at,
                                c.chunk_index,
                                vec_distance_cosine(c.embedding, vec_f32(?1)) AS distance
                         FROM chunks c
                         JOIN documents d ON d.id = c.document_id
                         WHERE ?2 IS NULL
                            OR c.document_id IN (SELECT value FROM json_each(?2))
                         ORDER BY distance ASC, c.document_id ASC, c.chunk_index ASC
                         LIMIT ?3",
                    )?;

                let rows = stmt
                    .query_map((&query_json, &allowed_json, limit), |row| {
                        let distance: f32 = row.get(5)?;
                        Ok(SearchMatch {
                            content: row.get(0)?,
                            document_id: row.get(1)?,
                            document_title: row.get(2)?,
                            document_timestamp: row.get(3)?,
                            chunk_index: row.get::<_, i64>(4)? as usize,
                            similarity: 1.0 - distance,
                        })
                    })?;

                let mut matches = Vec::new();
                for row in rows {
                    matches.push(row?);
                }
                Ok(matches)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| RecallError::Storage(err.to_string()))
    }

    async fn chunks_for_document(&self, document_id: &str) -> Result<Vec<ChunkRecord>> {
        let id = document_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, document_id, chunk_index, content,
                                vec_to_json(embedding), created_at
                         FROM chunks
                         WHERE document_id = ?1
                         ORDER BY chunk_index ASC",
                    )?;

                let rows = stmt
                    .query_map([&id], |row| {
                        let encoded: String = row.get(4)?;
                        Ok(ChunkRecord {
                            id: row.get(0)?,
                            document_id: row.get(1)?,
                            chunk_index: row.get::<_, i64>(2)? as usize,
                            content: row.get(3)?,
                            embedding: serde_json::from_str(&encoded).ok(),
                            created_at: row.get(5)?,
                        })
                    })?;

                let mut records = Vec::new();
                for row in rows {
                    records.push(row?);
                }
                Ok(records)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| RecallError::Storage(err.to_string()))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let dimension = self.dimension;
        self.conn
            .call(move |conn| {
                let (chunk_count, document_count) = conn
                    .query_row(
                        "SELECT COUNT(*), COUNT(DISTINCT document_id) FROM chunks",
                        [],
                        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
                    )?;
                Ok(StoreStats {
                    chunk_count: chunk_count as usize,
                    document_count: document_count as usize,
                    dimension,
                })
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| RecallError::Storage(err.to_string()))
    }
}

/// Registers `sqlite-vec` as an auto-loaded extension, once per process.
fn register_sqlite_vec() -> Result<()> {
    use std::sync::Mutex;

    static INIT: Once = Once::new();
    static INIT_RESULT: Mutex<Option<std::result::Result<(), String>>> = Mutex::new(None);

    INIT.call_once(|| {
        let result = unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *mut c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn: SqliteExtensionInit =
                transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != 0 {
                Err(format!(
                    "failed to register sqlite-vec extension (code {rc})"
                ))
            } else {
                Ok(())
            }
        };
        *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
    });

    INIT_RESULT
        .lock()
        .expect("init result mutex poisoned")
        .clone()
        .expect("init was called but result not set")
        .map_err(RecallError::Configuration)
}
