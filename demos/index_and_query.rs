//! End-to-end walkthrough: seed a document catalog, index two transcripts,
//! and run scoped similarity queries.
//!
//! Uses the deterministic mock embedding provider so it runs without any
//! model or network access:
//!
//! ```bash
//! cargo run --example index_and_query
//! ```

use std::sync::Arc;

use recallsmith::chunker::ChunkerConfig;
use recallsmith::embeddings::MockEmbeddingProvider;
use recallsmith::engine::RetrievalEngine;
use recallsmith::stores::{DocumentRecord, DocumentScope, SqliteChunkStore};

const DIM: usize = 64;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let dir = tempfile::tempdir()?;
    let store = SqliteChunkStore::open(dir.path().join("demo.sqlite"), DIM).await?;

    // The document catalog is owned by the surrounding system; seed it the
    // way that system would.
    store
        .upsert_document(DocumentRecord {
            id: "m1".into(),
            title: "Planning sync".into(),
            created_at: "2025-03-01T09:30:00+00:00".into(),
        })
        .await?;
    store
        .upsert_document(DocumentRecord {
            id: "m2".into(),
            title: "Design review".into(),
            created_at: "2025-03-02T14:00:00+00:00".into(),
        })
        .await?;

    let engine = RetrievalEngine::builder()
        .store(store)
        .provider(Arc::new(MockEmbeddingProvider::with_dimension(DIM)))
        .chunker(ChunkerConfig {
            target_size: 120,
            overlap: 24,
        })
        .build()?;

    let planning = "The quarter opened with a long discussion about the budget. \
        Headcount requests were reviewed one by one. The launch date was moved \
        to early June after some debate. Everyone agreed to revisit the \
        marketing plan next week.";
    let design = "The review focused on the new onboarding flow. Several screens \
        were flagged as confusing for first-time users. The team decided to \
        prototype a shorter variant and test it with five customers.";

    let written = engine.refresh("m1", planning).await?;
    println!("indexed {written} chunks for m1");
    let written = engine.refresh("m2", design).await?;
    println!("indexed {written} chunks for m2");

    let stats = engine.stats().await?;
    println!(
        "store: {} chunks across {} documents (dimension {})\n",
        stats.chunk_count, stats.document_count, stats.dimension
    );

    for (label, scope) in [
        ("unrestricted", DocumentScope::Unrestricted),
        ("allowed = [m1]", DocumentScope::allowed(["m1"])),
    ] {
        println!("query: \"onboarding flow feedback\" ({label})");
        let matches = engine
            .query("onboarding flow feedback", 3, &scope)
            .await?;
        println!("{:<4} | {:<14} | {:<6} | preview", "sim", "document", "chunk");
        println!("{:-<4}-|-{:-<14}-|-{:-<6}-|{:-<40}", "", "", "", "");
        for item in &matches {
            let preview: String = item.content.chars().take(40).collect();
            println!(
                "{:.2} | {:<14} | {:<6} | {preview}",
                item.similarity, item.document_title, item.chunk_index
            );
        }
        println!();
    }

    Ok(())
}
