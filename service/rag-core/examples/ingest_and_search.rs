//! `cargo run -p rag-core --example ingest_and_search -- <FILE> <QUERY>`
//!
//! Ingests one file into a throwaway notebook and runs agent-mode retrieval
//! (no threshold) against it, printing the fused results.

use std::path::PathBuf;
use std::sync::Arc;

use embedding_client::EmbeddingClient;
use rag_core::hybrid_search::RetrievalMode;
use rag_core::{AppConfig, Orchestrator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: cargo run -p rag-core --example ingest_and_search -- <FILE> <QUERY>");
        std::process::exit(1);
    }
    let file = PathBuf::from(&args[1]);
    let query = &args[2];

    let tmp = tempfile::tempdir()?;
    let mut config = AppConfig::from_env();
    config.data_dir = tmp.path().to_path_buf();
    let config = Arc::new(config);
    let embedder = Arc::new(EmbeddingClient::new(config.embedding.clone(), config.embedding_enabled));
    let orchestrator = Orchestrator::new(config, embedder)?;

    let notebook = orchestrator.create_notebook("demo")?;
    let source = orchestrator.add_source_from_path(&notebook.id, &file)?;
    let indexed = orchestrator.ingest_source(&source.id).await?;
    println!("indexed {} as {:?}", indexed.original_filename, indexed.status);

    let passages = orchestrator.retrieve(&notebook.id, query, None, 10, RetrievalMode::Agent).await?;
    println!("results: {}", passages.len());
    for (i, p) in passages.iter().enumerate() {
        let preview: String = p.text.chars().take(80).collect();
        println!("{:>2}. [{}] {:.4} {}", i + 1, p.section_id, p.score, preview);
    }
    Ok(())
}
