use std::sync::Arc;

use embedding_client::EmbeddingClient;
use rag_api::{create_router, AppState};
use rag_core::{AppConfig, Orchestrator};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Arc::new(AppConfig::from_env());
    let embedder = Arc::new(EmbeddingClient::new(config.embedding.clone(), config.embedding_enabled));
    embedder.startup_probe().await;

    let orchestrator = Arc::new(Orchestrator::new(config, embedder)?);
    let state = Arc::new(AppState::new(orchestrator));
    let app = create_router(state);

    let host = std::env::var("RAG_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("RAG_API_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080);
    let bind_addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(%bind_addr, "rag-api listening");
    axum::serve(listener, app).await?;
    Ok(())
}
