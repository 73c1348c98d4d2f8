//! HTTP surface for the RAG backend (spec §6): wires `rag_core::Orchestrator`
//! behind an axum router, mounted under `/api`.

pub mod error;
mod routes;

use std::sync::Arc;

use axum::Router;
use rag_core::Orchestrator;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.orchestrator.config.upload_max_bytes as usize;

    let api = Router::new()
        .merge(routes::notebooks::router())
        .merge(routes::sources::router())
        .merge(routes::chat::router())
        .merge(routes::misc::router())
        .layer(RequestBodyLimitLayer::new(upload_limit));

    Router::new()
        .nest("/api", api)
        .route("/health", axum::routing::get(routes::misc::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
