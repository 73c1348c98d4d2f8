//! Everything not notebook/source/chat shaped: model listing, runtime
//! embedding reconfiguration, agent manifests, raw file serving, health.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use embedding_client::{EmbeddingConfig, Provider};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/llm/models", get(list_models))
        .route("/settings/embedding", post(set_embedding_settings))
        .route("/agents", get(list_agents))
        .route("/files", get(serve_file))
        .route("/health", get(health))
}

pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    pub provider: Provider,
    pub base_url: String,
    #[serde(default)]
    pub purpose: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaTagModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagModel {
    name: String,
}

const EMBEDDING_NAME_HINTS: &[&str] = &["embed", "bge", "e5", "gte", "nomic", "mxbai"];
const RERANK_NAME_HINTS: &[&str] = &["rerank"];

fn matches_purpose(name: &str, purpose: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    let is_rerank = RERANK_NAME_HINTS.iter().any(|h| lower.contains(h));
    let is_embedding = EMBEDDING_NAME_HINTS.iter().any(|h| lower.contains(h));
    match purpose {
        "embedding" => is_embedding && !is_rerank,
        "chat" => !is_embedding && !is_rerank,
        _ => true,
    }
}

/// Lists upstream models, heuristically filtered by `purpose` (spec §6).
/// Only the `ollama` provider exposes a model-listing endpoint (`/api/tags`);
/// any other provider is `ProviderUnsupported`.
async fn list_models(Query(query): Query<ModelsQuery>) -> Result<Json<Vec<String>>, ApiError> {
    if query.provider != Provider::Ollama {
        return Err(ApiError::ProviderUnsupported(format!("{:?}", query.provider)));
    }

    let client = reqwest::Client::new();
    let url = format!("{}/api/tags", query.base_url.trim_end_matches('/'));
    let response = client.get(&url).send().await.map_err(|e| ApiError::UpstreamUnavailable(e.to_string()))?;
    if !response.status().is_success() {
        return Err(ApiError::UpstreamUnavailable(format!("status={}", response.status())));
    }
    let tags: OllamaTagsResponse = response.json().await.map_err(|e| ApiError::UpstreamUnavailable(e.to_string()))?;

    let names = tags
        .models
        .into_iter()
        .map(|m| m.name)
        .filter(|name| match query.purpose.as_deref() {
            Some(purpose) => matches_purpose(name, purpose),
            None => true,
        })
        .collect();
    Ok(Json(names))
}

#[derive(Debug, Deserialize)]
pub struct SetEmbeddingRequest {
    pub base_url: String,
    pub provider: Provider,
    #[serde(default)]
    pub explicit_endpoint: Option<String>,
    pub model_name: String,
    #[serde(default)]
    pub fallback_dim: Option<usize>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

async fn set_embedding_settings(State(state): State<Arc<AppState>>, Json(body): Json<SetEmbeddingRequest>) -> impl IntoResponse {
    let config = EmbeddingConfig {
        base_url: body.base_url,
        provider: body.provider,
        explicit_endpoint: body.explicit_endpoint,
        model_name: body.model_name,
        fallback_dim: body.fallback_dim.unwrap_or(768),
        ..EmbeddingConfig::default()
    };
    state.orchestrator.reconfigure_embedding(config, body.enabled);
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize, Deserialize)]
struct AgentManifest {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Reads every `*.json` manifest directly under `AGENTS_DIR` (spec §6); a
/// missing directory yields an empty list rather than an error.
async fn list_agents(State(state): State<Arc<AppState>>) -> Result<Json<Vec<AgentManifest>>, ApiError> {
    let dir = &state.orchestrator.config.agents_dir;
    let mut agents = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return Ok(Json(agents)),
    };
    while let Some(entry) = entries.next_entry().await.map_err(|e| ApiError::Internal(e.to_string()))? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Ok(bytes) = tokio::fs::read(&path).await {
            if let Ok(manifest) = serde_json::from_slice::<AgentManifest>(&bytes) {
                agents.push(manifest);
            }
        }
    }
    Ok(Json(agents))
}

#[derive(Debug, Deserialize)]
pub struct FilesQuery {
    pub path: String,
}

/// Serves an on-disk file verbatim (spec §6); `NotFound` if it is absent.
async fn serve_file(Query(query): Query<FilesQuery>) -> Result<Vec<u8>, ApiError> {
    tokio::fs::read(&query.path).await.map_err(|_| ApiError::NotFound(query.path))
}
