//! Source management, including multipart upload (spec §6 upload limits):
//! a fast in-memory path for well-behaved clients, and a streaming fallback
//! (`FORCE_FALLBACK_MULTIPART`) that counts bytes as they arrive and deletes
//! the partial temp file on rejection.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{delete, patch, post};
use axum::{Json, Router};
use axum_extra::extract::Multipart;
use corpus_model::{NotebookId, ParsingSettingsOverride, SourceId};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notebooks/{id}/sources", axum::routing::get(list_sources))
        .route("/notebooks/{id}/sources/upload", post(upload_source))
        .route("/notebooks/{id}/sources/add-path", post(add_path_source))
        .route("/notebooks/{id}/sources/reorder", patch(reorder_sources))
        .route("/sources/{id}", patch(patch_source).delete(delete_source))
        .route("/sources/{id}/reparse", post(reparse_source))
        .route("/sources/{id}/erase", delete(erase_source))
}

async fn list_sources(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    let sources = state.orchestrator.list_sources(&NotebookId::new(id))?;
    Ok(Json(serde_json::json!(sources)))
}

/// Streams each multipart field to a temp file under the notebook's docs
/// directory, enforcing `upload_max_bytes` while bytes are still arriving
/// rather than after the whole body has buffered.
async fn upload_source(
    State(state): State<Arc<AppState>>,
    Path(notebook_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let notebook_id = NotebookId::new(notebook_id);
    let limit = state.orchestrator.config.upload_max_bytes;
    let fallback = state.orchestrator.config.force_fallback_multipart;

    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::MalformedMultipart(e.to_string()))?
        .ok_or_else(|| ApiError::MalformedMultipart("missing file field".to_string()))?;
    let filename = field.file_name().map(|n| n.to_string()).ok_or_else(|| ApiError::MalformedMultipart("missing filename".to_string()))?;

    let tmp_dir = std::env::temp_dir();
    let tmp_path = tmp_dir.join(format!("rag-upload-{}-{}", std::process::id(), filename));

    let write_result = if fallback {
        stream_field_to_path(field, &tmp_path, limit).await
    } else {
        buffer_field_to_path(field, &tmp_path, limit).await
    };

    if let Err(err) = write_result {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(err);
    }

    let source = state.orchestrator.add_source_from_path(&notebook_id, &tmp_path)?;
    let _ = tokio::fs::remove_file(&tmp_path).await;

    let notebook_id_clone = notebook_id.clone();
    let source_id = source.id.clone();
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        let _ = orchestrator.ingest_source(&source_id).await;
        let _ = notebook_id_clone;
    });

    Ok(Json(serde_json::json!(source)))
}

async fn stream_field_to_path(mut field: axum_extra::extract::multipart::Field<'_>, path: &PathBuf, limit: u64) -> Result<(), ApiError> {
    let mut file = tokio::fs::File::create(path).await.map_err(|e| ApiError::Internal(e.to_string()))?;
    let mut written: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(|e| ApiError::MalformedMultipart(e.to_string()))? {
        written += chunk.len() as u64;
        if written > limit {
            return Err(ApiError::UploadTooLarge);
        }
        file.write_all(&chunk).await.map_err(|e| ApiError::Internal(e.to_string()))?;
    }
    Ok(())
}

async fn buffer_field_to_path(field: axum_extra::extract::multipart::Field<'_>, path: &PathBuf, limit: u64) -> Result<(), ApiError> {
    let bytes = field.bytes().await.map_err(|e| ApiError::MalformedMultipart(e.to_string()))?;
    if bytes.len() as u64 > limit {
        return Err(ApiError::UploadTooLarge);
    }
    tokio::fs::write(path, &bytes).await.map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct AddPathRequest {
    pub path: String,
}

async fn add_path_source(State(state): State<Arc<AppState>>, Path(notebook_id): Path<String>, Json(body): Json<AddPathRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    let notebook_id = NotebookId::new(notebook_id);
    let source = state.orchestrator.add_source_from_path(&notebook_id, std::path::Path::new(&body.path))?;
    Ok(Json(serde_json::json!(source)))
}

#[derive(Debug, Deserialize)]
pub struct ReorderSourcesRequest {
    pub ordered_ids: Vec<String>,
}

async fn reorder_sources(State(state): State<Arc<AppState>>, Path(notebook_id): Path<String>, Json(body): Json<ReorderSourcesRequest>) -> Result<(), ApiError> {
    let ids: Vec<SourceId> = body.ordered_ids.into_iter().map(SourceId::new).collect();
    state.orchestrator.reorder_sources(&NotebookId::new(notebook_id), &ids)?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct PatchSourceRequest {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub parser_override: Option<ParsingSettingsOverride>,
}

async fn patch_source(State(state): State<Arc<AppState>>, Path(id): Path<String>, Json(body): Json<PatchSourceRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    let id = SourceId::new(id);
    let mut source = None;
    if let Some(enabled) = body.enabled {
        source = Some(state.orchestrator.set_source_enabled(&id, enabled)?);
    }
    if let Some(parser_override) = body.parser_override {
        source = Some(state.orchestrator.set_source_override(&id, parser_override)?);
    }
    let source = match source {
        Some(s) => s,
        None => state.orchestrator.get_source(&id)?.ok_or_else(|| ApiError::NotFound(format!("source {id}")))?,
    };
    Ok(Json(serde_json::json!(source)))
}

async fn delete_source(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<(), ApiError> {
    state.orchestrator.delete_source_fully(&SourceId::new(id))?;
    Ok(())
}

async fn erase_source(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    let source = state.orchestrator.erase_source_data(&SourceId::new(id))?;
    Ok(Json(serde_json::json!(source)))
}

async fn reparse_source(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    let source = state.orchestrator.reparse_source(&SourceId::new(id)).await?;
    Ok(Json(serde_json::json!(source)))
}
