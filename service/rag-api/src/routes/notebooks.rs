use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use corpus_model::{NotebookId, ParsingSettings};
use serde::Deserialize;

use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notebooks", get(list_notebooks).post(create_notebook))
        .route("/notebooks/{id}", get(get_notebook).patch(rename_notebook).delete(delete_notebook))
        .route("/notebooks/{id}/duplicate", post(duplicate_notebook))
        .route("/notebooks/{id}/parsing-settings", get(get_parsing_settings).patch(set_parsing_settings))
        .route("/notebooks/{id}/index/status", get(index_status))
        .route("/notebooks/{id}/messages", get(list_messages).delete(clear_messages))
}

#[derive(Debug, Deserialize)]
pub struct CreateNotebookRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameNotebookRequest {
    pub title: String,
}

async fn list_notebooks(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let notebooks = state.orchestrator.list_notebooks()?;
    Ok(Json(serde_json::json!(notebooks)))
}

async fn create_notebook(State(state): State<Arc<AppState>>, Json(body): Json<CreateNotebookRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    let notebook = state.orchestrator.create_notebook(&body.title)?;
    Ok(Json(serde_json::json!(notebook)))
}

async fn get_notebook(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    let notebook = state
        .orchestrator
        .get_notebook(&NotebookId::new(id.clone()))?
        .ok_or_else(|| ApiError::NotFound(format!("notebook {id}")))?;
    Ok(Json(serde_json::json!(notebook)))
}

async fn rename_notebook(State(state): State<Arc<AppState>>, Path(id): Path<String>, Json(body): Json<RenameNotebookRequest>) -> Result<(), ApiError> {
    state.orchestrator.rename_notebook(&NotebookId::new(id), &body.title)?;
    Ok(())
}

async fn delete_notebook(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<(), ApiError> {
    state.orchestrator.delete_notebook(&NotebookId::new(id))?;
    Ok(())
}

async fn duplicate_notebook(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    let notebook = state.orchestrator.duplicate_notebook(&NotebookId::new(id))?;
    Ok(Json(serde_json::json!(notebook)))
}

async fn get_parsing_settings(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<ParsingSettings>, ApiError> {
    let settings = state.orchestrator.get_parsing_settings(&NotebookId::new(id))?;
    Ok(Json(settings))
}

async fn set_parsing_settings(State(state): State<Arc<AppState>>, Path(id): Path<String>, Json(settings): Json<ParsingSettings>) -> Result<(), ApiError> {
    state.orchestrator.set_parsing_settings(&NotebookId::new(id), &settings)?;
    Ok(())
}

async fn index_status(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<rag_core::IndexStatus>, ApiError> {
    let status = state.orchestrator.index_status(&NotebookId::new(id))?;
    Ok(Json(status))
}

async fn list_messages(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Json<serde_json::Value> {
    let messages = state.orchestrator.list_messages(&NotebookId::new(id));
    Json(serde_json::json!(messages))
}

async fn clear_messages(State(state): State<Arc<AppState>>, Path(id): Path<String>) {
    state.orchestrator.clear_messages(&NotebookId::new(id));
}
