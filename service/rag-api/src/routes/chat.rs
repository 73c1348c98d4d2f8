//! `POST /chat` (drains the event stream into one response) and
//! `GET /chat/stream` (bridges `ChatEvent` to the literal SSE wire format
//! from spec §6: `event: <name>\ndata: <json>\n\n`).

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::Stream;
use rag_core::{ChatEvent, ChatProvider, ChatRequest};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;

use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat_once)).route("/chat/stream", get(chat_stream))
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    message_id: String,
    content: String,
    citations: Vec<rag_core::RetrievedPassage>,
}

async fn chat_once(State(state): State<Arc<AppState>>, Json(request): Json<ChatRequest>) -> Result<Json<ChatResponse>, ApiError> {
    let mut stream = state.orchestrator.clone().chat_stream(request);
    let mut content = String::new();
    let mut citations = Vec::new();
    let mut message_id = String::new();
    while let Some(event) = stream.next().await {
        match event {
            ChatEvent::Token(text) => content.push_str(&text),
            ChatEvent::Citations(c) => citations = c,
            ChatEvent::Done { message_id: id } => message_id = id,
            ChatEvent::Error { detail } => return Err(ApiError::UpstreamUnavailable(detail)),
        }
    }
    Ok(Json(ChatResponse { message_id, content, citations }))
}

/// Query params mirror `POST /chat`'s JSON body (spec §6): `GET` requests
/// carry no body, so every field is a query param instead.
#[derive(Debug, Deserialize)]
pub struct ChatStreamQuery {
    pub notebook_id: String,
    pub message: String,
    #[serde(default)]
    pub selected_source_ids: Option<String>,
    pub mode: rag_core::hybrid_search::RetrievalMode,
    pub provider: ChatProvider,
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub max_history: Option<usize>,
}

async fn chat_stream(State(state): State<Arc<AppState>>, Query(query): Query<ChatStreamQuery>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let selected_source_ids = query.selected_source_ids.map(|csv| csv.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect());
    let request = ChatRequest {
        notebook_id: query.notebook_id,
        message: query.message,
        selected_source_ids,
        mode: query.mode,
        provider: query.provider,
        base_url: query.base_url,
        model: query.model,
        agent_id: query.agent_id,
        max_history: query.max_history,
    };

    let stream = state.orchestrator.clone().chat_stream(request).map(|event| {
        let sse_event = match event {
            ChatEvent::Token(text) => Event::default().event("token").json_data(serde_json::json!({ "text": text })),
            ChatEvent::Citations(citations) => Event::default().event("citations").json_data(serde_json::json!(citations)),
            ChatEvent::Done { message_id } => Event::default().event("done").json_data(serde_json::json!({ "message_id": message_id })),
            ChatEvent::Error { detail } => Event::default().event("error").json_data(serde_json::json!({ "detail": detail })),
        };
        Ok(sse_event.unwrap_or_else(|_| Event::default().event("error").data("serialization failed")))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
