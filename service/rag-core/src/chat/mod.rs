//! ChatEngine (spec §4.H): mode-specific prompting, history assembly,
//! upstream streaming, and cancellation via `chat_version`.

mod upstream;

use std::collections::HashMap;
use std::sync::Arc;

use corpus_model::{ChatMessage, ChatRole, NotebookId, Source};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::error::RagCoreError;
use crate::hybrid_search::{RetrievalMode, RetrievedPassage};
use crate::orchestrator::Orchestrator;

const DEFAULT_MAX_HISTORY: usize = 5;
const MIN_MAX_HISTORY: usize = 1;
const MAX_MAX_HISTORY: usize = 50;
const DEFAULT_TOP_N: usize = 8;

const NO_SOURCES_SENTENCE: &str =
    "I couldn't find anything in this notebook's sources that answers that question.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatProvider {
    Ollama,
    Openai,
    Custom,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub notebook_id: String,
    pub message: String,
    #[serde(default)]
    pub selected_source_ids: Option<Vec<String>>,
    pub mode: RetrievalMode,
    pub provider: ChatProvider,
    pub base_url: String,
    pub model: String,
    /// Required when `mode == agent`; names the agent manifest to respond
    /// as (spec §4.H, §6 `/agents`).
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub max_history: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub enum ChatEvent {
    Token(String),
    Citations(Vec<RetrievedPassage>),
    Done { message_id: String },
    Error { detail: String },
}

/// Sources ordered by `sort_order`, numbered 1-based: the stable citation
/// number a source keeps across every chat turn (spec §4.H).
pub fn citation_numbers(sources: &[Source]) -> HashMap<String, usize> {
    let mut ordered: Vec<&Source> = sources.iter().collect();
    ordered.sort_by_key(|s| s.sort_order);
    ordered.into_iter().enumerate().map(|(i, s)| (s.id.as_str().to_string(), i + 1)).collect()
}

fn numbered_passages(passages: &[RetrievedPassage], citations: &HashMap<String, usize>) -> String {
    passages
        .iter()
        .map(|p| {
            let n = citations.get(&p.source_id).copied().unwrap_or(0);
            format!("[{n}] ({}) {}", p.source, p.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn rag_system_prompt(passages: &[RetrievedPassage], citations: &HashMap<String, usize>) -> String {
    format!(
        "You answer strictly from the numbered passages below. Cite the passage for every claim using its bracketed number, e.g. [1]. Do not state anything the passages do not support; if the passages are insufficient, say so instead of guessing.\n\n{}",
        numbered_passages(passages, citations)
    )
}

fn model_with_sources_prompt(passages: &[RetrievedPassage], citations: &HashMap<String, usize>) -> String {
    format!(
        "You may reason beyond the passages below, but label every statement as either a Fact (grounded in a numbered passage, cited like [1]) or an Analysis (your own reasoning beyond the passages).\n\n{}",
        numbered_passages(passages, citations)
    )
}

fn model_general_prompt() -> String {
    "No notebook passages were retrieved for this question. Answer from general knowledge and prefix the response with \"General knowledge (no sources):\".".to_string()
}

fn agent_prompt(agent_id: &str) -> String {
    format!("You are responding as the agent \"{agent_id}\". Stay in character for this agent; no notebook sources are consulted in this mode.")
}

/// The last `max_history` (default 5, bounded [1,50]) non-empty messages,
/// oldest first (spec §4.H).
fn recent_history(messages: &[ChatMessage], max_history: Option<usize>) -> Vec<&ChatMessage> {
    let bound = max_history.unwrap_or(DEFAULT_MAX_HISTORY).clamp(MIN_MAX_HISTORY, MAX_MAX_HISTORY);
    let non_empty: Vec<&ChatMessage> = messages.iter().filter(|m| !m.content.trim().is_empty()).collect();
    let start = non_empty.len().saturating_sub(bound);
    non_empty[start..].to_vec()
}

#[derive(Debug, Clone, Serialize)]
struct UpstreamMessage {
    role: &'static str,
    content: String,
}

fn role_str(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    }
}

impl Orchestrator {
    /// Runs one chat turn as a background task and returns a stream of
    /// `ChatEvent`s the caller (an SSE handler, or a non-streaming endpoint
    /// that drains the whole stream) consumes. One task per request; no
    /// cross-request coordination beyond the shared chat-history map and
    /// `chat_version` counter (spec §5).
    pub fn chat_stream(self: Arc<Self>, request: ChatRequest) -> ReceiverStream<ChatEvent> {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            self.run_chat_turn(request, tx).await;
        });
        ReceiverStream::new(rx)
    }

    async fn run_chat_turn(&self, request: ChatRequest, tx: mpsc::Sender<ChatEvent>) {
        let notebook_id = NotebookId::new(request.notebook_id.clone());
        let version = self.chat_version(&notebook_id);
        self.append_message_if_current(&notebook_id, version, ChatRole::User, request.message.clone());

        match self.build_turn(&notebook_id, &request, version).await {
            Ok(Some(outcome)) => {
                let _ = tx.send(ChatEvent::Citations(outcome.citations)).await;
                self.run_and_persist(&notebook_id, version, &request, outcome.system_prompt, tx).await;
            }
            Ok(None) => {
                // rag mode with nothing above threshold: fixed sentence, no LLM call.
                let _ = tx.send(ChatEvent::Citations(Vec::new())).await;
                let message_id = self
                    .append_message_if_current(&notebook_id, version, ChatRole::Assistant, NO_SOURCES_SENTENCE.to_string())
                    .unwrap_or_default();
                let _ = tx.send(ChatEvent::Token(NO_SOURCES_SENTENCE.to_string())).await;
                let _ = tx.send(ChatEvent::Done { message_id }).await;
            }
            Err(err) => {
                let _ = tx.send(ChatEvent::Error { detail: err.to_string() }).await;
                let _ = tx.send(ChatEvent::Done { message_id: String::new() }).await;
            }
        }
    }

    async fn build_turn(&self, notebook_id: &NotebookId, request: &ChatRequest, _version: u64) -> Result<Option<TurnOutcome>, RagCoreError> {
        // `DEBUG_MODEL_MODE` forces every non-agent turn through the
        // analytical-with-sources prompt, bypassing the rag threshold.
        let mode = if self.config.debug_model_mode && request.mode != RetrievalMode::Agent {
            RetrievalMode::Model
        } else {
            request.mode
        };

        if mode == RetrievalMode::Agent {
            let agent_id = request.agent_id.clone().unwrap_or_else(|| "default".to_string());
            return Ok(Some(TurnOutcome { system_prompt: agent_prompt(&agent_id), citations: Vec::new() }));
        }

        let passages = self
            .retrieve(notebook_id, &request.message, request.selected_source_ids.clone(), DEFAULT_TOP_N, mode)
            .await?;

        if mode == RetrievalMode::Rag && passages.is_empty() {
            return Ok(None);
        }

        let sources = self.list_sources(notebook_id)?;
        let citations = citation_numbers(&sources);

        let system_prompt = match (mode, passages.is_empty()) {
            (RetrievalMode::Rag, false) => rag_system_prompt(&passages, &citations),
            (RetrievalMode::Model, false) => model_with_sources_prompt(&passages, &citations),
            (RetrievalMode::Model, true) => model_general_prompt(),
            (RetrievalMode::Rag, true) | (RetrievalMode::Agent, _) => unreachable!("handled above"),
        };

        Ok(Some(TurnOutcome { system_prompt, citations: passages }))
    }

    async fn run_and_persist(&self, notebook_id: &NotebookId, version: u64, request: &ChatRequest, system_prompt: String, tx: mpsc::Sender<ChatEvent>) {
        let history = self.list_messages(notebook_id);
        let mut messages: Vec<UpstreamMessage> = vec![UpstreamMessage { role: "system", content: system_prompt }];
        for m in recent_history(&history, request.max_history) {
            messages.push(UpstreamMessage { role: role_str(m.role), content: m.content.clone() });
        }

        match stream_chat_tokens(&self.http, request, messages, &tx).await {
            Ok(content) => {
                let current = self.chat_version(notebook_id);
                if current != version {
                    warn!(notebook_id = %notebook_id, "chat history cleared mid-stream; discarding answer");
                    let _ = tx.send(ChatEvent::Done { message_id: String::new() }).await;
                    return;
                }
                let message_id = self
                    .append_message_if_current(notebook_id, version, ChatRole::Assistant, content)
                    .unwrap_or_default();
                let _ = tx.send(ChatEvent::Done { message_id }).await;
            }
            Err(err) => {
                let _ = tx.send(ChatEvent::Error { detail: err.to_string() }).await;
                let _ = tx.send(ChatEvent::Done { message_id: String::new() }).await;
            }
        }
    }
}

struct TurnOutcome {
    system_prompt: String,
    citations: Vec<RetrievedPassage>,
}

/// Opens a streaming connection to the upstream chat endpoint, parses
/// line-delimited frames with the provider-appropriate parser, forwards
/// each token through `tx`, and returns the accumulated final content
/// (spec §4.H streaming).
async fn stream_chat_tokens(
    client: &reqwest::Client,
    request: &ChatRequest,
    messages: Vec<UpstreamMessage>,
    tx: &mpsc::Sender<ChatEvent>,
) -> Result<String, RagCoreError> {
    let base = request.base_url.trim_end_matches('/');
    let (url, is_ollama) = match request.provider {
        ChatProvider::Ollama | ChatProvider::Custom => (format!("{base}/api/chat"), true),
        ChatProvider::Openai => (format!("{base}/v1/chat/completions"), false),
    };
    let body = serde_json::json!({ "model": request.model, "messages": messages, "stream": true });

    let response = client
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(|e| RagCoreError::UpstreamUnavailable(e.to_string()))?;
    if !response.status().is_success() {
        return Err(RagCoreError::UpstreamUnavailable(format!("status={}", response.status())));
    }

    let mut accumulated = String::new();
    let mut buffer = String::new();
    let mut bytes = response.bytes_stream();
    'frames: while let Some(chunk) = bytes.next().await {
        let chunk = chunk.map_err(|e| RagCoreError::UpstreamUnavailable(e.to_string()))?;
        buffer.push_str(&String::from_utf8_lossy(&chunk));
        while let Some(pos) = buffer.find('\n') {
            let line: String = buffer.drain(..=pos).collect();
            let event = if is_ollama { upstream::parse_ollama_ndjson_line(&line) } else { upstream::parse_openai_sse_line(&line) };
            match event {
                Some(upstream::UpstreamEvent::Token(text)) => {
                    accumulated.push_str(&text);
                    let _ = tx.send(ChatEvent::Token(text)).await;
                }
                Some(upstream::UpstreamEvent::Done) => break 'frames,
                None => {}
            }
        }
    }
    Ok(accumulated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use corpus_model::{FileKind, ParsingSettingsOverride, SourceId, SourceStatus};

    fn source(id: &str, sort_order: u32) -> Source {
        Source {
            id: SourceId::new(id.to_string()),
            notebook_id: NotebookId::new("nb".to_string()),
            original_filename: format!("{id}.txt"),
            on_disk_path: String::new(),
            file_kind: FileKind::Other,
            size_bytes: 0,
            status: SourceStatus::Indexed,
            enabled: true,
            has_docs: true,
            has_parsing: true,
            has_base: true,
            embeddings_status: corpus_model::EmbeddingsStatus::Available,
            warning: None,
            sort_order,
            parser_override: ParsingSettingsOverride::default(),
            added_at: Utc::now(),
        }
    }

    #[test]
    fn citation_numbers_follow_sort_order_not_insertion_order() {
        let sources = vec![source("b", 2), source("a", 1)];
        let numbers = citation_numbers(&sources);
        assert_eq!(numbers["a"], 1);
        assert_eq!(numbers["b"], 2);
    }

    #[test]
    fn recent_history_bounds_and_skips_empty() {
        let messages: Vec<ChatMessage> = (0..10)
            .map(|i| ChatMessage {
                id: i.to_string(),
                notebook_id: NotebookId::new("nb".to_string()),
                role: ChatRole::User,
                content: if i == 3 { String::new() } else { format!("msg{i}") },
                created_at: Utc::now(),
            })
            .collect();
        let recent = recent_history(&messages, Some(3));
        assert_eq!(recent.len(), 3);
        assert_eq!(recent.last().unwrap().content, "msg9");
    }

    #[test]
    fn recent_history_clamps_out_of_range_max_history() {
        let messages = vec![ChatMessage {
            id: "1".to_string(),
            notebook_id: NotebookId::new("nb".to_string()),
            role: ChatRole::User,
            content: "hi".to_string(),
            created_at: Utc::now(),
        }];
        let recent = recent_history(&messages, Some(0));
        assert_eq!(recent.len(), 1);
    }
}
