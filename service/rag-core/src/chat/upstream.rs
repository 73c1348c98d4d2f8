//! Line-delimited frame parsers for the two upstream chat wire shapes (spec
//! §4.H, SPEC_FULL §4.H supplement): Ollama-style NDJSON and OpenAI-
//! compatible SSE, both terminated by a `done`/`[DONE]` sentinel.

use serde::Deserialize;

pub enum UpstreamEvent {
    Token(String),
    Done,
}

#[derive(Debug, Deserialize)]
struct OllamaFrame {
    #[serde(default)]
    message: Option<OllamaMessageDelta>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaMessageDelta {
    #[serde(default)]
    content: String,
}

/// Parses one line of `{"message":{"content":"..."},"done":bool}` NDJSON.
/// Non-JSON or blank lines are ignored rather than treated as errors, since
/// some servers interleave keep-alive newlines.
pub fn parse_ollama_ndjson_line(line: &str) -> Option<UpstreamEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let frame: OllamaFrame = serde_json::from_str(line).ok()?;
    if let Some(delta) = frame.message {
        if !delta.content.is_empty() {
            return Some(UpstreamEvent::Token(delta.content));
        }
    }
    if frame.done {
        return Some(UpstreamEvent::Done);
    }
    None
}

#[derive(Debug, Deserialize)]
struct OpenAiFrame {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    delta: OpenAiDelta,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Parses one line of `data: {"choices":[{"delta":{"content":"..."}}]}\n`,
/// honouring the literal `data: [DONE]` sentinel line.
pub fn parse_openai_sse_line(line: &str) -> Option<UpstreamEvent> {
    let line = line.trim();
    let payload = line.strip_prefix("data:")?.trim();
    if payload == "[DONE]" {
        return Some(UpstreamEvent::Done);
    }
    if payload.is_empty() {
        return None;
    }
    let frame: OpenAiFrame = serde_json::from_str(payload).ok()?;
    let content = frame.choices.first()?.delta.content.as_ref()?;
    if content.is_empty() {
        return None;
    }
    Some(UpstreamEvent::Token(content.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_token_line_yields_token() {
        let event = parse_ollama_ndjson_line(r#"{"message":{"content":"hi"},"done":false}"#);
        assert!(matches!(event, Some(UpstreamEvent::Token(t)) if t == "hi"));
    }

    #[test]
    fn ollama_final_line_yields_done() {
        let event = parse_ollama_ndjson_line(r#"{"message":{"content":""},"done":true}"#);
        assert!(matches!(event, Some(UpstreamEvent::Done)));
    }

    #[test]
    fn openai_delta_line_yields_token() {
        let event = parse_openai_sse_line(r#"data: {"choices":[{"delta":{"content":"hi"}}]}"#);
        assert!(matches!(event, Some(UpstreamEvent::Token(t)) if t == "hi"));
    }

    #[test]
    fn openai_done_sentinel_yields_done() {
        let event = parse_openai_sse_line("data: [DONE]");
        assert!(matches!(event, Some(UpstreamEvent::Done)));
    }

    #[test]
    fn blank_lines_are_ignored() {
        assert!(parse_ollama_ndjson_line("").is_none());
        assert!(parse_openai_sse_line("").is_none());
        assert!(parse_openai_sse_line("event: ping").is_none());
    }
}
