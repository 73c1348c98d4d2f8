use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::EmbeddingConfig;
use crate::error::EmbedError;

/// Dynamic provider state: the active model and the *model-absent-on-server*
/// flag. Mutation is serialised by the mutex that guards it; configuration
/// inputs (`EmbeddingConfig`) stay an immutable snapshot.
#[derive(Debug, Clone, Default)]
struct ProviderState {
    active_model: Option<String>,
    model_absent_on_server: bool,
}

pub struct EmbeddingClient {
    http: reqwest::Client,
    config: EmbeddingConfig,
    state: Mutex<ProviderState>,
    dimension: AtomicUsize,
    enabled: bool,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

#[derive(Deserialize)]
struct NativeBatchResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct LegacyResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    pub fn new(config: EmbeddingConfig, enabled: bool) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.api_timeout)
            .build()
            .expect("reqwest client builds");
        let dimension = AtomicUsize::new(config.fallback_dim);
        Self {
            http,
            config,
            state: Mutex::new(ProviderState::default()),
            dimension,
            enabled,
        }
    }

    pub fn current_dimension(&self) -> usize {
        self.dimension.load(Ordering::Relaxed)
    }

    /// `GET {base}/api/tags` liveness probe. Returns the list of model names
    /// the server currently reports, or `None` if the server didn't respond.
    async fn probe_tags(&self) -> Option<Vec<String>> {
        let url = format!("{}/api/tags", self.config.base_url.trim_end_matches('/'));
        let resp = self.http.get(&url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let parsed: TagsResponse = resp.json().await.ok()?;
        Some(parsed.models.into_iter().map(|m| m.name).collect())
    }

    /// If the server is live, embed a single short string and let its
    /// length override `fallback_dim` for the remainder of the process.
    pub async fn startup_probe(&self) {
        if !self.enabled {
            return;
        }
        if self.probe_tags().await.is_none() {
            debug!("embedding server not reachable at startup; keeping fallback dimension");
            return;
        }
        match self.get_embeddings(&["dimension probe".to_string()]).await {
            Ok(vectors) => {
                if let Some(v) = vectors.first() {
                    if !v.is_empty() {
                        self.dimension.store(v.len(), Ordering::Relaxed);
                    }
                }
            }
            Err(e) => warn!(error = %e, "startup dimension probe failed"),
        }
    }

    /// Model-name candidates: the exact configured name, then the prefix
    /// before `:` for tagged names like `name:0.6b`.
    fn model_candidates(&self) -> Vec<String> {
        let mut candidates = vec![self.config.model_name.clone()];
        if let Some((base, _tag)) = self.config.model_name.split_once(':') {
            if !base.is_empty() && base != self.config.model_name {
                candidates.push(base.to_string());
            }
        }
        candidates
    }

    fn endpoint_candidates(&self) -> Vec<(Endpoint, String)> {
        if let Some(explicit) = &self.config.explicit_endpoint {
            return vec![(Endpoint::NativeBatch, explicit.clone())];
        }
        let base = self.config.base_url.trim_end_matches('/').to_string();
        let (native, legacy) = if base.ends_with("/api") {
            (format!("{base}/embed"), format!("{base}/embeddings"))
        } else {
            (format!("{base}/api/embed"), format!("{base}/api/embeddings"))
        };
        vec![
            (Endpoint::NativeBatch, native),
            (Endpoint::Legacy, legacy),
            (Endpoint::OpenAi, format!("{base}/v1/embeddings")),
        ]
    }

    /// Returns one vector per input text, normalised to unit length when
    /// configured. An all-zero vector marks that text as a failed embedding.
    pub async fn get_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let dim = self.current_dimension();
        if !self.enabled {
            return Ok(zero_vectors(texts.len(), dim));
        }
        {
            let state = self.state.lock().await;
            if state.model_absent_on_server {
                return Ok(zero_vectors(texts.len(), dim));
            }
        }

        for model in self.model_candidates() {
            if let Some(server_models) = self.probe_tags().await {
                if !server_models.is_empty() && !server_models.iter().any(|m| m == &model) {
                    continue;
                }
            }

            match self.try_model(&model, texts).await {
                Ok(vectors) => {
                    let mut state = self.state.lock().await;
                    state.active_model = Some(model);
                    state.model_absent_on_server = false;
                    drop(state);
                    return Ok(self.maybe_normalize(vectors));
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "embedding candidate failed");
                    if looks_like_not_found(&e.to_string()) {
                        let mut state = self.state.lock().await;
                        state.model_absent_on_server = true;
                    }
                }
            }
        }

        Ok(zero_vectors(texts.len(), dim))
    }

    async fn try_model(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        for (kind, url) in self.endpoint_candidates() {
            match kind {
                Endpoint::NativeBatch => match self.call_native_batch(&url, model, texts).await {
                    Ok(v) => return Ok(v),
                    Err(EmbedError::RequestFailed(msg)) if is_404(&msg) => continue,
                    Err(e) => return Err(e),
                },
                Endpoint::Legacy => match self.call_legacy(&url, model, texts).await {
                    Ok(v) => return Ok(v),
                    Err(EmbedError::RequestFailed(msg)) if is_404(&msg) => continue,
                    Err(e) => return Err(e),
                },
                Endpoint::OpenAi => match self.call_openai(&url, model, texts).await {
                    Ok(v) => return Ok(v),
                    Err(EmbedError::RequestFailed(msg)) if is_404(&msg) => continue,
                    Err(e) => return Err(e),
                },
            }
        }
        Err(EmbedError::RequestFailed("all endpoint candidates exhausted".to_string()))
    }

    async fn call_native_batch(&self, url: &str, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let body = json!({ "model": model, "input": texts });
        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbedError::RequestFailed(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(EmbedError::RequestFailed(format!("status={}", resp.status())));
        }
        let parsed: NativeBatchResponse = resp
            .json()
            .await
            .map_err(|e| EmbedError::InvalidResponse(e.to_string()))?;
        Ok(pad_or_truncate(parsed.embeddings, texts.len(), self.current_dimension()))
    }

    async fn call_legacy(&self, url: &str, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let body = json!({ "model": model, "prompt": text });
            let resp = self
                .http
                .post(url)
                .json(&body)
                .send()
                .await
                .map_err(|e| EmbedError::RequestFailed(e.to_string()))?;
            if !resp.status().is_success() {
                return Err(EmbedError::RequestFailed(format!("status={}", resp.status())));
            }
            let parsed: LegacyResponse = resp
                .json()
                .await
                .map_err(|e| EmbedError::InvalidResponse(e.to_string()))?;
            out.push(parsed.embedding);
        }
        Ok(pad_or_truncate(out, texts.len(), self.current_dimension()))
    }

    async fn call_openai(&self, url: &str, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let body = json!({ "model": model, "input": texts });
        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbedError::RequestFailed(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(EmbedError::RequestFailed(format!("status={}", resp.status())));
        }
        let parsed: OpenAiResponse = resp
            .json()
            .await
            .map_err(|e| EmbedError::InvalidResponse(e.to_string()))?;
        let vectors = parsed.data.into_iter().map(|d| d.embedding).collect();
        Ok(pad_or_truncate(vectors, texts.len(), self.current_dimension()))
    }

    fn maybe_normalize(&self, vectors: Vec<Vec<f32>>) -> Vec<Vec<f32>> {
        if !self.config.normalize_embeddings {
            return vectors;
        }
        vectors.into_iter().map(|v| normalize(&v)).collect()
    }
}

enum Endpoint {
    NativeBatch,
    Legacy,
    OpenAi,
}

fn pad_or_truncate(mut vectors: Vec<Vec<f32>>, len: usize, dim: usize) -> Vec<Vec<f32>> {
    vectors.resize_with(len, || vec![0.0; dim]);
    vectors
}

fn zero_vectors(count: usize, dim: usize) -> Vec<Vec<f32>> {
    (0..count).map(|_| vec![0.0; dim]).collect()
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|c| c * c).sum::<f32>().sqrt();
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|c| c / norm).collect()
}

fn is_404(msg: &str) -> bool {
    msg.contains("404")
}

fn looks_like_not_found(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    lower.contains("404") || lower.contains("not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_length() {
        let v = normalize(&[3.0, 4.0]);
        let len = (v[0] * v[0] + v[1] * v[1]).sqrt();
        assert!((len - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_vector_alone() {
        let v = normalize(&[0.0, 0.0]);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn pad_or_truncate_fills_short_batches_with_zero_vectors() {
        let out = pad_or_truncate(vec![vec![1.0, 2.0]], 3, 2);
        assert_eq!(out.len(), 3);
        assert_eq!(out[1], vec![0.0, 0.0]);
    }
}
