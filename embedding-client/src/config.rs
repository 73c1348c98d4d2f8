use std::time::Duration;

use crate::provider::Provider;

/// Immutable configuration snapshot for one embedding client instance.
/// Only the dynamic provider state (active model, absent-on-server flag)
/// is mutable, and that lives behind a mutex in `EmbeddingClient`.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub provider: Provider,
    pub explicit_endpoint: Option<String>,
    pub model_name: String,
    pub fallback_dim: usize,
    pub batch_size: usize,
    pub normalize_embeddings: bool,
    pub api_timeout: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            provider: Provider::Ollama,
            explicit_endpoint: None,
            model_name: "nomic-embed-text".to_string(),
            fallback_dim: 768,
            batch_size: 32,
            normalize_embeddings: true,
            api_timeout: Duration::from_secs(120),
        }
    }
}
