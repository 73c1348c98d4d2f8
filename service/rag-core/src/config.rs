use std::path::PathBuf;
use std::time::Duration;

use embedding_client::{EmbeddingConfig, Provider};

/// Process configuration, read once at startup from the environment (spec
/// §6's fixed env var names). No hidden defaults-within-defaults: every
/// knob below has a literal fallback listed next to the `env::var` call
/// that reads it.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub embedding: EmbeddingConfig,
    pub embedding_enabled: bool,
    pub chat_base_url: String,
    pub chat_model: String,
    pub upload_max_bytes: u64,
    pub rag_score_threshold: f32,
    pub model_score_threshold: f32,
    /// `DEBUG_MODEL_MODE`: force chat mode to `model` regardless of the
    /// request, useful for exercising the analytical-with-sources prompt
    /// without a retrieval-threshold dependency.
    pub debug_model_mode: bool,
    /// `FORCE_FALLBACK_MULTIPART`: skip the fast multipart path and always
    /// use the streaming-to-temp-file fallback in the upload handler.
    pub force_fallback_multipart: bool,
    /// `ENABLE_LEGACY_ENGINE`: accept the historical flat parsing JSON
    /// schema on read (spec §9, Open Question iii) in addition to the
    /// structured `{metadata, chunks}` form.
    pub enable_legacy_engine: bool,
    pub agents_dir: PathBuf,
    pub openai_api_key: Option<String>,
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | ""))
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        let data_dir = std::env::var("RAG_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let embedding = EmbeddingConfig {
            base_url: std::env::var("EMBEDDING_BASE_URL").unwrap_or_else(|_| "http://localhost:11434".to_string()),
            provider: std::env::var("EMBEDDING_PROVIDER")
                .ok()
                .and_then(|v| match v.to_ascii_lowercase().as_str() {
                    "openai" => Some(Provider::Openai),
                    "custom" => Some(Provider::Custom),
                    "ollama" => Some(Provider::Ollama),
                    _ => None,
                })
                .unwrap_or(Provider::Ollama),
            explicit_endpoint: std::env::var("EMBEDDING_ENDPOINT").ok(),
            model_name: std::env::var("EMBEDDING_MODEL").unwrap_or_else(|_| "nomic-embed-text".to_string()),
            fallback_dim: std::env::var("EMBEDDING_DIM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(768),
            batch_size: 32,
            normalize_embeddings: true,
            api_timeout: Duration::from_secs(120),
        };

        let upload_max_mb: u64 = std::env::var("MAX_UPLOAD_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(25);

        Self {
            data_dir,
            embedding,
            embedding_enabled: env_flag("EMBEDDING_ENABLED", true),
            chat_base_url: std::env::var("EMBEDDING_BASE_URL").unwrap_or_else(|_| "http://localhost:11434".to_string()),
            chat_model: std::env::var("EMBEDDING_MODEL").unwrap_or_else(|_| "llama3".to_string()),
            upload_max_bytes: upload_max_mb * 1_048_576,
            rag_score_threshold: 0.75,
            model_score_threshold: 0.50,
            debug_model_mode: env_flag("DEBUG_MODEL_MODE", false),
            force_fallback_multipart: env_flag("FORCE_FALLBACK_MULTIPART", false),
            enable_legacy_engine: env_flag("ENABLE_LEGACY_ENGINE", true),
            agents_dir: std::env::var("AGENTS_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./agents")),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
        }
    }

    /// `data/store.db` — the global cross-notebook registry (spec §6).
    pub fn global_db_path(&self) -> PathBuf {
        self.data_dir.join("store.db")
    }

    /// `data/notebooks/{notebook_id}.db`.
    pub fn notebook_db_path(&self, notebook_id: &str) -> PathBuf {
        self.data_dir.join("notebooks").join(format!("{notebook_id}.db"))
    }

    /// `data/docs/{notebook_id}/` — originals.
    pub fn docs_dir(&self, notebook_id: &str) -> PathBuf {
        self.data_dir.join("docs").join(notebook_id)
    }

    /// `data/parsing/{notebook_id}/{doc_id}.json` — chunk+metadata
    /// intermediate.
    pub fn parsing_dir(&self, notebook_id: &str) -> PathBuf {
        self.data_dir.join("parsing").join(notebook_id)
    }

    pub fn parsing_json_path(&self, notebook_id: &str, doc_id: &str) -> PathBuf {
        self.parsing_dir(notebook_id).join(format!("{doc_id}.json"))
    }

    /// `data/citations/{notebook_id}/{citation_id}.json`.
    pub fn citations_dir(&self, notebook_id: &str) -> PathBuf {
        self.data_dir.join("citations").join(notebook_id)
    }

    /// `data/notes/{note_id}.json`.
    pub fn notes_dir(&self) -> PathBuf {
        self.data_dir.join("notes")
    }
}
