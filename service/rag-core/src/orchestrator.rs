//! Orchestrator (spec §4.F): drives extraction → chunking → embedding →
//! storage for each source, owns the source lifecycle state machine, and
//! restores state on process restart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use corpus_model::{
    ChatMessage, ChatRole, DocId, DocumentMetadata, EmbeddedChunk, EmbeddingsStatus, FileKind, Notebook, NotebookId,
    ParsingSettings, ParsingSettingsOverride, Source, SourceId, SourceStatus,
};
use doc_pipeline::chunker::chunk_blocks;
use doc_pipeline::extractor::{extract, ExtractOptions};
use embedding_client::EmbeddingClient;
use notebook_store::{GlobalStore, NotebookStore};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::RagCoreError;

/// Clears `has_docs` for any source whose `on_disk_path` no longer exists
/// (spec §4.E: the other half of startup reconciliation, alongside
/// `reconcile_interrupted_sources`'s `indexing` → `failed` promotion).
fn reconcile_missing_files(global: &GlobalStore) -> Result<(), RagCoreError> {
    let mut cleared = 0u32;
    for mut source in global.list_all_sources()? {
        if source.has_docs && !Path::new(&source.on_disk_path).exists() {
            source.has_docs = false;
            global.update_source(&source)?;
            cleared += 1;
        }
    }
    if cleared > 0 {
        warn!(cleared, "cleared has_docs for sources whose file is missing on disk");
    }
    Ok(())
}

struct ChatState {
    messages: Vec<ChatMessage>,
    version: Arc<AtomicU64>,
}

impl Default for ChatState {
    fn default() -> Self {
        Self { messages: Vec::new(), version: Arc::new(AtomicU64::new(0)) }
    }
}

/// Process-global in-memory indices plus the persistent stores they mirror
/// (spec §4.F). One process holds exactly one `Orchestrator`.
pub struct Orchestrator {
    pub config: Arc<AppConfig>,
    global: StdMutex<GlobalStore>,
    notebook_stores: StdMutex<HashMap<String, Arc<StdMutex<NotebookStore>>>>,
    /// Swappable so `POST /settings/embedding` can re-create the embedding
    /// engine at runtime without restarting the process.
    embedder: StdMutex<Arc<EmbeddingClient>>,
    chat: StdMutex<HashMap<String, ChatState>>,
    /// Client used for upstream chat-completion requests (spec §4.H); kept
    /// separate from the embedder's own client since it talks to a
    /// caller-supplied `base_url`/`provider` per chat request.
    pub(crate) http: reqwest::Client,
}

/// Aggregate counters for `GET /notebooks/{id}/index/status` (spec §6).
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct IndexStatus {
    pub total: u32,
    pub indexed: u32,
    pub indexing: u32,
    pub failed: u32,
}

impl Orchestrator {
    /// Opens the global store, reconciles any source left `indexing` by a
    /// process that died mid-ingestion, clears `has_docs` for any source
    /// whose on-disk file vanished while the process was down, and seeds
    /// one empty notebook when the global store is empty (spec §4.E, §4.F).
    pub fn new(config: Arc<AppConfig>, embedder: Arc<EmbeddingClient>) -> Result<Self, RagCoreError> {
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(config.data_dir.join("notebooks"))?;
        let global = GlobalStore::open(config.global_db_path())?;
        global.reconcile_interrupted_sources()?;
        reconcile_missing_files(&global)?;

        let this = Self {
            config,
            global: StdMutex::new(global),
            notebook_stores: StdMutex::new(HashMap::new()),
            embedder: StdMutex::new(embedder),
            chat: StdMutex::new(HashMap::new()),
            http: reqwest::Client::builder().build().expect("reqwest client builds"),
        };

        if this.list_notebooks()?.is_empty() {
            this.create_notebook("Untitled notebook")?;
        }
        Ok(this)
    }

    pub fn embedder(&self) -> Arc<EmbeddingClient> {
        self.embedder.lock().unwrap().clone()
    }

    /// `POST /settings/embedding` (spec §6): atomically replaces the
    /// embedding client so in-flight requests either use the old or the new
    /// configuration, never a half-constructed one.
    pub fn reconfigure_embedding(&self, config: embedding_client::EmbeddingConfig, enabled: bool) {
        let client = Arc::new(EmbeddingClient::new(config, enabled));
        *self.embedder.lock().unwrap() = client;
    }

    fn notebook_store(&self, notebook_id: &NotebookId) -> Result<Arc<StdMutex<NotebookStore>>, RagCoreError> {
        let mut cache = self.notebook_stores.lock().unwrap();
        if let Some(store) = cache.get(notebook_id.as_str()) {
            return Ok(store.clone());
        }
        std::fs::create_dir_all(self.config.data_dir.join("notebooks"))?;
        let store = NotebookStore::open(self.config.notebook_db_path(notebook_id.as_str()))?;
        let store = Arc::new(StdMutex::new(store));
        cache.insert(notebook_id.as_str().to_string(), store.clone());
        Ok(store)
    }

    // ---- Notebook CRUD -------------------------------------------------

    pub fn create_notebook(&self, title: &str) -> Result<Notebook, RagCoreError> {
        let now = Utc::now();
        let notebook = Notebook::new(NotebookId::new(fresh_id("nb")), title, now);
        self.global.lock().unwrap().create_notebook(&notebook)?;
        Ok(notebook)
    }

    pub fn list_notebooks(&self) -> Result<Vec<Notebook>, RagCoreError> {
        Ok(self.global.lock().unwrap().list_notebooks()?)
    }

    pub fn get_notebook(&self, id: &NotebookId) -> Result<Option<Notebook>, RagCoreError> {
        Ok(self.global.lock().unwrap().get_notebook(id)?)
    }

    pub fn rename_notebook(&self, id: &NotebookId, title: &str) -> Result<(), RagCoreError> {
        Ok(self.global.lock().unwrap().rename_notebook(id, title)?)
    }

    /// Cascades to every per-notebook artefact (spec §3): on-disk files,
    /// parsing JSONs, the notebook database, saved citations, and the
    /// in-memory chat history.
    pub fn delete_notebook(&self, id: &NotebookId) -> Result<(), RagCoreError> {
        self.notebook_stores.lock().unwrap().remove(id.as_str());
        self.chat.lock().unwrap().remove(id.as_str());
        self.global.lock().unwrap().delete_notebook(id)?;

        let _ = std::fs::remove_file(self.config.notebook_db_path(id.as_str()));
        let _ = std::fs::remove_dir_all(self.config.docs_dir(id.as_str()));
        let _ = std::fs::remove_dir_all(self.config.parsing_dir(id.as_str()));
        let _ = std::fs::remove_dir_all(self.config.citations_dir(id.as_str()));
        Ok(())
    }

    /// Copies a notebook's GlobalStore rows, on-disk files (under new
    /// ids), parsing JSONs, and per-notebook database, then rewrites
    /// `doc_id`/`source_id` references throughout the copy (spec §4.F).
    pub fn duplicate_notebook(&self, id: &NotebookId) -> Result<Notebook, RagCoreError> {
        let source_notebook = self
            .get_notebook(id)?
            .ok_or_else(|| RagCoreError::Store(notebook_store::StoreError::NotFound(format!("notebook {id}"))))?;
        let new_notebook = self.create_notebook(&format!("{} (copy)", source_notebook.title))?;

        let settings = self.global.lock().unwrap().get_parsing_settings(id)?;
        self.global.lock().unwrap().set_parsing_settings(&new_notebook.id, &settings)?;

        std::fs::create_dir_all(self.config.docs_dir(new_notebook.id.as_str()))?;
        std::fs::create_dir_all(self.config.parsing_dir(new_notebook.id.as_str()))?;

        let sources = self.global.lock().unwrap().list_sources(id)?;
        let mut source_id_map: HashMap<String, String> = HashMap::new();
        for source in &sources {
            let new_source_id = SourceId::new(fresh_id("src"));
            source_id_map.insert(source.id.as_str().to_string(), new_source_id.as_str().to_string());

            let old_path = PathBuf::from(&source.on_disk_path);
            let new_path = self.config.docs_dir(new_notebook.id.as_str()).join(&source.original_filename);
            if old_path.exists() {
                let _ = std::fs::copy(&old_path, &new_path);
            }

            let mut copy = source.clone();
            copy.id = new_source_id;
            copy.notebook_id = new_notebook.id.clone();
            copy.on_disk_path = new_path.to_string_lossy().to_string();
            copy.added_at = Utc::now();
            self.global.lock().unwrap().add_source(&copy)?;
        }

        let old_db = self.config.notebook_db_path(id.as_str());
        if old_db.exists() {
            let new_db = self.config.notebook_db_path(new_notebook.id.as_str());
            std::fs::copy(&old_db, &new_db)?;

            let new_store = self.notebook_store(&new_notebook.id)?;
            let mut store = new_store.lock().unwrap();
            let pairs = store.list_doc_source_pairs()?;
            let mut doc_id_map: HashMap<String, String> = HashMap::new();
            for (old_doc_id, _old_source_id) in &pairs {
                doc_id_map.insert(old_doc_id.clone(), fresh_id("doc"));
            }

            // Copy each source's parsing JSON keyed by its real doc_id
            // (from `list_doc_source_pairs`, not the source id) before the
            // store rewrites those doc_ids under `remap_ids`.
            for (old_doc_id, _old_source_id) in &pairs {
                let old_json = self.config.parsing_json_path(id.as_str(), old_doc_id);
                if !old_json.exists() {
                    continue;
                }
                let new_doc_id = &doc_id_map[old_doc_id];
                let new_json = self.config.parsing_json_path(new_notebook.id.as_str(), new_doc_id);
                let _ = std::fs::copy(&old_json, &new_json);
            }

            store.remap_ids(&doc_id_map, &source_id_map)?;
        }

        Ok(new_notebook)
    }

    // ---- Parsing settings -----------------------------------------------

    pub fn get_parsing_settings(&self, notebook_id: &NotebookId) -> Result<ParsingSettings, RagCoreError> {
        Ok(self.global.lock().unwrap().get_parsing_settings(notebook_id)?)
    }

    pub fn set_parsing_settings(&self, notebook_id: &NotebookId, settings: &ParsingSettings) -> Result<(), RagCoreError> {
        Ok(self.global.lock().unwrap().set_parsing_settings(notebook_id, settings)?)
    }

    // ---- Source lifecycle ------------------------------------------------

    pub fn list_sources(&self, notebook_id: &NotebookId) -> Result<Vec<Source>, RagCoreError> {
        Ok(self.global.lock().unwrap().list_sources(notebook_id)?)
    }

    pub fn get_source(&self, id: &SourceId) -> Result<Option<Source>, RagCoreError> {
        Ok(self.global.lock().unwrap().get_source(id)?)
    }

    /// Copies `source_path` into the notebook's docs directory, uniquifying
    /// its filename against any existing file (`name.ext`, `name_1.ext`, …,
    /// spec §5/§8), and registers a new `Source` row in state `new`.
    pub fn add_source_from_path(&self, notebook_id: &NotebookId, source_path: &Path) -> Result<Source, RagCoreError> {
        let filename = source_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RagCoreError::Extract("upload filename is empty after stripping path".to_string()))?;

        let docs_dir = self.config.docs_dir(notebook_id.as_str());
        std::fs::create_dir_all(&docs_dir)?;
        let unique_name = uniquify_filename(&docs_dir, filename);
        let dest = docs_dir.join(&unique_name);
        std::fs::copy(source_path, &dest)?;

        let size_bytes = std::fs::metadata(&dest)?.len();
        let ext = dest.extension().and_then(|e| e.to_str()).unwrap_or("");
        let sort_order = self.list_sources(notebook_id)?.len() as u32 + 1;

        let source = Source {
            id: SourceId::new(fresh_id("src")),
            notebook_id: notebook_id.clone(),
            original_filename: unique_name,
            on_disk_path: dest.to_string_lossy().to_string(),
            file_kind: FileKind::from_extension(ext),
            size_bytes,
            status: SourceStatus::New,
            enabled: true,
            has_docs: true,
            has_parsing: false,
            has_base: false,
            embeddings_status: EmbeddingsStatus::Unavailable,
            warning: None,
            sort_order,
            parser_override: ParsingSettingsOverride::default(),
            added_at: Utc::now(),
        };
        self.global.lock().unwrap().add_source(&source)?;

        let settings = self.get_parsing_settings(notebook_id)?;
        if settings.auto_parse_on_upload {
            info!(source_id = %source.id, "auto-parse on upload");
        }
        Ok(source)
    }

    pub fn reorder_sources(&self, notebook_id: &NotebookId, ordered_ids: &[SourceId]) -> Result<(), RagCoreError> {
        Ok(self.global.lock().unwrap().reorder_sources(notebook_id, ordered_ids)?)
    }

    pub fn set_source_enabled(&self, id: &SourceId, enabled: bool) -> Result<Source, RagCoreError> {
        let mut source = self
            .get_source(id)?
            .ok_or_else(|| RagCoreError::Store(notebook_store::StoreError::NotFound(format!("source {id}"))))?;
        source.enabled = enabled;
        self.global.lock().unwrap().update_source(&source)?;
        if let Ok(Some(doc)) = self.document_for_source(&source) {
            let store = self.notebook_store(&source.notebook_id)?;
            let _ = store.lock().unwrap().set_document_enabled(&doc.doc_id, enabled);
        }
        Ok(source)
    }

    pub fn set_source_override(&self, id: &SourceId, parser_override: ParsingSettingsOverride) -> Result<Source, RagCoreError> {
        let mut source = self
            .get_source(id)?
            .ok_or_else(|| RagCoreError::Store(notebook_store::StoreError::NotFound(format!("source {id}"))))?;
        source.parser_override = parser_override;
        self.global.lock().unwrap().update_source(&source)?;
        Ok(source)
    }

    fn document_for_source(&self, source: &Source) -> Result<Option<DocumentMetadata>, RagCoreError> {
        let store = self.notebook_store(&source.notebook_id)?;
        Ok(store.lock().unwrap().get_document_by_source(source.id.as_str())?)
    }

    /// `erase-data`: drop the parsed/indexed artefacts but keep the file
    /// and the Source row, returning it to `new` (spec §4.F diagram).
    pub fn erase_source_data(&self, id: &SourceId) -> Result<Source, RagCoreError> {
        let mut source = self
            .get_source(id)?
            .ok_or_else(|| RagCoreError::Store(notebook_store::StoreError::NotFound(format!("source {id}"))))?;

        if let Ok(Some(doc)) = self.document_for_source(&source) {
            let store = self.notebook_store(&source.notebook_id)?;
            store.lock().unwrap().delete_document(&doc.doc_id)?;
            let _ = std::fs::remove_file(self.config.parsing_json_path(source.notebook_id.as_str(), doc.doc_id.as_str()));
        }

        source.status = SourceStatus::New;
        source.has_parsing = false;
        source.has_base = false;
        source.embeddings_status = EmbeddingsStatus::Unavailable;
        source.warning = None;
        self.global.lock().unwrap().update_source(&source)?;
        Ok(source)
    }

    /// `delete-file`: the on-disk original is removed, `has_docs` drops to
    /// `false`, the Source row and its index stay (spec §4.F diagram).
    pub fn delete_source_file(&self, id: &SourceId) -> Result<Source, RagCoreError> {
        let mut source = self
            .get_source(id)?
            .ok_or_else(|| RagCoreError::Store(notebook_store::StoreError::NotFound(format!("source {id}"))))?;
        let _ = std::fs::remove_file(&source.on_disk_path);
        source.has_docs = false;
        self.global.lock().unwrap().update_source(&source)?;
        Ok(source)
    }

    /// `delete-fully`: row, file, parsing JSON, indexed chunks, and saved
    /// citations are all removed; `sort_order` is renumbered densely
    /// `1..=N` afterwards (spec §4.F, §8).
    pub fn delete_source_fully(&self, id: &SourceId) -> Result<(), RagCoreError> {
        let source = self
            .get_source(id)?
            .ok_or_else(|| RagCoreError::Store(notebook_store::StoreError::NotFound(format!("source {id}"))))?;

        if let Ok(Some(doc)) = self.document_for_source(&source) {
            let store = self.notebook_store(&source.notebook_id)?;
            store.lock().unwrap().delete_document(&doc.doc_id)?;
            let _ = std::fs::remove_file(self.config.parsing_json_path(source.notebook_id.as_str(), doc.doc_id.as_str()));
        }
        let _ = std::fs::remove_file(&source.on_disk_path);

        let mut global = self.global.lock().unwrap();
        global.delete_source(id)?;
        global.renumber_sources(&source.notebook_id)?;
        Ok(())
    }

    // ---- Ingestion ---------------------------------------------------

    /// Drives extraction → chunking → embedding → `NotebookStore::upsert_document`
    /// for one source (spec §4.A–§4.D). The blocking extraction/chunking and
    /// storage steps run on `tokio::task::spawn_blocking`; the embedding call
    /// is awaited directly since it is already async I/O (spec §5). Failures
    /// never roll back a prior successful index.
    pub async fn ingest_source(&self, id: &SourceId) -> Result<Source, RagCoreError> {
        let mut source = self
            .get_source(id)?
            .ok_or_else(|| RagCoreError::Store(notebook_store::StoreError::NotFound(format!("source {id}"))))?;

        source.status = SourceStatus::Indexing;
        self.global.lock().unwrap().update_source(&source)?;

        match self.run_ingestion(&source).await {
            Ok((metadata, any_nonzero)) => {
                source.status = SourceStatus::Indexed;
                source.has_parsing = true;
                source.has_base = true;
                source.embeddings_status = if any_nonzero { EmbeddingsStatus::Available } else { EmbeddingsStatus::Unavailable };
                source.warning = if any_nonzero { None } else { Some("embedding server unavailable; chunks indexed without vectors".to_string()) };
                self.global.lock().unwrap().update_source(&source)?;
                info!(source_id = %source.id, total_chunks = metadata.total_chunks, "source indexed");
            }
            Err(err) => {
                source.status = SourceStatus::Failed;
                source.has_base = false;
                source.warning = Some(err.to_string());
                self.global.lock().unwrap().update_source(&source)?;
                error!(source_id = %source.id, error = %err, "ingestion failed");
            }
        }
        Ok(source)
    }

    async fn run_ingestion(&self, source: &Source) -> Result<(DocumentMetadata, bool), RagCoreError> {
        let notebook_settings = self.get_parsing_settings(&source.notebook_id)?;
        let effective = source.parser_override.resolve(&notebook_settings);

        let path = PathBuf::from(&source.on_disk_path);
        let settings_for_extraction = effective.clone();
        let doc_id = DocId::new(fresh_id("doc"));
        let doc_id_for_extraction = doc_id.clone();
        let (chunks, total_pages, file_hash) = tokio::task::spawn_blocking(move || {
            let opts = ExtractOptions {
                ocr_enabled: settings_for_extraction.ocr_enabled,
                ocr_language: settings_for_extraction.ocr_language.clone(),
            };
            let extraction = extract(&path, &opts)?;
            let mut chunks = chunk_blocks(&doc_id_for_extraction, &extraction.blocks, &settings_for_extraction);
            for (index, chunk) in chunks.iter_mut().enumerate() {
                chunk.chunk_index = index as u32;
            }
            let file_hash = doc_pipeline::extractor::sha256_hex(&path)?;
            Ok::<_, RagCoreError>((chunks, extraction.total_pages, file_hash))
        })
        .await
        .map_err(|e| RagCoreError::Extract(e.to_string()))??;

        let texts: Vec<String> = chunks.iter().map(|c| c.text_for_embedding().to_string()).collect();
        let vectors = self.embedder().get_embeddings(&texts).await?;
        let now = Utc::now();
        let model_name = self.config.embedding.model_name.clone();
        let embedded_chunks: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(vectors.into_iter())
            .map(|(chunk, vector)| EmbeddedChunk::new(chunk, vector, model_name.clone(), now))
            .collect();
        let any_nonzero = embedded_chunks.iter().any(|c| !c.embedding_failed);

        let metadata = DocumentMetadata {
            doc_id: doc_id.clone(),
            file_hash,
            size_bytes: source.size_bytes,
            page_count: total_pages,
            total_chunks: embedded_chunks.len() as u32,
            detected_language: None,
            parser_version: corpus_model::SCHEMA_MAJOR.to_string(),
            parsed_at: now,
            effective_settings: effective,
            is_enabled: true,
        };

        self.save_parsing_result(&source.notebook_id, &metadata, &embedded_chunks)?;

        let store = self.notebook_store(&source.notebook_id)?;
        let source_id = source.id.as_str().to_string();
        let metadata_for_store = metadata.clone();
        tokio::task::spawn_blocking(move || store.lock().unwrap().upsert_document(&metadata_for_store, &source_id, &embedded_chunks))
            .await
            .map_err(|e| RagCoreError::Extract(e.to_string()))??;

        Ok((metadata, any_nonzero))
    }

    /// Writes the parsing JSON (`{ "metadata": ..., "chunks": [...] }`,
    /// spec §6) to `data/parsing/{notebook}/{doc_id}.json`.
    fn save_parsing_result(&self, notebook_id: &NotebookId, metadata: &DocumentMetadata, chunks: &[EmbeddedChunk]) -> Result<(), RagCoreError> {
        let dir = self.config.parsing_dir(notebook_id.as_str());
        std::fs::create_dir_all(&dir)?;
        let parsed_chunks: Vec<_> = chunks.iter().map(|c| &c.chunk).collect();
        let body = serde_json::json!({ "metadata": metadata, "chunks": parsed_chunks });
        std::fs::write(self.config.parsing_json_path(notebook_id.as_str(), metadata.doc_id.as_str()), serde_json::to_vec_pretty(&body)?)?;
        Ok(())
    }

    /// Re-runs ingestion for an already-indexed source, replacing its
    /// chunks atomically and keeping the same `doc_id`-owning row (spec
    /// §8: re-parsing yields the same `doc_id`).
    pub async fn reparse_source(&self, id: &SourceId) -> Result<Source, RagCoreError> {
        self.ingest_source(id).await
    }

    pub fn index_status(&self, notebook_id: &NotebookId) -> Result<IndexStatus, RagCoreError> {
        let sources = self.list_sources(notebook_id)?;
        let mut status = IndexStatus::default();
        for source in &sources {
            status.total += 1;
            match source.status {
                SourceStatus::Indexed => status.indexed += 1,
                SourceStatus::Indexing => status.indexing += 1,
                SourceStatus::Failed => status.failed += 1,
                SourceStatus::New => {}
            }
        }
        Ok(status)
    }

    pub fn notebook_store_handle(&self, notebook_id: &NotebookId) -> Result<Arc<StdMutex<NotebookStore>>, RagCoreError> {
        self.notebook_store(notebook_id)
    }

    // ---- Chat history --------------------------------------------------

    pub fn chat_version(&self, notebook_id: &NotebookId) -> u64 {
        let mut chat = self.chat.lock().unwrap();
        chat.entry(notebook_id.as_str().to_string()).or_default().version.load(Ordering::SeqCst)
    }

    pub fn list_messages(&self, notebook_id: &NotebookId) -> Vec<ChatMessage> {
        let mut chat = self.chat.lock().unwrap();
        chat.entry(notebook_id.as_str().to_string()).or_default().messages.clone()
    }

    /// Appends a message only if `at_version` still matches the current
    /// `chat_version` (spec §4.H cancellation / §8 invariant). Returns the
    /// message id on success, `None` if the history was cleared meanwhile.
    pub fn append_message_if_current(&self, notebook_id: &NotebookId, at_version: u64, role: ChatRole, content: String) -> Option<String> {
        let mut chat = self.chat.lock().unwrap();
        let state = chat.entry(notebook_id.as_str().to_string()).or_default();
        if state.version.load(Ordering::SeqCst) != at_version {
            return None;
        }
        let id = fresh_id("msg");
        state.messages.push(ChatMessage {
            id: id.clone(),
            notebook_id: notebook_id.clone(),
            role,
            content,
            created_at: Utc::now(),
        });
        Some(id)
    }

    /// Clears a notebook's chat history and bumps `chat_version`,
    /// implicitly cancelling any in-flight stream for it (spec §4.H, §5).
    pub fn clear_messages(&self, notebook_id: &NotebookId) {
        let mut chat = self.chat.lock().unwrap();
        let state = chat.entry(notebook_id.as_str().to_string()).or_default();
        state.messages.clear();
        state.version.fetch_add(1, Ordering::SeqCst);
        warn!(notebook_id = %notebook_id, "chat history cleared; chat_version advanced");
    }
}

/// Reduces a filename to its last path component and uniquifies it against
/// siblings already in `dir`: `name.ext`, `name_1.ext`, `name_2.ext`, …
/// (spec §5, §8 scenario 6).
fn uniquify_filename(dir: &Path, filename: &str) -> String {
    let candidate = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    if !dir.join(&candidate).exists() {
        return candidate;
    }
    let path = Path::new(&candidate);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("upload");
    let ext = path.extension().and_then(|e| e.to_str());
    for n in 1.. {
        let next = match ext {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        };
        if !dir.join(&next).exists() {
            return next;
        }
    }
    unreachable!()
}

fn fresh_id(prefix: &str) -> String {
    format!("{prefix}_{:x}", Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64 ^ (std::process::id() as u64).rotate_left(17))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_config() -> Arc<AppConfig> {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::from_env();
        config.data_dir = dir.into_path();
        Arc::new(config)
    }

    fn test_orchestrator() -> Orchestrator {
        let config = test_config();
        let embedder = Arc::new(EmbeddingClient::new(config.embedding.clone(), false));
        Orchestrator::new(config, embedder).unwrap()
    }

    #[test]
    fn seeds_one_empty_notebook_on_fresh_store() {
        let orch = test_orchestrator();
        let notebooks = orch.list_notebooks().unwrap();
        assert_eq!(notebooks.len(), 1);
    }

    #[test]
    fn uniquify_filename_avoids_collisions() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("file.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("file_1.txt"), b"b").unwrap();
        let name = uniquify_filename(dir.path(), "file.txt");
        assert_eq!(name, "file_2.txt");
    }

    #[test]
    fn add_source_uniquifies_on_repeat_upload() {
        let orch = test_orchestrator();
        let notebook = orch.create_notebook("nb").unwrap();
        let tmp = tempdir().unwrap();
        let upload = tmp.path().join("file.txt");
        std::fs::write(&upload, b"hello").unwrap();

        let first = orch.add_source_from_path(&notebook.id, &upload).unwrap();
        let second = orch.add_source_from_path(&notebook.id, &upload).unwrap();
        assert_eq!(first.original_filename, "file.txt");
        assert_eq!(second.original_filename, "file_1.txt");
    }

    #[tokio::test]
    async fn ingest_text_source_produces_indexed_status() {
        let orch = test_orchestrator();
        let notebook = orch.create_notebook("nb").unwrap();
        let tmp = tempdir().unwrap();
        let upload = tmp.path().join("notes.txt");
        std::fs::write(&upload, "# Heading\nSome body text about retrieval augmented generation.\n").unwrap();

        let source = orch.add_source_from_path(&notebook.id, &upload).unwrap();
        let indexed = orch.ingest_source(&source.id).await.unwrap();
        assert_eq!(indexed.status, SourceStatus::Indexed);
        assert!(indexed.has_parsing);
        assert!(indexed.has_base);
    }

    #[test]
    fn delete_fully_renumbers_sort_order_densely() {
        let orch = test_orchestrator();
        let notebook = orch.create_notebook("nb").unwrap();
        let tmp = tempdir().unwrap();
        let mut ids = Vec::new();
        for i in 0..3 {
            let path = tmp.path().join(format!("f{i}.txt"));
            std::fs::write(&path, "text").unwrap();
            ids.push(orch.add_source_from_path(&notebook.id, &path).unwrap().id);
        }
        orch.delete_source_fully(&ids[1]).unwrap();
        let remaining = orch.list_sources(&notebook.id).unwrap();
        let orders: Vec<u32> = remaining.iter().map(|s| s.sort_order).collect();
        assert_eq!(orders, vec![1, 2]);
    }

    #[test]
    fn clearing_chat_history_advances_version() {
        let orch = test_orchestrator();
        let notebook = orch.create_notebook("nb").unwrap();
        let v0 = orch.chat_version(&notebook.id);
        orch.append_message_if_current(&notebook.id, v0, ChatRole::User, "hi".to_string());
        orch.clear_messages(&notebook.id);
        let v1 = orch.chat_version(&notebook.id);
        assert!(v1 > v0);
        assert!(orch.list_messages(&notebook.id).is_empty());
    }

    #[test]
    fn stale_version_drops_append() {
        let orch = test_orchestrator();
        let notebook = orch.create_notebook("nb").unwrap();
        let v0 = orch.chat_version(&notebook.id);
        orch.clear_messages(&notebook.id);
        let result = orch.append_message_if_current(&notebook.id, v0, ChatRole::Assistant, "late".to_string());
        assert!(result.is_none());
    }
}
