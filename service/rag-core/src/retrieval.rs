//! `Orchestrator::retrieve` (spec §4.G): the HybridSearch pipeline —
//! embed query, fan out to vector + FTS, fuse by RRF, project, normalise,
//! threshold.

use std::collections::HashMap;

use corpus_model::NotebookId;
use notebook_store::VisibilityFilter;

use crate::error::RagCoreError;
use crate::hybrid_search::{decide_mode, fuse, project_chunk, RetrievalMode, RetrievedPassage};
use crate::orchestrator::Orchestrator;

impl Orchestrator {
    /// Runs the full retrieval pipeline for `query` against `notebook_id`,
    /// restricted to `selected_source_ids` when given, and applies the
    /// threshold for `mode`. `top_n` bounds the final result count; the
    /// fan-out to each underlying search is `3 * top_n` (spec §4.G).
    pub async fn retrieve(
        &self,
        notebook_id: &NotebookId,
        query: &str,
        selected_source_ids: Option<Vec<String>>,
        top_n: usize,
        mode: RetrievalMode,
    ) -> Result<Vec<RetrievedPassage>, RagCoreError> {
        let fan_out = top_n.saturating_mul(3).max(1);
        let filter = VisibilityFilter { selected_source_ids: selected_source_ids.clone(), exclude_disabled_tags: true };

        let query_vector = self.embedder().get_embeddings(&[query.to_string()]).await?.into_iter().next().unwrap_or_default();
        let vector_available = query_vector.iter().any(|c| *c != 0.0);

        let store = self.notebook_store_handle(notebook_id)?;
        let store_for_search = store.clone();
        let query_owned = query.to_string();
        let filter_for_search = filter.clone();
        let (text_ranked, vector_ranked) = tokio::task::spawn_blocking(move || {
            let store = store_for_search.lock().unwrap();
            let text_ranked = store.search_fts(&query_owned, fan_out, &filter_for_search)?;
            let vector_ranked = if vector_available {
                store.search_vector(&query_vector, fan_out, &filter_for_search)?
            } else {
                Vec::new()
            };
            Ok::<_, RagCoreError>((text_ranked, vector_ranked))
        })
        .await
        .map_err(|e| RagCoreError::Extract(e.to_string()))??;

        let fused = fuse(&text_ranked, &vector_ranked, top_n);

        let doc_lookup = self.source_lookup(notebook_id)?;
        let mut passages: Vec<RetrievedPassage> = fused.iter().map(|f| project_chunk(f, &doc_lookup)).collect();
        crate::hybrid_search::normalize_scores(&mut passages);

        let threshold = match mode {
            RetrievalMode::Rag => Some(self.config.rag_score_threshold as f64),
            RetrievalMode::Model => Some(self.config.model_score_threshold as f64),
            RetrievalMode::Agent => None,
        };
        if let Some(threshold) = threshold {
            passages.retain(|p| p.score >= threshold);
        }

        Ok(passages)
    }

    /// Builds a `doc_id -> (source_id, original_filename)` lookup by
    /// joining `GlobalStore::list_sources` against
    /// `NotebookStore::list_doc_source_pairs` on `source_id`.
    fn source_lookup(&self, notebook_id: &NotebookId) -> Result<HashMap<String, (String, String)>, RagCoreError> {
        let sources = self.list_sources(notebook_id)?;
        let filenames: HashMap<String, String> = sources.iter().map(|s| (s.id.as_str().to_string(), s.original_filename.clone())).collect();

        let store = self.notebook_store_handle(notebook_id)?;
        let pairs = store.lock().unwrap().list_doc_source_pairs()?;

        let mut lookup = HashMap::new();
        for (doc_id, source_id) in pairs {
            let filename = filenames.get(&source_id).cloned().unwrap_or_default();
            lookup.insert(doc_id, (source_id, filename));
        }
        Ok(lookup)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use embedding_client::EmbeddingClient;
    use tempfile::tempdir;

    use crate::config::AppConfig;
    use crate::hybrid_search::RetrievalMode;
    use crate::orchestrator::Orchestrator;

    fn test_orchestrator() -> Orchestrator {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::from_env();
        config.data_dir = dir.into_path();
        let config = Arc::new(config);
        let embedder = Arc::new(EmbeddingClient::new(config.embedding.clone(), false));
        Orchestrator::new(config, embedder).unwrap()
    }

    #[tokio::test]
    async fn retrieve_finds_indexed_text_in_agent_mode() {
        let orch = test_orchestrator();
        let notebook = orch.create_notebook("nb").unwrap();
        let tmp = tempdir().unwrap();
        let upload = tmp.path().join("notes.txt");
        std::fs::write(&upload, "hybrid search combines lexical and dense retrieval.\n").unwrap();
        let source = orch.add_source_from_path(&notebook.id, &upload).unwrap();
        orch.ingest_source(&source.id).await.unwrap();

        let passages = orch.retrieve(&notebook.id, "hybrid search", None, 5, RetrievalMode::Agent).await.unwrap();
        assert!(!passages.is_empty());
        assert_eq!(passages[0].source_id, source.id.as_str());
    }

    #[tokio::test]
    async fn retrieve_applies_rag_threshold_without_embeddings() {
        let orch = test_orchestrator();
        let notebook = orch.create_notebook("nb").unwrap();
        let tmp = tempdir().unwrap();
        let upload = tmp.path().join("notes.txt");
        std::fs::write(&upload, "unrelated filler content with no overlap.\n").unwrap();
        let source = orch.add_source_from_path(&notebook.id, &upload).unwrap();
        orch.ingest_source(&source.id).await.unwrap();

        let passages = orch.retrieve(&notebook.id, "completely different query text", None, 5, RetrievalMode::Rag).await.unwrap();
        // With embeddings disabled, FTS-only scores degenerate to 1.0 when any
        // candidate survives the newest-rows fallback, so the rag threshold
        // either keeps everything or (query truly unmatched) nothing.
        assert!(passages.is_empty() || passages.iter().all(|p| p.score >= orch.config.rag_score_threshold as f64));
    }
}
