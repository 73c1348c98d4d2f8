use std::collections::HashMap;

use corpus_model::{ChunkType, DocId, ParsedChunk};
use notebook_store::ScoredChunk;
use serde::Serialize;

/// Reciprocal Rank Fusion constant: a result's contribution from one ranked
/// list is `1 / (RRF_K + rank)`, rank starting at 1.
pub const RRF_K: f64 = 60.0;

#[derive(Debug, Clone)]
pub struct FusedChunk {
    pub chunk: ParsedChunk,
    pub doc_id: DocId,
    pub rrf_score: f64,
}

/// Fuses a full-text ranked list and a vector-similarity ranked list by
/// Reciprocal Rank Fusion. Each list is assumed already sorted best-first;
/// only rank position matters, not the underlying text/cosine scores,
/// which are not comparable across the two retrieval methods.
pub fn fuse(text_ranked: &[ScoredChunk], vector_ranked: &[ScoredChunk], top_k: usize) -> Vec<FusedChunk> {
    let mut fused: HashMap<String, FusedChunk> = HashMap::new();

    for (rank, hit) in text_ranked.iter().enumerate() {
        accumulate(&mut fused, hit, rank + 1);
    }
    for (rank, hit) in vector_ranked.iter().enumerate() {
        accumulate(&mut fused, hit, rank + 1);
    }

    let mut results: Vec<FusedChunk> = fused.into_values().collect();
    results.sort_by(|a, b| b.rrf_score.partial_cmp(&a.rrf_score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(top_k);
    results
}

fn accumulate(fused: &mut HashMap<String, FusedChunk>, hit: &ScoredChunk, rank: usize) {
    let contribution = 1.0 / (RRF_K + rank as f64);
    fused
        .entry(hit.chunk.chunk_id.as_str().to_string())
        .and_modify(|f| f.rrf_score += contribution)
        .or_insert_with(|| FusedChunk {
            chunk: hit.chunk.clone(),
            doc_id: hit.doc_id.clone(),
            rrf_score: contribution,
        });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Strong fused relevance: answer is grounded in retrieved chunks and
    /// every claim must carry a citation.
    Rag,
    /// Weak fused relevance: retrieved chunks are offered as background
    /// but the answer leans on model knowledge.
    Model,
    /// No usable retrieval: answered from model/agent knowledge alone, no
    /// citations are possible.
    Agent,
}

pub fn decide_mode(top_score: Option<f64>, rag_threshold: f32, model_threshold: f32) -> RetrievalMode {
    match top_score {
        Some(score) if score >= rag_threshold as f64 => RetrievalMode::Rag,
        Some(score) if score >= model_threshold as f64 => RetrievalMode::Model,
        _ => RetrievalMode::Agent,
    }
}

/// The retrieval contract a surviving fused chunk is projected onto (spec
/// §4.G step 4). `section_id` is the chunk's own id: chunks carry no
/// separate section identifier, so the chunk id is the stable handle a
/// client can use to fetch the same passage again.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedPassage {
    pub source_id: String,
    pub source: String,
    pub page: Option<u32>,
    pub section_id: String,
    pub section_title: Option<String>,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub doc_id: String,
    pub score: f64,
}

pub fn chunk_type_str(kind: ChunkType) -> &'static str {
    match kind {
        ChunkType::Text => "text",
        ChunkType::Table => "table",
        ChunkType::Formula => "formula",
        ChunkType::Heading => "heading",
        ChunkType::Caption => "caption",
    }
}

/// Projects one fused chunk onto the retrieval contract, looking up the
/// owning source's id and filename from `doc_lookup` (built by the caller
/// from `GlobalStore::list_sources` + `NotebookStore::list_doc_source_pairs`).
pub fn project_chunk(fused: &FusedChunk, doc_lookup: &HashMap<String, (String, String)>) -> RetrievedPassage {
    let (source_id, source_name) = doc_lookup
        .get(fused.doc_id.as_str())
        .cloned()
        .unwrap_or_else(|| (String::new(), String::new()));
    RetrievedPassage {
        source_id,
        source: source_name,
        page: fused.chunk.page_number,
        section_id: fused.chunk.chunk_id.as_str().to_string(),
        section_title: fused.chunk.section_header.clone(),
        text: fused.chunk.text.clone(),
        kind: chunk_type_str(fused.chunk.chunk_type),
        doc_id: fused.doc_id.as_str().to_string(),
        score: fused.rrf_score,
    }
}

/// Normalises scores so the maximum equals 1.0; if every score is zero
/// (the FTS-only degenerate case), assigns 1.0 to all (spec §4.G step 5).
pub fn normalize_scores(passages: &mut [RetrievedPassage]) {
    let max = passages.iter().map(|p| p.score).fold(0.0_f64, f64::max);
    if max <= 0.0 {
        for p in passages.iter_mut() {
            p.score = 1.0;
        }
        return;
    }
    for p in passages.iter_mut() {
        p.score /= max;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use corpus_model::{ChunkId, ChunkType};

    fn chunk(id: &str, text: &str) -> ParsedChunk {
        ParsedChunk {
            chunk_id: ChunkId::new(id.to_string()),
            doc_id: DocId::new("doc1".to_string()),
            chunk_index: 0,
            chunk_type: ChunkType::Text,
            page_number: None,
            section_header: None,
            parent_header: None,
            prev_tail: None,
            next_head: None,
            text: text.to_string(),
            embedding_text: None,
            parent_chunk_id: None,
        }
    }

    fn hit(id: &str) -> ScoredChunk {
        let _ = Utc::now();
        ScoredChunk { chunk: chunk(id, id), doc_id: DocId::new("doc1".to_string()), score: 1.0 }
    }

    #[test]
    fn chunk_ranked_first_in_both_lists_wins() {
        let text = vec![hit("a"), hit("b")];
        let vector = vec![hit("a"), hit("c")];
        let fused = fuse(&text, &vector, 10);
        assert_eq!(fused[0].chunk.chunk_id.as_str(), "a");
        let expected = 2.0 / (RRF_K + 1.0);
        assert!((fused[0].rrf_score - expected).abs() < 1e-9);
    }

    #[test]
    fn result_only_in_one_list_still_included() {
        let text = vec![hit("a")];
        let vector: Vec<ScoredChunk> = vec![];
        let fused = fuse(&text, &vector, 10);
        assert_eq!(fused.len(), 1);
    }

    #[test]
    fn mode_thresholds_select_rag_model_or_agent() {
        assert_eq!(decide_mode(Some(0.8), 0.75, 0.50), RetrievalMode::Rag);
        assert_eq!(decide_mode(Some(0.6), 0.75, 0.50), RetrievalMode::Model);
        assert_eq!(decide_mode(Some(0.1), 0.75, 0.50), RetrievalMode::Agent);
        assert_eq!(decide_mode(None, 0.75, 0.50), RetrievalMode::Agent);
    }

    #[test]
    fn rrf_fusion_worked_example_orders_by_combined_rank() {
        let vector = vec![hit("a"), hit("b"), hit("c")];
        let text = vec![hit("c"), hit("a"), hit("d")];
        let fused = fuse(&text, &vector, 3);
        let ids: Vec<&str> = fused.iter().map(|f| f.chunk.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn project_chunk_looks_up_source_and_maps_chunk_type() {
        let fused = FusedChunk { chunk: chunk("c1", "hello"), doc_id: DocId::new("doc1".to_string()), rrf_score: 0.5 };
        let mut lookup = HashMap::new();
        lookup.insert("doc1".to_string(), ("src1".to_string(), "file.txt".to_string()));
        let passage = project_chunk(&fused, &lookup);
        assert_eq!(passage.source_id, "src1");
        assert_eq!(passage.source, "file.txt");
        assert_eq!(passage.kind, "text");
        assert_eq!(passage.section_id, "c1");
    }

    #[test]
    fn normalize_scores_scales_to_unit_max() {
        let mut passages = vec![
            RetrievedPassage { source_id: "s".into(), source: "s".into(), page: None, section_id: "1".into(), section_title: None, text: "a".into(), kind: "text", doc_id: "d".into(), score: 0.5 },
            RetrievedPassage { source_id: "s".into(), source: "s".into(), page: None, section_id: "2".into(), section_title: None, text: "b".into(), kind: "text", doc_id: "d".into(), score: 0.25 },
        ];
        normalize_scores(&mut passages);
        assert!((passages[0].score - 1.0).abs() < 1e-9);
        assert!((passages[1].score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn normalize_scores_all_zero_degenerates_to_one() {
        let mut passages = vec![RetrievedPassage {
            source_id: "s".into(), source: "s".into(), page: None, section_id: "1".into(), section_title: None, text: "a".into(), kind: "text", doc_id: "d".into(), score: 0.0,
        }];
        normalize_scores(&mut passages);
        assert_eq!(passages[0].score, 1.0);
    }
}
