use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChunkId, DocId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Text,
    Table,
    Formula,
    Heading,
    Caption,
}

/// The output of the Chunker (spec §4.B). `chunk_index` is dense 0..N-1
/// within a document (an invariant enforced by the post-strategy
/// renumbering pass every chunker runs before returning).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedChunk {
    pub chunk_id: ChunkId,
    pub doc_id: DocId,
    pub chunk_index: u32,
    pub chunk_type: ChunkType,
    pub page_number: Option<u32>,
    pub section_header: Option<String>,
    pub parent_header: Option<String>,
    pub prev_tail: Option<String>,
    pub next_head: Option<String>,
    pub text: String,
    /// Distinct text handed to the embedder for Context-Enrichment/PCR
    /// strategies; `None` means "embed `text` as-is".
    pub embedding_text: Option<String>,
    /// PCR soft linkage to a synthetic, non-materialised parent chunk id.
    pub parent_chunk_id: Option<String>,
}

impl ParsedChunk {
    /// Text that the embedder must vectorise: `embedding_text` when set,
    /// otherwise `text` itself (spec §4.B.2, §4.B.4).
    pub fn text_for_embedding(&self) -> &str {
        self.embedding_text.as_deref().unwrap_or(&self.text)
    }
}

/// `ParsedChunk` plus its dense vector (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: ParsedChunk,
    pub vector: Vec<f32>,
    pub embedding_model: String,
    pub embedded_at: DateTime<Utc>,
    pub embedding_failed: bool,
}

impl EmbeddedChunk {
    pub fn new(chunk: ParsedChunk, vector: Vec<f32>, embedding_model: String, now: DateTime<Utc>) -> Self {
        let embedding_failed = vector.iter().all(|c| *c == 0.0);
        Self {
            chunk,
            vector,
            embedding_model,
            embedded_at: now,
            embedding_failed,
        }
    }
}
