use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::DocId;
use crate::parsing_settings::ParsingSettings;

/// Per-parsed-document metadata (spec §3). Serialised as part of the
/// parsing JSON (`{ "metadata": DocumentMetadata, "chunks": [ParsedChunk] }`,
/// spec §6) and mirrored into the `documents` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub doc_id: DocId,
    pub file_hash: String,
    pub size_bytes: u64,
    pub page_count: Option<u32>,
    pub total_chunks: u32,
    pub detected_language: Option<String>,
    pub parser_version: String,
    pub parsed_at: DateTime<Utc>,
    pub effective_settings: ParsingSettings,
    pub is_enabled: bool,
}
