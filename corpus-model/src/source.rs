use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{NotebookId, SourceId};
use crate::parsing_settings::ParsingSettingsOverride;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Pdf,
    Docx,
    Xlsx,
    Other,
}

impl FileKind {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => FileKind::Pdf,
            "docx" => FileKind::Docx,
            "xlsx" | "xls" | "ods" => FileKind::Xlsx,
            _ => FileKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    New,
    Indexing,
    Indexed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingsStatus {
    Available,
    Unavailable,
}

/// A file bound to exactly one notebook (spec §3).
///
/// Invariant: `status == Indexed` implies `has_parsing && has_base`.
/// Invariant: `embeddings_status == Available` implies at least one
/// non-zero embedding vector exists among the source's chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub notebook_id: NotebookId,
    pub original_filename: String,
    pub on_disk_path: String,
    pub file_kind: FileKind,
    pub size_bytes: u64,
    pub status: SourceStatus,
    pub enabled: bool,
    pub has_docs: bool,
    pub has_parsing: bool,
    pub has_base: bool,
    pub embeddings_status: EmbeddingsStatus,
    pub warning: Option<String>,
    pub sort_order: u32,
    pub parser_override: ParsingSettingsOverride,
    pub added_at: DateTime<Utc>,
}

impl Source {
    /// Enforce the `status == Indexed ⇒ has_parsing ∧ has_base` invariant;
    /// called after every lifecycle transition so a bug can't silently
    /// persist an inconsistent row.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.status == SourceStatus::Indexed && !(self.has_parsing && self.has_base) {
            return Err(format!(
                "source {} is Indexed but has_parsing={} has_base={}",
                self.id, self.has_parsing, self.has_base
            ));
        }
        Ok(())
    }
}
