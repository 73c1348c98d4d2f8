use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingMethod {
    General,
    ContextEnrichment,
    Hierarchy,
    Pcr,
    Symbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    TechnicalManual,
    Gost,
    ApiDocs,
    Markdown,
}

/// Per-notebook chunking defaults (spec §3). A per-source override uses the
/// same shape with every field `Option`-wrapped; `effective.F = override.F if
/// override.F is Some else notebook_settings.F` (spec §4.F merge rule).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsingSettings {
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub min_chunk_size: u32,
    pub ocr_enabled: bool,
    pub ocr_language: String,
    pub auto_parse_on_upload: bool,
    pub chunking_method: ChunkingMethod,
    pub context_window: u32,
    pub use_llm_summary: bool,
    pub doc_type: DocType,
    pub parent_chunk_size: u32,
    pub child_chunk_size: u32,
    pub symbol_separator: String,
}

impl Default for ParsingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 64,
            min_chunk_size: 128,
            ocr_enabled: true,
            ocr_language: "eng".to_string(),
            auto_parse_on_upload: true,
            chunking_method: ChunkingMethod::General,
            context_window: 200,
            use_llm_summary: false,
            doc_type: DocType::TechnicalManual,
            parent_chunk_size: 1024,
            child_chunk_size: 256,
            symbol_separator: "\n\n".to_string(),
        }
    }
}

/// Per-source override. Every field is `None` by default, meaning "inherit
/// from the notebook's `ParsingSettings`" (spec §9, Open Question i — a
/// `None` is inheritance, never an implicit disable).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsingSettingsOverride {
    pub chunk_size: Option<u32>,
    pub chunk_overlap: Option<u32>,
    pub min_chunk_size: Option<u32>,
    pub ocr_enabled: Option<bool>,
    pub ocr_language: Option<String>,
    pub auto_parse_on_upload: Option<bool>,
    pub chunking_method: Option<ChunkingMethod>,
    pub context_window: Option<u32>,
    pub use_llm_summary: Option<bool>,
    pub doc_type: Option<DocType>,
    pub parent_chunk_size: Option<u32>,
    pub child_chunk_size: Option<u32>,
    pub symbol_separator: Option<String>,
}

impl ParsingSettingsOverride {
    /// Merge this override onto notebook defaults, field by field.
    pub fn resolve(&self, base: &ParsingSettings) -> ParsingSettings {
        ParsingSettings {
            chunk_size: self.chunk_size.unwrap_or(base.chunk_size),
            chunk_overlap: self.chunk_overlap.unwrap_or(base.chunk_overlap),
            min_chunk_size: self.min_chunk_size.unwrap_or(base.min_chunk_size),
            ocr_enabled: self.ocr_enabled.unwrap_or(base.ocr_enabled),
            ocr_language: self
                .ocr_language
                .clone()
                .unwrap_or_else(|| base.ocr_language.clone()),
            auto_parse_on_upload: self.auto_parse_on_upload.unwrap_or(base.auto_parse_on_upload),
            chunking_method: self.chunking_method.unwrap_or(base.chunking_method),
            context_window: self.context_window.unwrap_or(base.context_window),
            use_llm_summary: self.use_llm_summary.unwrap_or(base.use_llm_summary),
            doc_type: self.doc_type.unwrap_or(base.doc_type),
            parent_chunk_size: self.parent_chunk_size.unwrap_or(base.parent_chunk_size),
            child_chunk_size: self.child_chunk_size.unwrap_or(base.child_chunk_size),
            symbol_separator: self
                .symbol_separator
                .clone()
                .unwrap_or_else(|| base.symbol_separator.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_inherits_unset_fields() {
        let base = ParsingSettings::default();
        let over = ParsingSettingsOverride {
            chunk_size: Some(999),
            ..Default::default()
        };
        let effective = over.resolve(&base);
        assert_eq!(effective.chunk_size, 999);
        assert_eq!(effective.chunk_overlap, base.chunk_overlap);
        assert_eq!(effective.ocr_enabled, base.ocr_enabled);
    }
}
