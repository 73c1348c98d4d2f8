//! Extractor (spec §4.A): converts a file into an ordered sequence of
//! semantic blocks with page/location metadata. Block order is the sole
//! semantic anchor downstream — the Chunker never re-sorts blocks.

pub mod docx;
pub mod ocr;
pub mod pdf;
pub mod text;
pub mod xlsx;

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    Heading,
    Table,
    Formula,
}

/// A single semantic unit extracted from a source file, in source order.
#[derive(Debug, Clone)]
pub struct Block {
    pub kind: BlockKind,
    pub text: String,
    pub page_number: Option<u32>,
    /// Heading nesting level, 1-based, only meaningful when `kind ==
    /// Heading`.
    pub heading_level: Option<u32>,
    pub section_header: Option<String>,
}

impl Block {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Text,
            text: text.into(),
            page_number: None,
            heading_level: None,
            section_header: None,
        }
    }

    pub fn heading(text: impl Into<String>, level: u32) -> Self {
        Self {
            kind: BlockKind::Heading,
            text: text.into(),
            page_number: None,
            heading_level: Some(level),
            section_header: None,
        }
    }

    pub fn table(text: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Table,
            text: text.into(),
            page_number: None,
            heading_level: None,
            section_header: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("OCR required but unavailable for {0}")]
    OcrUnavailable(String),
}

pub struct ExtractOptions {
    pub ocr_enabled: bool,
    pub ocr_language: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            ocr_language: "eng".to_string(),
        }
    }
}

/// Output of extraction: the block sequence plus total page count when the
/// format is paginated (PDF); `None` for single-logical-page formats.
pub struct Extraction {
    pub blocks: Vec<Block>,
    pub total_pages: Option<u32>,
}

/// Dispatch by file suffix (spec §4.A).
pub fn extract(path: &Path, opts: &ExtractOptions) -> Result<Extraction, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::FileNotFound(path.display().to_string()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "txt" | "md" => text::extract_text(path),
        "docx" => docx::extract_docx(path),
        "pdf" => pdf::extract_pdf(path, opts),
        "xlsx" | "xls" | "ods" => xlsx::extract_xlsx(path),
        "html" | "epub" => Err(ExtractError::UnsupportedFormat(ext)),
        other => Err(ExtractError::UnsupportedFormat(other.to_string())),
    }
}

/// SHA-256 hex digest of a file's bytes, used to populate
/// `DocumentMetadata::file_hash`.
pub fn sha256_hex(path: &Path) -> std::io::Result<String> {
    use sha2::Digest;
    use std::io::Read;

    let f = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(f);
    let mut hasher = sha2::Sha256::new();
    let mut buf = [0u8; 32 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
