//! Pluggable OCR backend (spec §4.A OCR path). The concrete engine is not
//! pinned by the specification; this defines the trait boundary and a real
//! Tesseract-backed implementation behind the `ocr` feature.

use super::ExtractError;

/// A rasterised, pre-processed page image ready for text recognition.
pub struct OcrPage {
    pub width: u32,
    pub height: u32,
    /// 8-bit grayscale, row-major.
    pub gray: Vec<u8>,
}

pub trait OcrEngine: Send + Sync {
    fn recognize(&self, page: &OcrPage, language: &str) -> Result<String, ExtractError>;
}

#[cfg(feature = "ocr")]
pub struct TesseractOcrEngine;

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractOcrEngine {
    fn recognize(&self, page: &OcrPage, language: &str) -> Result<String, ExtractError> {
        use leptess::{LepTess, Variables};

        let mut lt = LepTess::new(None, language)
            .map_err(|e| ExtractError::ParseError(format!("tesseract init: {e}")))?;
        lt.set_variable(Variables::TesseditPagesegMode, "1")
            .map_err(|e| ExtractError::ParseError(format!("tesseract config: {e}")))?;
        lt.set_image_from_mem(&page.gray)
            .map_err(|e| ExtractError::ParseError(format!("tesseract image: {e}")))?;
        lt.get_utf8_text()
            .map_err(|e| ExtractError::ParseError(format!("tesseract recognize: {e}")))
    }
}

/// Returns the compiled-in OCR engine, or `None` when the `ocr` feature is
/// disabled — in which case callers must surface `ExtractError::OcrUnavailable`
/// rather than silently skip the page (spec §4.A failure modes).
pub fn default_engine() -> Option<Box<dyn OcrEngine>> {
    #[cfg(feature = "ocr")]
    {
        Some(Box::new(TesseractOcrEngine))
    }
    #[cfg(not(feature = "ocr"))]
    {
        None
    }
}
