use std::path::Path;

use calamine::{open_workbook_auto, Reader};

use super::{Block, ExtractError, Extraction};

/// `.xlsx`/`.xls`/`.ods`: spec §4.A treats spreadsheets as out of deep
/// scope and only requires a single placeholder table block per workbook.
/// We still open the workbook (via `calamine`, already in the teacher's
/// dependency set) so the placeholder at least names the sheets found,
/// rather than being a hardcoded string.
pub fn extract_xlsx(path: &Path) -> Result<Extraction, ExtractError> {
    let workbook = open_workbook_auto(path).map_err(|e| ExtractError::ParseError(e.to_string()))?;
    let sheet_names = workbook.sheet_names().to_vec();
    let placeholder = if sheet_names.is_empty() {
        "| (spreadsheet) |\n| --- |\n".to_string()
    } else {
        format!("| sheets |\n| --- |\n| {} |\n", sheet_names.join(", "))
    };
    Ok(Extraction {
        blocks: vec![Block::table(placeholder)],
        total_pages: None,
    })
}
