use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use super::{Block, ExtractError, Extraction};

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6} .+)|(\d+(\.\d+)* .+)$").expect("valid regex"))
}

/// `.txt` / `.md`: line scan; a line matching the heading pattern becomes a
/// heading block, others text. Single logical page (spec §4.A).
pub fn extract_text(path: &Path) -> Result<Extraction, ExtractError> {
    let raw = std::fs::read(path).map_err(|e| ExtractError::ParseError(e.to_string()))?;
    let (content, _, _) = encoding_rs::UTF_8.decode(&raw);

    let mut blocks = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let block = if heading_re().is_match(line) {
            let level = line.chars().take_while(|c| *c == '#').count().max(1) as u32;
            Block::heading(line.trim_start_matches('#').trim(), level.min(6))
        } else {
            Block::text(line.to_string())
        };
        blocks.push(block);
    }
    if blocks.is_empty() {
        blocks.push(Block::text(String::new()));
    }
    Ok(Extraction {
        blocks,
        total_pages: Some(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_heading_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "# Title\nbody line\n1.2 numbered heading\n").unwrap();
        let out = extract_text(&path).unwrap();
        assert_eq!(out.blocks.len(), 3);
        assert_eq!(out.blocks[0].kind, super::super::BlockKind::Heading);
        assert_eq!(out.blocks[1].kind, super::super::BlockKind::Text);
        assert_eq!(out.blocks[2].kind, super::super::BlockKind::Heading);
    }
}
