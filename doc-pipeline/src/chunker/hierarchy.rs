use std::collections::BTreeMap;
use std::sync::OnceLock;

use corpus_model::{ChunkType, DocId, DocType, ParsedChunk};
use regex::Regex;

use crate::extractor::{Block, BlockKind};

use super::general::{chunk_text_block, new_text_chunk_pub, reassign_dense_index};
use super::tokens::TokenCounter;

struct LevelPattern {
    level: u32,
    re: Regex,
}

fn patterns_for(doc_type: DocType) -> &'static Vec<LevelPattern> {
    static TECHNICAL_MANUAL: OnceLock<Vec<LevelPattern>> = OnceLock::new();
    static GOST: OnceLock<Vec<LevelPattern>> = OnceLock::new();
    static API_DOCS: OnceLock<Vec<LevelPattern>> = OnceLock::new();
    static MARKDOWN: OnceLock<Vec<LevelPattern>> = OnceLock::new();

    fn build(pairs: &[(&str, u32)]) -> Vec<LevelPattern> {
        pairs
            .iter()
            .map(|(p, level)| LevelPattern {
                level: *level,
                re: Regex::new(p).expect("valid pattern"),
            })
            .collect()
    }

    match doc_type {
        DocType::TechnicalManual => TECHNICAL_MANUAL.get_or_init(|| {
            build(&[
                (r"^\d+\. .+$", 1),
                (r"^\d+\.\d+ .+$", 2),
                (r"^\d+\.\d+\.\d+ .+$", 3),
            ])
        }),
        DocType::Gost => GOST.get_or_init(|| {
            build(&[
                (r"^[А-Я0-9]+\. .+$", 1),
                (r"^\d+\.\d+ .+$", 2),
            ])
        }),
        DocType::ApiDocs => API_DOCS.get_or_init(|| {
            build(&[
                (r"^# .+$", 1),
                (r"^## .+$", 2),
                (r"^### .+$", 3),
            ])
        }),
        DocType::Markdown => MARKDOWN.get_or_init(|| {
            build(&[
                (r"^# .+$", 1),
                (r"^## .+$", 2),
                (r"^### .+$", 3),
                (r"^#### .+$", 4),
            ])
        }),
    }
}

pub struct HierarchyParams {
    pub chunk_size: u32,
    pub min_chunk_size: u32,
    pub doc_type: DocType,
}

/// Hierarchy chunker (spec §4.B.3). Maintains a level→title map; on a
/// recognised heading, flushes the buffered content as one chunk (prefixed
/// by the `L1 > L2 > ...` breadcrumb) or, if it exceeds `chunk_size` tokens,
/// sub-slices with General's text-window logic, prepending the breadcrumb
/// to every sub-chunk. Unrecognised heading-looking blocks are content.
pub fn chunk_hierarchy(doc_id: &DocId, blocks: &[Block], params: &HierarchyParams, counter: &dyn TokenCounter) -> Vec<ParsedChunk> {
    let patterns = patterns_for(params.doc_type);
    let mut hierarchy: BTreeMap<u32, String> = BTreeMap::new();
    let mut buffer: Vec<&Block> = Vec::new();
    let mut out = Vec::new();

    let mut flush = |buffer: &mut Vec<&Block>, hierarchy: &BTreeMap<u32, String>, out: &mut Vec<ParsedChunk>| {
        if buffer.is_empty() {
            return;
        }
        let breadcrumb = hierarchy.values().cloned().collect::<Vec<_>>().join(" > ");
        let full_text = buffer.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join("\n");
        let page = buffer.first().and_then(|b| b.page_number);
        if counter.count(&full_text) <= params.chunk_size as usize {
            let section_text = if breadcrumb.is_empty() {
                full_text.clone()
            } else {
                format!("{breadcrumb}\n\n{full_text}")
            };
            out.push(new_text_chunk_pub(doc_id, ChunkType::Text, section_text, Some(breadcrumb), page));
        } else {
            for part in chunk_text_block(&full_text, params.chunk_size, params.min_chunk_size) {
                let prefixed = if breadcrumb.is_empty() {
                    part
                } else {
                    format!("{breadcrumb}\n\n{part}")
                };
                out.push(new_text_chunk_pub(doc_id, ChunkType::Text, prefixed, Some(breadcrumb.clone()), page));
            }
        }
        buffer.clear();
    };

    for block in blocks {
        let matched_level = patterns.iter().find(|p| p.re.is_match(block.text.trim())).map(|p| p.level);
        let looks_like_heading = block.kind == BlockKind::Heading;

        if let Some(level) = matched_level {
            flush(&mut buffer, &hierarchy, &mut out);
            hierarchy.retain(|&l, _| l < level);
            hierarchy.insert(level, block.text.trim().to_string());
        } else if looks_like_heading && matched_level.is_none() {
            // Unrecognised heading-looking block: treated as content.
            buffer.push(block);
        } else {
            buffer.push(block);
        }
    }
    flush(&mut buffer, &hierarchy, &mut out);

    reassign_dense_index(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::tokens::ApproxTokenCounter;
    use crate::extractor::Block as Blk;

    #[test]
    fn breadcrumb_prepended_to_flushed_section() {
        let doc_id = DocId::new("doc1");
        let blocks = vec![
            Blk::heading("1. Overview", 1),
            Blk::text("intro text"),
            Blk::heading("1.1 Details", 2),
            Blk::text("detail text"),
        ];
        let params = HierarchyParams { chunk_size: 512, min_chunk_size: 10, doc_type: DocType::TechnicalManual };
        let counter = ApproxTokenCounter;
        let chunks = chunk_hierarchy(&doc_id, &blocks, &params, &counter);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.starts_with("1. Overview"));
        assert!(chunks[1].text.starts_with("1. Overview > 1.1 Details"));
    }
}
