use corpus_model::{ChunkType, DocId, ParsedChunk};

use crate::extractor::{Block, BlockKind};

use super::tokens::{whitespace_tokens, TokenCounter};

pub struct GeneralParams {
    pub chunk_size: u32,
    pub min_chunk_size: u32,
    pub chunk_overlap: u32,
}

/// General chunker (spec §4.B.1). Headings are buffered and prepended to
/// the next non-heading block's text; text blocks are token-windowed with
/// doubling when the tail would be too short; table blocks duplicate their
/// header+separator lines into every produced chunk so each is
/// self-contained.
pub fn chunk_general(
    doc_id: &DocId,
    blocks: &[Block],
    params: &GeneralParams,
    counter: &dyn TokenCounter,
) -> Vec<ParsedChunk> {
    let mut out: Vec<ParsedChunk> = Vec::new();
    let mut pending_header: Option<String> = None;

    for block in blocks {
        match block.kind {
            BlockKind::Heading => {
                pending_header = Some(block.text.clone());
            }
            BlockKind::Table => {
                let header = pending_header.take();
                for text in chunk_table_block(&block.text, params.chunk_size, counter) {
                    out.push(new_text_chunk(doc_id, ChunkType::Table, text, header.clone(), block.page_number));
                }
            }
            BlockKind::Formula => {
                let header = pending_header.take();
                out.push(new_text_chunk(doc_id, ChunkType::Formula, block.text.clone(), header, block.page_number));
            }
            BlockKind::Text => {
                let header = pending_header.take();
                let mut text = block.text.clone();
                if let Some(h) = &header {
                    text = format!("{h}\n{text}");
                }
                for part in chunk_text_block(&text, params.chunk_size, params.min_chunk_size) {
                    out.push(new_text_chunk(doc_id, ChunkType::Text, part, header.clone(), block.page_number));
                }
            }
        }
    }

    apply_overlap_metadata(&mut out, params.chunk_overlap, counter);
    reassign_dense_index(&mut out);
    out
}

pub fn new_text_chunk_pub(
    doc_id: &DocId,
    chunk_type: ChunkType,
    text: String,
    section_header: Option<String>,
    page_number: Option<u32>,
) -> ParsedChunk {
    new_text_chunk(doc_id, chunk_type, text, section_header, page_number)
}

fn new_text_chunk(
    doc_id: &DocId,
    chunk_type: ChunkType,
    text: String,
    section_header: Option<String>,
    page_number: Option<u32>,
) -> ParsedChunk {
    ParsedChunk {
        chunk_id: corpus_model::ChunkId::new(format!("{}:{}", doc_id, uuid_like())),
        doc_id: doc_id.clone(),
        chunk_index: 0,
        chunk_type,
        page_number,
        section_header,
        parent_header: None,
        prev_tail: None,
        next_head: None,
        text,
        embedding_text: None,
        parent_chunk_id: None,
    }
}

/// Lightweight unique suffix; the store assigns the durable primary key, so
/// this only needs to be unique within one chunking call.
fn uuid_like() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!("c{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Token-window a text block, doubling the window when the tail would land
/// below `min_chunk_size` tokens and more text remains (spec §4.B.1).
pub fn chunk_text_block(text: &str, chunk_size: u32, min_chunk_size: u32) -> Vec<String> {
    let tokens = whitespace_tokens(text);
    if tokens.is_empty() {
        return Vec::new();
    }
    let step = chunk_size.max(1) as usize;
    let min_size = min_chunk_size as usize;
    let mut parts = Vec::new();
    let mut i = 0usize;
    while i < tokens.len() {
        let mut window_end = (i + step).min(tokens.len());
        let remaining_after = tokens.len() - window_end;
        if window_end - i < min_size && remaining_after > 0 {
            window_end = (i + step * 2).min(tokens.len());
        }
        parts.push(tokens[i..window_end].join(" "));
        i = window_end;
    }
    parts
}

/// Slice a rendered pipe-table: the first two lines are header + separator
/// and are duplicated into every produced chunk (spec §4.B.1).
pub fn chunk_table_block(text: &str, chunk_size: u32, counter: &dyn TokenCounter) -> Vec<String> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() <= 2 {
        return vec![text.to_string()];
    }
    let header = lines[0];
    let separator = lines[1];
    let prefix = format!("{header}\n{separator}\n");
    let mut out = Vec::new();
    let mut current_rows: Vec<&str> = Vec::new();
    let mut current_tokens = 0usize;
    for row in &lines[2..] {
        let row_tokens = counter.count(row);
        if current_tokens + row_tokens > chunk_size as usize && !current_rows.is_empty() {
            out.push(format!("{prefix}{}", current_rows.join("\n")));
            current_rows.clear();
            current_tokens = 0;
        }
        current_rows.push(row);
        current_tokens += row_tokens;
    }
    if !current_rows.is_empty() {
        out.push(format!("{prefix}{}", current_rows.join("\n")));
    }
    if out.is_empty() {
        out.push(text.to_string());
    }
    out
}

/// Record `prev_tail`/`next_head` as the last/first `chunk_overlap` tokens
/// of the neighbouring chunk's text — metadata only, chunks never
/// physically overlap (spec §4.B.1).
pub fn apply_overlap_metadata(chunks: &mut [ParsedChunk], chunk_overlap: u32, counter: &dyn TokenCounter) {
    let _ = counter;
    let overlap = chunk_overlap as usize;
    if overlap == 0 || chunks.len() < 2 {
        return;
    }
    let tails: Vec<Option<String>> = chunks
        .iter()
        .map(|c| {
            let toks = whitespace_tokens(&c.text);
            if toks.is_empty() {
                None
            } else {
                let start = toks.len().saturating_sub(overlap);
                Some(toks[start..].join(" "))
            }
        })
        .collect();
    let heads: Vec<Option<String>> = chunks
        .iter()
        .map(|c| {
            let toks = whitespace_tokens(&c.text);
            if toks.is_empty() {
                None
            } else {
                Some(toks[..overlap.min(toks.len())].join(" "))
            }
        })
        .collect();

    for i in 0..chunks.len() {
        if i > 0 {
            chunks[i].prev_tail = tails[i - 1].clone();
        }
        if i + 1 < chunks.len() {
            chunks[i].next_head = heads[i + 1].clone();
        }
    }
}

/// Reassign `chunk_index` to a dense 0..N-1 sequence (run after every
/// strategy, per spec §4.B closing sentence).
pub fn reassign_dense_index(chunks: &mut [ParsedChunk]) {
    for (i, c) in chunks.iter_mut().enumerate() {
        c.chunk_index = i as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::tokens::ApproxTokenCounter;

    #[test]
    fn short_tail_merges_forward() {
        let text = (0..25).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let parts = chunk_text_block(&text, 10, 8);
        // 25 tokens, step 10: [0..10), tail would be [20..25) = 5 tokens < 8 -> doubled to [10..30)->25
        assert_eq!(parts.len(), 2);
        assert_eq!(whitespace_tokens(&parts[0]).len(), 10);
        assert_eq!(whitespace_tokens(&parts[1]).len(), 15);
    }

    #[test]
    fn table_header_duplicated_into_every_chunk() {
        let table = "| a | b |\n| --- | --- |\n| 1 | 2 |\n| 3 | 4 |\n| 5 | 6 |";
        let counter = ApproxTokenCounter;
        let parts = chunk_table_block(table, 3, &counter);
        assert!(parts.len() >= 2);
        for p in &parts {
            assert!(p.starts_with("| a | b |"));
        }
    }

    #[test]
    fn dense_index_after_reassignment() {
        let doc_id = DocId::new("doc1");
        let mut chunks = vec![
            new_text_chunk(&doc_id, ChunkType::Text, "a".into(), None, None),
            new_text_chunk(&doc_id, ChunkType::Text, "b".into(), None, None),
        ];
        reassign_dense_index(&mut chunks);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].chunk_index, 1);
    }
}
