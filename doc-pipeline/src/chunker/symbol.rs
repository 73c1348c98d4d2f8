use corpus_model::{ChunkType, DocId, ParsedChunk};

use crate::extractor::{Block, BlockKind};

use super::general::{new_text_chunk_pub, reassign_dense_index};

/// Symbol chunker (spec §4.B.5): concatenate non-heading blocks, split on a
/// user-chosen separator literal, trim and drop empties. Each remaining
/// segment becomes one chunk.
pub fn chunk_symbol(doc_id: &DocId, blocks: &[Block], separator: &str) -> Vec<ParsedChunk> {
    let full_text = blocks
        .iter()
        .filter(|b| b.kind != BlockKind::Heading)
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let mut out: Vec<ParsedChunk> = if separator.is_empty() {
        vec![new_text_chunk_pub(doc_id, ChunkType::Text, full_text.trim().to_string(), None, None)]
    } else {
        full_text
            .split(separator)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| new_text_chunk_pub(doc_id, ChunkType::Text, s.to_string(), None, None))
            .collect()
    };

    reassign_dense_index(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Block as Blk;

    #[test]
    fn splits_on_separator_and_drops_empties() {
        let doc_id = DocId::new("doc1");
        let blocks = vec![Blk::text("one###\n\n###two###three")];
        let chunks = chunk_symbol(&doc_id, &blocks, "###");
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }
}
