use corpus_model::{ChunkType, DocId, ParsedChunk};

use crate::extractor::{Block, BlockKind};

use super::general::{new_text_chunk_pub, reassign_dense_index};
use super::tokens::whitespace_tokens;

pub struct PcrParams {
    pub parent_chunk_size: u32,
    pub child_chunk_size: u32,
}

/// Parent-Child Retrieval chunker (spec §4.B.4). Concatenates non-heading
/// block text, slices into parent windows, then slices each parent into
/// child windows. One `ParsedChunk` is emitted per child: `text` is the
/// parent's full text (what the ChatEngine feeds the LLM), `embedding_text`
/// is the child's text (what the Embedder vectorises), and
/// `parent_chunk_id` is a synthetic, non-materialised soft reference.
pub fn chunk_pcr(doc_id: &DocId, blocks: &[Block], params: &PcrParams) -> Vec<ParsedChunk> {
    let full_text = blocks
        .iter()
        .filter(|b| b.kind != BlockKind::Heading)
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let tokens = whitespace_tokens(&full_text);
    if tokens.is_empty() {
        return Vec::new();
    }

    let parent_step = params.parent_chunk_size.max(1) as usize;
    let child_step = params.child_chunk_size.max(1) as usize;

    let mut out = Vec::new();
    let mut parent_index = 0usize;
    let mut i = 0usize;
    while i < tokens.len() {
        let parent_end = (i + parent_step).min(tokens.len());
        let parent_tokens = &tokens[i..parent_end];
        let parent_text = parent_tokens.join(" ");
        let parent_chunk_id = format!("{doc_id}:pcr_parent:{parent_index}");

        let mut j = 0usize;
        while j < parent_tokens.len() {
            let child_end = (j + child_step).min(parent_tokens.len());
            let child_text = parent_tokens[j..child_end].join(" ");
            let mut chunk = new_text_chunk_pub(doc_id, ChunkType::Text, parent_text.clone(), None, None);
            chunk.embedding_text = Some(child_text);
            chunk.parent_chunk_id = Some(parent_chunk_id.clone());
            out.push(chunk);
            j = child_end;
        }

        parent_index += 1;
        i = parent_end;
    }

    reassign_dense_index(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Block as Blk;

    #[test]
    fn children_share_parent_text_and_id() {
        let doc_id = DocId::new("doc1");
        let words: Vec<String> = (0..40).map(|i| format!("w{i}")).collect();
        let blocks = vec![Blk::text(words.join(" "))];
        let params = PcrParams { parent_chunk_size: 20, child_chunk_size: 8 };
        let chunks = chunk_pcr(&doc_id, &blocks, &params);

        assert!(chunks.len() >= 2);
        let first_parent_id = chunks[0].parent_chunk_id.clone();
        let siblings: Vec<_> = chunks
            .iter()
            .filter(|c| c.parent_chunk_id == first_parent_id)
            .collect();
        assert!(siblings.len() >= 2);
        for c in &siblings {
            assert_eq!(c.text, siblings[0].text);
            assert!(!c.embedding_text.as_ref().unwrap().is_empty());
        }
    }
}
