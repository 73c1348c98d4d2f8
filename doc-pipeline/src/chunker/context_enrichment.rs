use corpus_model::{DocId, ParsedChunk};

use crate::extractor::Block;

use super::general::{chunk_general, GeneralParams};
use super::tokens::TokenCounter;

/// Context Enrichment chunker (spec §4.B.2): run General, then for each
/// chunk set `embedding_text` to the predecessor's trailing `W` characters
/// plus the chunk's own text plus the successor's leading `W` characters.
/// `text` (the display payload) is left unchanged.
pub fn chunk_context_enrichment(
    doc_id: &DocId,
    blocks: &[Block],
    params: &GeneralParams,
    context_window: u32,
    counter: &dyn TokenCounter,
) -> Vec<ParsedChunk> {
    let mut chunks = chunk_general(doc_id, blocks, params, counter);
    let w = context_window as usize;
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

    for i in 0..chunks.len() {
        let prev_tail = if i > 0 { tail_chars(&texts[i - 1], w) } else { String::new() };
        let next_head = if i + 1 < chunks.len() { head_chars(&texts[i + 1], w) } else { String::new() };
        chunks[i].embedding_text = Some(format!("{prev_tail}{}{next_head}", texts[i]));
    }
    chunks
}

fn tail_chars(s: &str, n: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    let start = chars.len().saturating_sub(n);
    chars[start..].iter().collect()
}

fn head_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::tokens::ApproxTokenCounter;
    use crate::extractor::Block as Blk;

    #[test]
    fn embedding_text_includes_neighbour_context() {
        let doc_id = DocId::new("doc1");
        let blocks = vec![
            Blk::text("alpha beta gamma delta epsilon"),
            Blk::text("zeta eta theta iota kappa"),
        ];
        let params = GeneralParams { chunk_size: 3, min_chunk_size: 1, chunk_overlap: 0 };
        let counter = ApproxTokenCounter;
        let chunks = chunk_context_enrichment(&doc_id, &blocks, &params, 5, &counter);
        assert!(chunks.len() >= 2);
        let enriched = chunks[0].embedding_text.as_ref().expect("enrichment set");
        assert!(enriched.starts_with(&chunks[0].text));
        assert_ne!(enriched, &chunks[0].text, "should append successor context");
    }
}
