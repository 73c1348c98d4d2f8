//! Chunker (spec §4.B): turns extracted blocks into `ParsedChunk`s under one
//! of five interchangeable strategies.

pub mod context_enrichment;
pub mod general;
pub mod hierarchy;
pub mod pcr;
pub mod symbol;
pub mod tokens;

use corpus_model::{ChunkingMethod, DocId, ParsedChunk, ParsingSettings};

use crate::extractor::Block;

use general::GeneralParams;
use hierarchy::HierarchyParams;
use pcr::PcrParams;
use tokens::{ApproxTokenCounter, TokenCounter};

/// Dispatch to the strategy named in `settings.chunking_method`, using the
/// default approximate token counter unless one is supplied.
pub fn chunk_blocks(doc_id: &DocId, blocks: &[Block], settings: &ParsingSettings) -> Vec<ParsedChunk> {
    chunk_blocks_with_counter(doc_id, blocks, settings, &ApproxTokenCounter)
}

pub fn chunk_blocks_with_counter(
    doc_id: &DocId,
    blocks: &[Block],
    settings: &ParsingSettings,
    counter: &dyn TokenCounter,
) -> Vec<ParsedChunk> {
    let general_params = GeneralParams {
        chunk_size: settings.chunk_size,
        min_chunk_size: settings.min_chunk_size,
        chunk_overlap: settings.chunk_overlap,
    };

    match settings.chunking_method {
        ChunkingMethod::General => general::chunk_general(doc_id, blocks, &general_params, counter),
        ChunkingMethod::ContextEnrichment => context_enrichment::chunk_context_enrichment(
            doc_id,
            blocks,
            &general_params,
            settings.context_window,
            counter,
        ),
        ChunkingMethod::Hierarchy => {
            let params = HierarchyParams {
                chunk_size: settings.chunk_size,
                min_chunk_size: settings.min_chunk_size,
                doc_type: settings.doc_type,
            };
            hierarchy::chunk_hierarchy(doc_id, blocks, &params, counter)
        }
        ChunkingMethod::Pcr => {
            let params = PcrParams {
                parent_chunk_size: settings.parent_chunk_size,
                child_chunk_size: settings.child_chunk_size,
            };
            pcr::chunk_pcr(doc_id, blocks, &params)
        }
        ChunkingMethod::Symbol => symbol::chunk_symbol(doc_id, blocks, &settings.symbol_separator),
    }
}
