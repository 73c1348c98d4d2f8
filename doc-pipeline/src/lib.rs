//! Extractor (§4.A) and Chunker (§4.B): turns a file on disk into an ordered
//! sequence of blocks, then into `ParsedChunk`s under one of five
//! interchangeable strategies.

pub mod chunker;
pub mod extractor;

pub use extractor::{extract, Block, BlockKind, ExtractError};
