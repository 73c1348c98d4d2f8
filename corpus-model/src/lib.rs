//! Shared domain models used across the ingestion, storage, retrieval and
//! chat crates.

pub mod chat;
pub mod chunk;
pub mod citation;
pub mod document;
pub mod error;
pub mod ids;
pub mod notebook;
pub mod parsing_settings;
pub mod source;
pub mod tag;

pub use chat::{ChatMessage, ChatRole};
pub use chunk::{ChunkType, EmbeddedChunk, ParsedChunk};
pub use citation::{GlobalNote, SavedCitation};
pub use document::DocumentMetadata;
pub use error::CoreError;
pub use ids::{ChunkId, DocId, NoteId, NotebookId, SourceId};
pub use notebook::Notebook;
pub use parsing_settings::{ChunkingMethod, DocType, ParsingSettings};
pub use source::{EmbeddingsStatus, FileKind, Source, SourceStatus};
pub use tag::Tag;

/// Schema version for on-disk/serialised artefacts (parsing JSON, DB pragmas).
/// Bumped whenever a breaking change is made to stored shapes.
pub const SCHEMA_MAJOR: u32 = 1;
