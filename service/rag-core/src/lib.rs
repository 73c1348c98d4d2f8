//! RAG backend core: ingestion orchestration, hybrid retrieval, and chat
//! orchestration, wired together behind the `Orchestrator` type that
//! `rag-api` holds as its shared state.

pub mod chat;
pub mod config;
pub mod error;
pub mod hybrid_search;
pub mod orchestrator;
pub mod retrieval;

pub use chat::{citation_numbers, ChatEvent, ChatProvider, ChatRequest};
pub use config::AppConfig;
pub use error::RagCoreError;
pub use hybrid_search::{decide_mode, fuse, FusedChunk, RetrievalMode, RetrievedPassage, RRF_K};
pub use orchestrator::{IndexStatus, Orchestrator};
