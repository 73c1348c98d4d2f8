//! Sqlite-backed storage: one chunk database per notebook plus a shared
//! catalogue database for notebooks, sources and parsing settings.

pub mod error;
pub mod global_store;
pub mod notebook_store;
pub mod schema;
pub mod vector;

pub use error::StoreError;
pub use global_store::GlobalStore;
pub use notebook_store::{NotebookStore, ScoredChunk, VisibilityFilter};
