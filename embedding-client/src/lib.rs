//! Batched calls to an external embedding HTTP server with endpoint/model
//! fallback and zero-vector degradation when nothing answers.

pub mod client;
pub mod config;
pub mod error;
pub mod provider;

pub use client::EmbeddingClient;
pub use config::EmbeddingConfig;
pub use error::EmbedError;
pub use provider::Provider;
