use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagCoreError {
    #[error(transparent)]
    Core(#[from] corpus_model::CoreError),

    #[error(transparent)]
    Store(#[from] notebook_store::StoreError),

    #[error("extraction failed: {0}")]
    Extract(String),

    #[error(transparent)]
    Extraction(#[from] doc_pipeline::extractor::ExtractError),

    #[error(transparent)]
    Embed(#[from] embedding_client::EmbedError),

    #[error("upstream chat provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
