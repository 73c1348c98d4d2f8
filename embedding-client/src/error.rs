use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    RequestFailed(String),

    #[error("embedding response could not be parsed: {0}")]
    InvalidResponse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}
