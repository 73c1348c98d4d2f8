use thiserror::Error;

/// Error kinds shared across the core (spec §7). Concrete crates add their
/// own lower-level error enums and convert into this one at their boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("upload too large: {size_bytes} bytes exceeds {limit_bytes} byte limit")]
    UploadTooLarge { size_bytes: u64, limit_bytes: u64 },

    #[error("malformed multipart: {0}")]
    MalformedMultipart(String),

    #[error("provider unsupported: {0}")]
    ProviderUnsupported(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("index compatibility error: {0}")]
    IndexCompatibilityError(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
