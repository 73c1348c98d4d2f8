//! Maps internal error kinds (spec §7) to HTTP status codes. Ingestion
//! failures never reach here directly — they're recorded on the `Source`
//! row instead; this only covers request-handling failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use doc_pipeline::extractor::ExtractError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("upload exceeds the configured size limit")]
    UploadTooLarge,
    #[error("malformed multipart body: {0}")]
    MalformedMultipart(String),
    #[error("provider not supported for this operation: {0}")]
    ProviderUnsupported(String),
    #[error("upstream server unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("index metadata is incompatible with the current embedding configuration: {0}")]
    IndexCompatibilityError(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            ApiError::ParseError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::UploadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::MalformedMultipart(_) => StatusCode::BAD_REQUEST,
            ApiError::ProviderUnsupported(_) => StatusCode::BAD_REQUEST,
            ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::IndexCompatibilityError(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

impl From<rag_core::RagCoreError> for ApiError {
    fn from(err: rag_core::RagCoreError) -> Self {
        match err {
            rag_core::RagCoreError::Store(notebook_store::StoreError::NotFound(msg)) => ApiError::NotFound(msg),
            rag_core::RagCoreError::Extraction(ExtractError::FileNotFound(msg)) => ApiError::NotFound(msg),
            rag_core::RagCoreError::Extraction(ExtractError::UnsupportedFormat(msg)) => ApiError::UnsupportedFormat(msg),
            rag_core::RagCoreError::Extraction(ExtractError::ParseError(msg)) => ApiError::ParseError(msg),
            rag_core::RagCoreError::Extraction(ExtractError::OcrUnavailable(msg)) => ApiError::ParseError(msg),
            rag_core::RagCoreError::UpstreamUnavailable(msg) => ApiError::UpstreamUnavailable(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
