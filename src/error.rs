use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid source document: {0}")]
    InvalidDocument(String),

    #[error("Merge produced no pages")]
    EmptyMergeResult,

    #[error("Merged document is {size} bytes, limit is {limit}")]
    OversizedResult { size: usize, limit: usize },

    #[error("Batch {batch} failed after {attempts} attempts")]
    BatchExhausted { batch: usize, attempts: u32 },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::InvalidDocument(name) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Invalid source document: {}", name),
            ),
            Error::EmptyMergeResult => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Merge produced no pages".to_string(),
            ),
            Error::OversizedResult { size, limit } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Merged document is {} bytes, limit is {}", size, limit),
            ),
            // Transport failures collapse to one generic user-facing message.
            Error::BatchExhausted { .. } => (
                StatusCode::BAD_GATEWAY,
                "Server busy, please try again.".to_string(),
            ),
            Error::Reqwest(_) => (
                StatusCode::BAD_GATEWAY,
                "Server busy, please try again.".to_string(),
            ),
            Error::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Json(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Multipart(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Pdf(err) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
            Error::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            Error::Io(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            Error::Anyhow(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
