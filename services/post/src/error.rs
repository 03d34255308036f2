use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Request-level failures of the ingestion and query paths.
///
/// Every variant is terminal for the request that produced it; nothing is
/// retried.
#[derive(Debug, Error)]
pub enum PostError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Missing or invalid credentials")]
    Unauthorized,

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Failed to save media to object storage: {0}")]
    UploadFailure(String),

    #[error("Failed to annotate the image: {0}")]
    AnnotationFailure(String),

    #[error("Failed to save post to the search index: {0}")]
    IndexingFailure(String),

    #[error("Failed to read posts from the search index: {0}")]
    QueryFailure(String),

    #[error("Failed to initialize index schema: {0}")]
    SchemaInitFailure(String),
}

impl PostError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PostError::Validation(_) => StatusCode::BAD_REQUEST,
            PostError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Label used for the `stage` dimension of failure counters
    pub fn stage(&self) -> &'static str {
        match self {
            PostError::Validation(_) => "validation",
            PostError::Unauthorized => "auth",
            PostError::UpstreamUnavailable(_) => "upstream",
            PostError::UploadFailure(_) => "upload",
            PostError::AnnotationFailure(_) => "annotation",
            PostError::IndexingFailure(_) => "indexing",
            PostError::QueryFailure(_) => "query",
            PostError::SchemaInitFailure(_) => "schema",
        }
    }
}

impl IntoResponse for PostError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Backend detail stays in the logs
        let message = match &self {
            PostError::Validation(_) | PostError::Unauthorized => self.to_string(),
            PostError::UpstreamUnavailable(_) => "Upstream service unavailable".to_string(),
            PostError::UploadFailure(_) => "Failed to save image to object storage".to_string(),
            PostError::AnnotationFailure(_) => "Failed to annotate the image".to_string(),
            PostError::IndexingFailure(_) => "Failed to save post to the search index".to_string(),
            PostError::QueryFailure(_) => "Failed to read posts from the search index".to_string(),
            PostError::SchemaInitFailure(_) => "Index schema unavailable".to_string(),
        };

        (status, message).into_response()
    }
}
