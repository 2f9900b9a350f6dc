//! Error taxonomy for the pipeline and the streaming endpoints.
//!
//! Every failure is contained per-request or per-job: handlers return
//! [`VideoError`] and the `IntoResponse` impl maps it to an HTTP status,
//! so nothing in this module can take the process down.

use std::io;
use std::path::PathBuf;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("video not found: {0}")]
    NotFound(String),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Malformed or unsatisfiable Range header. `total_len` feeds the
    /// `Content-Range: bytes */<len>` header on the 416 response.
    #[error("invalid range: {reason}")]
    InvalidRange { reason: String, total_len: u64 },

    #[error("video {0} is already being processed")]
    ConflictingJob(String),

    /// Non-zero exit from the external transcoder. Recorded as `Failed`
    /// state and surfaced through status queries, never as a 5xx.
    #[error("transcode failed with exit code {exit_code:?}: {stderr}")]
    Transcode {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("upload rejected: {0}")]
    InvalidUpload(String),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl IntoResponse for VideoError {
    fn into_response(self) -> Response {
        if let VideoError::InvalidRange { reason, total_len } = &self {
            return (
                StatusCode::RANGE_NOT_SATISFIABLE,
                [(header::CONTENT_RANGE, format!("bytes */{total_len}"))],
                Json(json!({ "message": reason, "success": false })),
            )
                .into_response();
        }

        let status = match &self {
            VideoError::NotFound(_) | VideoError::FileNotFound(_) => StatusCode::NOT_FOUND,
            VideoError::ConflictingJob(_) => StatusCode::CONFLICT,
            VideoError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            VideoError::InvalidRange { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            VideoError::Transcode { .. } | VideoError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "request failed");
        }

        (
            status,
            Json(json!({ "message": self.to_string(), "success": false })),
        )
            .into_response()
    }
}
