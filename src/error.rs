//! Error taxonomy for the API and the catalog adapters.
//!
//! The retry-vs-surface decision lives in the types: only transient
//! network faults are ever retried, and they surface as
//! [`UpstreamError::Exhausted`] once the budget is spent. HTTP error
//! statuses, vendor rejections and malformed bodies are fatal on the
//! first attempt.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Boundary error. Every failure a handler can produce maps to exactly
/// one variant, and every variant maps to one HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed caller input (empty description, bad duration, unknown source).
    #[error("{0}")]
    Validation(String),

    /// The affected feature was never configured (e.g. no catalog credential).
    #[error("{0}")]
    Config(String),

    /// The generation engine failed to initialize at startup.
    #[error("generation engine is not loaded")]
    ModelUnavailable,

    /// The generation queue is full; one request is in flight and the
    /// backlog is at capacity.
    #[error("generation queue is full, try again later")]
    Busy,

    /// The engine was invoked but failed. Terminal for the request, no retry.
    #[error("generation failed: {0}")]
    Generation(String),

    /// An external catalog API rejected us or stayed unreachable.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures from an external catalog API.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Non-2xx HTTP response. Never retried; the status is propagated to
    /// the caller as-is.
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Transient network faults exhausted the retry budget.
    #[error("upstream unreachable after {attempts} attempts: {last}")]
    Exhausted { attempts: usize, last: String },

    /// The vendor answered 200 but flagged an application-level error
    /// (e.g. a non-"success" `headers.status`).
    #[error("upstream rejected request ({status}): {message}")]
    Rejected { status: String, message: String },

    /// The response body did not match the documented shape.
    #[error("malformed upstream response: {0}")]
    Malformed(String),

    /// A gated audio payload could not be downloaded or stored locally.
    /// Fails the whole request; the caller cannot serve a track whose
    /// promised local copy does not exist.
    #[error("audio materialization failed: {0}")]
    Materialize(String),
}

impl ApiError {
    /// Stable machine-readable kind for the JSON error body.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::Config(_) => "config",
            ApiError::ModelUnavailable => "model_unavailable",
            ApiError::Busy => "busy",
            ApiError::Generation(_) => "generation",
            ApiError::Upstream(_) => "upstream",
            ApiError::Io(_) => "io",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Busy => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Generation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream(upstream) => match upstream {
                UpstreamError::Status { status, .. } => {
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
                }
                UpstreamError::Exhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
                UpstreamError::Rejected { .. } => StatusCode::BAD_GATEWAY,
                UpstreamError::Malformed(_) => StatusCode::INTERNAL_SERVER_ERROR,
                UpstreamError::Materialize(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.kind(),
            "detail": self.to_string(),
        }));
        (status, body).into_response()
    }
}
