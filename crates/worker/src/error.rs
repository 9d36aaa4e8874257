//! Worker error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use forge::ForgeError;
use thiserror::Error;

/// Errors from the system-of-record reporter.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The HTTP request could not be sent or its response read.
    #[error("System-of-record request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The system of record answered with a non-success status.
    #[error("System-of-record returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The forged application lacks something the record requires.
    #[error("Forged application is missing {0}")]
    Incomplete(&'static str),

    /// The system of record refused the record.
    #[error("System-of-record unavailable: {0}")]
    Unavailable(String),
}

/// Why a `create_application` event did not commit.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The forge failed; anything it created was torn down.
    #[error("Forge failed: {0}")]
    Forge(#[from] ForgeError),

    /// The forge succeeded but could not be recorded, so it was torn down.
    #[error("Reporting failed: {0}")]
    Report(#[from] ReportError),
}

impl DispatchError {
    pub fn is_report_failure(&self) -> bool {
        matches!(self, DispatchError::Report(_))
    }
}

/// Errors returned by the HTTP ingest endpoint.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("event queue is full")]
    QueueFull,

    #[error("event queue is closed")]
    QueueClosed,
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "rejecting inbound event");
        let body = serde_json::json!({ "error": self.to_string() });
        (StatusCode::SERVICE_UNAVAILABLE, axum::Json(body)).into_response()
    }
}
