//! Superkey model error types.

use thiserror::Error;

/// Errors raised while decoding requests or resolving pipelines.
#[derive(Debug, Error)]
pub enum SuperkeyError {
    /// The event payload is not a valid create request.
    #[error("Malformed create request: {0}")]
    Decode(#[from] serde_json::Error),

    /// The payload parsed but a required field is empty.
    #[error("Incomplete create request: '{0}' is empty")]
    IncompleteRequest(&'static str),

    /// No pipeline is registered for the application type.
    #[error("Unknown application type: {0}")]
    UnknownApplicationType(String),

    /// A pipeline definition violates step ordering.
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// A step input could not be resolved from the request or prior outputs.
    #[error("Step '{step}' is missing input '{input}'")]
    MissingInput { step: String, input: String },
}

/// Convenience type alias for superkey results.
pub type Result<T> = std::result::Result<T, SuperkeyError>;
