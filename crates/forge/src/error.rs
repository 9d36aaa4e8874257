//! Forge error types.

use superkey::{ResourceKind, SuperkeyError};
use thiserror::Error;

/// Errors returned by a provider driver.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The provider API call failed.
    #[error("{operation} failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },

    /// The provider refused to create the resource.
    #[error("Provider rejected {kind}: {reason}")]
    Rejected { kind: ResourceKind, reason: String },

    /// The driver has no implementation for this resource kind.
    #[error("Provider '{provider}' does not support {kind}")]
    Unsupported {
        provider: String,
        kind: ResourceKind,
    },

    /// The request did not carry usable provider credentials.
    #[error("Invalid provider credentials: {0}")]
    Credentials(String),

    /// No driver could be reached for the resource.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// Errors that end a forge run.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// No pipeline is registered for the application type.
    #[error("Unknown application type: {0}")]
    UnknownApplicationType(String),

    /// The pipeline targets a different provider than the request.
    #[error(
        "Application type '{application_type}' runs on provider '{expected}', request names '{actual}'"
    )]
    ProviderMismatch {
        application_type: String,
        expected: String,
        actual: String,
    },

    /// No provider factory is registered for the request's provider.
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Building a driver from the request's credentials failed.
    #[error("Failed to connect to provider: {0}")]
    Connect(#[source] ProviderError),

    /// A provider create call failed mid-pipeline.
    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        kind: ResourceKind,
        source: ProviderError,
    },

    /// A step's inputs could not be resolved.
    #[error("{0}")]
    Input(#[source] SuperkeyError),
}

impl ForgeError {
    /// Returns true if the error came from a pipeline step, after which
    /// teardown of earlier steps has been attempted.
    pub fn is_step_failure(&self) -> bool {
        matches!(self, ForgeError::StepFailed { .. } | ForgeError::Input(_))
    }

    /// Returns the name of the failing step, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            ForgeError::StepFailed { step, .. } => Some(step),
            ForgeError::Input(SuperkeyError::MissingInput { step, .. }) => Some(step),
            _ => None,
        }
    }
}

/// Convenience type alias for forge results.
pub type Result<T> = std::result::Result<T, ForgeError>;
