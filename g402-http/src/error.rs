//! Error types for the gate middleware.

use g402::error::BuildError;
use g402_proto::validate::ValidationIssue;

/// Errors surfaced while gating a request.
///
/// [`GateError::is_validation`] distinguishes schema-validation failures
/// (answered with `400 Bad Request` and the issue list) from unexpected
/// failures (answered with `500`).
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Requirements construction failed.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The application's resolver failed.
    #[error("{0}")]
    Resolver(String),
}

impl GateError {
    /// Whether this is schema-validation material (HTTP 400).
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        match self {
            Self::Build(error) => error.is_validation(),
            Self::Resolver(_) => false,
        }
    }

    /// The individual validation issues, when present.
    #[must_use]
    pub fn validation_issues(&self) -> Option<&[ValidationIssue]> {
        match self {
            Self::Build(error) => error.validation_issues(),
            Self::Resolver(_) => None,
        }
    }
}
