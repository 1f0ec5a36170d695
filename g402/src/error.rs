//! Error types for payment-requirements construction.

use g402_evm::DetectError;
use g402_proto::validate::{ValidationIssue, join_issues};
use g402_proto::{Network, PaymentType};

/// Errors raised while building [`PaymentRequirements`].
///
/// These are server-side configuration failures, raised before any
/// payment is processed. [`BuildError::Validation`] is the only class a
/// gate should answer with `400 Bad Request`; everything else is a
/// `500`-class misconfiguration.
///
/// [`PaymentRequirements`]: g402_proto::PaymentRequirements
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The configuration (or the assembled requirements) failed schema
    /// validation.
    #[error("invalid payment configuration: {}", join_issues(.0))]
    Validation(Vec<ValidationIssue>),

    /// `autoDetect` was disabled without an explicit payment type.
    #[error("Must specify paymentType when autoDetect is false")]
    PaymentTypeRequired,

    /// Detection found no usable authorization flavor for the token.
    #[error("token {token} does not support advanced payment methods")]
    NoSupportedMethod {
        /// The token that was probed.
        token: String,
    },

    /// The facilitator enumerated its support matrix and the requested
    /// combination is not in it.
    #[error(
        "Facilitator does not support {payment_type} for {asset} on {network}; supported: [{}]",
        supported.join(", ")
    )]
    UnsupportedCombination {
        /// The requested payment type.
        payment_type: PaymentType,
        /// The requested asset (lowercased).
        asset: String,
        /// The requested network.
        network: Network,
        /// Every combination the facilitator does support.
        supported: Vec<String>,
    },

    /// Token capability detection failed.
    #[error(transparent)]
    Detect(#[from] DetectError),
}

impl BuildError {
    /// Whether this is a schema-validation failure (HTTP 400 material,
    /// as opposed to a 500-class misconfiguration).
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// The individual validation issues, when this is a validation error.
    #[must_use]
    pub fn validation_issues(&self) -> Option<&[ValidationIssue]> {
        match self {
            Self::Validation(issues) => Some(issues),
            _ => None,
        }
    }
}
