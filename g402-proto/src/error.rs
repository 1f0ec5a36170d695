//! Error types for wire format parsing.

use crate::validate::{ValidationIssue, join_issues};

/// Errors that can occur while decoding x402 protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The header was not valid Base64.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The decoded bytes were not valid JSON for the expected shape.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The message parsed but violated the schema.
    #[error("{}", join_issues(.0))]
    Schema(Vec<ValidationIssue>),
}
