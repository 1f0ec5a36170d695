//! Wire format types for the x402 payment-gating protocol.
//!
//! This crate defines the serialization-level data structures exchanged
//! between clients, resource servers, and facilitators. It has minimal
//! dependencies (`serde`, `serde_json`, `base64`) and is the shared
//! "lingua franca" across the g402 stack.
//!
//! # Modules
//!
//! - [`types`] — Payment requirements, payloads, and 402 response bodies
//! - [`responses`] — Facilitator request/response types
//! - [`networks`] — Network identifiers and chain-id mapping
//! - [`encoding`] — Base64 codec for the `X-PAYMENT` header
//! - [`validate`] — Schema validation helpers

pub mod encoding;
pub mod error;
pub mod networks;
pub mod responses;
pub mod types;
pub mod validate;

pub use encoding::{Base64Bytes, decode_payment_header, encode_payment_header};
pub use error::ProtocolError;
pub use networks::Network;
pub use responses::{
    SettleRequest, SettleResponse, SupportedKind, SupportedResponse, VerifyRequest,
    VerifyResponse, WaitUntil,
};
pub use types::{
    AuthorizationPayload, ErrorStage, ExactScheme, PaymentMethod, PaymentPayload,
    PaymentRequired, PaymentRequirements, PaymentType,
};
pub use validate::ValidationIssue;

/// Current protocol version.
pub const X402_VERSION: u32 = 1;
