//! Server-side core of the x402 payment-gating protocol.
//!
//! A resource server requires clients to attach a signed token-transfer
//! authorization to requests for protected resources. This crate
//! provides the pieces that turn an incoming `X-PAYMENT` header into
//! either a settled transaction or a precisely categorized rejection:
//!
//! - [`facilitator`] — The trait describing the remote facilitator the
//!   server delegates verification and settlement to
//! - [`server`] — [`PaymentServer`] and the `parse → verify → settle`
//!   pipeline
//! - [`builder`] — 402 payment-requirements construction with
//!   capability auto-detection
//! - [`error`] — Builder error types
//!
//! Wire format types are re-exported from [`g402_proto`].

pub mod builder;
pub mod error;
pub mod facilitator;
pub mod server;

pub use builder::{PaymentTypeChoice, RequirementsConfig};
pub use error::BuildError;
pub use facilitator::{Facilitator, SupportedQuery};
pub use server::{PaymentServer, ProcessResult, Rejection, Settlement};

/// Re-export all wire format types from `g402-proto`.
pub use g402_proto;
pub use g402_proto::*;
