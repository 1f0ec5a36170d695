//! Payment requirements, payloads, and 402 response bodies.
//!
//! # JSON Format
//!
//! A 402 response body looks like:
//!
//! ```json
//! {
//!   "x402Version": 1,
//!   "accepts": [{
//!     "scheme": "exact",
//!     "network": "bsc",
//!     "maxAmountRequired": "1000000",
//!     "payTo": "0x...",
//!     "asset": "0x...",
//!     "paymentType": "eip3009",
//!     "maxTimeoutSeconds": 300
//!   }],
//!   "error": "missing_payment_header",
//!   "errorStage": "parse"
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::X402_VERSION;
use crate::networks::Network;
use crate::validate::{ValidationIssue, check_address, check_amount, check_bytes32};

/// The `exact` payment scheme marker.
///
/// Serializes as the string `"exact"` and rejects anything else on
/// deserialization. The protocol defines no other scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExactScheme {
    /// The one and only scheme.
    #[default]
    #[serde(rename = "exact")]
    Exact,
}

impl fmt::Display for ExactScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("exact")
    }
}

/// The EIP-712 authorization flavor a payment settles through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    /// EIP-2612 `permit`.
    Permit,
    /// EIP-3009 `transferWithAuthorization`.
    Eip3009,
    /// Uniswap Permit2 signature transfer.
    Permit2,
}

impl PaymentType {
    /// Returns the wire name of this payment type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Permit => "permit",
            Self::Eip3009 => "eip3009",
            Self::Permit2 => "permit2",
        }
    }

    /// Returns the EIP-712 primary type a facilitator advertises for
    /// this payment type in its support matrix.
    #[must_use]
    pub const fn primary_type(self) -> &'static str {
        match self {
            Self::Permit => "Permit",
            Self::Eip3009 => "TransferWithAuthorization",
            Self::Permit2 => "Permit2",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capability a token contract may expose, as reported by detection.
///
/// This is a superset of [`PaymentType`]: `permit2-witness` is a
/// detection-level distinction that folds into [`PaymentType::Permit2`]
/// when choosing how to pay.
///
/// Variants are declared in recommendation-priority order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum PaymentMethod {
    /// EIP-3009 `transferWithAuthorization`.
    #[serde(rename = "eip3009")]
    Eip3009,
    /// EIP-2612 `permit`.
    #[serde(rename = "permit")]
    Permit,
    /// Uniswap Permit2 signature transfer.
    #[serde(rename = "permit2")]
    Permit2,
    /// Permit2 with witness data.
    #[serde(rename = "permit2-witness")]
    Permit2Witness,
}

impl PaymentMethod {
    /// Returns the wire name of this method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eip3009 => "eip3009",
            Self::Permit => "permit",
            Self::Permit2 => "permit2",
            Self::Permit2Witness => "permit2-witness",
        }
    }

    /// Returns the payment type used when paying via this method.
    ///
    /// `permit2-witness` folds into [`PaymentType::Permit2`].
    #[must_use]
    pub const fn payment_type(self) -> PaymentType {
        match self {
            Self::Eip3009 => PaymentType::Eip3009,
            Self::Permit => PaymentType::Permit,
            Self::Permit2 | Self::Permit2Witness => PaymentType::Permit2,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment terms a resource server will accept, sent to clients in 402
/// response bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme (always `"exact"`).
    pub scheme: ExactScheme,

    /// Network the payment must settle on.
    pub network: Network,

    /// Maximum amount in the token's smallest unit, as a decimal string.
    /// May exceed the 64-bit range.
    pub max_amount_required: String,

    /// The merchant's receiving address.
    pub pay_to: String,

    /// The ERC-20 token contract address.
    pub asset: String,

    /// Which EIP-712 authorization flavor the server expects.
    pub payment_type: PaymentType,

    /// Maximum time in seconds for payment validity.
    pub max_timeout_seconds: u64,

    /// URL of the protected resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Human-readable description of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// MIME type of the resource content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Optional opaque schema describing the response body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,

    /// Scheme-specific extra data. Capability detection injects the
    /// EIP-712 domain `name` and `version` here when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl PaymentRequirements {
    /// Validates the record, returning every issue found.
    ///
    /// # Errors
    ///
    /// Returns the full list of [`ValidationIssue`]s when any field is
    /// out of shape.
    pub fn validate(&self) -> Result<(), Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        check_address("asset", &self.asset, &mut issues);
        check_address("payTo", &self.pay_to, &mut issues);
        check_amount("maxAmountRequired", &self.max_amount_required, &mut issues);
        if self.max_timeout_seconds == 0 {
            issues.push(ValidationIssue::new(
                "maxTimeoutSeconds",
                "must be a positive integer",
            ));
        }
        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }
}

/// A signed payment authorization, carried Base64-JSON in the
/// `X-PAYMENT` request header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version (always 1).
    pub x402_version: u32,

    /// Payment scheme (always `"exact"`).
    pub scheme: ExactScheme,

    /// Network the authorization was signed for.
    pub network: Network,

    /// The typed authorization plus signature.
    pub payload: AuthorizationPayload,
}

impl PaymentPayload {
    /// Validates the payload, returning every issue found.
    ///
    /// # Errors
    ///
    /// Returns the full list of [`ValidationIssue`]s when any field is
    /// out of shape.
    pub fn validate(&self) -> Result<(), Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        if self.x402_version != X402_VERSION {
            issues.push(ValidationIssue::new(
                "x402Version",
                format!("unsupported version {}", self.x402_version),
            ));
        }
        self.payload.collect_issues(&mut issues);
        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }

    /// Returns the payment type of the inner authorization.
    #[must_use]
    pub const fn payment_type(&self) -> PaymentType {
        self.payload.payment_type()
    }
}

/// The typed EIP-712 authorization carried inside a payment payload,
/// discriminated by the `authorizationType` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "authorizationType")]
pub enum AuthorizationPayload {
    /// EIP-2612 `permit` authorization.
    #[serde(rename = "permit")]
    Permit(PermitAuthorization),
    /// EIP-3009 `transferWithAuthorization` authorization.
    #[serde(rename = "eip3009")]
    Eip3009(Eip3009Authorization),
    /// Permit2 signature-transfer authorization.
    #[serde(rename = "permit2")]
    Permit2(Permit2Authorization),
}

impl AuthorizationPayload {
    /// Returns the payment type of this authorization.
    #[must_use]
    pub const fn payment_type(&self) -> PaymentType {
        match self {
            Self::Permit(_) => PaymentType::Permit,
            Self::Eip3009(_) => PaymentType::Eip3009,
            Self::Permit2(_) => PaymentType::Permit2,
        }
    }

    /// Returns the signer (payer-claimed) address of this authorization.
    #[must_use]
    pub fn signer(&self) -> &str {
        match self {
            Self::Permit(p) => &p.owner,
            Self::Eip3009(p) => &p.from,
            Self::Permit2(p) => &p.from,
        }
    }

    fn collect_issues(&self, issues: &mut Vec<ValidationIssue>) {
        match self {
            Self::Permit(p) => {
                check_address("payload.owner", &p.owner, issues);
                check_address("payload.spender", &p.spender, issues);
                check_amount("payload.value", &p.value, issues);
                check_amount("payload.nonce", &p.nonce, issues);
                check_amount("payload.deadline", &p.deadline, issues);
            }
            Self::Eip3009(p) => {
                check_address("payload.from", &p.from, issues);
                check_address("payload.to", &p.to, issues);
                check_amount("payload.value", &p.value, issues);
                check_amount("payload.validAfter", &p.valid_after, issues);
                check_amount("payload.validBefore", &p.valid_before, issues);
                check_bytes32("payload.nonce", &p.nonce, issues);
            }
            Self::Permit2(p) => {
                check_address("payload.from", &p.from, issues);
                check_address("payload.token", &p.token, issues);
                check_address("payload.spender", &p.spender, issues);
                check_amount("payload.amount", &p.amount, issues);
                check_amount("payload.nonce", &p.nonce, issues);
                check_amount("payload.deadline", &p.deadline, issues);
            }
        }
    }
}

/// EIP-2612 `permit` parameters plus the owner's signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitAuthorization {
    /// Token owner (the payer).
    pub owner: String,
    /// Approved spender.
    pub spender: String,
    /// Approved amount in smallest unit, decimal string.
    pub value: String,
    /// The owner's current permit nonce, decimal string.
    pub nonce: String,
    /// Signature expiry as a unix timestamp, decimal string.
    pub deadline: String,
    /// EIP-712 signature, hex.
    pub signature: String,
}

/// EIP-3009 `transferWithAuthorization` parameters plus signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    /// The address authorizing the transfer (the payer).
    pub from: String,
    /// The recipient of the transfer.
    pub to: String,
    /// Transfer amount in smallest unit, decimal string.
    pub value: String,
    /// Not valid before this unix timestamp (inclusive), decimal string.
    pub valid_after: String,
    /// Expires at this unix timestamp (exclusive), decimal string.
    pub valid_before: String,
    /// Unique 32-byte nonce, hex.
    pub nonce: String,
    /// EIP-712 signature, hex.
    pub signature: String,
}

/// Permit2 `PermitTransferFrom` parameters plus signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permit2Authorization {
    /// Signer / token owner (the payer).
    pub from: String,
    /// Token contract address permitted for transfer.
    pub token: String,
    /// Permitted amount in smallest unit, decimal string.
    pub amount: String,
    /// The spender named in the signed message.
    pub spender: String,
    /// Unique uint256 nonce, decimal string.
    pub nonce: String,
    /// Signature expiry as a unix timestamp, decimal string.
    pub deadline: String,
    /// Optional witness data bound into the signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<Value>,
    /// EIP-712 signature, hex.
    pub signature: String,
}

/// The pipeline stage at which a payment was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStage {
    /// Header decoding or schema validation failed.
    Parse,
    /// The facilitator rejected the authorization.
    Verify,
    /// On-chain settlement failed.
    Settle,
}

impl ErrorStage {
    /// Returns the wire name of this stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Verify => "verify",
            Self::Settle => "settle",
        }
    }

    /// Returns the HTTP status code rejections at this stage carry.
    ///
    /// Parse and verify failures are client-attributable (402, the
    /// client can re-sign with corrected input); settle failures are
    /// chain- or facilitator-attributable (500, retrying the same
    /// authorization is meaningless).
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Parse | Self::Verify => 402,
            Self::Settle => 500,
        }
    }
}

impl fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `402 Payment Required` (or `500`) response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version (always 1).
    pub x402_version: u32,

    /// The payment terms the server accepts.
    pub accepts: Vec<PaymentRequirements>,

    /// Machine-readable error, when the request carried a rejected payment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The stage at which the payment was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stage: Option<ErrorStage>,
}

impl PaymentRequired {
    /// Builds a bare 402 body carrying only the accepted terms.
    #[must_use]
    pub const fn new(accepts: Vec<PaymentRequirements>) -> Self {
        Self {
            x402_version: X402_VERSION,
            accepts,
            error: None,
            error_stage: None,
        }
    }

    /// Builds a rejection body for the given stage and error.
    #[must_use]
    pub fn rejection(
        accepts: Vec<PaymentRequirements>,
        stage: ErrorStage,
        error: impl Into<String>,
    ) -> Self {
        Self {
            x402_version: X402_VERSION,
            accepts,
            error: Some(error.into()),
            error_stage: Some(stage),
        }
    }
}
