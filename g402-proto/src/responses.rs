//! Facilitator request and response types.
//!
//! These types are exchanged between resource servers and facilitators
//! during payment verification and settlement.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::X402_VERSION;
use crate::networks::Network;
use crate::types::{ExactScheme, PaymentPayload, PaymentRequirements};

/// Request to verify a payment (`POST /verify`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Protocol version (always 1).
    pub x402_version: u32,

    /// The payment payload to verify.
    pub payment_payload: PaymentPayload,

    /// The requirements to verify against.
    pub payment_requirements: PaymentRequirements,
}

impl VerifyRequest {
    /// Couples a payload with the server's expected requirements.
    #[must_use]
    pub const fn new(payload: PaymentPayload, requirements: PaymentRequirements) -> Self {
        Self {
            x402_version: X402_VERSION,
            payment_payload: payload,
            payment_requirements: requirements,
        }
    }
}

/// How long the facilitator should wait before reporting settlement.
///
/// Only `confirmed` is currently defined; `simulated` and `submitted`
/// are reserved for future facilitator versions and are rejected on
/// deserialization until then.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    /// Wait for on-chain confirmation.
    #[default]
    Confirmed,
}

/// Request to settle a payment (`POST /settle`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    /// Protocol version (always 1).
    pub x402_version: u32,

    /// The payment payload to settle.
    pub payment_payload: PaymentPayload,

    /// The requirements for settlement.
    pub payment_requirements: PaymentRequirements,

    /// Settlement finality to wait for.
    #[serde(default)]
    pub wait_until: WaitUntil,
}

impl SettleRequest {
    /// Couples a payload with the server's expected requirements.
    #[must_use]
    pub const fn new(payload: PaymentPayload, requirements: PaymentRequirements) -> Self {
        Self {
            x402_version: X402_VERSION,
            payment_payload: payload,
            payment_requirements: requirements,
            wait_until: WaitUntil::Confirmed,
        }
    }
}

impl From<VerifyRequest> for SettleRequest {
    fn from(request: VerifyRequest) -> Self {
        Self::new(request.payment_payload, request.payment_requirements)
    }
}

/// Response from payment verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// Whether the payment is valid.
    pub success: bool,

    /// The recovered payer address (present on success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,

    /// Machine-readable failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Human-readable failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl VerifyResponse {
    /// Creates a successful verification response.
    #[must_use]
    pub fn valid(payer: impl Into<String>) -> Self {
        Self {
            success: true,
            payer: Some(payer.into()),
            error: None,
            error_message: None,
        }
    }

    /// Creates a failed verification response.
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            payer: None,
            error: Some(reason.into()),
            error_message: None,
        }
    }

    /// Returns the failure text, preferring the machine-readable reason.
    #[must_use]
    pub fn failure_reason(&self) -> &str {
        self.error
            .as_deref()
            .or(self.error_message.as_deref())
            .unwrap_or("verification failed")
    }
}

/// Response from payment settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    /// Whether settlement succeeded.
    pub success: bool,

    /// Transaction hash of the settlement (present on success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,

    /// Network the settlement landed on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,

    /// Opaque transaction receipt, when the facilitator shares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Value>,

    /// Machine-readable failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Human-readable failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SettleResponse {
    /// Creates a successful settlement response.
    #[must_use]
    pub fn confirmed(transaction: impl Into<String>, network: Network) -> Self {
        Self {
            success: true,
            transaction: Some(transaction.into()),
            network: Some(network),
            receipt: None,
            error: None,
            error_message: None,
        }
    }

    /// Creates a failed settlement response.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction: None,
            network: None,
            receipt: None,
            error: Some(reason.into()),
            error_message: None,
        }
    }

    /// Returns the failure text, preferring the machine-readable reason.
    #[must_use]
    pub fn failure_reason(&self) -> &str {
        self.error
            .as_deref()
            .or(self.error_message.as_deref())
            .unwrap_or("settlement failed")
    }
}

/// EIP-712 domain data a facilitator advertises for an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEip712 {
    /// EIP-712 domain name.
    pub name: String,
    /// EIP-712 domain version.
    pub version: String,
    /// Primary type of the typed message (e.g., `TransferWithAuthorization`).
    pub primary_type: String,
}

/// An asset a facilitator supports on a given network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedAsset {
    /// Token contract address.
    pub address: String,

    /// EIP-712 domain data, when the facilitator knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eip712: Option<AssetEip712>,
}

/// Extra data on a supported payment kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedKindExtra {
    /// Assets supported for this kind.
    #[serde(default)]
    pub assets: Vec<SupportedAsset>,
}

/// A single (version, scheme, network) combination a facilitator supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedKind {
    /// Protocol version for this kind.
    pub x402_version: u32,

    /// Payment scheme identifier.
    pub scheme: ExactScheme,

    /// Network identifier.
    pub network: Network,

    /// Per-asset support details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<SupportedKindExtra>,
}

/// Response from `GET /supported`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedResponse {
    /// The supported payment kinds. An empty list means the facilitator
    /// declined to enumerate its support matrix.
    #[serde(default)]
    pub kinds: Vec<SupportedKind>,
}

impl SupportedResponse {
    /// Returns whether any kind matches `(network, asset, primary_type)`.
    ///
    /// Asset addresses compare case-insensitively.
    #[must_use]
    pub fn supports(&self, network: &Network, asset: &str, primary_type: &str) -> bool {
        self.kinds.iter().any(|kind| {
            kind.network == *network
                && kind.extra.as_ref().is_some_and(|extra| {
                    extra.assets.iter().any(|entry| {
                        entry.address.eq_ignore_ascii_case(asset)
                            && entry
                                .eip712
                                .as_ref()
                                .is_some_and(|domain| domain.primary_type == primary_type)
                    })
                })
        })
    }

    /// Enumerates every supported `(network, asset, primaryType)` tuple,
    /// for error messages listing what the facilitator does accept.
    #[must_use]
    pub fn combinations(&self) -> Vec<String> {
        let mut combos = Vec::new();
        for kind in &self.kinds {
            let Some(extra) = &kind.extra else { continue };
            for asset in &extra.assets {
                let primary = asset
                    .eip712
                    .as_ref()
                    .map_or("?", |domain| domain.primary_type.as_str());
                combos.push(format!("{}/{} ({primary})", kind.network, asset.address));
            }
        }
        combos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supported_bsc_permit(asset: &str) -> SupportedResponse {
        SupportedResponse {
            kinds: vec![SupportedKind {
                x402_version: 1,
                scheme: ExactScheme::Exact,
                network: Network::Bsc,
                extra: Some(SupportedKindExtra {
                    assets: vec![SupportedAsset {
                        address: asset.to_owned(),
                        eip712: Some(AssetEip712 {
                            name: "Test Token".to_owned(),
                            version: "1".to_owned(),
                            primary_type: "Permit".to_owned(),
                        }),
                    }],
                }),
            }],
        }
    }

    #[test]
    fn support_matrix_matches_case_insensitively() {
        let response = supported_bsc_permit("0x8d0D000Ee44948FC98c9B98A4FA4921476f08B0d");
        assert!(response.supports(
            &Network::Bsc,
            "0x8d0d000ee44948fc98c9b98a4fa4921476f08b0d",
            "Permit"
        ));
        assert!(!response.supports(
            &Network::Bsc,
            "0x8d0d000ee44948fc98c9b98a4fa4921476f08b0d",
            "TransferWithAuthorization"
        ));
        assert!(!response.supports(
            &Network::Base,
            "0x8d0d000ee44948fc98c9b98a4fa4921476f08b0d",
            "Permit"
        ));
    }

    #[test]
    fn verify_response_failure_reason_prefers_error() {
        let response = VerifyResponse {
            success: false,
            payer: None,
            error: Some("invalid_signature".to_owned()),
            error_message: Some("signature does not recover".to_owned()),
        };
        assert_eq!(response.failure_reason(), "invalid_signature");

        let bare = VerifyResponse::invalid("expired");
        assert_eq!(bare.failure_reason(), "expired");
    }

    #[test]
    fn wait_until_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&WaitUntil::Confirmed).unwrap(),
            "\"confirmed\""
        );
        // Reserved values are not yet accepted.
        assert!(serde_json::from_str::<WaitUntil>("\"simulated\"").is_err());
    }

    #[test]
    fn supported_response_tolerates_missing_kinds() {
        let response: SupportedResponse = serde_json::from_str("{}").unwrap();
        assert!(response.kinds.is_empty());
    }
}
