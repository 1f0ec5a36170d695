//! Payment-requirements construction.
//!
//! [`PaymentServer::create_requirements`] validates a
//! [`RequirementsConfig`], determines the payment type (auto-detecting
//! from the token contract when unspecified), attaches EIP-712 domain
//! data, cross-checks the facilitator's declared support matrix, and
//! emits a validated [`PaymentRequirements`].

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use g402_evm::EvmReader;
use g402_proto::validate::{ValidationIssue, is_decimal_amount, is_hex_address};
use g402_proto::{ExactScheme, Network, PaymentRequirements, PaymentType};

use crate::error::BuildError;
use crate::facilitator::{Facilitator, SupportedQuery};
use crate::server::PaymentServer;

/// Default payment validity window in seconds.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

/// Default MIME type advertised for the protected resource.
pub const DEFAULT_MIME_TYPE: &str = "application/json";

/// The payment type requested in a [`RequirementsConfig`]: either a
/// concrete flavor or `auto`, deferring to capability detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentTypeChoice {
    /// Defer to capability detection.
    Auto,
    /// EIP-2612 `permit`.
    Permit,
    /// EIP-3009 `transferWithAuthorization`.
    Eip3009,
    /// Uniswap Permit2.
    Permit2,
}

impl PaymentTypeChoice {
    /// The concrete payment type, unless this is `auto`.
    #[must_use]
    pub const fn fixed(self) -> Option<PaymentType> {
        match self {
            Self::Auto => None,
            Self::Permit => Some(PaymentType::Permit),
            Self::Eip3009 => Some(PaymentType::Eip3009),
            Self::Permit2 => Some(PaymentType::Permit2),
        }
    }
}

/// Configuration for one protected resource's payment terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementsConfig {
    /// The ERC-20 token contract address.
    pub asset: String,

    /// Maximum amount in the token's smallest unit, decimal string.
    pub max_amount_required: String,

    /// Receiving address; falls back to the server-wide default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pay_to: Option<String>,

    /// Network override; falls back to the server default, then to the
    /// RPC endpoint's chain id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,

    /// Scheme override (only `"exact"` exists).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<ExactScheme>,

    /// Requested payment type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<PaymentTypeChoice>,

    /// Whether to consult the token detector (default `true`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_detect: Option<bool>,

    /// URL of the protected resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// MIME type of the resource content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Payment validity window override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_timeout_seconds: Option<u64>,

    /// Optional opaque response schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,

    /// Extra data to carry; detection injects `name`/`version` on top.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl RequirementsConfig {
    /// Creates a config with just the required fields.
    #[must_use]
    pub fn new(asset: impl Into<String>, max_amount_required: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            max_amount_required: max_amount_required.into(),
            pay_to: None,
            network: None,
            scheme: None,
            payment_type: None,
            auto_detect: None,
            resource: None,
            description: None,
            mime_type: None,
            max_timeout_seconds: None,
            output_schema: None,
            extra: None,
        }
    }
}

impl<R: EvmReader, F: Facilitator> PaymentServer<R, F> {
    /// Builds validated [`PaymentRequirements`] from a config.
    ///
    /// The network resolves explicit-field → server-default → RPC chain
    /// id. With auto-detection on (the default), the payment type comes
    /// from the explicit config when set (and not `auto`), else from the
    /// detector's recommendation. The facilitator's support matrix is
    /// cross-checked permissively: an empty or unreachable `supported()`
    /// is logged and skipped, but a populated response with no matching
    /// entry is a fatal configuration error.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] on invalid input, an undetectable or
    /// unsupported token, or a facilitator support mismatch.
    pub async fn create_requirements(
        &self,
        config: RequirementsConfig,
    ) -> Result<PaymentRequirements, BuildError> {
        let pay_to = config
            .pay_to
            .as_deref()
            .or_else(|| self.default_pay_to())
            .unwrap_or_default()
            .to_owned();

        let mut issues = Vec::new();
        if !is_hex_address(&config.asset) {
            issues.push(ValidationIssue::new(
                "asset",
                "must be a 0x-prefixed 20-byte hex address",
            ));
        }
        if !is_hex_address(&pay_to) {
            issues.push(ValidationIssue::new(
                "payTo",
                "must be a 0x-prefixed 20-byte hex address",
            ));
        }
        if !is_decimal_amount(&config.max_amount_required) {
            issues.push(ValidationIssue::new(
                "maxAmountRequired",
                "must be a non-negative decimal integer",
            ));
        }
        if config.max_timeout_seconds == Some(0) {
            issues.push(ValidationIssue::new(
                "maxTimeoutSeconds",
                "must be a positive integer",
            ));
        }
        if !issues.is_empty() {
            return Err(BuildError::Validation(issues));
        }

        let network = match config.network.or_else(|| self.default_network().cloned()) {
            Some(network) => network,
            None => Network::from_chain_id(self.detector().chain_id().await?),
        };

        let token: Address = config
            .asset
            .parse()
            .map_err(|_| BuildError::Validation(vec![ValidationIssue::new(
                "asset",
                "must be a 0x-prefixed 20-byte hex address",
            )]))?;

        let explicit = config.payment_type.and_then(PaymentTypeChoice::fixed);
        let auto_detect = config.auto_detect.unwrap_or(true);

        let (payment_type, domain) = if auto_detect {
            let detection = self.detector().detect(token).await?;
            let payment_type = match explicit {
                Some(payment_type) => payment_type,
                None => detection
                    .recommended()
                    .ok_or_else(|| BuildError::NoSupportedMethod {
                        token: config.asset.clone(),
                    })?,
            };
            (payment_type, Some((detection.name, detection.version)))
        } else {
            (explicit.ok_or(BuildError::PaymentTypeRequired)?, None)
        };

        self.check_facilitator_support(&network, &config.asset, payment_type)
            .await?;

        let extra = build_extra(config.extra, domain);
        let requirements = PaymentRequirements {
            scheme: config.scheme.unwrap_or_default(),
            network,
            max_amount_required: config.max_amount_required,
            pay_to,
            asset: config.asset,
            payment_type,
            max_timeout_seconds: config
                .max_timeout_seconds
                .unwrap_or(DEFAULT_MAX_TIMEOUT_SECONDS),
            resource: config.resource,
            description: config.description,
            mime_type: Some(
                config
                    .mime_type
                    .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_owned()),
            ),
            output_schema: config.output_schema,
            extra,
        };

        requirements.validate().map_err(BuildError::Validation)?;
        Ok(requirements)
    }

    /// Confirms `(network, asset, primaryType)` against the
    /// facilitator's support matrix.
    async fn check_facilitator_support(
        &self,
        network: &Network,
        asset: &str,
        payment_type: PaymentType,
    ) -> Result<(), BuildError> {
        let query = SupportedQuery {
            chain_id: network.chain_id(),
            token_address: Some(asset.to_lowercase()),
        };
        match self.facilitator().supported(&query).await {
            Ok(response) if response.kinds.is_empty() => {
                warn!("facilitator declined to enumerate support; skipping cross-check");
                Ok(())
            }
            Ok(response) => {
                if response.supports(network, asset, payment_type.primary_type()) {
                    Ok(())
                } else {
                    Err(BuildError::UnsupportedCombination {
                        payment_type,
                        asset: asset.to_lowercase(),
                        network: network.clone(),
                        supported: response.combinations(),
                    })
                }
            }
            Err(error) => {
                warn!(%error, "facilitator supported() unreachable; skipping cross-check");
                Ok(())
            }
        }
    }
}

/// Merges caller-provided extra data with the detected EIP-712 domain.
/// Detection wins on the `name`/`version` keys.
fn build_extra(extra: Option<Value>, domain: Option<(String, String)>) -> Option<Value> {
    let mut map = match extra {
        Some(Value::Object(map)) => map,
        Some(other) => {
            let mut map = Map::new();
            map.insert("data".to_owned(), other);
            map
        }
        None => Map::new(),
    };
    if let Some((name, version)) = domain {
        map.insert("name".to_owned(), Value::String(name));
        map.insert("version".to_owned(), Value::String(version));
    }
    if map.is_empty() {
        None
    } else {
        Some(Value::Object(map))
    }
}
