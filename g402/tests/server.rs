//! End-to-end tests for the payment pipeline and requirements builder,
//! driving [`PaymentServer`] with an in-memory chain reader and a
//! scripted facilitator.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy_primitives::{Address, B256, Bytes, FixedBytes, address, hex};
use alloy_transport::TransportErrorKind;

use g402::builder::{PaymentTypeChoice, RequirementsConfig};
use g402::error::BuildError;
use g402::facilitator::{Facilitator, SupportedQuery};
use g402::server::{PaymentServer, ProcessResult};
use g402_evm::reader::{Eip712DomainInfo, EvmReader, EvmReaderError};
use g402_proto::responses::{AssetEip712, SupportedAsset, SupportedKind, SupportedKindExtra};
use g402_proto::types::{AuthorizationPayload, Eip3009Authorization};
use g402_proto::{
    ErrorStage, ExactScheme, Network, PaymentPayload, PaymentRequirements, PaymentType,
    SettleRequest, SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse,
    encode_payment_header,
};

const USDC: Address = address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
const USD1: Address = address!("0x8d0D000Ee44948FC98c9B98A4FA4921476f08B0d");
const PERMIT2: Address = address!("0x000000000022D473030F116dDEE9F6B43aC78BA3");
const MERCHANT: &str = "0x3333333333333333333333333333333333333333";
const PAYER: &str = "0x1111111111111111111111111111111111111111";

#[derive(Default)]
struct ReaderState {
    chain_id: u64,
    code: HashMap<Address, Bytes>,
    names: HashMap<Address, String>,
    domains: HashMap<Address, Eip712DomainInfo>,
    calls: AtomicUsize,
}

/// Shared in-memory chain reader; clones observe the same call counter.
#[derive(Clone, Default)]
struct MockReader {
    state: Arc<ReaderState>,
}

impl MockReader {
    fn on_chain(chain_id: u64) -> Self {
        Self {
            state: Arc::new(ReaderState {
                chain_id,
                ..ReaderState::default()
            }),
        }
    }

    fn usdc_on_base() -> Self {
        let mut state = ReaderState {
            chain_id: 8453,
            ..ReaderState::default()
        };
        state
            .code
            .insert(USDC, Bytes::from(hex::decode("60808063e3ee160e5b00").unwrap()));
        state.code.insert(PERMIT2, Bytes::from(vec![0x60, 0x80]));
        state.names.insert(USDC, "USD Coin".to_owned());
        state.domains.insert(
            USDC,
            Eip712DomainInfo {
                name: "USD Coin".to_owned(),
                version: "2".to_owned(),
            },
        );
        Self {
            state: Arc::new(state),
        }
    }

    fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn fail() -> EvmReaderError {
        EvmReaderError::Transport(TransportErrorKind::custom_str("no such view"))
    }
}

impl EvmReader for MockReader {
    async fn get_code(&self, address: Address) -> Result<Bytes, EvmReaderError> {
        self.bump();
        Ok(self.state.code.get(&address).cloned().unwrap_or_default())
    }

    async fn get_storage_at(&self, _address: Address, _slot: B256) -> Result<B256, EvmReaderError> {
        self.bump();
        Ok(B256::ZERO)
    }

    async fn chain_id(&self) -> Result<u64, EvmReaderError> {
        self.bump();
        Ok(self.state.chain_id)
    }

    async fn token_name(&self, token: Address) -> Result<String, EvmReaderError> {
        self.bump();
        self.state.names.get(&token).cloned().ok_or_else(Self::fail)
    }

    async fn token_version(&self, _token: Address) -> Result<String, EvmReaderError> {
        self.bump();
        Err(Self::fail())
    }

    async fn eip712_domain(&self, token: Address) -> Result<Eip712DomainInfo, EvmReaderError> {
        self.bump();
        self.state
            .domains
            .get(&token)
            .cloned()
            .ok_or_else(Self::fail)
    }

    async fn implementation_address(&self, _token: Address) -> Result<Address, EvmReaderError> {
        self.bump();
        Err(Self::fail())
    }

    async fn supports_interface(
        &self,
        _target: Address,
        _interface_id: FixedBytes<4>,
    ) -> Result<bool, EvmReaderError> {
        self.bump();
        Err(Self::fail())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("facilitator unreachable: connection refused")]
struct Unreachable;

#[derive(Default)]
struct FacilitatorState {
    /// `None` simulates a transport failure.
    verify: Option<VerifyResponse>,
    settle: Option<SettleResponse>,
    supported: Option<SupportedResponse>,
    verify_calls: AtomicUsize,
    settle_calls: AtomicUsize,
}

/// Scripted facilitator; clones observe the same call counters.
#[derive(Clone, Default)]
struct StubFacilitator {
    state: Arc<FacilitatorState>,
}

impl StubFacilitator {
    fn scripted(
        verify: Option<VerifyResponse>,
        settle: Option<SettleResponse>,
        supported: Option<SupportedResponse>,
    ) -> Self {
        Self {
            state: Arc::new(FacilitatorState {
                verify,
                settle,
                supported,
                verify_calls: AtomicUsize::new(0),
                settle_calls: AtomicUsize::new(0),
            }),
        }
    }

    fn happy() -> Self {
        Self::scripted(
            Some(VerifyResponse::valid(PAYER)),
            Some(SettleResponse::confirmed("0xTX123", Network::Bsc)),
            Some(SupportedResponse::default()),
        )
    }

    fn verify_calls(&self) -> usize {
        self.state.verify_calls.load(Ordering::SeqCst)
    }

    fn settle_calls(&self) -> usize {
        self.state.settle_calls.load(Ordering::SeqCst)
    }
}

impl Facilitator for StubFacilitator {
    type Error = Unreachable;

    async fn verify(&self, _request: &VerifyRequest) -> Result<VerifyResponse, Unreachable> {
        self.state.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.state.verify.clone().ok_or(Unreachable)
    }

    async fn settle(&self, _request: &SettleRequest) -> Result<SettleResponse, Unreachable> {
        self.state.settle_calls.fetch_add(1, Ordering::SeqCst);
        self.state.settle.clone().ok_or(Unreachable)
    }

    async fn supported(&self, _query: &SupportedQuery) -> Result<SupportedResponse, Unreachable> {
        self.state.supported.clone().ok_or(Unreachable)
    }
}

fn requirements() -> PaymentRequirements {
    PaymentRequirements {
        scheme: ExactScheme::Exact,
        network: Network::Bsc,
        max_amount_required: "1000000".to_owned(),
        pay_to: MERCHANT.to_owned(),
        asset: format!("{USDC:#x}"),
        payment_type: PaymentType::Eip3009,
        max_timeout_seconds: 300,
        resource: None,
        description: None,
        mime_type: Some("application/json".to_owned()),
        output_schema: None,
        extra: None,
    }
}

fn signed_header() -> String {
    let payload = PaymentPayload {
        x402_version: 1,
        scheme: ExactScheme::Exact,
        network: Network::Bsc,
        payload: AuthorizationPayload::Eip3009(Eip3009Authorization {
            from: PAYER.to_owned(),
            to: MERCHANT.to_owned(),
            value: "1000000".to_owned(),
            valid_after: "0".to_owned(),
            valid_before: "1735689600".to_owned(),
            nonce: "0x0101010101010101010101010101010101010101010101010101010101010101"
                .to_owned(),
            signature: "0xdeadbeef".to_owned(),
        }),
    };
    encode_payment_header(&payload).unwrap()
}

fn rejection(result: ProcessResult) -> g402::server::Rejection {
    match result {
        ProcessResult::Rejected(rejection) => rejection,
        ProcessResult::Success(settlement) => {
            panic!("expected rejection, payment settled: {settlement:?}")
        }
    }
}

#[tokio::test]
async fn missing_header_rejects_at_parse() {
    let server = PaymentServer::new(MockReader::on_chain(56), StubFacilitator::happy());
    let requirements = requirements();

    for header in [None, Some(""), Some("   ")] {
        let rejection = rejection(server.process(header, &requirements).await);
        assert_eq!(rejection.status(), 402);
        assert_eq!(rejection.stage, ErrorStage::Parse);
        assert_eq!(rejection.error, "missing_payment_header");
        assert_eq!(rejection.body.x402_version, 1);
        assert_eq!(rejection.body.accepts, vec![requirements.clone()]);
        assert_eq!(rejection.body.error_stage, Some(ErrorStage::Parse));
    }
}

#[tokio::test]
async fn malformed_header_rejects_at_parse_with_reason() {
    let facilitator = StubFacilitator::happy();
    let server = PaymentServer::new(MockReader::on_chain(56), facilitator.clone());
    let requirements = requirements();

    let rejection = rejection(server.process(Some("!!not-base64!!"), &requirements).await);
    assert_eq!(rejection.stage, ErrorStage::Parse);
    assert!(rejection.error.starts_with("invalid_payment_header:"));
    // The facilitator was never consulted.
    assert_eq!(facilitator.verify_calls(), 0);
}

#[tokio::test]
async fn schema_invalid_header_rejects_at_parse() {
    let server = PaymentServer::new(MockReader::on_chain(56), StubFacilitator::happy());
    let requirements = requirements();

    // Structurally valid JSON, wrong version.
    let json = serde_json::json!({
        "x402Version": 7,
        "scheme": "exact",
        "network": "bsc",
        "payload": {
            "authorizationType": "eip3009",
            "from": PAYER,
            "to": MERCHANT,
            "value": "1",
            "validAfter": "0",
            "validBefore": "1",
            "nonce": "0x0101010101010101010101010101010101010101010101010101010101010101",
            "signature": "0x00"
        }
    });
    let header = g402_proto::Base64Bytes::encode(serde_json::to_vec(&json).unwrap()).to_string();

    let rejection = rejection(server.process(Some(&header), &requirements).await);
    assert_eq!(rejection.stage, ErrorStage::Parse);
    assert!(rejection.error.contains("x402Version"));
}

#[tokio::test]
async fn verify_failure_rejects_with_facilitator_error() {
    let facilitator = StubFacilitator::scripted(
        Some(VerifyResponse::invalid("invalid_signature")),
        None,
        None,
    );
    let server = PaymentServer::new(MockReader::on_chain(56), facilitator.clone());
    let requirements = requirements();

    let rejection = rejection(server.process(Some(&signed_header()), &requirements).await);
    assert_eq!(rejection.status(), 402);
    assert_eq!(rejection.stage, ErrorStage::Verify);
    assert_eq!(rejection.error, "invalid_signature");
    assert_eq!(rejection.body.error.as_deref(), Some("invalid_signature"));
    assert_eq!(facilitator.settle_calls(), 0);
}

#[tokio::test]
async fn verify_without_payer_is_treated_as_failure() {
    let mut response = VerifyResponse::valid(PAYER);
    response.payer = None;
    let facilitator = StubFacilitator::scripted(Some(response), None, None);
    let server = PaymentServer::new(MockReader::on_chain(56), facilitator);

    let rejection =
        rejection(server.process(Some(&signed_header()), &requirements()).await);
    assert_eq!(rejection.stage, ErrorStage::Verify);
    assert_eq!(
        rejection.error,
        "Payer address not found in verification result"
    );
}

#[tokio::test]
async fn unreachable_facilitator_rejects_at_verify() {
    let facilitator = StubFacilitator::scripted(None, None, None);
    let server = PaymentServer::new(MockReader::on_chain(56), facilitator);

    let rejection =
        rejection(server.process(Some(&signed_header()), &requirements()).await);
    assert_eq!(rejection.status(), 402);
    assert_eq!(rejection.stage, ErrorStage::Verify);
    assert!(rejection.error.contains("unreachable"));
}

#[tokio::test]
async fn settle_failure_after_verify_returns_500() {
    let facilitator = StubFacilitator::scripted(
        Some(VerifyResponse::valid(PAYER)),
        Some(SettleResponse::failed("insufficient_gas")),
        None,
    );
    let server = PaymentServer::new(MockReader::on_chain(56), facilitator.clone());
    let requirements = requirements();

    let rejection = rejection(server.process(Some(&signed_header()), &requirements).await);
    assert_eq!(rejection.status(), 500);
    assert_eq!(rejection.stage, ErrorStage::Settle);
    assert_eq!(rejection.error, "insufficient_gas");
    assert_eq!(rejection.body.error_stage, Some(ErrorStage::Settle));
    assert_eq!(facilitator.verify_calls(), 1);
    assert_eq!(facilitator.settle_calls(), 1);
}

#[tokio::test]
async fn settle_without_transaction_hash_returns_500() {
    let mut settle = SettleResponse::confirmed("0xTX", Network::Bsc);
    settle.transaction = None;
    let facilitator =
        StubFacilitator::scripted(Some(VerifyResponse::valid(PAYER)), Some(settle), None);
    let server = PaymentServer::new(MockReader::on_chain(56), facilitator);

    let rejection =
        rejection(server.process(Some(&signed_header()), &requirements()).await);
    assert_eq!(rejection.stage, ErrorStage::Settle);
}

#[tokio::test]
async fn happy_path_returns_payer_and_tx_hash() {
    let facilitator = StubFacilitator::happy();
    let server = PaymentServer::new(MockReader::on_chain(56), facilitator.clone());

    let result = server.process(Some(&signed_header()), &requirements()).await;
    match result {
        ProcessResult::Success(settlement) => {
            assert_eq!(settlement.payer, PAYER);
            assert_eq!(settlement.tx_hash, "0xTX123");
        }
        ProcessResult::Rejected(rejection) => panic!("unexpected rejection: {rejection:?}"),
    }
    assert_eq!(facilitator.verify_calls(), 1);
    assert_eq!(facilitator.settle_calls(), 1);
}

#[tokio::test]
async fn builder_auto_detects_eip3009_and_injects_domain() {
    let reader = MockReader::usdc_on_base();
    let server = PaymentServer::new(reader, StubFacilitator::happy()).with_pay_to(MERCHANT);

    let requirements = server
        .create_requirements(
            RequirementsConfig::new(format!("{USDC:#x}"), "1000000")
                .tap_network(Network::Base),
        )
        .await
        .unwrap();

    assert_eq!(requirements.payment_type, PaymentType::Eip3009);
    assert_eq!(requirements.network, Network::Base);
    assert_eq!(requirements.max_timeout_seconds, 300);
    assert_eq!(requirements.mime_type.as_deref(), Some("application/json"));
    let extra = requirements.extra.unwrap();
    assert_eq!(extra["name"], "USD Coin");
    assert_eq!(extra["version"], "2");
}

#[tokio::test]
async fn builder_uses_preset_without_probing() {
    let reader = MockReader::on_chain(56);
    let server =
        PaymentServer::new(reader.clone(), StubFacilitator::happy()).with_pay_to(MERCHANT);

    let requirements = server
        .create_requirements(
            RequirementsConfig::new(format!("{USD1:#x}"), "1000").tap_network(Network::Bsc),
        )
        .await
        .unwrap();

    assert_eq!(requirements.payment_type, PaymentType::Permit);
    // chain_id is the only RPC that went out (cache key resolution).
    assert_eq!(reader.calls(), 1);
}

#[tokio::test]
async fn builder_resolves_network_from_chain_id() {
    let reader = MockReader::usdc_on_base();
    let server = PaymentServer::new(reader, StubFacilitator::happy()).with_pay_to(MERCHANT);

    let requirements = server
        .create_requirements(RequirementsConfig::new(format!("{USDC:#x}"), "1"))
        .await
        .unwrap();
    assert_eq!(requirements.network, Network::Base);
}

#[tokio::test]
async fn builder_requires_payment_type_when_auto_detect_off() {
    let server =
        PaymentServer::new(MockReader::on_chain(56), StubFacilitator::happy()).with_pay_to(MERCHANT);

    let mut config = RequirementsConfig::new(format!("{USDC:#x}"), "1000");
    config.network = Some(Network::Bsc);
    config.auto_detect = Some(false);
    let error = server.create_requirements(config.clone()).await.unwrap_err();
    assert!(matches!(error, BuildError::PaymentTypeRequired));

    // `paymentType: "auto"` does not satisfy the requirement either.
    config.payment_type = Some(PaymentTypeChoice::Auto);
    let error = server.create_requirements(config.clone()).await.unwrap_err();
    assert!(matches!(error, BuildError::PaymentTypeRequired));

    config.payment_type = Some(PaymentTypeChoice::Permit);
    let requirements = server.create_requirements(config).await.unwrap();
    assert_eq!(requirements.payment_type, PaymentType::Permit);
}

#[tokio::test]
async fn builder_skips_detector_when_auto_detect_off() {
    let reader = MockReader::on_chain(56);
    let server =
        PaymentServer::new(reader.clone(), StubFacilitator::happy()).with_pay_to(MERCHANT);

    let mut config = RequirementsConfig::new(format!("{USDC:#x}"), "1000");
    config.network = Some(Network::Bsc);
    config.auto_detect = Some(false);
    config.payment_type = Some(PaymentTypeChoice::Eip3009);
    server.create_requirements(config).await.unwrap();
    assert_eq!(reader.calls(), 0);
}

#[tokio::test]
async fn builder_rejects_token_with_no_methods() {
    // Chain 56 has no Permit2 deployed in this mock and the token's
    // bytecode carries no selectors.
    let mut state = ReaderState {
        chain_id: 56,
        ..ReaderState::default()
    };
    state.names.insert(USDC, "Plain".to_owned());
    let reader = MockReader {
        state: Arc::new(state),
    };
    let server = PaymentServer::new(reader, StubFacilitator::happy()).with_pay_to(MERCHANT);

    let error = server
        .create_requirements(
            RequirementsConfig::new(format!("{USDC:#x}"), "1000").tap_network(Network::Bsc),
        )
        .await
        .unwrap_err();
    assert!(matches!(error, BuildError::NoSupportedMethod { .. }));
}

#[tokio::test]
async fn builder_validation_errors_are_flagged() {
    let server =
        PaymentServer::new(MockReader::on_chain(56), StubFacilitator::happy()).with_pay_to(MERCHANT);

    let error = server
        .create_requirements(RequirementsConfig::new("not-an-address", "12e4"))
        .await
        .unwrap_err();
    assert!(error.is_validation());
    let issues = error.validation_issues().unwrap();
    assert_eq!(issues.len(), 2);
}

#[tokio::test]
async fn builder_requires_a_pay_to_from_somewhere() {
    let server = PaymentServer::new(MockReader::on_chain(56), StubFacilitator::happy());
    let error = server
        .create_requirements(
            RequirementsConfig::new(format!("{USDC:#x}"), "1000").tap_network(Network::Bsc),
        )
        .await
        .unwrap_err();
    assert!(error.is_validation());
}

#[tokio::test]
async fn populated_support_matrix_without_match_is_fatal() {
    let supported = SupportedResponse {
        kinds: vec![SupportedKind {
            x402_version: 1,
            scheme: ExactScheme::Exact,
            network: Network::Bsc,
            extra: Some(SupportedKindExtra {
                assets: vec![SupportedAsset {
                    address: format!("{USDC:#x}"),
                    eip712: Some(AssetEip712 {
                        name: "USD Coin".to_owned(),
                        version: "2".to_owned(),
                        primary_type: "Permit".to_owned(),
                    }),
                }],
            }),
        }],
    };
    let facilitator = StubFacilitator::scripted(None, None, Some(supported));
    let server = PaymentServer::new(MockReader::on_chain(56), facilitator).with_pay_to(MERCHANT);

    let mut config = RequirementsConfig::new(format!("{USDC:#x}"), "1000");
    config.network = Some(Network::Bsc);
    config.auto_detect = Some(false);
    config.payment_type = Some(PaymentTypeChoice::Eip3009);

    let error = server.create_requirements(config).await.unwrap_err();
    match error {
        BuildError::UnsupportedCombination {
            payment_type,
            supported,
            ..
        } => {
            assert_eq!(payment_type, PaymentType::Eip3009);
            assert_eq!(supported.len(), 1);
            assert!(supported[0].contains("Permit"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unreachable_support_matrix_is_permissive() {
    let facilitator = StubFacilitator::scripted(None, None, None);
    let server = PaymentServer::new(MockReader::on_chain(56), facilitator).with_pay_to(MERCHANT);

    let mut config = RequirementsConfig::new(format!("{USDC:#x}"), "1000");
    config.network = Some(Network::Bsc);
    config.auto_detect = Some(false);
    config.payment_type = Some(PaymentTypeChoice::Permit);
    assert!(server.create_requirements(config).await.is_ok());
}

/// Small helper so the builder-config tests read naturally.
trait TapNetwork {
    fn tap_network(self, network: Network) -> Self;
}

impl TapNetwork for RequirementsConfig {
    fn tap_network(mut self, network: Network) -> Self {
        self.network = Some(network);
        self
    }
}
