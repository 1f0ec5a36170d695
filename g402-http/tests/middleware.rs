//! Integration tests for the payment gate middleware, driving an axum
//! router end-to-end with an in-memory chain reader and a scripted
//! facilitator.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy_primitives::{Address, B256, Bytes, FixedBytes, address};
use alloy_transport::TransportErrorKind;
use axum::body::to_bytes;
use axum::routing::get;
use axum::{Extension, Router};
use http::{Request, StatusCode, header};
use tower::ServiceExt;

use g402::builder::{PaymentTypeChoice, RequirementsConfig};
use g402::facilitator::{Facilitator, SupportedQuery};
use g402::server::PaymentServer;
use g402_evm::reader::{Eip712DomainInfo, EvmReader, EvmReaderError};
use g402_http::gate::{PaymentGate, PaymentReceipt, StaticGate};
use g402_http::layer::X402Gate;
use g402_proto::types::{AuthorizationPayload, Eip3009Authorization, ExactScheme};
use g402_proto::{
    Network, PaymentPayload, PaymentRequired, SettleRequest, SettleResponse, SupportedResponse,
    VerifyRequest, VerifyResponse, encode_payment_header,
};

const USDC: Address = address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
const MERCHANT: &str = "0x3333333333333333333333333333333333333333";
const PAYER: &str = "0x1111111111111111111111111111111111111111";

#[derive(Clone, Default)]
struct MockReader {
    names: Arc<HashMap<Address, String>>,
}

impl MockReader {
    fn fail() -> EvmReaderError {
        EvmReaderError::Transport(TransportErrorKind::custom_str("no such view"))
    }
}

impl EvmReader for MockReader {
    async fn get_code(&self, _address: Address) -> Result<Bytes, EvmReaderError> {
        Ok(Bytes::new())
    }

    async fn get_storage_at(&self, _address: Address, _slot: B256) -> Result<B256, EvmReaderError> {
        Ok(B256::ZERO)
    }

    async fn chain_id(&self) -> Result<u64, EvmReaderError> {
        Ok(56)
    }

    async fn token_name(&self, token: Address) -> Result<String, EvmReaderError> {
        self.names.get(&token).cloned().ok_or_else(Self::fail)
    }

    async fn token_version(&self, _token: Address) -> Result<String, EvmReaderError> {
        Err(Self::fail())
    }

    async fn eip712_domain(&self, _token: Address) -> Result<Eip712DomainInfo, EvmReaderError> {
        Err(Self::fail())
    }

    async fn implementation_address(&self, _token: Address) -> Result<Address, EvmReaderError> {
        Err(Self::fail())
    }

    async fn supports_interface(
        &self,
        _target: Address,
        _interface_id: FixedBytes<4>,
    ) -> Result<bool, EvmReaderError> {
        Err(Self::fail())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("facilitator unreachable: connection refused")]
struct Unreachable;

#[derive(Clone)]
struct StubFacilitator {
    verify: Option<VerifyResponse>,
    settle: Option<SettleResponse>,
}

impl StubFacilitator {
    fn happy() -> Self {
        Self {
            verify: Some(VerifyResponse::valid(PAYER)),
            settle: Some(SettleResponse::confirmed("0xTX123", Network::Bsc)),
        }
    }
}

impl Facilitator for StubFacilitator {
    type Error = Unreachable;

    async fn verify(&self, _request: &VerifyRequest) -> Result<VerifyResponse, Unreachable> {
        self.verify.clone().ok_or(Unreachable)
    }

    async fn settle(&self, _request: &SettleRequest) -> Result<SettleResponse, Unreachable> {
        self.settle.clone().ok_or(Unreachable)
    }

    async fn supported(&self, _query: &SupportedQuery) -> Result<SupportedResponse, Unreachable> {
        Ok(SupportedResponse::default())
    }
}

/// Gate wrapper counting lifecycle callbacks.
#[derive(Clone)]
struct CountingGate {
    inner: StaticGate,
    successes: Arc<AtomicUsize>,
    rejections: Arc<AtomicUsize>,
    errors: Arc<AtomicUsize>,
}

impl CountingGate {
    fn new(config: RequirementsConfig) -> Self {
        Self {
            inner: StaticGate::new(config),
            successes: Arc::new(AtomicUsize::new(0)),
            rejections: Arc::new(AtomicUsize::new(0)),
            errors: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl PaymentGate for CountingGate {
    async fn resolve(
        &self,
        parts: &http::request::Parts,
    ) -> Result<RequirementsConfig, g402_http::GateError> {
        self.inner.resolve(parts).await
    }

    async fn on_payment_success(&self, _parts: &http::request::Parts, _receipt: &PaymentReceipt) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_payment_required(
        &self,
        _parts: &http::request::Parts,
        _response: &PaymentRequired,
    ) {
        self.rejections.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_error(&self, _parts: &http::request::Parts, _error: &g402_http::GateError) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

fn paid_config() -> RequirementsConfig {
    let mut config = RequirementsConfig::new(format!("{USDC:#x}"), "1000000");
    config.network = Some(Network::Bsc);
    config.auto_detect = Some(false);
    config.payment_type = Some(PaymentTypeChoice::Eip3009);
    config.description = Some("premium data".to_owned());
    config
}

fn app_with(facilitator: StubFacilitator, gate: CountingGate) -> Router {
    let server =
        Arc::new(PaymentServer::new(MockReader::default(), facilitator).with_pay_to(MERCHANT));
    let layer = X402Gate::new(server, gate);
    Router::new()
        .route(
            "/paid",
            get(|Extension(receipt): Extension<PaymentReceipt>| async move {
                format!("paid by {} in {}", receipt.payer, receipt.tx_hash)
            }),
        )
        .layer(layer)
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

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_header_yields_402_with_requirements() {
    let gate = CountingGate::new(paid_config());
    let app = app_with(StubFacilitator::happy(), gate.clone());

    let response = app
        .oneshot(Request::get("/paid").body(axum::body::Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    let json = body_json(response).await;
    assert_eq!(json["x402Version"], 1);
    assert_eq!(json["error"], "missing_payment_header");
    assert_eq!(json["errorStage"], "parse");
    assert_eq!(json["accepts"][0]["paymentType"], "eip3009");
    // The middleware filled the resource URL from the request.
    assert_eq!(json["accepts"][0]["resource"], "http://localhost/paid");

    assert_eq!(gate.rejections.load(Ordering::SeqCst), 1);
    assert_eq!(gate.successes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn valid_payment_admits_request_with_receipt() {
    let gate = CountingGate::new(paid_config());
    let app = app_with(StubFacilitator::happy(), gate.clone());

    let response = app
        .oneshot(
            Request::get("/paid")
                .header("X-Payment", signed_header())
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(
        bytes.as_ref(),
        format!("paid by {PAYER} in 0xTX123").as_bytes()
    );
    assert_eq!(gate.successes.load(Ordering::SeqCst), 1);
    assert_eq!(gate.rejections.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn settle_failure_yields_500_without_invoking_handler() {
    let facilitator = StubFacilitator {
        verify: Some(VerifyResponse::valid(PAYER)),
        settle: Some(SettleResponse::failed("insufficient_gas")),
    };
    let gate = CountingGate::new(paid_config());
    let app = app_with(facilitator, gate.clone());

    let response = app
        .oneshot(
            Request::get("/paid")
                .header("x-payment", signed_header())
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "insufficient_gas");
    assert_eq!(json["errorStage"], "settle");
    // 500s are not 402s: the on_payment_required hook stays silent.
    assert_eq!(gate.rejections.load(Ordering::SeqCst), 0);
    assert_eq!(gate.successes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn verify_failure_yields_402_with_facilitator_error() {
    let facilitator = StubFacilitator {
        verify: Some(VerifyResponse::invalid("invalid_signature")),
        settle: None,
    };
    let app = app_with(facilitator, CountingGate::new(paid_config()));

    let response = app
        .oneshot(
            Request::get("/paid")
                .header("x-payment", signed_header())
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_signature");
    assert_eq!(json["errorStage"], "verify");
}

#[tokio::test]
async fn invalid_configuration_yields_400_with_details() {
    let mut config = paid_config();
    config.asset = "not-an-address".to_owned();
    let gate = CountingGate::new(config);
    let app = app_with(StubFacilitator::happy(), gate.clone());

    let response = app
        .oneshot(Request::get("/paid").body(axum::body::Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid payment configuration");
    assert_eq!(json["details"][0]["field"], "asset");
    assert_eq!(gate.errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn header_lookup_is_case_insensitive() {
    let app = app_with(StubFacilitator::happy(), CountingGate::new(paid_config()));

    let response = app
        .oneshot(
            Request::get("/paid")
                .header("X-PAYMENT", signed_header())
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
