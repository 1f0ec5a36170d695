//! Tower middleware enforcing x402 payments on protected routes.
//!
//! [`X402Gate`] wraps a route with the full payment lifecycle: resolve
//! the terms via a [`PaymentGate`], build requirements, run the
//! `parse → verify → settle` pipeline on the `x-payment` header, and
//! either admit the request (with a [`PaymentReceipt`] in its
//! extensions) or answer with the categorized 402/500 body.
//!
//! Configuration failures are distinguished from payment rejections: a
//! schema-invalid server configuration answers `400 Bad Request` with
//! the issue list, never a 402.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum_core::body::Body;
use axum_core::extract::Request;
use axum_core::response::Response;
use http::request::Parts;
use http::{StatusCode, header};
use serde_json::json;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};
use tracing::{debug, warn};

use g402::facilitator::Facilitator;
use g402::server::{PaymentServer, ProcessResult, Rejection};
use g402_evm::EvmReader;

use crate::constants::X_PAYMENT_HEADER;
use crate::error::GateError;
use crate::gate::{PaymentGate, PaymentReceipt};

/// Payment-enforcing [`Layer`].
///
/// One instance per protected route (or route group); the underlying
/// [`PaymentServer`] is shared so all routes use the same detector
/// cache and facilitator connection.
pub struct X402Gate<R, F, G> {
    server: Arc<PaymentServer<R, F>>,
    gate: Arc<G>,
}

impl<R, F, G> X402Gate<R, F, G> {
    /// Creates a layer from a shared server and a gate configuration.
    pub fn new(server: Arc<PaymentServer<R, F>>, gate: G) -> Self {
        Self {
            server,
            gate: Arc::new(gate),
        }
    }
}

impl<R, F, G> Clone for X402Gate<R, F, G> {
    fn clone(&self) -> Self {
        Self {
            server: Arc::clone(&self.server),
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<R, F, G> std::fmt::Debug for X402Gate<R, F, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Gate").finish_non_exhaustive()
    }
}

impl<S, R, F, G> Layer<S> for X402Gate<R, F, G>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    R: EvmReader + 'static,
    F: Facilitator + 'static,
    G: PaymentGate,
{
    type Service = X402GateService<R, F, G>;

    fn layer(&self, inner: S) -> Self::Service {
        X402GateService {
            server: Arc::clone(&self.server),
            gate: Arc::clone(&self.gate),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// The service produced by [`X402Gate`].
pub struct X402GateService<R, F, G> {
    server: Arc<PaymentServer<R, F>>,
    gate: Arc<G>,
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl<R, F, G> Clone for X402GateService<R, F, G> {
    fn clone(&self) -> Self {
        Self {
            server: Arc::clone(&self.server),
            gate: Arc::clone(&self.gate),
            inner: self.inner.clone(),
        }
    }
}

impl<R, F, G> Service<Request> for X402GateService<R, F, G>
where
    R: EvmReader + 'static,
    F: Facilitator + 'static,
    G: PaymentGate,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let server = Arc::clone(&self.server);
        let gate = Arc::clone(&self.gate);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let (parts, body) = req.into_parts();

            let mut config = match gate.resolve(&parts).await {
                Ok(config) => config,
                Err(error) => {
                    gate.on_error(&parts, &error).await;
                    return Ok(gate_error_response(&error));
                }
            };
            if config.resource.is_none() {
                config.resource = Some(request_url(&parts));
            }

            let requirements = match server.create_requirements(config).await {
                Ok(requirements) => requirements,
                Err(error) => {
                    let error = GateError::from(error);
                    warn!(%error, "payment configuration rejected");
                    gate.on_error(&parts, &error).await;
                    return Ok(gate_error_response(&error));
                }
            };

            let header_value = parts
                .headers
                .get(X_PAYMENT_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);

            match server.process(header_value.as_deref(), &requirements).await {
                ProcessResult::Success(settlement) => {
                    let receipt = PaymentReceipt {
                        payer: settlement.payer,
                        tx_hash: settlement.tx_hash,
                    };
                    gate.on_payment_success(&parts, &receipt).await;
                    let mut req = Request::from_parts(parts, body);
                    req.extensions_mut().insert(receipt);
                    inner.call(req).await
                }
                ProcessResult::Rejected(rejection) => {
                    debug!(
                        stage = %rejection.stage,
                        error = %rejection.error,
                        "payment rejected"
                    );
                    if rejection.status() == StatusCode::PAYMENT_REQUIRED.as_u16() {
                        gate.on_payment_required(&parts, &rejection.body).await;
                    }
                    Ok(rejection_response(&rejection))
                }
            }
        })
    }
}

/// Computes the resource URL for a request from its Host header and URI.
fn request_url(parts: &Parts) -> String {
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    match parts.uri.query() {
        Some(query) => format!("http://{host}{}?{query}", parts.uri.path()),
        None => format!("http://{host}{}", parts.uri.path()),
    }
}

/// Serializes a pipeline rejection as its 402/500 JSON response.
fn rejection_response(rejection: &Rejection) -> Response {
    let body = serde_json::to_vec(&rejection.body).expect("serialization failed");
    Response::builder()
        .status(rejection.status())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("Fail to construct response")
}

/// Maps gate-level failures to 400 (validation) or 500 (anything else).
fn gate_error_response(error: &GateError) -> Response {
    let (status, body) = if let Some(issues) = error.validation_issues() {
        (
            StatusCode::BAD_REQUEST,
            json!({
                "error": "Invalid payment configuration",
                "message": error.to_string(),
                "details": issues,
            }),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "error": "Internal server error",
                "message": error.to_string(),
            }),
        )
    };
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("Fail to construct response")
}
