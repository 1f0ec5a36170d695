//! The application-facing gate configuration trait.
//!
//! [`PaymentGate`] has one required method — [`resolve`], producing the
//! payment terms for a request — and optional observer methods with
//! no-op defaults. Implement only what you need.
//!
//! [`resolve`]: PaymentGate::resolve

use std::future::Future;
use std::sync::Arc;

use http::request::Parts;

use g402::builder::RequirementsConfig;
use g402_proto::PaymentRequired;

use crate::error::GateError;

/// Proof of a settled payment, attached to the request's extensions
/// before it reaches the downstream handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    /// The payer address recovered by the facilitator.
    pub payer: String,
    /// The settlement transaction hash.
    pub tx_hash: String,
}

/// Per-route payment configuration and lifecycle observers.
///
/// The gate middleware calls [`resolve`](Self::resolve) for every
/// request to produce a [`RequirementsConfig`], typically from the
/// request path, headers, or an application pricing table. The
/// `resource` field may be left unset; the middleware fills it from the
/// request URL.
pub trait PaymentGate: Send + Sync + 'static {
    /// Produces the payment terms for this request.
    fn resolve(
        &self,
        parts: &Parts,
    ) -> impl Future<Output = Result<RequirementsConfig, GateError>> + Send;

    /// Observes a settled payment. Called exactly once per admitted
    /// request, before the downstream handler runs.
    fn on_payment_success(
        &self,
        _parts: &Parts,
        _receipt: &PaymentReceipt,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Observes an outgoing `402 Payment Required` response.
    fn on_payment_required(
        &self,
        _parts: &Parts,
        _response: &PaymentRequired,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Observes a gate-level failure (configuration or resolver error).
    fn on_error(&self, _parts: &Parts, _error: &GateError) -> impl Future<Output = ()> + Send {
        async {}
    }
}

impl<G: PaymentGate> PaymentGate for Arc<G> {
    fn resolve(
        &self,
        parts: &Parts,
    ) -> impl Future<Output = Result<RequirementsConfig, GateError>> + Send {
        self.as_ref().resolve(parts)
    }

    fn on_payment_success(
        &self,
        parts: &Parts,
        receipt: &PaymentReceipt,
    ) -> impl Future<Output = ()> + Send {
        self.as_ref().on_payment_success(parts, receipt)
    }

    fn on_payment_required(
        &self,
        parts: &Parts,
        response: &PaymentRequired,
    ) -> impl Future<Output = ()> + Send {
        self.as_ref().on_payment_required(parts, response)
    }

    fn on_error(&self, parts: &Parts, error: &GateError) -> impl Future<Output = ()> + Send {
        self.as_ref().on_error(parts, error)
    }
}

/// The simplest gate: the same payment terms for every request.
#[derive(Debug, Clone)]
pub struct StaticGate {
    config: RequirementsConfig,
}

impl StaticGate {
    /// Creates a gate charging the given terms on every request.
    #[must_use]
    pub const fn new(config: RequirementsConfig) -> Self {
        Self { config }
    }

    /// The configured terms.
    #[must_use]
    pub const fn config(&self) -> &RequirementsConfig {
        &self.config
    }
}

impl PaymentGate for StaticGate {
    async fn resolve(&self, _parts: &Parts) -> Result<RequirementsConfig, GateError> {
        Ok(self.config.clone())
    }
}
