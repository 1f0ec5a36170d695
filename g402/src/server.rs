//! The payment server and its `parse → verify → settle` pipeline.
//!
//! [`PaymentServer`] owns one [`TokenDetector`] (and thereby its cache)
//! and one [`Facilitator`]; both are created at construction and live
//! for the process. [`PaymentServer::process`] is the three-stage state
//! machine that turns an `X-PAYMENT` header into either a settled
//! transaction or a categorized rejection:
//!
//! ```text
//! start ──► parse ──fail──► 402 {errorStage: "parse"}
//!             │ok
//!             ▼
//!           verify ──fail──► 402 {errorStage: "verify"}
//!             │ok
//!             ▼
//!           settle ──fail──► 500 {errorStage: "settle"}
//!             │ok
//!             ▼
//!           200 {payer, txHash}
//! ```
//!
//! Parse and verify failures are client-attributable: the client can
//! re-sign with corrected input, so they answer 402. A settle failure
//! means the client's authorization was valid and the chain or the
//! facilitator misbehaved — retrying the same authorization is
//! meaningless, so it answers 500.

use tracing::{debug, info, warn};

use g402_evm::{EvmReader, TokenDetector};
use g402_proto::{
    ErrorStage, Network, PaymentPayload, PaymentRequired, PaymentRequirements, SettleRequest,
    VerifyRequest, decode_payment_header,
};

use crate::facilitator::Facilitator;

/// Error text for an absent (or blank) `X-PAYMENT` header.
pub const MISSING_PAYMENT_HEADER: &str = "missing_payment_header";

/// Error-text prefix for a header that fails decoding or validation.
pub const INVALID_PAYMENT_HEADER: &str = "invalid_payment_header";

/// A successfully parsed payment, coupled with the server's expected
/// requirements (never the client's copy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPayment {
    /// The decoded, schema-valid payload.
    pub payload: PaymentPayload,
    /// The server-side requirements the payment is held against.
    pub requirements: PaymentRequirements,
}

/// The outcome of a settled payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// The payer address recovered by the facilitator during verify.
    pub payer: String,
    /// The settlement transaction hash reported by settle.
    pub tx_hash: String,
}

/// A categorized pipeline rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// The stage that rejected the payment.
    pub stage: ErrorStage,
    /// Machine-readable error text.
    pub error: String,
    /// The response body to send (402 or 500 shape).
    pub body: PaymentRequired,
}

impl Rejection {
    /// Builds a rejection carrying the server's accepted terms.
    #[must_use]
    pub fn new(
        stage: ErrorStage,
        error: impl Into<String>,
        requirements: &PaymentRequirements,
    ) -> Self {
        let error = error.into();
        let body = PaymentRequired::rejection(vec![requirements.clone()], stage, error.clone());
        Self { stage, error, body }
    }

    /// The HTTP status this rejection maps to (402 or 500).
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.stage.http_status()
    }
}

/// The result of running the pipeline: exactly one of
/// `200/success`, `402/parse`, `402/verify`, or `500/settle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessResult {
    /// The payment verified and settled; admit the request.
    Success(Settlement),
    /// The payment was rejected at a specific stage.
    Rejected(Rejection),
}

impl ProcessResult {
    /// Whether the payment settled.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// The server-side core: requirements construction plus the payment
/// pipeline.
///
/// Shared across all concurrent requests; the detector cache is the
/// only mutable state.
#[derive(Debug)]
pub struct PaymentServer<R, F> {
    detector: TokenDetector<R>,
    facilitator: F,
    network: Option<Network>,
    pay_to: Option<String>,
}

impl<R: EvmReader, F: Facilitator> PaymentServer<R, F> {
    /// Creates a server from its two required collaborators.
    #[must_use]
    pub fn new(reader: R, facilitator: F) -> Self {
        Self {
            detector: TokenDetector::new(reader),
            facilitator,
            network: None,
            pay_to: None,
        }
    }

    /// Overrides the network instead of resolving it from the RPC
    /// endpoint's chain id.
    #[must_use]
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = Some(network);
        self
    }

    /// Sets the default receiving address for built requirements.
    #[must_use]
    pub fn with_pay_to(mut self, pay_to: impl Into<String>) -> Self {
        self.pay_to = Some(pay_to.into());
        self
    }

    /// The detector owned by this server.
    pub const fn detector(&self) -> &TokenDetector<R> {
        &self.detector
    }

    /// The facilitator owned by this server.
    pub const fn facilitator(&self) -> &F {
        &self.facilitator
    }

    pub(crate) const fn default_network(&self) -> Option<&Network> {
        self.network.as_ref()
    }

    pub(crate) fn default_pay_to(&self) -> Option<&str> {
        self.pay_to.as_deref()
    }

    /// Runs the full pipeline on an incoming header.
    ///
    /// Cancellation-safe: dropping the returned future mid-flight admits
    /// nothing and fires no callbacks (though a settlement already
    /// submitted by the facilitator remains authoritative on-chain).
    pub async fn process(
        &self,
        header: Option<&str>,
        requirements: &PaymentRequirements,
    ) -> ProcessResult {
        let parsed = match parse_payment(header, requirements) {
            Ok(parsed) => parsed,
            Err(rejection) => {
                debug!(error = %rejection.error, "payment rejected at parse");
                return ProcessResult::Rejected(rejection);
            }
        };

        let verify_request = VerifyRequest::new(parsed.payload, parsed.requirements);
        let payer = match self.verify(&verify_request, requirements).await {
            Ok(payer) => payer,
            Err(rejection) => return ProcessResult::Rejected(rejection),
        };

        let settle_request = SettleRequest::from(verify_request);
        match self.settle(&settle_request, requirements).await {
            Ok(tx_hash) => {
                info!(payer = %payer, tx_hash = %tx_hash, "payment settled");
                ProcessResult::Success(Settlement { payer, tx_hash })
            }
            Err(rejection) => ProcessResult::Rejected(rejection),
        }
    }

    /// Verify stage: delegate to the facilitator, demand a payer back.
    async fn verify(
        &self,
        request: &VerifyRequest,
        requirements: &PaymentRequirements,
    ) -> Result<String, Rejection> {
        match self.facilitator.verify(request).await {
            Ok(response) if response.success => response.payer.ok_or_else(|| {
                Rejection::new(
                    ErrorStage::Verify,
                    "Payer address not found in verification result",
                    requirements,
                )
            }),
            Ok(response) => {
                debug!(error = response.failure_reason(), "facilitator rejected payment");
                Err(Rejection::new(
                    ErrorStage::Verify,
                    response.failure_reason(),
                    requirements,
                ))
            }
            Err(error) => {
                warn!(%error, "facilitator verify unreachable");
                Err(Rejection::new(
                    ErrorStage::Verify,
                    error.to_string(),
                    requirements,
                ))
            }
        }
    }

    /// Settle stage: delegate to the facilitator, demand a hash back.
    async fn settle(
        &self,
        request: &SettleRequest,
        requirements: &PaymentRequirements,
    ) -> Result<String, Rejection> {
        match self.facilitator.settle(request).await {
            Ok(response) if response.success => response.transaction.ok_or_else(|| {
                Rejection::new(
                    ErrorStage::Settle,
                    "settlement succeeded without a transaction hash",
                    requirements,
                )
            }),
            Ok(response) => {
                warn!(error = response.failure_reason(), "settlement failed");
                Err(Rejection::new(
                    ErrorStage::Settle,
                    response.failure_reason(),
                    requirements,
                ))
            }
            Err(error) => {
                warn!(%error, "facilitator settle unreachable");
                Err(Rejection::new(
                    ErrorStage::Settle,
                    error.to_string(),
                    requirements,
                ))
            }
        }
    }
}

/// Parse stage: absent header, then Base64 + JSON + schema.
fn parse_payment(
    header: Option<&str>,
    requirements: &PaymentRequirements,
) -> Result<ParsedPayment, Rejection> {
    let header = match header {
        Some(value) if !value.trim().is_empty() => value,
        _ => {
            return Err(Rejection::new(
                ErrorStage::Parse,
                MISSING_PAYMENT_HEADER,
                requirements,
            ));
        }
    };
    let payload = decode_payment_header(header).map_err(|error| {
        Rejection::new(
            ErrorStage::Parse,
            format!("{INVALID_PAYMENT_HEADER}: {error}"),
            requirements,
        )
    })?;
    Ok(ParsedPayment {
        payload,
        requirements: requirements.clone(),
    })
}
