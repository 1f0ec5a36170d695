//! The facilitator seam.
//!
//! A facilitator is a remote service that cryptographically verifies
//! signed authorizations and submits on-chain settlement. The server
//! core only ever talks to it through this trait; the HTTP transport
//! lives in `g402-http`.

use std::future::Future;
use std::sync::Arc;

use g402_proto::{SettleRequest, SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse};

/// Query parameters for the facilitator's support matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportedQuery {
    /// Restrict to one EIP-155 chain.
    pub chain_id: Option<u64>,
    /// Restrict to one token contract address.
    pub token_address: Option<String>,
}

/// Asynchronous interface to an x402 payment facilitator.
///
/// Implementations must be safe for concurrent use; the payment server
/// shares one instance across all in-flight requests.
pub trait Facilitator: Send + Sync {
    /// Transport-level error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Verifies a payment payload against the server's requirements.
    ///
    /// A transport failure is distinct from a rejection: rejections come
    /// back as [`VerifyResponse`] with `success == false`.
    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send;

    /// Submits a verified payment for on-chain settlement.
    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send;

    /// Fetches the facilitator's declared support matrix.
    fn supported(
        &self,
        query: &SupportedQuery,
    ) -> impl Future<Output = Result<SupportedResponse, Self::Error>> + Send;
}

impl<T: Facilitator> Facilitator for Arc<T> {
    type Error = T::Error;

    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send {
        self.as_ref().verify(request)
    }

    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send {
        self.as_ref().settle(request)
    }

    fn supported(
        &self,
        query: &SupportedQuery,
    ) -> impl Future<Output = Result<SupportedResponse, Self::Error>> + Send {
        self.as_ref().supported(query)
    }
}
