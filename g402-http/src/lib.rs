//! HTTP edge of the x402 payment-gating protocol.
//!
//! Two halves:
//!
//! - [`facilitator_client`] — A [`FacilitatorClient`] speaking the
//!   remote facilitator's `/verify`, `/settle`, and `/supported`
//!   endpoints over JSON HTTP
//! - [`layer`] — The [`X402Gate`] tower middleware enforcing payment on
//!   protected routes, configured through the [`PaymentGate`] trait
//!
//! # Example
//!
//! ```ignore
//! let facilitator = FacilitatorClient::try_from("https://x402.org/facilitator")?
//!     .with_api_key(api_key);
//! let server = Arc::new(
//!     PaymentServer::new(reader, facilitator).with_pay_to(merchant),
//! );
//! let gate = X402Gate::new(server, StaticGate::new(config));
//! let app = Router::new().route("/paid", get(handler)).layer(gate);
//! ```

pub mod constants;
pub mod error;
pub mod facilitator_client;
pub mod gate;
pub mod layer;

pub use constants::{DEFAULT_FACILITATOR_URL, X_PAYMENT_HEADER};
pub use error::GateError;
pub use facilitator_client::{FacilitatorClient, FacilitatorClientError};
pub use gate::{PaymentGate, PaymentReceipt, StaticGate};
pub use layer::{X402Gate, X402GateService};
