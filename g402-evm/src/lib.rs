//! EVM token-capability detection for the x402 payment-gating protocol.
//!
//! This crate answers one question for a resource server: *how can a
//! given ERC-20 token be paid with?* It inspects deployed bytecode for
//! EIP-3009 and EIP-2612 function selectors, checks for the chain-wide
//! Permit2 deployment, resolves proxies (EIP-1967 / EIP-1822 /
//! `implementation()`), and extracts the EIP-712 domain `name` and
//! `version` needed to verify signatures.
//!
//! # Modules
//!
//! - [`reader`] — The [`EvmReader`] seam over JSON-RPC reads, with an
//!   alloy-backed implementation
//! - [`detector`] — The cached [`TokenDetector`]
//! - [`presets`] — Static overrides for tokens known to misreport
//! - [`constants`] — Selectors, storage slots, and interface ids

pub mod constants;
mod contract;
pub mod detector;
pub mod presets;
pub mod reader;

pub use detector::{CacheStats, DetectError, SettleMethodSupport, TokenDetection, TokenDetector};
pub use reader::{AlloyEvmReader, Eip712DomainInfo, EvmReader, EvmReaderError};
