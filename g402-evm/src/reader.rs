//! The JSON-RPC read seam consumed by capability detection.
//!
//! [`EvmReader`] is the narrow interface the detector needs from a
//! blockchain node: bytecode, storage slots, a handful of view
//! functions, and the chain id. [`AlloyEvmReader`] implements it over
//! any [`alloy_provider::Provider`]. No transaction submission happens
//! through this seam — settlement is the facilitator's responsibility.

use std::future::Future;

use alloy_primitives::{Address, B256, Bytes, FixedBytes, U256};
use alloy_provider::Provider;
use alloy_transport::TransportError;

use crate::contract::{IERC165, IERC20Meta};

/// Errors surfaced by [`EvmReader`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum EvmReaderError {
    /// RPC transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Contract call failure (revert, ABI decode, missing function).
    #[error(transparent)]
    Contract(#[from] alloy_contract::Error),
}

/// EIP-712 domain data read via EIP-5267 `eip712Domain()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip712DomainInfo {
    /// Domain name.
    pub name: String,
    /// Domain version.
    pub version: String,
}

/// Read-only blockchain access needed by the token detector.
///
/// Every method is a suspension point; implementations must be safe for
/// concurrent use. Failures are per-call; the detector degrades
/// individual probes rather than failing outright.
pub trait EvmReader: Send + Sync {
    /// Fetches the deployed bytecode at `address`.
    fn get_code(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<Bytes, EvmReaderError>> + Send;

    /// Reads a raw storage slot at `address`.
    fn get_storage_at(
        &self,
        address: Address,
        slot: B256,
    ) -> impl Future<Output = Result<B256, EvmReaderError>> + Send;

    /// Returns the EIP-155 chain id of the connected network.
    fn chain_id(&self) -> impl Future<Output = Result<u64, EvmReaderError>> + Send;

    /// Calls `name()` on a token contract.
    fn token_name(
        &self,
        token: Address,
    ) -> impl Future<Output = Result<String, EvmReaderError>> + Send;

    /// Calls `version()` on a token contract.
    fn token_version(
        &self,
        token: Address,
    ) -> impl Future<Output = Result<String, EvmReaderError>> + Send;

    /// Calls EIP-5267 `eip712Domain()` on a token contract.
    fn eip712_domain(
        &self,
        token: Address,
    ) -> impl Future<Output = Result<Eip712DomainInfo, EvmReaderError>> + Send;

    /// Calls `implementation()` on a contract (proxy probe).
    fn implementation_address(
        &self,
        token: Address,
    ) -> impl Future<Output = Result<Address, EvmReaderError>> + Send;

    /// Calls ERC-165 `supportsInterface(interface_id)` on `target`.
    fn supports_interface(
        &self,
        target: Address,
        interface_id: FixedBytes<4>,
    ) -> impl Future<Output = Result<bool, EvmReaderError>> + Send;
}

/// [`EvmReader`] implementation over any alloy [`Provider`].
#[derive(Debug, Clone)]
pub struct AlloyEvmReader<P> {
    provider: P,
}

impl<P> AlloyEvmReader<P> {
    /// Wraps a provider.
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Returns a reference to the underlying provider.
    pub const fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: Provider> EvmReader for AlloyEvmReader<P> {
    async fn get_code(&self, address: Address) -> Result<Bytes, EvmReaderError> {
        Ok(self.provider.get_code_at(address).await?)
    }

    async fn get_storage_at(
        &self,
        address: Address,
        slot: B256,
    ) -> Result<B256, EvmReaderError> {
        let word = self
            .provider
            .get_storage_at(address, U256::from_be_bytes(slot.0))
            .await?;
        Ok(B256::from(word.to_be_bytes::<32>()))
    }

    async fn chain_id(&self) -> Result<u64, EvmReaderError> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn token_name(&self, token: Address) -> Result<String, EvmReaderError> {
        let contract = IERC20Meta::new(token, &self.provider);
        Ok(contract.name().call().await?)
    }

    async fn token_version(&self, token: Address) -> Result<String, EvmReaderError> {
        let contract = IERC20Meta::new(token, &self.provider);
        Ok(contract.version().call().await?)
    }

    async fn eip712_domain(&self, token: Address) -> Result<Eip712DomainInfo, EvmReaderError> {
        let contract = IERC20Meta::new(token, &self.provider);
        let domain = contract.eip712Domain().call().await?;
        Ok(Eip712DomainInfo {
            name: domain.name,
            version: domain.version,
        })
    }

    async fn implementation_address(&self, token: Address) -> Result<Address, EvmReaderError> {
        let contract = IERC20Meta::new(token, &self.provider);
        Ok(contract.implementation().call().await?)
    }

    async fn supports_interface(
        &self,
        target: Address,
        interface_id: FixedBytes<4>,
    ) -> Result<bool, EvmReaderError> {
        let contract = IERC165::new(target, &self.provider);
        Ok(contract.supportsInterface(interface_id).call().await?)
    }
}
