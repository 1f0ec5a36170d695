//! Cached, proxy-aware token-capability detection.
//!
//! [`TokenDetector`] decides which EIP-712 authorization flavors a token
//! contract supports and extracts the EIP-712 domain data needed to
//! verify signatures. Results are cached per `(chain id, address)` for
//! the life of the process.
//!
//! Detection degrades gracefully: an RPC failure on an individual probe
//! marks that capability absent rather than failing the whole
//! detection. Only an unreadable token `name()` fails [`detect`].
//!
//! [`detect`]: TokenDetector::detect

use std::collections::BTreeSet;

use alloy_primitives::{Address, B256, FixedBytes, hex};
use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use g402_proto::{PaymentMethod, PaymentType};

use crate::constants::{
    DEFAULT_TOKEN_VERSION, EIP1822_PROXIABLE_SLOT, EIP1967_IMPLEMENTATION_SLOT,
    EIP3009_SELECTORS, PERMIT2_ADDRESS, PERMIT_SELECTOR, SETTLE_WITH_ERC3009_INTERFACE_ID,
    SETTLE_WITH_PERMIT2_INTERFACE_ID, SETTLE_WITH_PERMIT_INTERFACE_ID,
};
use crate::presets::preset_for;
use crate::reader::{EvmReader, EvmReaderError};

/// Errors that can fail a detection outright.
///
/// Per-probe RPC failures do not appear here; they degrade the probe.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    /// The token `name()` could not be read on either the direct or the
    /// proxy-implementation path.
    #[error("failed to read name() for token {address}: {source}")]
    TokenName {
        /// The token that was being detected.
        address: Address,
        /// The underlying read failure.
        #[source]
        source: EvmReaderError,
    },
    /// The chain id could not be determined.
    #[error("failed to resolve chain id: {0}")]
    ChainId(#[source] EvmReaderError),
}

/// The detected capabilities of one token on one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDetection {
    /// Every method the token supports.
    pub supported_methods: BTreeSet<PaymentMethod>,
    /// EIP-712 domain name (the token `name()`).
    pub name: String,
    /// EIP-712 domain version (`eip712Domain()` third field, then
    /// `version()`, then `"1"`).
    pub version: String,
}

impl TokenDetection {
    /// Whether EIP-3009 `transferWithAuthorization` is supported.
    #[must_use]
    pub fn has_eip3009(&self) -> bool {
        self.supported_methods.contains(&PaymentMethod::Eip3009)
    }

    /// Whether EIP-2612 `permit` is supported.
    #[must_use]
    pub fn has_permit(&self) -> bool {
        self.supported_methods.contains(&PaymentMethod::Permit)
    }

    /// Whether Permit2 (with or without witness) is supported.
    #[must_use]
    pub fn has_permit2(&self) -> bool {
        self.supported_methods.contains(&PaymentMethod::Permit2)
            || self
                .supported_methods
                .contains(&PaymentMethod::Permit2Witness)
    }

    /// Picks the preferred payment type, priority
    /// `eip3009 > permit > permit2`; `permit2-witness` folds into
    /// `permit2`.
    #[must_use]
    pub fn recommended(&self) -> Option<PaymentType> {
        if self.has_eip3009() {
            Some(PaymentType::Eip3009)
        } else if self.has_permit() {
            Some(PaymentType::Permit)
        } else if self.has_permit2() {
            Some(PaymentType::Permit2)
        } else {
            None
        }
    }
}

/// ERC-165 settle-interface support of a merchant's receiving contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettleMethodSupport {
    /// `settleWithPermit` (interface id `0x02ccc23e`).
    pub supports_settle_with_permit: bool,
    /// `settleWithERC3009` (interface id `0x1fe200d9`).
    pub supports_settle_with_erc3009: bool,
    /// `settleWithPermit2` (interface id `0xa7fcafbb`).
    pub supports_settle_with_permit2: bool,
}

/// A snapshot of the detection cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached detections.
    pub entries: usize,
    /// Cache keys as `<chainId>:<0x-lowercase-address>`.
    pub keys: Vec<String>,
}

/// Cached, proxy-aware token-capability detector.
///
/// One instance is owned by the payment server and shared across all
/// concurrent requests. The cache is the only mutable state; entries
/// never expire. Two concurrent detections of the same cold token may
/// both probe the chain. Duplicate insertion is idempotent and no lock
/// is held across RPC I/O.
#[derive(Debug)]
pub struct TokenDetector<R> {
    reader: R,
    cache: DashMap<(u64, Address), TokenDetection>,
    chain_id: OnceCell<u64>,
}

impl<R: EvmReader> TokenDetector<R> {
    /// Creates a detector over the given reader.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            cache: DashMap::new(),
            chain_id: OnceCell::new(),
        }
    }

    /// Returns the chain id of the connected network, fetching it on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ChainId`] if the RPC read fails (the
    /// result is not cached in that case; a later call retries).
    pub async fn chain_id(&self) -> Result<u64, DetectError> {
        self.chain_id
            .get_or_try_init(|| self.reader.chain_id())
            .await
            .copied()
            .map_err(DetectError::ChainId)
    }

    /// Detects the capabilities of `token`, consulting the cache first.
    ///
    /// # Errors
    ///
    /// Fails only when the chain id or the token `name()` cannot be
    /// read; every other probe failure degrades to "capability absent".
    pub async fn detect(&self, token: Address) -> Result<TokenDetection, DetectError> {
        let chain_id = self.chain_id().await?;
        if let Some(hit) = self.cache.get(&(chain_id, token)) {
            return Ok(hit.clone());
        }

        let detection = if let Some(preset) = preset_for(token) {
            let supported_methods = if preset.chain_ids.contains(&chain_id) {
                preset.methods.iter().copied().collect()
            } else {
                debug!(
                    token = %token,
                    chain_id,
                    "preset exists but chain is not in its supported list"
                );
                BTreeSet::new()
            };
            TokenDetection {
                supported_methods,
                name: preset.name.to_owned(),
                version: preset.version.to_owned(),
            }
        } else {
            self.probe(token).await?
        };

        // Concurrent misses may both land here; last write wins with an
        // identical value.
        self.cache.insert((chain_id, token), detection.clone());
        Ok(detection)
    }

    /// Detects and picks the preferred payment type for `token`.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`detect`](Self::detect).
    pub async fn recommended_method(
        &self,
        token: Address,
    ) -> Result<Option<PaymentType>, DetectError> {
        Ok(self.detect(token).await?.recommended())
    }

    /// Probes the merchant's receiving contract for the three ERC-165
    /// settle interfaces. Probe failures degrade to `false`.
    pub async fn detect_settle_methods(&self, recipient: Address) -> SettleMethodSupport {
        let (permit, erc3009, permit2) = tokio::join!(
            self.probe_interface(recipient, SETTLE_WITH_PERMIT_INTERFACE_ID),
            self.probe_interface(recipient, SETTLE_WITH_ERC3009_INTERFACE_ID),
            self.probe_interface(recipient, SETTLE_WITH_PERMIT2_INTERFACE_ID),
        );
        SettleMethodSupport {
            supports_settle_with_permit: permit,
            supports_settle_with_erc3009: erc3009,
            supports_settle_with_permit2: permit2,
        }
    }

    /// Warms the cache for a batch of tokens in parallel.
    ///
    /// Per-address failures are logged and do not abort the batch.
    pub async fn initialize(&self, tokens: &[Address]) {
        let detections = futures::future::join_all(
            tokens
                .iter()
                .map(|&token| async move { (token, self.detect(token).await) }),
        )
        .await;
        for (token, result) in detections {
            if let Err(error) = result {
                warn!(token = %token, %error, "token warm-up failed");
            }
        }
    }

    /// Drops cached detections for one token (on every chain), or the
    /// entire cache when `token` is `None`.
    pub fn clear_cache(&self, token: Option<Address>) {
        match token {
            Some(address) => self.cache.retain(|(_, cached), _| *cached != address),
            None => self.cache.clear(),
        }
    }

    /// Returns a snapshot of the cache contents.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        let keys = self
            .cache
            .iter()
            .map(|entry| {
                let (chain_id, address) = entry.key();
                format!("{chain_id}:{address:#x}")
            })
            .collect::<Vec<_>>();
        CacheStats {
            entries: keys.len(),
            keys,
        }
    }

    /// Full on-chain probe for a token with no preset.
    async fn probe(&self, token: Address) -> Result<TokenDetection, DetectError> {
        let (code, permit2_live) =
            tokio::join!(self.reader.get_code(token), self.permit2_deployed());

        let code_hex = match code {
            Ok(bytes) => hex::encode(&bytes),
            Err(error) => {
                debug!(token = %token, %error, "bytecode fetch failed, treating as empty");
                String::new()
            }
        };

        let mut has_eip3009 = contains_any_selector(&code_hex, &EIP3009_SELECTORS);
        let mut has_permit = code_hex.contains(PERMIT_SELECTOR);

        // Proxy escalation: a direct miss may just mean the selectors
        // live in the implementation contract. Attempted once.
        let mut implementation = None;
        if !has_eip3009 || !has_permit {
            if let Some(impl_address) = self.resolve_implementation(token).await {
                implementation = Some(impl_address);
                match self.reader.get_code(impl_address).await {
                    Ok(bytes) => {
                        let impl_hex = hex::encode(&bytes);
                        has_eip3009 =
                            has_eip3009 || contains_any_selector(&impl_hex, &EIP3009_SELECTORS);
                        has_permit = has_permit || impl_hex.contains(PERMIT_SELECTOR);
                    }
                    Err(error) => {
                        debug!(
                            token = %token,
                            implementation = %impl_address,
                            %error,
                            "implementation bytecode fetch failed"
                        );
                    }
                }
            }
        }

        let (name, version) = self.token_info(token, implementation).await?;

        let mut supported_methods = BTreeSet::new();
        if has_eip3009 {
            supported_methods.insert(PaymentMethod::Eip3009);
        }
        if has_permit {
            supported_methods.insert(PaymentMethod::Permit);
        }
        if permit2_live {
            supported_methods.insert(PaymentMethod::Permit2);
            supported_methods.insert(PaymentMethod::Permit2Witness);
        }

        Ok(TokenDetection {
            supported_methods,
            name,
            version,
        })
    }

    /// Whether the universal Permit2 contract is deployed on this chain.
    async fn permit2_deployed(&self) -> bool {
        match self.reader.get_code(PERMIT2_ADDRESS).await {
            Ok(code) => !code.is_empty(),
            Err(error) => {
                debug!(%error, "Permit2 bytecode check failed");
                false
            }
        }
    }

    /// Resolves the implementation behind a proxy, trying EIP-1967, then
    /// EIP-1822, then the `implementation()` view. Individual strategy
    /// failures are swallowed; all three failing means "not a proxy".
    async fn resolve_implementation(&self, token: Address) -> Option<Address> {
        for slot in [EIP1967_IMPLEMENTATION_SLOT, EIP1822_PROXIABLE_SLOT] {
            match self.reader.get_storage_at(token, slot).await {
                Ok(word) => {
                    if let Some(address) = address_from_word(word) {
                        return Some(address);
                    }
                }
                Err(error) => {
                    debug!(token = %token, slot = %slot, %error, "proxy slot read failed");
                }
            }
        }
        match self.reader.implementation_address(token).await {
            Ok(address) if !address.is_zero() => Some(address),
            Ok(_) => None,
            Err(error) => {
                debug!(token = %token, %error, "implementation() call failed");
                None
            }
        }
    }

    /// Reads the token name and EIP-712 version.
    ///
    /// `name()` is read on the token address (delegatecall makes
    /// proxies forward it transparently), with one retry against the
    /// implementation if the direct read fails. The version falls back
    /// `eip712Domain()` → `version()` → `"1"`.
    async fn token_info(
        &self,
        token: Address,
        implementation: Option<Address>,
    ) -> Result<(String, String), DetectError> {
        let name = match self.reader.token_name(token).await {
            Ok(name) => name,
            Err(direct_error) => match implementation {
                Some(impl_address) => self
                    .reader
                    .token_name(impl_address)
                    .await
                    .map_err(|source| DetectError::TokenName {
                        address: token,
                        source,
                    })?,
                None => {
                    return Err(DetectError::TokenName {
                        address: token,
                        source: direct_error,
                    });
                }
            },
        };

        let version = match self.reader.eip712_domain(token).await {
            Ok(domain) => domain.version,
            Err(error) => {
                debug!(token = %token, %error, "eip712Domain() unavailable, trying version()");
                match self.reader.token_version(token).await {
                    Ok(version) => version,
                    Err(error) => {
                        debug!(token = %token, %error, "version() unavailable, defaulting");
                        DEFAULT_TOKEN_VERSION.to_owned()
                    }
                }
            }
        };

        Ok((name, version))
    }

    async fn probe_interface(&self, target: Address, interface_id: FixedBytes<4>) -> bool {
        match self.reader.supports_interface(target, interface_id).await {
            Ok(supported) => supported,
            Err(error) => {
                debug!(target = %target, interface = %interface_id, %error, "ERC-165 probe failed");
                false
            }
        }
    }
}

/// Whether any of the given 4-byte selectors appears in the bytecode.
///
/// The bytecode is matched as lowercase hex without the `0x` prefix;
/// selectors are lowercase hex.
fn contains_any_selector(code_hex: &str, selectors: &[&str]) -> bool {
    selectors.iter().any(|selector| code_hex.contains(selector))
}

/// Extracts the 20-byte address from the low bytes of a storage word.
/// A zero word (or zero address) means the slot is unset.
fn address_from_word(word: B256) -> Option<Address> {
    if word == B256::ZERO {
        return None;
    }
    let address = Address::from_slice(&word[12..]);
    if address.is_zero() { None } else { Some(address) }
}
