//! Hard-coded chain constants used by capability detection.

use alloy_primitives::{Address, B256, FixedBytes, address, b256, fixed_bytes};

/// Canonical Uniswap Permit2 contract address (same on all EVM chains
/// via CREATE2). Permit2 presence is a chain property, not a token
/// property: the detector checks this address for non-empty bytecode.
pub const PERMIT2_ADDRESS: Address = address!("0x000000000022D473030F116dDEE9F6B43aC78BA3");

/// EIP-3009 function selectors searched for in token bytecode.
///
/// `transferWithAuthorization` ships in two overloads: the (v, r, s)
/// variant (`0xe3ee160e`) and the packed-bytes variant (`0xcf092995`).
/// A match on either counts as EIP-3009 support.
pub const EIP3009_SELECTORS: [&str; 2] = ["e3ee160e", "cf092995"];

/// EIP-2612 `permit(address,address,uint256,uint256,uint8,bytes32,bytes32)`
/// selector.
pub const PERMIT_SELECTOR: &str = "d505accf";

/// EIP-1967 implementation storage slot
/// (`keccak256("eip1967.proxy.implementation") - 1`).
pub const EIP1967_IMPLEMENTATION_SLOT: B256 =
    b256!("0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc");

/// EIP-1822 (UUPS) proxiable storage slot (`keccak256("PROXIABLE")`).
pub const EIP1822_PROXIABLE_SLOT: B256 =
    b256!("0x7050c9e0f4ca769c69bd3a8ef740bc37934f8e2c036e5a723fd8ee048ed3f8c3");

/// ERC-165 interface id for `settleWithPermit` on receiving contracts.
pub const SETTLE_WITH_PERMIT_INTERFACE_ID: FixedBytes<4> = fixed_bytes!("0x02ccc23e");

/// ERC-165 interface id for `settleWithERC3009` on receiving contracts.
pub const SETTLE_WITH_ERC3009_INTERFACE_ID: FixedBytes<4> = fixed_bytes!("0x1fe200d9");

/// ERC-165 interface id for `settleWithPermit2` on receiving contracts.
pub const SETTLE_WITH_PERMIT2_INTERFACE_ID: FixedBytes<4> = fixed_bytes!("0xa7fcafbb");

/// Version reported when a token exposes neither `eip712Domain()` nor
/// `version()`.
pub const DEFAULT_TOKEN_VERSION: &str = "1";
