//! Static capability overrides for tokens known to misreport.
//!
//! On-chain heuristics are fallible: a token can carry EIP-3009
//! selectors in its bytecode yet revert every `transferWithAuthorization`
//! call. Presets short-circuit detection for such tokens, declaring
//! their working methods directly.

use alloy_primitives::{Address, address};
use g402_proto::PaymentMethod;

/// A declared capability override for one token.
#[derive(Debug, Clone, Copy)]
pub struct TokenPreset {
    /// Token contract address.
    pub address: Address,
    /// EIP-155 chain ids this preset applies on. On any other chain the
    /// token is treated as having no capabilities.
    pub chain_ids: &'static [u64],
    /// The methods that actually work for this token.
    pub methods: &'static [PaymentMethod],
    /// EIP-712 domain name.
    pub name: &'static str,
    /// EIP-712 domain version.
    pub version: &'static str,
}

/// Known overrides.
static TOKEN_PRESETS: &[TokenPreset] = &[
    // WLFI's USD1 on BSC carries EIP-3009 selectors but the functions
    // revert; permit is the only working path.
    TokenPreset {
        address: address!("0x8d0D000Ee44948FC98c9B98A4FA4921476f08B0d"),
        chain_ids: &[56],
        methods: &[PaymentMethod::Permit],
        name: "USD1",
        version: "1",
    },
];

/// Looks up the preset for a token address, if any.
#[must_use]
pub fn preset_for(address: Address) -> Option<&'static TokenPreset> {
    TOKEN_PRESETS.iter().find(|preset| preset.address == address)
}
