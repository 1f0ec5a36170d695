//! HTTP-specific constants.

/// Request header carrying the Base64-JSON payment payload.
///
/// Header names are case-insensitive; the lowercase form is canonical
/// for lookups in [`http::HeaderMap`].
pub const X_PAYMENT_HEADER: &str = "x-payment";

/// Default facilitator service URL.
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";

/// Query parameter restricting `/supported` to one chain.
pub const SUPPORTED_CHAIN_ID_PARAM: &str = "chainId";

/// Query parameter restricting `/supported` to one token.
pub const SUPPORTED_TOKEN_ADDRESS_PARAM: &str = "tokenAddress";
