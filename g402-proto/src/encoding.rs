//! Base64 codec for the `X-PAYMENT` header.
//!
//! The header carries `base64(utf8(json(PaymentPayload)))` as an opaque
//! ASCII string. A `data:application/json;base64,` prefix is tolerated
//! and stripped before decoding.

use std::fmt::{self, Display, Formatter};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;

use crate::error::ProtocolError;
use crate::types::PaymentPayload;

/// Data-URL prefix some clients prepend to the header value.
pub const BASE64_JSON_PREFIX: &str = "data:application/json;base64,";

/// A wrapper for base64-encoded byte data.
///
/// Holds bytes that represent base64-encoded data and provides encode
/// and decode methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes(pub Vec<u8>);

impl Base64Bytes {
    /// Decodes the base64 string bytes to raw binary data.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(&self.0)
    }

    /// Encodes raw binary data into base64 string bytes.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Self {
        let encoded = b64.encode(input.as_ref());
        Self(encoded.into_bytes())
    }
}

impl AsRef<[u8]> for Base64Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Base64Bytes {
    fn from(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }
}

impl Display for Base64Bytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Decodes an `X-PAYMENT` header value into a validated [`PaymentPayload`].
///
/// Strips an optional [`BASE64_JSON_PREFIX`], base64-decodes, parses the
/// JSON, and runs schema validation.
///
/// # Errors
///
/// Returns [`ProtocolError`] on base64, JSON, or schema failure.
pub fn decode_payment_header(value: &str) -> Result<PaymentPayload, ProtocolError> {
    let trimmed = value.trim();
    let trimmed = trimmed.strip_prefix(BASE64_JSON_PREFIX).unwrap_or(trimmed);
    let bytes = b64.decode(trimmed)?;
    let payload: PaymentPayload = serde_json::from_slice(&bytes)?;
    payload.validate().map_err(ProtocolError::Schema)?;
    Ok(payload)
}

/// Encodes a [`PaymentPayload`] as an `X-PAYMENT` header value.
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] if serialization fails.
pub fn encode_payment_header(payload: &PaymentPayload) -> Result<String, ProtocolError> {
    let json = serde_json::to_vec(payload)?;
    Ok(b64.encode(&json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::Network;
    use crate::types::{AuthorizationPayload, Eip3009Authorization, ExactScheme};

    fn sample_payload() -> PaymentPayload {
        PaymentPayload {
            x402_version: 1,
            scheme: ExactScheme::Exact,
            network: Network::Bsc,
            payload: AuthorizationPayload::Eip3009(Eip3009Authorization {
                from: "0x1111111111111111111111111111111111111111".to_owned(),
                to: "0x2222222222222222222222222222222222222222".to_owned(),
                value: "1000000".to_owned(),
                valid_after: "0".to_owned(),
                valid_before: "1735689600".to_owned(),
                nonce: "0x0101010101010101010101010101010101010101010101010101010101010101"
                    .to_owned(),
                signature: "0xdeadbeef".to_owned(),
            }),
        }
    }

    #[test]
    fn header_round_trips() {
        let payload = sample_payload();
        let header = encode_payment_header(&payload).unwrap();
        let decoded = decode_payment_header(&header).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn data_url_prefix_is_stripped() {
        let payload = sample_payload();
        let header = encode_payment_header(&payload).unwrap();
        let prefixed = format!("{BASE64_JSON_PREFIX}{header}");
        let decoded = decode_payment_header(&prefixed).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn garbage_base64_is_rejected() {
        assert!(matches!(
            decode_payment_header("not-base64!!!"),
            Err(ProtocolError::Base64(_))
        ));
    }

    #[test]
    fn valid_base64_invalid_json_is_rejected() {
        let header = b64.encode(b"{\"hello\":");
        assert!(matches!(
            decode_payment_header(&header),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn schema_violations_are_rejected_with_details() {
        let mut payload = sample_payload();
        if let AuthorizationPayload::Eip3009(auth) = &mut payload.payload {
            auth.value = "one million".to_owned();
        }
        let header = encode_payment_header(&payload).unwrap();
        let err = decode_payment_header(&header).unwrap_err();
        assert!(err.to_string().contains("payload.value"));
    }

    #[test]
    fn base64_bytes_round_trips() {
        let encoded = Base64Bytes::encode("hello x402");
        assert_eq!(encoded.decode().unwrap(), b"hello x402");
    }
}
