//! The stateless L402 proof token and its transport encoding.
//!
//! A [`ProofToken`] is issued with every challenge and replayed by the client alongside
//! the preimage. It is compact JSON wrapped in standard base64, which keeps it safe inside
//! an HTTP header value and free of `:` characters.
//!
//! The encoding provides no integrity protection. Anyone can decode a token and
//! re-encode a modified one. Its only security-relevant content is the payment hash,
//! and a modified hash simply will not match the preimage the client holds.

use serde::{Deserialize, Serialize};

use crate::timestamp::UnixTimestamp;
use crate::util::Base64Bytes;

/// Proof token as issued by the server.
///
/// # Example
///
/// ```json
/// {
///   "version": 0,
///   "paymentHash": "6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d",
///   "resource": "/premium",
///   "issuedAt": 1699999999
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofToken {
    /// Token format version.
    pub version: u8,
    /// Hex payment hash of the invoice issued with this token.
    pub payment_hash: String,
    /// Identifier of the resource the token was issued for (the request path).
    #[serde(default)]
    pub resource: String,
    /// Issuance time. Informational; never enforced.
    #[serde(default)]
    pub issued_at: UnixTimestamp,
}

impl ProofToken {
    /// The version written into newly issued tokens.
    pub const CURRENT_VERSION: u8 = 0;

    /// Creates a token for `payment_hash` and `resource`, stamped with the current time.
    pub fn new<H: Into<String>, R: Into<String>>(payment_hash: H, resource: R) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            payment_hash: payment_hash.into(),
            resource: resource.into(),
            issued_at: UnixTimestamp::now(),
        }
    }

    /// Encodes the token for transport.
    pub fn encode(&self) -> String {
        // A struct of strings and integers always serializes.
        let json = serde_json::to_vec(self).unwrap_or_default();
        Base64Bytes::encode(json).into_string()
    }

    /// Decodes a transport string back into a token.
    ///
    /// Returns `None` for anything that is not a well-formed token: bad base64, bad JSON,
    /// a missing `version`, or a missing or empty `paymentHash`. Clients send stale or
    /// garbled credentials routinely, so this is not treated as an error.
    pub fn decode(encoded: &str) -> Option<Self> {
        let bytes = Base64Bytes::from(encoded.trim()).decode().ok()?;
        let token: ProofToken = serde_json::from_slice(&bytes).ok()?;
        if token.payment_hash.is_empty() {
            return None;
        }
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode_json(value: serde_json::Value) -> String {
        Base64Bytes::encode(value.to_string()).into_string()
    }

    #[test]
    fn test_decode_encoded_token() {
        let token = ProofToken::new("ab".repeat(32), "/premium");
        let decoded = ProofToken::decode(&token.encode()).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn test_encoded_token_is_header_safe() {
        let token = ProofToken::new("cd".repeat(32), "/a:b/ü?x=1");
        let encoded = token.encode();
        assert!(!encoded.contains(':'));
        assert!(encoded.bytes().all(|b| b.is_ascii_graphic()));
    }

    #[test]
    fn test_decode_defaults_optional_fields() {
        let encoded = encode_json(json!({ "version": 0, "paymentHash": "ef".repeat(32) }));
        let token = ProofToken::decode(&encoded).unwrap();
        assert_eq!(token.resource, "");
        assert_eq!(token.issued_at, UnixTimestamp::default());
    }

    #[test]
    fn test_decode_requires_version_and_hash() {
        let no_version = encode_json(json!({ "paymentHash": "ef".repeat(32) }));
        assert_eq!(ProofToken::decode(&no_version), None);
        let no_hash = encode_json(json!({ "version": 0, "resource": "/" }));
        assert_eq!(ProofToken::decode(&no_hash), None);
        let empty_hash = encode_json(json!({ "version": 0, "paymentHash": "" }));
        assert_eq!(ProofToken::decode(&empty_hash), None);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(ProofToken::decode(""), None);
        assert_eq!(ProofToken::decode("!!!not base64!!!"), None);
        assert_eq!(ProofToken::decode(&Base64Bytes::encode(b"not json").into_string()), None);
        let truncated = ProofToken::new("ab".repeat(32), "/").encode();
        assert_eq!(ProofToken::decode(&truncated[..truncated.len() / 2]), None);
        let wrong_type = encode_json(json!({ "version": "zero", "paymentHash": "ab" }));
        assert_eq!(ProofToken::decode(&wrong_type), None);
    }
}
