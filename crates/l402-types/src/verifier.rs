//! Preimage commitment and verification.
//!
//! A Lightning invoice commits to a 32-byte preimage through its payment hash,
//! `payment_hash = sha256(preimage)`. Paying the invoice reveals the preimage,
//! and knowledge of it is the whole proof of payment.
//!
//! Everything here is a pure function: no store, no network, no shared state.
//! Preimages and hashes travel as hex text; hashing always runs over the
//! decoded bytes, never over the hex characters.

use sha2::{Digest, Sha256};

use crate::util::Base64Bytes;

/// Length in bytes of a SHA-256 payment hash (and of a Lightning preimage).
pub const HASH_LEN: usize = 32;

/// Hashes raw preimage bytes, returning the lowercase hex payment hash.
pub fn commit_bytes(preimage: &[u8]) -> String {
    hex::encode(Sha256::digest(preimage))
}

/// Hashes a hex-encoded preimage.
///
/// Returns `None` if `preimage_hex` is not valid hex.
///
/// ```
/// use l402_types::verifier::commit;
///
/// // sha256 of the single byte 0x00
/// assert_eq!(
///     commit("00").as_deref(),
///     Some("6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d")
/// );
/// assert_eq!(commit("not hex"), None);
/// ```
pub fn commit(preimage_hex: &str) -> Option<String> {
    let bytes = hex::decode(preimage_hex.trim()).ok()?;
    Some(commit_bytes(&bytes))
}

/// Returns `true` iff `sha256(hex_decode(preimage_hex)) == hex_decode(payment_hash_hex)`.
///
/// Comparison happens on decoded bytes, so hex case does not matter.
/// Malformed hex on either side is a failed verification, not an error.
pub fn verify(preimage_hex: &str, payment_hash_hex: &str) -> bool {
    let Ok(preimage) = hex::decode(preimage_hex.trim()) else {
        return false;
    };
    let Ok(expected) = hex::decode(payment_hash_hex.trim()) else {
        return false;
    };
    Sha256::digest(&preimage).as_slice() == expected.as_slice()
}

/// Checks that `value` is a hex-encoded 32-byte hash.
pub fn is_payment_hash(value: &str) -> bool {
    value.len() == HASH_LEN * 2 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Normalizes a preimage reported by a payment backend into lowercase hex.
///
/// Backends report preimages either as hex or as base64 (LND's REST gateway does the latter).
/// A 64-character hex string is taken as hex; anything else is tried as base64.
/// Returns `None` if neither interpretation yields bytes.
pub fn normalize_preimage(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.len() == HASH_LEN * 2 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Some(raw.to_ascii_lowercase());
    }
    let bytes = Base64Bytes::from(raw).decode_any().ok()?;
    if bytes.is_empty() {
        return None;
    }
    Some(hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_preimage() -> [u8; HASH_LEN] {
        rand::random()
    }

    #[test]
    fn test_commit_hashes_decoded_bytes_not_hex_text() {
        let preimage = random_preimage();
        let preimage_hex = hex::encode(preimage);
        let committed = commit(&preimage_hex).unwrap();
        assert_eq!(committed, commit_bytes(&preimage));
        assert_ne!(committed, commit_bytes(preimage_hex.as_bytes()));
    }

    #[test]
    fn test_verify_accepts_own_commitment() {
        for _ in 0..16 {
            let preimage_hex = hex::encode(random_preimage());
            let payment_hash = commit(&preimage_hex).unwrap();
            assert!(verify(&preimage_hex, &payment_hash));
        }
    }

    #[test]
    fn test_verify_rejects_other_commitment() {
        let s1 = hex::encode(random_preimage());
        let s2 = hex::encode(random_preimage());
        assert_ne!(s1, s2);
        assert!(!verify(&s1, &commit(&s2).unwrap()));
        assert!(!verify(&s2, &commit(&s1).unwrap()));
    }

    #[test]
    fn test_verify_is_case_insensitive() {
        let preimage_hex = hex::encode(random_preimage());
        let payment_hash = commit(&preimage_hex).unwrap();
        assert!(verify(
            &preimage_hex.to_ascii_uppercase(),
            &payment_hash.to_ascii_uppercase()
        ));
    }

    #[test]
    fn test_verify_rejects_malformed_input() {
        let preimage_hex = hex::encode(random_preimage());
        let payment_hash = commit(&preimage_hex).unwrap();
        assert!(!verify("zz", &payment_hash));
        assert!(!verify("", &payment_hash));
        assert!(!verify(&preimage_hex, "not-a-hash"));
        assert!(!verify(&preimage_hex, &payment_hash[..10]));
    }

    #[test]
    fn test_normalize_preimage_from_base64() {
        let preimage = random_preimage();
        let as_b64 = Base64Bytes::encode(preimage).into_string();
        assert_eq!(normalize_preimage(&as_b64), Some(hex::encode(preimage)));
    }

    #[test]
    fn test_normalize_preimage_from_hex() {
        let preimage_hex = hex::encode(random_preimage()).to_ascii_uppercase();
        assert_eq!(
            normalize_preimage(&preimage_hex),
            Some(preimage_hex.to_ascii_lowercase())
        );
        assert_eq!(normalize_preimage(""), None);
        assert_eq!(normalize_preimage("%%%"), None);
    }

    #[test]
    fn test_is_payment_hash() {
        assert!(is_payment_hash(&commit_bytes(b"x")));
        assert!(!is_payment_hash("abcd"));
        assert!(!is_payment_hash(&"g".repeat(64)));
    }
}
