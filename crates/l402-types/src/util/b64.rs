//! Base64 encoding and decoding utilities.
//!
//! [`Base64Bytes`] wraps base64 text as it travels in L402 tokens and in
//! payment backend responses (`r_hash`, `payment_preimage`).

use base64::Engine;
use base64::engine::general_purpose::{STANDARD as b64, URL_SAFE as b64_url};
use std::borrow::Cow;
use std::fmt::Display;

/// A wrapper for base64-encoded byte data.
///
/// Holds the *encoded* text bytes. Uses copy-on-write semantics so header values
/// can be decoded without an intermediate allocation.
///
/// # Example
///
/// ```rust
/// use l402_types::util::Base64Bytes;
///
/// let encoded = Base64Bytes::encode(b"hello world");
/// assert_eq!(encoded.to_string(), "aGVsbG8gd29ybGQ=");
///
/// let decoded = encoded.decode().unwrap();
/// assert_eq!(decoded, b"hello world");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes<'a>(pub Cow<'a, [u8]>);

impl Base64Bytes<'_> {
    /// Decodes standard-alphabet base64 into raw binary data.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(&self.0)
    }

    /// Decodes base64 written in either the standard or the URL-safe alphabet.
    ///
    /// Payment backends differ in which alphabet they emit for binary fields.
    pub fn decode_any(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(&self.0).or_else(|_| b64_url.decode(&self.0))
    }

    /// Encodes raw binary data into standard base64 text bytes.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Base64Bytes<'static> {
        let encoded = b64.encode(input.as_ref());
        Base64Bytes(Cow::Owned(encoded.into_bytes()))
    }

    /// Returns the encoded text as an owned `String`.
    pub fn into_string(self) -> String {
        String::from_utf8_lossy(self.0.as_ref()).into_owned()
    }
}

impl AsRef<[u8]> for Base64Bytes<'_> {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl<'a> From<&'a [u8]> for Base64Bytes<'a> {
    fn from(slice: &'a [u8]) -> Self {
        Base64Bytes(Cow::Borrowed(slice))
    }
}

impl<'a> From<&'a str> for Base64Bytes<'a> {
    fn from(value: &'a str) -> Self {
        Base64Bytes(Cow::Borrowed(value.as_bytes()))
    }
}

impl Display for Base64Bytes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.0.as_ref()))
    }
}
