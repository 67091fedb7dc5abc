//! Wire format types for L402 messages.
//!
//! # Payment required
//!
//! A server answers an unauthenticated request with `402 Payment Required`, a
//! `WWW-Authenticate` header, and a JSON [`ChallengeBody`]:
//!
//! ```text
//! WWW-Authenticate: L402 token="eyJ2ZXJzaW9uIjowLC4uLn0=", invoice="lnbc1u1p..."
//!
//! { "price": 100, "description": "GET /premium", "invoice": "lnbc1u1p...", "token": "eyJ2ZXJzaW9uIjowLC4uLn0=" }
//! ```
//!
//! # Authorized request
//!
//! ```text
//! Authorization: L402 <token>:<preimage-hex>
//! ```
//!
//! The scheme keyword is matched case-insensitively. The credential is split at the
//! **last** `:` so that token encodings containing the separator still parse.

use serde::{Deserialize, Serialize};

/// The authorization scheme keyword.
pub const L402_SCHEME: &str = "L402";

/// Separator between token and preimage in a credential.
pub const CREDENTIAL_SEPARATOR: char = ':';

/// JSON body of a `402 Payment Required` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeBody {
    /// Price in satoshis.
    pub price: u64,
    /// Human-readable memo describing what is being paid for.
    pub description: String,
    /// Payable form of the commitment (a BOLT11 invoice).
    pub invoice: String,
    /// Encoded [`crate::token::ProofToken`].
    pub token: String,
}

/// A challenge as issued by the server, before it is written to the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub price: u64,
    pub description: String,
    pub invoice: String,
    pub payment_hash: String,
    pub token: String,
}

impl Challenge {
    /// Value of the `WWW-Authenticate` header for this challenge.
    pub fn www_authenticate(&self) -> String {
        format!(
            "{L402_SCHEME} token=\"{}\", invoice=\"{}\"",
            self.token, self.invoice
        )
    }

    /// JSON body of the `402` response. The payment hash is carried only inside the token.
    pub fn body(&self) -> ChallengeBody {
        ChallengeBody {
            price: self.price,
            description: self.description.clone(),
            invoice: self.invoice.clone(),
            token: self.token.clone(),
        }
    }
}

/// Verified proof of payment, attached to the request after the credential checks out.
///
/// Handlers behind the paywall can read it via `axum::Extension<Proof>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    /// The revealed preimage, lowercase hex.
    pub preimage: String,
    /// The payment hash the preimage was checked against.
    pub payment_hash: String,
    /// Resource the token was issued for.
    pub resource: String,
}

/// An `Authorization: L402 <token>:<preimage>` credential, split but not yet verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential<'a> {
    pub token: &'a str,
    pub preimage: &'a str,
}

/// Why a presented credential could not even be split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("Authorization header does not use the L402 scheme")]
    WrongScheme,
    #[error("Credential has no token/preimage separator")]
    MissingSeparator,
    #[error("Credential has an empty token")]
    EmptyToken,
}

impl<'a> Credential<'a> {
    /// Parses a full `Authorization` header value.
    ///
    /// Returns [`CredentialError::WrongScheme`] when the value does not start with
    /// the L402 keyword followed by whitespace; callers treat that as "no credential".
    pub fn parse(header_value: &'a str) -> Result<Self, CredentialError> {
        let header_value = header_value.trim_start();
        let (scheme, rest) = header_value
            .split_once(char::is_whitespace)
            .ok_or(CredentialError::WrongScheme)?;
        if !scheme.eq_ignore_ascii_case(L402_SCHEME) {
            return Err(CredentialError::WrongScheme);
        }
        Self::split(rest.trim())
    }

    /// Splits `<token>:<preimage>` at the last separator.
    pub fn split(value: &'a str) -> Result<Self, CredentialError> {
        let (token, preimage) = value
            .rsplit_once(CREDENTIAL_SEPARATOR)
            .ok_or(CredentialError::MissingSeparator)?;
        if token.is_empty() {
            return Err(CredentialError::EmptyToken);
        }
        Ok(Self { token, preimage })
    }
}

/// Formats the `Authorization` header value a client sends after paying.
pub fn authorization_value(token: &str, preimage_hex: &str) -> String {
    format!("{L402_SCHEME} {token}{CREDENTIAL_SEPARATOR}{preimage_hex}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_credential() {
        let credential = Credential::parse("L402 dG9rZW4=:abcd").unwrap();
        assert_eq!(credential.token, "dG9rZW4=");
        assert_eq!(credential.preimage, "abcd");
    }

    #[test]
    fn test_parse_scheme_case_insensitive() {
        assert!(Credential::parse("l402 tok:ab").is_ok());
        assert!(Credential::parse("L402   tok:ab").is_ok());
        assert_eq!(
            Credential::parse("Bearer tok:ab"),
            Err(CredentialError::WrongScheme)
        );
        assert_eq!(
            Credential::parse("L402tok:ab"),
            Err(CredentialError::WrongScheme)
        );
        assert_eq!(Credential::parse(""), Err(CredentialError::WrongScheme));
    }

    #[test]
    fn test_split_at_last_separator() {
        let credential = Credential::split("a:b:c:deadbeef").unwrap();
        assert_eq!(credential.token, "a:b:c");
        assert_eq!(credential.preimage, "deadbeef");
    }

    #[test]
    fn test_split_rejects_missing_separator_and_empty_token() {
        assert_eq!(
            Credential::split("tokenonly"),
            Err(CredentialError::MissingSeparator)
        );
        assert_eq!(
            Credential::split(":deadbeef"),
            Err(CredentialError::EmptyToken)
        );
    }

    #[test]
    fn test_authorization_value_parses_back() {
        let value = authorization_value("dG9rZW4=", "00ff");
        assert_eq!(value, "L402 dG9rZW4=:00ff");
        let credential = Credential::parse(&value).unwrap();
        assert_eq!(credential.token, "dG9rZW4=");
        assert_eq!(credential.preimage, "00ff");
    }

    #[test]
    fn test_www_authenticate() {
        let challenge = Challenge {
            price: 100,
            description: "GET /".into(),
            invoice: "lnbc1".into(),
            payment_hash: "00".into(),
            token: "dG9r".into(),
        };
        assert_eq!(
            challenge.www_authenticate(),
            "L402 token=\"dG9r\", invoice=\"lnbc1\""
        );
        assert_eq!(challenge.body().price, 100);
    }
}
