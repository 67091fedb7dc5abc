//! The L402 payment gate: challenge, verify, or reject.
//!
//! A [`Paygate`] is built per request by [`crate::layer::L402MiddlewareService`] and decides,
//! without any stored state, between three outcomes:
//!
//! - **No L402 credential** — request an invoice from the payment backend and answer
//!   `402 Payment Required` with the price, invoice, and an encoded proof token.
//! - **Valid credential** — the preimage hashes to the token's payment hash and the token
//!   was issued for this resource. A [`Proof`] is inserted into the request extensions and
//!   the inner service is called exactly once.
//! - **Invalid credential** — answer `401 Unauthorized`. Every cause gets the same body, so
//!   a caller cannot tell a wrong preimage from a garbled token.
//!
//! Backend failures and invalid prices answer `500 Internal Server Error` with a generic
//! body. The details are logged, never returned.

use axum_core::body::Body;
use axum_core::extract::Request;
use axum_core::response::Response;
use http::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{HeaderValue, StatusCode};
use l402_types::backend::InvoiceIssuer;
use l402_types::proto::{Challenge, Credential, CredentialError, Proof};
use l402_types::token::ProofToken;
use l402_types::verifier;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tower::{Service, ServiceExt};
use tracing::{Instrument, instrument};

use crate::price::{PriceSource, RequestMeta};

// ============================================================================
// Error Types
// ============================================================================

/// Why a presented credential was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error(transparent)]
    MalformedCredential(#[from] CredentialError),
    #[error("Token could not be decoded")]
    UndecodableToken,
    #[error("Preimage does not match the payment hash")]
    PreimageMismatch,
    #[error("Token was issued for {issued_for:?}, not {requested:?}")]
    ResourceMismatch {
        issued_for: String,
        requested: String,
    },
}

/// Paygate error type covering rejections and internal failures.
#[derive(Debug, thiserror::Error)]
pub enum PaygateError {
    #[error("Credential rejected: {0}")]
    Rejected(#[from] RejectReason),
    #[error("Invalid price: {0}")]
    InvalidPrice(u64),
    #[error("Pricing failed: {0}")]
    Pricing(String),
    #[error("Payment backend failed: {0}")]
    Backend(String),
    #[error("Payment backend returned an unusable invoice: {0}")]
    MalformedInvoice(&'static str),
}

impl PaygateError {
    /// Body returned for every rejected credential.
    pub const UNAUTHORIZED_MESSAGE: &'static str = "Invalid or unverifiable L402 credential";
    /// Body returned for every internal failure.
    pub const INTERNAL_MESSAGE: &'static str = "Internal server error";

    /// Converts the error into a response that carries no internal detail.
    pub fn into_response(self) -> Response {
        match self {
            PaygateError::Rejected(reason) => {
                tracing::debug!(%reason, "Rejected L402 credential");
                json_response(
                    StatusCode::UNAUTHORIZED,
                    &json!({ "error": Self::UNAUTHORIZED_MESSAGE }),
                )
            }
            err => {
                tracing::error!(error = %err, "Failed to issue L402 challenge");
                json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &json!({ "error": Self::INTERNAL_MESSAGE }),
                )
            }
        }
    }
}

/// A price must be a positive amount of satoshis.
pub fn validate_price(price: u64) -> Result<u64, PaygateError> {
    if price == 0 {
        Err(PaygateError::InvalidPrice(price))
    } else {
        Ok(price)
    }
}

// ============================================================================
// Paygate
// ============================================================================

/// Payment gate for a single request.
pub struct Paygate<B> {
    /// Creates invoices for challenges
    pub backend: B,
    /// Price of the protected resource
    pub price: Arc<dyn PriceSource>,
    /// Explicit invoice memo; `"<METHOD> <path>"` when absent
    pub description: Option<Arc<str>>,
}

impl<B> Paygate<B>
where
    B: InvoiceIssuer,
{
    /// Handles an incoming request, calling `inner` only for a verified credential.
    #[instrument(name = "l402.handle_request", skip_all, fields(path = %req.uri().path()))]
    pub async fn handle_request<S>(self, inner: S, req: Request) -> Result<Response, Infallible>
    where
        S: Service<Request, Response = Response, Error = Infallible>,
    {
        match self.handle_request_fallible(inner, req).await {
            Ok(response) => Ok(response),
            Err(err) => Ok(err.into_response()),
        }
    }

    /// Handles an incoming request, returning errors as [`PaygateError`].
    ///
    /// A challenge is a successful outcome here: it is returned as `Ok` with status 402.
    pub async fn handle_request_fallible<S>(
        &self,
        inner: S,
        mut req: Request,
    ) -> Result<Response, PaygateError>
    where
        S: Service<Request, Response = Response, Error = Infallible>,
    {
        match authorize(&req)? {
            Some(proof) => {
                tracing::debug!(payment_hash = %proof.payment_hash, "Accepted L402 credential");
                req.extensions_mut().insert(proof);
                let response = match inner
                    .oneshot(req)
                    .instrument(tracing::info_span!("inner"))
                    .await
                {
                    Ok(response) => response,
                    Err(infallible) => match infallible {},
                };
                Ok(response)
            }
            None => {
                let meta = RequestMeta::from(&req);
                let challenge = self.issue_challenge(&meta).await?;
                challenge_response(&challenge)
            }
        }
    }

    /// Prices the request, creates an invoice, and wraps its payment hash in a token.
    pub async fn issue_challenge(&self, meta: &RequestMeta) -> Result<Challenge, PaygateError> {
        let price = self
            .price
            .price(meta)
            .await
            .map_err(|e| PaygateError::Pricing(e.to_string()))?;
        let price = validate_price(price)?;
        let description = match &self.description {
            Some(description) => description.to_string(),
            None => format!("{} {}", meta.method, meta.path()),
        };

        let invoice = self
            .backend
            .create_invoice(price, &description)
            .await
            .map_err(|e| PaygateError::Backend(e.to_string()))?;
        if invoice.payment_request.is_empty() {
            return Err(PaygateError::MalformedInvoice("empty payment request"));
        }
        if !verifier::is_payment_hash(&invoice.payment_hash) {
            return Err(PaygateError::MalformedInvoice("payment hash is not 32-byte hex"));
        }

        let token = ProofToken::new(invoice.payment_hash.clone(), meta.path()).encode();
        tracing::debug!(price, payment_hash = %invoice.payment_hash, "Issuing L402 challenge");
        Ok(Challenge {
            price,
            description,
            invoice: invoice.payment_request,
            payment_hash: invoice.payment_hash,
            token,
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Checks the request's credential.
///
/// Returns `Ok(None)` when there is no L402 credential at all (a challenge is due),
/// `Ok(Some(proof))` for a valid one, and a [`RejectReason`] otherwise.
pub fn authorize<B>(req: &http::Request<B>) -> Result<Option<Proof>, RejectReason> {
    let Some(header) = req.headers().get(AUTHORIZATION) else {
        return Ok(None);
    };
    let Ok(header) = header.to_str() else {
        return Ok(None);
    };
    let credential = match Credential::parse(header) {
        Ok(credential) => credential,
        Err(CredentialError::WrongScheme) => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let token = ProofToken::decode(credential.token).ok_or(RejectReason::UndecodableToken)?;
    if !verifier::verify(credential.preimage, &token.payment_hash) {
        return Err(RejectReason::PreimageMismatch);
    }
    let requested = req.uri().path();
    if token.resource != requested {
        return Err(RejectReason::ResourceMismatch {
            issued_for: token.resource,
            requested: requested.to_string(),
        });
    }

    Ok(Some(Proof {
        preimage: credential.preimage.trim().to_ascii_lowercase(),
        payment_hash: token.payment_hash,
        resource: token.resource,
    }))
}

/// Builds the `402 Payment Required` response for a challenge.
fn challenge_response(challenge: &Challenge) -> Result<Response, PaygateError> {
    let www_authenticate = HeaderValue::from_str(&challenge.www_authenticate())
        .map_err(|_| PaygateError::MalformedInvoice("invoice is not a valid header value"))?;
    let mut response = json_response(StatusCode::PAYMENT_REQUIRED, &challenge.body());
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, www_authenticate);
    Ok(response)
}

fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> Response {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
