//! A payment backend client that talks to a Lightning node's REST gateway over HTTP.
//!
//! [`BackendClient`] handles the `POST /v1/invoices` and `POST /v1/channels/transactions`
//! endpoints and implements [`InvoiceIssuer`] and [`InvoicePayer`].
//!
//! ## Certificate validation
//!
//! Lightning nodes commonly serve self-signed certificates. Calling
//! [`BackendClient::with_accept_invalid_certs`] rebuilds the HTTP client owned by this
//! backend with certificate validation disabled. No other connection in the process is
//! affected, and nothing is toggled globally.
//!
//! ## Error Handling
//!
//! [`BackendClientError`] separates
//! - URL construction and HTTP client construction failures
//! - transport failures and timeouts
//! - unexpected HTTP status responses (the body is kept verbatim)
//! - payments the backend reports as failed
//! - responses that parse but do not carry usable values

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use l402_types::backend::{Invoice, InvoiceIssuer, InvoicePayer, Payment};
use l402_types::config::BackendConfig;
use l402_types::util::Base64Bytes;
use l402_types::verifier::{self, HASH_LEN};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;
use tracing::{Span, instrument};
use url::Url;

/// Header carrying the hex-encoded macaroon on every backend request.
pub const MACAROON_HEADER: &str = "Grpc-Metadata-macaroon";

/// A client for a remote Lightning payment backend.
#[derive(Clone, Debug)]
pub struct BackendClient {
    /// Base URL of the backend (e.g. `https://localhost:8080/`)
    base_url: Url,
    /// Full URL to `POST /v1/invoices` requests
    invoices_url: Url,
    /// Full URL to `POST /v1/channels/transactions` requests
    payments_url: Url,
    /// Reqwest HTTP client dedicated to this backend
    client: Client,
    /// Custom headers sent with each request (macaroon and friends)
    headers: HeaderMap,
    /// Optional request timeout
    timeout: Option<Duration>,
}

/// Errors that can occur while interacting with a payment backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendClientError {
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Request timed out: {context}")]
    Timeout { context: &'static str },
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Payment failed: {0}")]
    PaymentFailed(String),
    #[error("Malformed backend response: {context}: {reason}")]
    MalformedResponse {
        context: &'static str,
        reason: &'static str,
    },
}

impl BackendClientError {
    /// Whether the failure was a timeout rather than a rejection or transport error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendClientError::Timeout { .. })
    }

    fn from_reqwest(context: &'static str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            BackendClientError::Timeout { context }
        } else {
            BackendClientError::Http { context, source }
        }
    }
}

/// `POST /v1/invoices` request body.
#[derive(Debug, Serialize)]
struct AddInvoiceRequest<'a> {
    /// Amount in satoshis. LND encodes 64-bit integers as JSON strings.
    value: String,
    memo: &'a str,
}

/// `POST /v1/invoices` response body.
#[derive(Debug, Deserialize)]
struct AddInvoiceResponse {
    /// Base64 payment hash
    #[serde(default)]
    r_hash: String,
    #[serde(default)]
    payment_request: String,
}

/// `POST /v1/channels/transactions` request body.
#[derive(Debug, Serialize)]
struct SendPaymentRequest<'a> {
    payment_request: &'a str,
}

/// `POST /v1/channels/transactions` response body.
#[derive(Debug, Deserialize)]
struct SendPaymentResponse {
    #[serde(default)]
    payment_error: String,
    /// Base64 (or hex) preimage
    #[serde(default)]
    payment_preimage: String,
}

impl InvoiceIssuer for BackendClient {
    type Error = BackendClientError;

    #[instrument(name = "l402.backend.create_invoice", skip(self, memo), err)]
    async fn create_invoice(&self, amount: u64, memo: &str) -> Result<Invoice, BackendClientError> {
        BackendClient::create_invoice(self, amount, memo).await
    }
}

impl InvoicePayer for BackendClient {
    type Error = BackendClientError;

    #[instrument(name = "l402.backend.pay_invoice", skip_all, err)]
    async fn pay_invoice(&self, payment_request: &str) -> Result<Payment, BackendClientError> {
        BackendClient::pay_invoice(self, payment_request).await
    }

    fn is_timeout(error: &BackendClientError) -> bool {
        error.is_timeout()
    }
}

impl BackendClient {
    /// Returns the base URL used by this client.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the computed `./v1/invoices` URL relative to [`BackendClient::base_url`].
    pub fn invoices_url(&self) -> &Url {
        &self.invoices_url
    }

    /// Returns the computed `./v1/channels/transactions` URL relative to [`BackendClient::base_url`].
    pub fn payments_url(&self) -> &Url {
        &self.payments_url
    }

    /// Returns any custom headers configured on the client.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the configured timeout, if any.
    pub fn timeout(&self) -> &Option<Duration> {
        &self.timeout
    }

    /// Constructs a new [`BackendClient`] from a base URL.
    ///
    /// Endpoint URLs are resolved relative to the base, so the base should end with `/`.
    pub fn try_new(base_url: Url) -> Result<Self, BackendClientError> {
        let client = Client::new();
        let invoices_url =
            base_url
                .join("./v1/invoices")
                .map_err(|e| BackendClientError::UrlParse {
                    context: "Failed to construct ./v1/invoices URL",
                    source: e,
                })?;
        let payments_url = base_url.join("./v1/channels/transactions").map_err(|e| {
            BackendClientError::UrlParse {
                context: "Failed to construct ./v1/channels/transactions URL",
                source: e,
            }
        })?;
        Ok(Self {
            client,
            base_url,
            invoices_url,
            payments_url,
            headers: HeaderMap::new(),
            timeout: None,
        })
    }

    /// Constructs a client from [`BackendConfig`]: URL, macaroon, certificate policy, and timeout.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendClientError> {
        let mut this = BackendClient::try_from(config.url.as_str())?;
        if let Some(macaroon) = &config.macaroon {
            this = this.with_macaroon(macaroon)?;
        }
        if config.accept_invalid_certs {
            this = this.with_accept_invalid_certs(true)?;
        }
        if let Some(timeout) = config.timeout() {
            this = this.with_timeout(timeout);
        }
        Ok(this)
    }

    /// Attaches custom headers to all future requests.
    pub fn with_headers(&self, headers: HeaderMap) -> Self {
        let mut this = self.clone();
        this.headers = headers;
        this
    }

    /// Sends `macaroon` (hex) in the [`MACAROON_HEADER`] of all future requests.
    pub fn with_macaroon(&self, macaroon: &str) -> Result<Self, BackendClientError> {
        let mut this = self.clone();
        let mut value = HeaderValue::from_str(macaroon.trim())?;
        value.set_sensitive(true);
        this.headers
            .insert(HeaderName::from_static("grpc-metadata-macaroon"), value);
        Ok(this)
    }

    /// Sets a timeout for all future requests.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut this = self.clone();
        this.timeout = Some(timeout);
        this
    }

    /// Replaces the HTTP client with one that does (or does not) validate TLS certificates.
    ///
    /// The setting lives in this backend's own client; clones made before the call keep
    /// their previous client.
    pub fn with_accept_invalid_certs(&self, accept: bool) -> Result<Self, BackendClientError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(accept)
            .build()
            .map_err(BackendClientError::ClientBuild)?;
        let mut this = self.clone();
        this.client = client;
        Ok(this)
    }

    /// Sends a `POST /v1/invoices` request to the backend.
    ///
    /// The returned payment hash is lowercase hex and guaranteed to be 32 bytes long.
    pub async fn create_invoice(
        &self,
        amount: u64,
        memo: &str,
    ) -> Result<Invoice, BackendClientError> {
        const CONTEXT: &str = "POST /v1/invoices";
        let request = AddInvoiceRequest {
            value: amount.to_string(),
            memo,
        };
        let response: AddInvoiceResponse =
            self.post_json(&self.invoices_url, CONTEXT, &request).await?;
        if response.payment_request.is_empty() {
            return Err(BackendClientError::MalformedResponse {
                context: CONTEXT,
                reason: "missing payment_request",
            });
        }
        let payment_hash = Base64Bytes::from(response.r_hash.as_str())
            .decode_any()
            .ok()
            .filter(|bytes| bytes.len() == HASH_LEN)
            .ok_or(BackendClientError::MalformedResponse {
                context: CONTEXT,
                reason: "r_hash is not a base64 32-byte hash",
            })?;
        Ok(Invoice {
            payment_request: response.payment_request,
            payment_hash: hex::encode(payment_hash),
        })
    }

    /// Sends a `POST /v1/channels/transactions` request to the backend.
    ///
    /// A populated `payment_error` becomes [`BackendClientError::PaymentFailed`] with the
    /// backend's text. The preimage is normalized to lowercase hex.
    pub async fn pay_invoice(&self, payment_request: &str) -> Result<Payment, BackendClientError> {
        const CONTEXT: &str = "POST /v1/channels/transactions";
        let request = SendPaymentRequest { payment_request };
        let response: SendPaymentResponse =
            self.post_json(&self.payments_url, CONTEXT, &request).await?;
        if !response.payment_error.is_empty() {
            return Err(BackendClientError::PaymentFailed(response.payment_error));
        }
        let preimage = verifier::normalize_preimage(&response.payment_preimage).ok_or(
            BackendClientError::MalformedResponse {
                context: CONTEXT,
                reason: "missing or undecodable payment_preimage",
            },
        )?;
        Ok(Payment { preimage })
    }

    /// Generic POST helper that handles JSON serialization, error mapping,
    /// timeout application, and span recording.
    ///
    /// `context` is a human-readable identifier used in tracing and error messages (e.g. `"POST /v1/invoices"`).
    async fn post_json<T, R>(
        &self,
        url: &Url,
        context: &'static str,
        payload: &T,
    ) -> Result<R, BackendClientError>
    where
        T: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let mut req = self.client.post(url.clone()).json(payload);
        for (key, value) in self.headers.iter() {
            req = req.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let http_response = req
            .send()
            .await
            .map_err(|e| BackendClientError::from_reqwest(context, e))?;

        let result = if http_response.status() == StatusCode::OK {
            http_response.json::<R>().await.map_err(|e| {
                if e.is_timeout() {
                    BackendClientError::Timeout { context }
                } else {
                    BackendClientError::JsonDeserialization { context, source: e }
                }
            })
        } else {
            let status = http_response.status();
            let body = http_response
                .text()
                .await
                .map_err(|e| BackendClientError::ResponseBodyRead { context, source: e })?;
            Err(BackendClientError::HttpStatus {
                context,
                status,
                body,
            })
        };

        record_result_on_span(&result);

        result
    }
}

/// Converts a string URL into a `BackendClient`, parsing the URL and calling `try_new`.
impl TryFrom<&str> for BackendClient {
    type Error = BackendClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // Normalize: strip trailing slashes and add a single trailing slash
        let mut normalized = value.trim_end_matches('/').to_string();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|e| BackendClientError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;
        BackendClient::try_new(url)
    }
}

impl TryFrom<String> for BackendClient {
    type Error = BackendClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        BackendClient::try_from(value.as_str())
    }
}

/// Records the outcome of a request on the current span, including status and errors.
fn record_result_on_span<R, E: Display>(result: &Result<R, E>) {
    let span = Span::current();
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", tracing::field::display(err));
            tracing::event!(tracing::Level::ERROR, error = %err, "Request to payment backend failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use l402_types::verifier::commit_bytes;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PREIMAGE: [u8; 32] = [7u8; 32];

    fn r_hash() -> String {
        let hash = hex::decode(commit_bytes(&PREIMAGE)).unwrap();
        Base64Bytes::encode(hash).into_string()
    }

    async fn client_for(server: &MockServer) -> BackendClient {
        BackendClient::try_from(server.uri()).unwrap()
    }

    #[tokio::test]
    async fn test_create_invoice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/invoices"))
            .and(body_json(json!({ "value": "100", "memo": "GET /premium" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "r_hash": r_hash(),
                "payment_request": "lnbc1u1ptest",
                "add_index": "4"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let invoice = client_for(&server)
            .await
            .create_invoice(100, "GET /premium")
            .await
            .unwrap();
        assert_eq!(invoice.payment_request, "lnbc1u1ptest");
        assert_eq!(invoice.payment_hash, commit_bytes(&PREIMAGE));
    }

    #[tokio::test]
    async fn test_create_invoice_sends_macaroon() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/invoices"))
            .and(header(MACAROON_HEADER, "0201036c6e64"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "r_hash": r_hash(),
                "payment_request": "lnbc1u1ptest"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server)
            .await
            .with_macaroon("0201036c6e64")
            .unwrap();
        client.create_invoice(1, "memo").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_invoice_rejects_malformed_hash() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/invoices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "r_hash": Base64Bytes::encode(b"short").into_string(),
                "payment_request": "lnbc1u1ptest"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .create_invoice(100, "memo")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendClientError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_create_invoice_surfaces_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/invoices"))
            .respond_with(ResponseTemplate::new(500).set_body_string("node is locked"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .create_invoice(100, "memo")
            .await
            .unwrap_err();
        match err {
            BackendClientError::HttpStatus { status, body, .. } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "node is locked");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_pay_invoice_normalizes_preimage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/channels/transactions"))
            .and(body_json(json!({ "payment_request": "lnbc1u1ptest" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "payment_error": "",
                "payment_preimage": Base64Bytes::encode(PREIMAGE).into_string(),
                "payment_hash": r_hash()
            })))
            .expect(1)
            .mount(&server)
            .await;

        let payment = client_for(&server)
            .await
            .pay_invoice("lnbc1u1ptest")
            .await
            .unwrap();
        assert_eq!(payment.preimage, "07".repeat(32));
    }

    #[tokio::test]
    async fn test_pay_invoice_reports_payment_error_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/channels/transactions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "payment_error": "unable to find a path to destination"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .pay_invoice("lnbc1u1ptest")
            .await
            .unwrap_err();
        match err {
            BackendClientError::PaymentFailed(reason) => {
                assert_eq!(reason, "unable to find a path to destination")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_pay_invoice_timeout_is_distinct() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/channels/transactions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(json!({ "payment_preimage": "00" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .with_timeout(Duration::from_millis(50))
            .pay_invoice("lnbc1u1ptest")
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err}");
    }

    #[test]
    fn test_from_config() {
        let mut config = BackendConfig::new("https://localhost:8080/api".parse().unwrap());
        config.accept_invalid_certs = true;
        config.timeout_ms = Some(250);
        config.macaroon = Some(l402_types::config::LiteralOrEnv::from_literal(
            "cafe".to_string(),
        ));
        let client = BackendClient::from_config(&config).unwrap();
        assert_eq!(
            client.invoices_url().as_str(),
            "https://localhost:8080/api/v1/invoices"
        );
        assert_eq!(client.timeout(), &Some(Duration::from_millis(250)));
        assert!(client.headers().contains_key(MACAROON_HEADER));
    }
}
