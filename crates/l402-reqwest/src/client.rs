//! Client-side L402 payment handling for reqwest.
//!
//! This module provides the [`L402Client`], which turns a `402 Payment Required` answer
//! into a paid, authorized retry: it reads the challenge, checks the price against a
//! spending ceiling, pays the invoice through an [`InvoicePayer`], and resends the request
//! with `Authorization: L402 <token>:<preimage>`. The resulting credential is cached per
//! target so later requests to the same target do not pay again.

use http::header::AUTHORIZATION;
use http::{Extensions, HeaderMap, HeaderValue, Method, StatusCode};
use l402_backend::{BackendClient, BackendClientError};
use l402_types::backend::InvoicePayer;
use l402_types::config::{ClientConfig, config_defaults};
use l402_types::proto::{ChallengeBody, authorization_value};
use l402_types::verifier;
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, info, instrument, trace};
use url::Url;

use crate::cache::TokenCache;

/// Errors produced while fetching a paywalled resource.
#[derive(Debug, thiserror::Error)]
pub enum L402Error {
    #[error("Invalid target URL {target:?}: {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),
    #[error("Timed out during {context}")]
    Timeout { context: &'static str },
    #[error("Invalid 402 response: {0}")]
    InvalidChallenge(String),
    #[error("Price {price} exceeds the spending ceiling of {ceiling}")]
    PriceExceedsCeiling { price: u64, ceiling: u64 },
    #[error("Payment backend error: {0}")]
    Payment(String),
    #[error("Request object is not cloneable. Are you passing a streaming body?")]
    RequestNotCloneable,
    #[error("Invalid authorization header value: {0}")]
    HeaderValue(#[from] http::header::InvalidHeaderValue),
}

impl L402Error {
    fn from_reqwest(source: reqwest::Error) -> Self {
        if source.is_timeout() {
            L402Error::Timeout { context: "request" }
        } else {
            L402Error::Http(source)
        }
    }
}

impl From<L402Error> for rqm::Error {
    fn from(error: L402Error) -> Self {
        rqm::Error::Middleware(error.into())
    }
}

/// Per-request spending ceiling for requests sent through the middleware.
///
/// ```rust,no_run
/// use l402_backend::BackendClient;
/// use l402_reqwest::{L402Client, MaxPrice, ReqwestWithPayments, ReqwestWithPaymentsBuild};
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let node = BackendClient::try_from("https://localhost:8080")?;
/// let http = reqwest::Client::new()
///     .with_payments(L402Client::new(Arc::new(node)))
///     .build();
///
/// let response = http
///     .get("https://api.example.com/premium")
///     .with_extension(MaxPrice(500))
///     .send()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxPrice(pub u64);

/// Options for [`L402Client::fetch`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method; `GET` when not set
    pub method: Method,
    /// Caller headers, sent on the first request and on the paid retry
    pub headers: HeaderMap,
    /// Request body, sent as-is
    pub body: Option<Vec<u8>>,
    /// Overrides the client's spending ceiling for this call
    pub max_price: Option<u64>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: Method::POST,
            body: Some(body.into()),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: http::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_max_price(mut self, max_price: u64) -> Self {
        self.max_price = Some(max_price);
        self
    }
}

/// Outcome of [`L402Client::fetch`].
#[derive(Debug, Clone, PartialEq)]
pub struct PaidResponse {
    /// Status of the final response
    pub status: StatusCode,
    /// Final body: JSON when it parses, a JSON string for other text, `null` when empty
    pub body: Value,
    /// Whether a payment was made during this call
    pub paid: bool,
    /// Price paid, when `paid`
    pub price: Option<u64>,
    /// Preimage revealed by the payment, when `paid`
    pub preimage: Option<String>,
}

/// Credential produced by a settled challenge.
#[derive(Debug, Clone)]
struct Settlement {
    authorization: String,
    header: HeaderValue,
    preimage: String,
    price: u64,
}

/// The `Authorization` header for `token` and `preimage_hex`, if it is printable ASCII.
fn credential_header(token: &str, preimage_hex: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&authorization_value(token, preimage_hex))
        .ok()
        .filter(|value| value.to_str().is_ok())
}

/// The L402 client: pays challenges and remembers the resulting credentials.
///
/// ## Creating an L402Client
///
/// ```rust,no_run
/// use l402_reqwest::L402Client;
/// use l402_backend::BackendClient;
/// use std::sync::Arc;
///
/// let backend = BackendClient::try_from("https://localhost:8080").unwrap();
/// let client = L402Client::new(Arc::new(backend)).with_max_price(1_000);
/// ```
///
/// Clones share the payer and the [`TokenCache`]. Separate clients have separate caches.
///
/// ## Using with Reqwest
///
/// See the [`crate::ReqwestWithPayments`] trait for integrating with reqwest.
#[derive(Debug, Clone)]
pub struct L402Client<P> {
    payer: P,
    http: reqwest::Client,
    cache: TokenCache,
    max_price: u64,
    timeout: Option<Duration>,
}

impl<P> L402Client<P> {
    /// Creates a client with an empty cache and the default ceiling of
    /// [`config_defaults::DEFAULT_MAX_PRICE`] satoshis.
    pub fn new(payer: P) -> Self {
        Self {
            payer,
            http: reqwest::Client::new(),
            cache: TokenCache::new(),
            max_price: config_defaults::DEFAULT_MAX_PRICE,
            timeout: None,
        }
    }

    /// Sets the highest price paid without a per-call override.
    pub fn with_max_price(mut self, max_price: u64) -> Self {
        self.max_price = max_price;
        self
    }

    /// Sets the timeout applied to each request [`L402Client::fetch`] sends.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replaces the HTTP client used by [`L402Client::fetch`].
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Replaces the credential cache, e.g. to share one between clients.
    pub fn with_cache(mut self, cache: TokenCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn payer(&self) -> &P {
        &self.payer
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    pub fn max_price(&self) -> u64 {
        self.max_price
    }
}

impl L402Client<Arc<BackendClient>> {
    /// Builds a client paying through the configured backend.
    pub fn from_config(config: &ClientConfig) -> Result<Self, BackendClientError> {
        let backend = BackendClient::from_config(&config.backend)?;
        let mut client = L402Client::new(Arc::new(backend)).with_max_price(config.max_price);
        if let Some(timeout) = config.request_timeout() {
            client = client.with_timeout(timeout);
        }
        Ok(client)
    }
}

impl<P> L402Client<P>
where
    P: InvoicePayer,
{
    /// Fetches `target`, paying for it when the server asks.
    ///
    /// A cached credential for the exact `target` string is attached first. Any status other
    /// than 402 is returned as-is with `paid = false`, even a rejection. On 402 the price is
    /// checked against `options.max_price` (or the client ceiling) before anything is paid,
    /// and a failed payment leaves the cache untouched.
    #[instrument(name = "l402.reqwest.fetch", skip_all, fields(target = %target), err)]
    pub async fn fetch(
        &self,
        target: &str,
        options: RequestOptions,
    ) -> Result<PaidResponse, L402Error> {
        let url = Url::parse(target).map_err(|source| L402Error::InvalidTarget {
            target: target.to_string(),
            source,
        })?;

        let cached = self.cache.get(target);
        if cached.is_some() {
            trace!("Using cached L402 credential");
        }
        let cached = cached.map(|value| HeaderValue::from_str(&value)).transpose()?;
        let response = self.send(&url, &options, cached.as_ref()).await?;
        if response.status() != StatusCode::PAYMENT_REQUIRED {
            return Ok(PaidResponse {
                status: response.status(),
                body: read_body(response).await?,
                paid: false,
                price: None,
                preimage: None,
            });
        }

        let challenge = parse_challenge(response).await?;
        let ceiling = options.max_price.unwrap_or(self.max_price);
        let settlement = self.settle(&challenge, ceiling).await?;
        self.cache.insert(target, settlement.authorization);

        let response = self
            .send(&url, &options, Some(&settlement.header))
            .instrument(tracing::info_span!("retry"))
            .await?;
        Ok(PaidResponse {
            status: response.status(),
            body: read_body(response).await?,
            paid: true,
            price: Some(settlement.price),
            preimage: Some(settlement.preimage),
        })
    }

    /// Checks the challenge and the price against `ceiling`, pays the invoice, and formats
    /// the credential. Nothing is paid unless the resulting credential can be sent.
    #[instrument(name = "l402.reqwest.settle", skip_all, fields(price = challenge.price), err)]
    async fn settle(&self, challenge: &ChallengeBody, ceiling: u64) -> Result<Settlement, L402Error> {
        // The preimage is hex, so the token alone decides whether the header is valid.
        if credential_header(&challenge.token, "").is_none() {
            return Err(L402Error::InvalidChallenge(
                "token is not a valid header value".to_string(),
            ));
        }
        if challenge.price > ceiling {
            return Err(L402Error::PriceExceedsCeiling {
                price: challenge.price,
                ceiling,
            });
        }

        let payment = self
            .payer
            .pay_invoice(&challenge.invoice)
            .await
            .map_err(|e| {
                if P::is_timeout(&e) {
                    L402Error::Timeout { context: "payment" }
                } else {
                    L402Error::Payment(e.to_string())
                }
            })?;
        let preimage = verifier::normalize_preimage(&payment.preimage).ok_or_else(|| {
            L402Error::Payment("backend returned an unusable preimage".to_string())
        })?;
        info!(price = challenge.price, "Paid L402 invoice");

        let authorization = authorization_value(&challenge.token, &preimage);
        let header = HeaderValue::from_str(&authorization)?;
        Ok(Settlement {
            authorization,
            header,
            preimage,
            price: challenge.price,
        })
    }

    async fn send(
        &self,
        url: &Url,
        options: &RequestOptions,
        authorization: Option<&HeaderValue>,
    ) -> Result<Response, L402Error> {
        let mut headers = options.headers.clone();
        if let Some(authorization) = authorization {
            headers.insert(AUTHORIZATION, authorization.clone());
        }
        let mut request = self
            .http
            .request(options.method.clone(), url.clone())
            .headers(headers);
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        request.send().await.map_err(L402Error::from_reqwest)
    }
}

#[async_trait::async_trait]
impl<P> rqm::Middleware for L402Client<P>
where
    P: InvoicePayer + Send + Sync + 'static,
    P::Error: Send,
{
    /// Handles a request, automatically paying for 402 responses.
    ///
    /// A cached credential for the request URL is attached unless the caller already set
    /// `Authorization`. The ceiling is the client's, or [`MaxPrice`] from the request
    /// extensions.
    #[instrument(name = "l402.reqwest.handle", skip_all, fields(url = %req.url()), err)]
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let target = req.url().to_string();
        if !req.headers().contains_key(AUTHORIZATION) {
            if let Some(cached) = self.cache.get(&target) {
                trace!("Using cached L402 credential");
                let value = HeaderValue::from_str(&cached).map_err(L402Error::from)?;
                req.headers_mut().insert(AUTHORIZATION, value);
            }
        }

        let retry_req = req.try_clone();
        let res = next.clone().run(req, extensions).await?;
        if res.status() != StatusCode::PAYMENT_REQUIRED {
            trace!(status = ?res.status(), "No payment required, returning response");
            return Ok(res);
        }

        // Paying without a way to retry would lose the payment.
        let mut retry = retry_req.ok_or(L402Error::RequestNotCloneable)?;
        let ceiling = extensions
            .get::<MaxPrice>()
            .map(|max| max.0)
            .unwrap_or(self.max_price);
        let challenge = parse_challenge(res).await?;
        let settlement = self.settle(&challenge, ceiling).await?;

        self.cache.insert(target, settlement.authorization);
        retry.headers_mut().insert(AUTHORIZATION, settlement.header);

        trace!(url = ?retry.url(), "Retrying request with L402 credential");
        next.run(retry, extensions).await
    }
}

/// Parses the JSON body of a `402 Payment Required` response.
pub async fn parse_challenge(response: Response) -> Result<ChallengeBody, L402Error> {
    let bytes = response.bytes().await.map_err(L402Error::from_reqwest)?;
    serde_json::from_slice::<ChallengeBody>(&bytes)
        .map_err(|e| L402Error::InvalidChallenge(e.to_string()))
}

async fn read_body(response: Response) -> Result<Value, L402Error> {
    let bytes = response.bytes().await.map_err(L402Error::from_reqwest)?;
    Ok(body_to_json(&bytes))
}

/// JSON when it parses, a JSON string for other text, `null` when empty.
fn body_to_json(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
