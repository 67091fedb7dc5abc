//! Axum middleware for enforcing L402 payments on protected routes.
//!
//! Requests without an `Authorization: L402 ...` credential receive `402 Payment Required`
//! with a fresh invoice and proof token. Requests with a valid credential reach the route,
//! and the verified [`l402_types::proto::Proof`] is available through `Extension<Proof>`.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use axum::{Extension, Router, routing::get};
//! use l402_axum::L402Middleware;
//! use l402_types::proto::Proof;
//!
//! let l402 = L402Middleware::try_new("https://localhost:8080").unwrap();
//!
//! let app: Router = Router::new().route(
//!     "/protected",
//!     get(my_handler).layer(l402.with_price(100).with_description("VIP content")),
//! );
//!
//! async fn my_handler(Extension(proof): Extension<Proof>) -> String {
//!     format!("Paid with {}", proof.payment_hash)
//! }
//! ```
//!
//! ## Configuration Notes
//!
//! - **[`L402Middleware::with_price`]** sets a static price in satoshis.
//! - **[`L402Middleware::with_dynamic_price`]** prices each request with a synchronous function.
//! - **[`L402Middleware::with_async_price`]** prices each request with an asynchronous, fallible function.
//! - **[`L402LayerBuilder::with_description`]** sets the invoice memo. Without it the memo is
//!   `"<METHOD> <path>"` of the challenged request.
//!
//! A price of zero is never offered: the request fails with `500 Internal Server Error`.

use axum_core::extract::Request;
use axum_core::response::Response;
use l402_backend::{BackendClient, BackendClientError};
use l402_types::backend::InvoiceIssuer;
use l402_types::config::ServerConfig;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};

use crate::paygate::Paygate;
use crate::price::{AsyncPrice, BoxError, DynamicPrice, PriceSource, RequestMeta, StaticPrice};

/// The main L402 middleware instance for enforcing payments on routes.
///
/// Create a single instance per application and use it to build payment layers
/// for protected routes.
#[derive(Clone, Debug)]
pub struct L402Middleware<B> {
    backend: B,
}

impl<B> L402Middleware<B> {
    /// Uses any [`InvoiceIssuer`] as the payment backend.
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl L402Middleware<Arc<BackendClient>> {
    /// Creates a new middleware instance backed by the payment backend at `url`.
    pub fn try_new(url: &str) -> Result<Self, BackendClientError> {
        let backend = BackendClient::try_from(url)?;
        Ok(Self {
            backend: Arc::new(backend),
        })
    }

    /// Creates a middleware instance and a priced layer from [`ServerConfig`].
    pub fn from_config(
        config: &ServerConfig,
    ) -> Result<L402LayerBuilder<Arc<BackendClient>>, BackendClientError> {
        let backend = BackendClient::from_config(&config.backend)?;
        let layer = Self::with_backend(Arc::new(backend)).with_price(config.price);
        Ok(match &config.description {
            Some(description) => layer.with_description(description.clone()),
            None => layer,
        })
    }
}

impl TryFrom<&str> for L402Middleware<Arc<BackendClient>> {
    type Error = BackendClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl<B> L402Middleware<B>
where
    B: Clone,
{
    /// Protects a route with a static price in satoshis.
    pub fn with_price(&self, price: u64) -> L402LayerBuilder<B> {
        self.with_price_source(StaticPrice(price))
    }

    /// Protects a route with a price computed from each request.
    pub fn with_dynamic_price<F>(&self, pricing: F) -> L402LayerBuilder<B>
    where
        F: Fn(&RequestMeta) -> u64 + Send + Sync + 'static,
    {
        self.with_price_source(DynamicPrice(pricing))
    }

    /// Protects a route with a price computed asynchronously from each request.
    ///
    /// A pricing error fails the request with `500 Internal Server Error`.
    pub fn with_async_price<F, Fut, E>(&self, pricing: F) -> L402LayerBuilder<B>
    where
        F: Fn(RequestMeta) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<u64, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.with_price_source(AsyncPrice(pricing))
    }

    /// Protects a route with any [`PriceSource`].
    pub fn with_price_source<P: PriceSource>(&self, price: P) -> L402LayerBuilder<B> {
        L402LayerBuilder {
            backend: self.backend.clone(),
            price: Arc::new(price),
            description: None,
        }
    }
}

/// Builder for configuring the L402 middleware layer.
#[derive(Clone)]
pub struct L402LayerBuilder<B> {
    backend: B,
    price: Arc<dyn PriceSource>,
    description: Option<Arc<str>>,
}

impl<B> L402LayerBuilder<B> {
    /// Sets a description of what the payment grants access to.
    ///
    /// Used as the invoice memo and included in 402 responses.
    pub fn with_description<D: Into<String>>(mut self, description: D) -> Self {
        self.description = Some(Arc::from(description.into()));
        self
    }
}

impl<S, B> Layer<S> for L402LayerBuilder<B>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    B: InvoiceIssuer + Clone,
{
    type Service = L402MiddlewareService<B>;

    fn layer(&self, inner: S) -> Self::Service {
        L402MiddlewareService {
            backend: self.backend.clone(),
            price: self.price.clone(),
            description: self.description.clone(),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// Axum service that enforces L402 payments on incoming requests.
#[derive(Clone)]
pub struct L402MiddlewareService<B> {
    /// Payment backend that creates invoices
    backend: B,
    /// Price of the protected route
    price: Arc<dyn PriceSource>,
    /// Invoice memo override
    description: Option<Arc<str>>,
    /// The inner Axum service being wrapped
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl<B> Service<Request> for L402MiddlewareService<B>
where
    B: InvoiceIssuer + Clone + Send + Sync + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    /// Delegates readiness polling to the wrapped inner service.
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    /// Intercepts the request, injects payment enforcement logic, and forwards to the wrapped service.
    fn call(&mut self, req: Request) -> Self::Future {
        let gate = Paygate {
            backend: self.backend.clone(),
            price: self.price.clone(),
            description: self.description.clone(),
        };
        Box::pin(gate.handle_request(self.inner.clone(), req))
    }
}
