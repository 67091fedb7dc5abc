//! Pricing for protected routes.
//!
//! A route is priced either statically ([`StaticPrice`]) or per request through a
//! caller-supplied function over [`RequestMeta`]. Every price source is consulted only when
//! a challenge is about to be issued, and its result is validated the same way: zero is not
//! a price and turns into an internal error, never into a free pass.

use http::{HeaderMap, Method, Uri};
use std::future::Future;
use std::pin::Pin;

/// Boxed error returned by fallible price sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed future returned by [`PriceSource::price`].
pub type PriceFuture<'a> = Pin<Box<dyn Future<Output = Result<u64, BoxError>> + Send + 'a>>;

/// The parts of a request a pricing function may look at.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestMeta {
    /// The resource identifier a challenge is bound to.
    pub fn path(&self) -> &str {
        self.uri.path()
    }
}

impl<B> From<&http::Request<B>> for RequestMeta {
    fn from(req: &http::Request<B>) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            headers: req.headers().clone(),
        }
    }
}

/// Source of the price, in satoshis, for a challenged request.
pub trait PriceSource: Send + Sync + 'static {
    fn price<'a>(&'a self, request: &'a RequestMeta) -> PriceFuture<'a>;
}

/// The same price for every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticPrice(pub u64);

impl PriceSource for StaticPrice {
    fn price<'a>(&'a self, _request: &'a RequestMeta) -> PriceFuture<'a> {
        let price = self.0;
        Box::pin(async move { Ok(price) })
    }
}

/// A synchronous pricing function.
///
/// ```rust
/// use l402_axum::price::{DynamicPrice, RequestMeta};
///
/// let pricing = DynamicPrice(|req: &RequestMeta| if req.path().starts_with("/bulk") { 500 } else { 10 });
/// ```
#[derive(Clone)]
pub struct DynamicPrice<F>(pub F);

impl<F> PriceSource for DynamicPrice<F>
where
    F: Fn(&RequestMeta) -> u64 + Send + Sync + 'static,
{
    fn price<'a>(&'a self, request: &'a RequestMeta) -> PriceFuture<'a> {
        let price = (self.0)(request);
        Box::pin(async move { Ok(price) })
    }
}

/// An asynchronous, fallible pricing function. It receives an owned copy of the request
/// metadata so it can await other services freely.
#[derive(Clone)]
pub struct AsyncPrice<F>(pub F);

impl<F, Fut, E> PriceSource for AsyncPrice<F>
where
    F: Fn(RequestMeta) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<u64, E>> + Send + 'static,
    E: Into<BoxError>,
{
    fn price<'a>(&'a self, request: &'a RequestMeta) -> PriceFuture<'a> {
        let fut = (self.0)(request.clone());
        Box::pin(async move { fut.await.map_err(Into::into) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(path: &str) -> RequestMeta {
        let req = http::Request::get(path).body(()).unwrap();
        RequestMeta::from(&req)
    }

    #[tokio::test]
    async fn test_static_price() {
        assert_eq!(StaticPrice(42).price(&meta("/")).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_dynamic_price_sees_request() {
        let pricing = DynamicPrice(|req: &RequestMeta| req.path().len() as u64);
        assert_eq!(pricing.price(&meta("/abcd")).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_async_price_error_is_propagated() {
        let pricing = AsyncPrice(|_req: RequestMeta| async { Err::<u64, _>("oracle down") });
        let err = pricing.price(&meta("/")).await.unwrap_err();
        assert_eq!(err.to_string(), "oracle down");
    }
}
