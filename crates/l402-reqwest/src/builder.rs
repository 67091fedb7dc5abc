//! Wiring an [`L402Client`] into `reqwest` as middleware.
//!
//! ```rust,no_run
//! use l402_backend::BackendClient;
//! use l402_reqwest::{L402Client, ReqwestWithPayments, ReqwestWithPaymentsBuild};
//! use std::sync::Arc;
//!
//! let node = BackendClient::try_from("https://localhost:8080").unwrap();
//! let payments = reqwest::ClientBuilder::new()
//!     .with_payments(L402Client::new(Arc::new(node)));
//! let cache = payments.l402_client().cache().clone();
//! let http = payments.build().unwrap();
//! # let _ = (cache, http);
//! ```
//!
//! Starting from a [`ClientBuilder`] defers building the `reqwest` client, so building
//! can fail; starting from a [`Client`] cannot.

use reqwest::{Client, ClientBuilder};
use reqwest_middleware as rqm;

use crate::client::L402Client;

/// Attaches an [`L402Client`] to a `reqwest` client or client builder.
pub trait ReqwestWithPayments<A, P> {
    fn with_payments(self, l402_client: L402Client<P>) -> ReqwestWithPaymentsBuilder<A, P>;
}

impl<P> ReqwestWithPayments<Client, P> for Client {
    fn with_payments(self, l402_client: L402Client<P>) -> ReqwestWithPaymentsBuilder<Client, P> {
        ReqwestWithPaymentsBuilder::new(self, l402_client)
    }
}

impl<P> ReqwestWithPayments<ClientBuilder, P> for ClientBuilder {
    fn with_payments(
        self,
        l402_client: L402Client<P>,
    ) -> ReqwestWithPaymentsBuilder<ClientBuilder, P> {
        ReqwestWithPaymentsBuilder::new(self, l402_client)
    }
}

/// A `reqwest` client (or builder) paired with the [`L402Client`] that will pay for it.
pub struct ReqwestWithPaymentsBuilder<A, P> {
    inner: A,
    l402_client: L402Client<P>,
}

impl<A, P> ReqwestWithPaymentsBuilder<A, P> {
    fn new(inner: A, l402_client: L402Client<P>) -> Self {
        Self { inner, l402_client }
    }

    /// The client that will be installed. Its cache is shared with the middleware.
    pub fn l402_client(&self) -> &L402Client<P> {
        &self.l402_client
    }
}

/// Finishes a [`ReqwestWithPaymentsBuilder`] into a middleware-enabled client.
pub trait ReqwestWithPaymentsBuild {
    type BuildResult;
    type BuilderResult;

    /// Builds the client with the L402 middleware installed.
    fn build(self) -> Self::BuildResult;
    /// Returns a middleware builder, so further middleware can be stacked after L402.
    fn builder(self) -> Self::BuilderResult;
}

impl<P> ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<Client, P>
where
    L402Client<P>: rqm::Middleware,
{
    type BuildResult = rqm::ClientWithMiddleware;
    type BuilderResult = rqm::ClientBuilder;

    fn build(self) -> Self::BuildResult {
        self.builder().build()
    }

    fn builder(self) -> Self::BuilderResult {
        rqm::ClientBuilder::new(self.inner).with(self.l402_client)
    }
}

impl<P> ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<ClientBuilder, P>
where
    L402Client<P>: rqm::Middleware,
{
    type BuildResult = Result<rqm::ClientWithMiddleware, reqwest::Error>;
    type BuilderResult = Result<rqm::ClientBuilder, reqwest::Error>;

    fn build(self) -> Self::BuildResult {
        Ok(self.builder()?.build())
    }

    fn builder(self) -> Self::BuilderResult {
        let client = self.inner.build()?;
        Ok(rqm::ClientBuilder::new(client).with(self.l402_client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use l402_types::backend::{InvoicePayer, Payment};

    struct NeverPays;

    impl InvoicePayer for NeverPays {
        type Error = String;

        async fn pay_invoice(&self, _payment_request: &str) -> Result<Payment, String> {
            Err("payments disabled".to_string())
        }
    }

    #[test]
    fn test_build_from_client_builder() {
        let client = ClientBuilder::new()
            .with_payments(L402Client::new(NeverPays))
            .build();
        assert!(client.is_ok());
    }

    #[test]
    fn test_builder_exposes_client_cache() {
        let payments = Client::new().with_payments(L402Client::new(NeverPays));
        let cache = payments.l402_client().cache().clone();
        let _http = payments.build();
        cache.insert("https://a/x", "L402 t:p");
        assert_eq!(cache.len(), 1);
    }
}
