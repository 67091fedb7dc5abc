//! Traits for the external payment backend.
//!
//! The server needs to create priced invoices ([`InvoiceIssuer`]); the client needs to pay
//! them ([`InvoicePayer`]). A Lightning node's REST gateway usually does both, and
//! `l402-backend` provides an HTTP client implementing both traits.

use std::fmt::{Debug, Display};
use std::sync::Arc;

/// An invoice created by the payment backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    /// Payable form of the invoice (BOLT11 payment request).
    pub payment_request: String,
    /// Lowercase hex SHA-256 of the invoice preimage.
    pub payment_hash: String,
}

/// Outcome of a successful payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    /// Revealed preimage, normalized to lowercase hex.
    pub preimage: String,
}

/// Creates invoices for challenges. Implemented by server-side backends.
pub trait InvoiceIssuer {
    /// The error type returned by this backend.
    type Error: Debug + Display;

    /// Creates an invoice for `amount` satoshis carrying `memo`.
    ///
    /// Any failure, including a response that cannot be understood, is an error.
    fn create_invoice(
        &self,
        amount: u64,
        memo: &str,
    ) -> impl Future<Output = Result<Invoice, Self::Error>> + Send;
}

/// Pays invoices found in challenges. Implemented by client-side backends.
pub trait InvoicePayer {
    /// The error type returned by this backend.
    type Error: Debug + Display;

    /// Pays `payment_request` and returns the revealed preimage.
    ///
    /// A payment the backend reports as failed is an error carrying the backend's reason.
    fn pay_invoice(
        &self,
        payment_request: &str,
    ) -> impl Future<Output = Result<Payment, Self::Error>> + Send;

    /// Whether `error` means the backend did not answer in time.
    fn is_timeout(_error: &Self::Error) -> bool {
        false
    }
}

impl<T: InvoiceIssuer> InvoiceIssuer for Arc<T> {
    type Error = T::Error;

    fn create_invoice(
        &self,
        amount: u64,
        memo: &str,
    ) -> impl Future<Output = Result<Invoice, Self::Error>> + Send {
        self.as_ref().create_invoice(amount, memo)
    }
}

impl<T: InvoicePayer> InvoicePayer for Arc<T> {
    type Error = T::Error;

    fn pay_invoice(
        &self,
        payment_request: &str,
    ) -> impl Future<Output = Result<Payment, Self::Error>> + Send {
        self.as_ref().pay_invoice(payment_request)
    }

    fn is_timeout(error: &Self::Error) -> bool {
        T::is_timeout(error)
    }
}
