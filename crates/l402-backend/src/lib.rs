//! HTTP client for the external Lightning payment backend.
//!
//! [`BackendClient`] speaks the REST dialect of an LND node (`/v1/invoices` and
//! `/v1/channels/transactions`) and implements both
//! [`l402_types::backend::InvoiceIssuer`] and [`l402_types::backend::InvoicePayer`],
//! so one type serves the `l402-axum` paywall and the `l402-reqwest` payer.
//!
//! ```rust
//! use l402_backend::BackendClient;
//!
//! let backend = BackendClient::try_from("https://localhost:8080").unwrap();
//! ```

pub mod client;

pub use client::*;
