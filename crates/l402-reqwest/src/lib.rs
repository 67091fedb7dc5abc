//! Reqwest integration for automatic [L402](https://docs.lightning.engineering/the-lightning-network/l402) payments.
//!
//! This crate provides an [`L402Client`] that answers `402 Payment Required` responses by
//! paying the Lightning invoice in the challenge and retrying with the resulting credential.
//! It can be used directly through [`L402Client::fetch`], or as a `reqwest` middleware.
//!
//! ## Quickstart
//!
//! ```rust,no_run
//! use l402_backend::BackendClient;
//! use l402_reqwest::{L402Client, RequestOptions};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let node = BackendClient::try_from("https://localhost:8080")?;
//! let client = L402Client::new(Arc::new(node)).with_max_price(1_000);
//!
//! let response = client
//!     .fetch("https://api.example.com/premium", RequestOptions::get())
//!     .await?;
//! println!("paid: {}, body: {}", response.paid, response.body);
//! # Ok(())
//! # }
//! ```
//!
//! ## As Middleware
//!
//! ```rust,no_run
//! use l402_backend::BackendClient;
//! use l402_reqwest::{L402Client, ReqwestWithPayments, ReqwestWithPaymentsBuild};
//! use reqwest::Client;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let node = BackendClient::try_from("https://localhost:8080")?;
//! let http_client = Client::new()
//!     .with_payments(L402Client::new(Arc::new(node)))
//!     .build();
//!
//! let response = http_client
//!     .get("https://api.example.com/premium")
//!     .send()
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Spending Ceiling
//!
//! A challenge priced above the ceiling fails with [`L402Error::PriceExceedsCeiling`]
//! before anything is paid. The default ceiling is 10000 satoshis; change it with
//! [`L402Client::with_max_price`], per call with [`RequestOptions::max_price`], or per
//! middleware request with the [`MaxPrice`] extension.
//!
//! ## Credential Cache
//!
//! Credentials are cached per target in a [`TokenCache`] owned by the client and shared by
//! its clones. There is no expiry.

mod builder;
mod cache;
mod client;

pub use builder::*;
pub use cache::*;
pub use client::*;
