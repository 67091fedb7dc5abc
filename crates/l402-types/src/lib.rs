#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the L402 payment protocol.
//!
//! This crate provides the foundational types shared by the server-side paywall
//! ([`l402-axum`]) and the client-side payer ([`l402-reqwest`]). It performs no I/O.
//!
//! # Overview
//!
//! The L402 protocol gates HTTP resources behind a Lightning payment. When a client
//! requests a paid resource without a credential, the server responds with
//! `402 Payment Required`, an invoice, and a token that embeds the invoice's payment hash.
//! Paying the invoice reveals a preimage. The client replays the request with
//! `Authorization: L402 <token>:<preimage>`, and the server checks that
//! `sha256(preimage) == payment_hash` without keeping any state.
//!
//! # Modules
//!
//! - [`backend`] - Traits for the external payment backend (create and pay invoices)
//! - [`config`] - Backend, server, and client configuration with environment variable resolution
//! - [`proto`] - Wire format types: challenge body, credentials, and the verified [`proto::Proof`]
//! - [`timestamp`] - Unix timestamp used for the informational `issuedAt` token field
//! - [`token`] - The stateless [`token::ProofToken`] and its transport encoding
//! - [`util`] - Helper types (base64)
//! - [`verifier`] - Preimage commitment and verification
//!
//! [`l402-axum`]: https://docs.rs/l402-axum
//! [`l402-reqwest`]: https://docs.rs/l402-reqwest

pub mod backend;
pub mod config;
pub mod proto;
pub mod timestamp;
pub mod token;
pub mod util;
pub mod verifier;
