//! Axum middleware for enforcing [L402](https://docs.lightning.engineering/the-lightning-network/l402) payments.
//!
//! This crate provides an [`L402Middleware`] Axum layer that protects routes behind a
//! Lightning payment, verified statelessly from the preimage the client presents.
//!
//! ## Quickstart
//!
//! ```rust,no_run
//! use axum::{Router, routing::get, Json};
//! use axum::response::IntoResponse;
//! use http::StatusCode;
//! use serde_json::json;
//! use l402_axum::L402Middleware;
//!
//! let l402 = L402Middleware::try_new("https://localhost:8080").unwrap();
//!
//! let app: Router = Router::new().route(
//!     "/paywall",
//!     get(my_handler).layer(l402.with_price(100).with_description("Premium Content")),
//! );
//!
//! async fn my_handler() -> impl IntoResponse {
//!     (StatusCode::OK, Json(json!({ "hello": "world" })))
//! }
//! ```
//! See [`L402Middleware`] for full configuration options and the [`price`] module for
//! per-request pricing.

pub mod layer;
pub mod paygate;
pub mod price;

pub use layer::{L402LayerBuilder, L402Middleware, L402MiddlewareService};
pub use price::RequestMeta;
