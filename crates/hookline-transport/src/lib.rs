//! # Hookline Transport
//!
//! Network layer of the Hookline interactions framework.
//!
//! ## Outbound
//!
//! [`HttpClient`] sends API calls through per-route [`RateLimitBucket`]s,
//! retries transient failures and maps error statuses onto
//! [`HttpError`](hookline_core::HttpError). [`Followup`] wraps the calls that
//! authenticate with an interaction's follow-up token.
//!
//! ## Inbound
//!
//! [`InteractionServer`] exposes one HTTP path: `POST` deliveries and `GET`
//! liveness checks are forwarded to an
//! [`InteractionHandler`](hookline_core::InteractionHandler). [`Verifier`]
//! checks the Ed25519 signature of each delivery.
//!
//! ## Features
//!
//! - `http-client` (default): the `reqwest` backend
//! - `http-server` (default): the `axum` endpoint
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  hookline-framework │  (dispatcher, handlers)
//! ├─────────────────────┤
//! │  hookline-transport │  <- This crate
//! ├─────────────────────┤
//! │  Network (HTTP)     │
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hookline_transport::{ClientConfig, HttpClient, Method, Route};
//!
//! let client = HttpClient::new(ClientConfig::new(token))?;
//! let route = Route::new(Method::Get, "/channels/{channel_id}").param("channel_id", 123);
//! let channel = client.request(&route, None).await?.into_json();
//! ```

pub mod backend;
pub mod client;
pub mod ratelimit;
pub mod response;
pub mod route;
pub mod verify;
pub mod webhook;

#[cfg(feature = "http-server")]
pub mod server;

pub use backend::{BackendError, BackendRequest, BackendResponse, HttpBackend};
pub use client::{ClientConfig, HttpClient, RequestOptions};
pub use ratelimit::{BucketPermit, BucketTable, RateLimitBucket, RateLimitInfo};
pub use response::{HttpResponse, ResponseBody, ResponseFormat};
pub use route::{Method, Route};
pub use verify::{KeyError, Verifier};
pub use webhook::Followup;

#[cfg(feature = "http-client")]
pub use backend::ReqwestBackend;

#[cfg(feature = "http-server")]
pub use server::{BoundServer, InteractionServer};
