//! IRIS client core.
//!
//! An authenticated HTTP client for the IRIS backend with request deduplication,
//! single-flight token refresh and retry with backoff, plus the login session
//! and the SQAS stock screener bindings built on top of it.

#![deny(clippy::all)]

pub mod auth;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod sqas;
pub mod store;

pub use auth::AuthSession;
pub use config::Config;
pub use error::{AppError, HttpError, RefreshError, SessionError, TokenStoreError};
pub use http::{ClientOptions, HttpClient, RequestBody, RequestOptions};
pub use sqas::SqasApi;
pub use store::{open_token_store, TokenStore, TokenStoreKind};
