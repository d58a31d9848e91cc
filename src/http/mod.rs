//! HTTP layer: request model, transport, retry, deduplication and the client.

pub mod client;
pub(crate) mod dedup;
pub mod request;
pub mod retry;
pub mod transport;

pub use client::{ClientOptions, HttpClient, HttpClientBuilder, DEFAULT_BASE_URL};
pub use request::{ApiRequest, FormPart, Method, MultipartBody, RequestBody, RequestOptions};
pub use retry::RetryPolicy;
pub use transport::{ReqwestTransport, Transport, WireRequest, WireResponse};
