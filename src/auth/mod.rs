//! IRIS authentication.
//!
//! Challenge-response login, logout and the single-flight token refresh the
//! HTTP client falls back to on 401.

pub mod hash;
pub mod models;
pub mod refresh;
pub mod session;

pub use models::{ChallengeResponse, LoginResponse, LogoutResponse, RefreshedTokens};
pub use refresh::{EndpointRefresher, LogoutCallback, RefreshCoordinator, RefreshState, Refresher};
pub use session::AuthSession;
