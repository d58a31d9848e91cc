//! Error types for the IRIS client.
//!
//! Uses `thiserror` for library-style errors with automatic `Display` and `Error` implementations.
//! `HttpError` and `RefreshError` are `Clone` so one settled result can be handed to every
//! caller that shares an in-flight request or waits on a token refresh.

use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Token store error: {0}")]
    TokenStore(#[from] TokenStoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the HTTP client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// No response was received (connect failure, timeout, reset).
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: HTTP {status}")]
    Server { status: u16, body: String },

    /// Any 4xx other than 401.
    #[error("Request rejected: HTTP {status}")]
    Client { status: u16, body: String },

    #[error("Unauthorized (401)")]
    Unauthorized,

    /// A 401 could not be recovered because the token refresh failed.
    #[error("Token refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The task executing the request ended without producing a result.
    #[error("Request aborted: {0}")]
    Aborted(String),
}

impl HttpError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => Self::Unauthorized,
            500..=599 => Self::Server { status, body },
            _ => Self::Client { status, body },
        }
    }

    /// The HTTP status behind this error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Client { status, .. } => Some(*status),
            Self::Unauthorized => Some(401),
            _ => None,
        }
    }

    /// Network failures and 5xx responses are transient and may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }

    /// Returns a user-friendly message for display in the UI.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Network(_) => "Network error. Check your connection.",
            Self::Server { .. } => "The server is unavailable. Please try again later.",
            Self::Client { status: 403, .. } => "Insufficient permissions for this operation.",
            Self::Client { status: 404, .. } => "The requested resource was not found.",
            Self::Client { .. } => "The request was rejected by the server.",
            Self::Unauthorized => "Authentication failed.",
            Self::Refresh(_) => "Session expired. Please sign in again.",
            Self::Decode(_) => "Unexpected response from the server.",
            Self::InvalidRequest(_) | Self::Aborted(_) => "An error occurred. Please try again.",
        }
    }

    /// Returns true if this error should send the user back to the login screen.
    pub fn requires_sign_out(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::Refresh(_))
    }
}

/// Token refresh failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Refresh endpoint rejected the token: HTTP {0}")]
    Rejected(u16),

    #[error("Network error during refresh: {0}")]
    Network(String),

    #[error("Refresh response did not contain an access token")]
    MissingAccessToken,

    #[error("Failed to persist refreshed tokens: {0}")]
    Storage(String),

    #[error("Refresh ended before settling")]
    Abandoned,
}

/// Token storage errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenStoreError {
    #[error("Failed to store token: {0}")]
    StoreFailed(String),

    #[error("Failed to retrieve token: {0}")]
    RetrieveFailed(String),

    #[error("Failed to delete token: {0}")]
    DeleteFailed(String),
}

/// Login / logout errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Request failed: {0}")]
    Http(#[from] HttpError),

    #[error("Failed to store tokens: {0}")]
    TokenStore(#[from] TokenStoreError),
}

impl SessionError {
    /// Returns a user-friendly message for display in the UI.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Http(HttpError::Unauthorized) => "Sign-in failed. Check your user name and password.",
            Self::Http(e) => e.user_message(),
            Self::TokenStore(_) => "Failed to save credentials.",
        }
    }
}

impl AppError {
    /// Returns a user-friendly message for display in the UI.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Http(e) => e.user_message(),
            Self::Session(e) => e.user_message(),
            Self::TokenStore(_) => "Failed to access saved credentials.",
            Self::Config(_) => "Configuration error. Please check settings.",
            Self::Io(_) => "An error occurred. Please try again.",
        }
    }

    /// Returns true if this error should trigger a sign-out.
    pub fn requires_sign_out(&self) -> bool {
        match self {
            Self::Http(e) | Self::Session(SessionError::Http(e)) => e.requires_sign_out(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert_eq!(HttpError::from_status(401, String::new()), HttpError::Unauthorized);
        assert!(matches!(
            HttpError::from_status(503, "down".into()),
            HttpError::Server { status: 503, .. }
        ));
        assert!(matches!(
            HttpError::from_status(404, String::new()),
            HttpError::Client { status: 404, .. }
        ));
    }

    #[test]
    fn test_transient() {
        assert!(HttpError::Network("reset".into()).is_transient());
        assert!(HttpError::from_status(500, String::new()).is_transient());
        assert!(!HttpError::from_status(400, String::new()).is_transient());
        assert!(!HttpError::Unauthorized.is_transient());
    }

    #[test]
    fn test_user_messages() {
        let err = AppError::Http(HttpError::Refresh(RefreshError::NoRefreshToken));
        assert_eq!(err.user_message(), "Session expired. Please sign in again.");

        let err = AppError::Session(SessionError::Http(HttpError::Unauthorized));
        assert_eq!(
            err.user_message(),
            "Sign-in failed. Check your user name and password."
        );
    }

    #[test]
    fn test_requires_sign_out() {
        let err = AppError::Http(HttpError::Unauthorized);
        assert!(err.requires_sign_out());

        let err = AppError::Http(HttpError::from_status(403, String::new()));
        assert!(!err.requires_sign_out());

        let err = AppError::from(SessionError::Http(HttpError::Refresh(RefreshError::Abandoned)));
        assert!(err.requires_sign_out());

        let err = AppError::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(!err.requires_sign_out());
        assert_eq!(err.user_message(), "An error occurred. Please try again.");
    }
}
