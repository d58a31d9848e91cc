//! Request and response bodies of the auth endpoints.

use serde::{Deserialize, Serialize};

use crate::store::{SecureString, TokenPair};

/// One-time login challenge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChallengeResponse {
    /// Per-user salt the stored password hash was derived with.
    pub salt: String,
    /// Single-use nonce keying the second hashing stage.
    pub nonce: String,
}

/// Credentials submitted to the login endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest<'a> {
    pub user_id: &'a str,
    pub password_hash: &'a str,
}

/// Successful login: a fresh token pair.
pub type LoginResponse = TokenPair;

/// Body of the logout call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest<'a> {
    pub refresh_token: Option<&'a str>,
}

/// Logout outcome. `result_code == 0` means the server revoked the session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub result_code: i32,
    #[serde(default)]
    pub message: String,
}

impl LogoutResponse {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }
}

/// Raw refresh response. The refresh token is only present when rotated.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl RefreshResponse {
    /// `None` when the access token is absent or empty.
    pub(crate) fn into_tokens(self) -> Option<RefreshedTokens> {
        let access_token = self.access_token.filter(|t| !t.is_empty())?;
        Some(RefreshedTokens {
            access_token: SecureString::new(access_token),
            refresh_token: self
                .refresh_token
                .filter(|t| !t.is_empty())
                .map(SecureString::new),
        })
    }
}

/// Tokens obtained from a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access_token: SecureString,
    /// Set when the server rotated the refresh token.
    pub refresh_token: Option<SecureString>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_login_request_shape() {
        let body = serde_json::to_value(LoginRequest {
            user_id: "u-1",
            password_hash: "h",
        })
        .unwrap();
        assert_eq!(body, json!({"userId": "u-1", "passwordHash": "h"}));
    }

    #[test]
    fn test_logout_response() {
        let ok: LogoutResponse =
            serde_json::from_value(json!({"resultCode": 0, "message": "bye"})).unwrap();
        assert!(ok.is_success());

        let failed: LogoutResponse = serde_json::from_value(json!({"resultCode": 9})).unwrap();
        assert!(!failed.is_success());
        assert!(failed.message.is_empty());
    }

    #[test]
    fn test_refresh_response_without_rotation() {
        let raw: RefreshResponse = serde_json::from_value(json!({"accessToken": "A2"})).unwrap();
        let tokens = raw.into_tokens().unwrap();
        assert_eq!(tokens.access_token.as_str(), "A2");
        assert!(tokens.refresh_token.is_none());
    }

    #[test]
    fn test_refresh_response_missing_access_token() {
        let raw: RefreshResponse =
            serde_json::from_value(json!({"accessToken": "", "refreshToken": "R2"})).unwrap();
        assert!(raw.into_tokens().is_none());

        let raw: RefreshResponse = serde_json::from_value(json!({})).unwrap();
        assert!(raw.into_tokens().is_none());
    }
}
