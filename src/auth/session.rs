//! Login and logout against the IRIS auth endpoints.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{error, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::hash::password_hash;
use super::models::{ChallengeResponse, LoginRequest, LoginResponse, LogoutRequest, LogoutResponse};
use crate::endpoints::{AUTH_GET_CHALLENGE, AUTH_GET_USER_ID, AUTH_LOGIN, AUTH_LOGOUT};
use crate::error::{HttpError, SessionError};
use crate::http::{HttpClient, RequestBody, RequestOptions};

/// Who is signed in.
#[derive(Debug, Default)]
struct LoginState {
    user_name: Option<String>,
    user_id: Option<Uuid>,
    is_authenticated: bool,
}

/// Session state on top of an [`HttpClient`].
pub struct AuthSession {
    client: HttpClient,
    state: Mutex<LoginState>,
}

impl AuthSession {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            state: Mutex::new(LoginState::default()),
        }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    fn state(&self) -> MutexGuard<'_, LoginState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.state().user_id
    }

    pub fn user_name(&self) -> Option<String> {
        self.state().user_name.clone()
    }

    /// Sign in with the challenge-response flow.
    ///
    /// Nothing about the authenticated state changes unless every step succeeds.
    pub async fn login(
        &self,
        url: Option<&str>,
        user_name: &str,
        password: &str,
    ) -> Result<(), SessionError> {
        let password = Zeroizing::new(password.to_string());
        self.client.set_base_url(url)?;

        info!("Signing in as {}", user_name);

        let user_id: Uuid = self
            .client
            .get(AUTH_GET_USER_ID, &[("userName", user_name)], RequestOptions::default())
            .await?;
        let user_id_text = user_id.to_string();

        let challenge: ChallengeResponse = self
            .client
            .get(
                AUTH_GET_CHALLENGE,
                &[("userId", user_id_text.as_str())],
                // Each challenge is single-use; never share one between logins.
                RequestOptions::forced(),
            )
            .await?;

        let hash = password_hash(&challenge.salt, &challenge.nonce, &password);
        let body = serde_json::to_value(LoginRequest {
            user_id: &user_id_text,
            password_hash: &hash,
        })
        .map_err(|e| HttpError::InvalidRequest(e.to_string()))?;

        let tokens: LoginResponse = self
            .client
            .post(AUTH_LOGIN, RequestBody::Json(body), RequestOptions::default())
            .await?;

        if let Err(e) = self.client.token_store().store_pair(&tokens) {
            error!("Failed to store tokens after login: {}", e);
            let _ = self.client.token_store().clear();
            return Err(e.into());
        }

        *self.state() = LoginState {
            user_name: Some(user_name.to_string()),
            user_id: Some(user_id),
            is_authenticated: true,
        };
        info!("Signed in as {}", user_name);
        Ok(())
    }

    /// Revoke the session on the server.
    ///
    /// Returns `Ok(false)` and leaves everything untouched when the server
    /// answers with a nonzero result code.
    pub async fn logout(&self) -> Result<bool, SessionError> {
        let refresh_token = self.client.refresh_token();
        let body = serde_json::to_value(LogoutRequest {
            refresh_token: refresh_token.as_ref().map(|t| t.as_str()),
        })
        .map_err(|e| HttpError::InvalidRequest(e.to_string()))?;

        let response: LogoutResponse = self
            .client
            .post(AUTH_LOGOUT, RequestBody::Json(body), RequestOptions::forced())
            .await?;

        if !response.is_success() {
            warn!(
                "Logout rejected (code {}): {}",
                response.result_code, response.message
            );
            return Ok(false);
        }

        self.client.reset_base_url();
        self.client.clear_tokens_and_pending()?;
        *self.state() = LoginState::default();
        info!("Signed out");
        Ok(true)
    }

    /// Drop the local session without contacting the server.
    pub fn forget(&self) -> Result<(), SessionError> {
        self.client.clear_tokens_and_pending()?;
        *self.state() = LoginState::default();
        Ok(())
    }
}
