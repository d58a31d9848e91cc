//! Authenticated HTTP client.
//!
//! Every call goes through the same pipeline:
//! dedup → retry loop → (401 → refresh → resend once) → transport.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::dedup::{Outcome, PendingRegistry};
use super::request::{resolve_url, ApiRequest, Method, RequestBody, RequestOptions};
use super::retry::{RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
use super::transport::{ReqwestTransport, Transport, WireRequest};
use crate::auth::refresh::{
    EndpointRefresher, LogoutCallback, RefreshCoordinator, RefreshState, Refresher,
};
use crate::endpoints::{is_auth_endpoint, AUTH_REFRESH};
use crate::error::{HttpError, TokenStoreError};
use crate::store::{MemoryTokenStore, SecureString, TokenStore};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client construction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Headers sent with every request.
    pub headers: HashMap<String, String>,
    pub refresh_endpoint: String,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub dedupe: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        let mut headers = HashMap::new();
        headers.insert("Accept".to_string(), "application/json".to_string());

        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_TIMEOUT,
            headers,
            refresh_endpoint: AUTH_REFRESH.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            dedupe: true,
        }
    }
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    options: ClientOptions,
    tokens: Option<Arc<dyn TokenStore>>,
    transport: Option<Arc<dyn Transport>>,
    refresher: Option<Arc<dyn Refresher>>,
    on_logout: Option<LogoutCallback>,
}

impl HttpClientBuilder {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            tokens: None,
            transport: None,
            refresher: None,
            on_logout: None,
        }
    }

    /// Token storage. Defaults to an in-memory store.
    pub fn token_store(mut self, tokens: Arc<dyn TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Wire transport. Defaults to reqwest.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the default refresh call to the refresh endpoint.
    pub fn refresher(mut self, refresher: Arc<dyn Refresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Called once each time a refresh fails and the session is dropped.
    pub fn on_logout(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_logout = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> Result<HttpClient, HttpError> {
        let options = self.options;
        let default_base_url = parse_base_url(&options.base_url)?;
        let base_url = Arc::new(RwLock::new(default_base_url.clone()));

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(
                options.timeout,
                options.connect_timeout,
                &options.headers,
            )?),
        };
        let tokens = self
            .tokens
            .unwrap_or_else(|| Arc::new(MemoryTokenStore::new()));
        let refresher = self.refresher.unwrap_or_else(|| {
            Arc::new(EndpointRefresher::new(
                Arc::clone(&transport),
                Arc::clone(&base_url),
                options.refresh_endpoint.clone(),
            ))
        });
        let refresh = RefreshCoordinator::new(refresher, Arc::clone(&tokens), self.on_logout);

        info!(
            "HTTP client ready for {} (retries: {}, dedupe: {})",
            default_base_url, options.max_retries, options.dedupe
        );

        Ok(HttpClient {
            inner: Arc::new(ClientInner {
                retry: RetryPolicy::new(options.max_retries, options.retry_delay),
                options,
                default_base_url,
                base_url,
                transport,
                tokens,
                pending: Arc::new(PendingRegistry::new()),
                refresh,
            }),
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, HttpError> {
    Url::parse(raw.trim()).map_err(|e| HttpError::InvalidRequest(format!("base URL {}: {}", raw, e)))
}

struct ClientInner {
    options: ClientOptions,
    retry: RetryPolicy,
    default_base_url: Url,
    base_url: Arc<RwLock<Url>>,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenStore>,
    pending: Arc<PendingRegistry>,
    refresh: RefreshCoordinator,
}

/// HTTP client shared by the session and the API bindings. Cheap to clone.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<ClientInner>,
}

impl HttpClient {
    pub fn builder(options: ClientOptions) -> HttpClientBuilder {
        HttpClientBuilder::new(options)
    }

    /// Client with default options, an in-memory token store and reqwest.
    pub fn new() -> Result<Self, HttpError> {
        Self::builder(ClientOptions::default()).build()
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        options: RequestOptions,
    ) -> Result<T, HttpError> {
        self.request(with_query(ApiRequest::new(Method::Get, path), query), options)
            .await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<T, HttpError> {
        let mut request = ApiRequest::new(Method::Post, path);
        request.body = body;
        self.request(request, options).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<T, HttpError> {
        let mut request = with_query(ApiRequest::new(Method::Put, path), query);
        request.body = body;
        self.request(request, options).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        options: RequestOptions,
    ) -> Result<T, HttpError> {
        self.request(with_query(ApiRequest::new(Method::Delete, path), query), options)
            .await
    }

    /// Issue `request` and decode the JSON response into `T`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        options: RequestOptions,
    ) -> Result<T, HttpError> {
        let value = self.dispatch(request, options).await?;
        serde_json::from_value(value).map_err(|e| HttpError::Decode(e.to_string()))
    }

    async fn dispatch(&self, request: ApiRequest, options: RequestOptions) -> Outcome {
        let retry = options.retry.map_or(self.inner.retry, |max_retries| {
            RetryPolicy::new(max_retries, self.inner.retry.base_delay)
        });

        if !self.inner.options.dedupe {
            return self.inner.execute(request, retry).await;
        }

        let key = request.fingerprint();
        let inner = Arc::clone(&self.inner);
        let (method, path) = (request.method, request.path.clone());
        let (future, joined) = self
            .inner
            .pending
            .join_or_start(key, options.force, move || async move {
                inner.execute(request, retry).await
            });
        if joined {
            debug!("Joining in-flight {} {}", method, path);
        }
        future.await
    }

    /// Point the client at another server. `None` or an empty string is ignored.
    pub fn set_base_url(&self, url: Option<&str>) -> Result<(), HttpError> {
        let Some(raw) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            return Ok(());
        };
        let parsed = parse_base_url(raw)?;
        info!("Base URL set to {}", parsed);
        *self.inner.write_base_url() = parsed;
        Ok(())
    }

    /// Restore the base URL the client was built with.
    pub fn reset_base_url(&self) {
        *self.inner.write_base_url() = self.inner.default_base_url.clone();
    }

    pub fn base_url(&self) -> Url {
        self.inner.current_base_url()
    }

    pub fn set_access_token(&self, token: &str) -> Result<(), TokenStoreError> {
        self.inner.tokens.set_access_token(token)
    }

    pub fn set_refresh_token(&self, token: &str) -> Result<(), TokenStoreError> {
        self.inner.tokens.set_refresh_token(token)
    }

    pub fn access_token(&self) -> Option<SecureString> {
        self.inner.tokens.access_token()
    }

    pub fn refresh_token(&self) -> Option<SecureString> {
        self.inner.tokens.refresh_token()
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.inner.tokens
    }

    /// Drop the session: tokens, in-flight dedup entries and any running refresh.
    pub fn clear_tokens_and_pending(&self) -> Result<(), TokenStoreError> {
        self.inner.pending.clear();
        self.inner.refresh.reset();
        self.inner.tokens.clear()
    }

    /// Number of requests currently registered for deduplication.
    pub fn in_flight(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.inner.refresh.state()
    }
}

fn with_query(mut request: ApiRequest, query: &[(&str, &str)]) -> ApiRequest {
    for (key, value) in query {
        request = request.query(*key, *value);
    }
    request
}

impl ClientInner {
    fn current_base_url(&self) -> Url {
        self.base_url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write_base_url(&self) -> std::sync::RwLockWriteGuard<'_, Url> {
        self.base_url.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn execute(&self, request: ApiRequest, retry: RetryPolicy) -> Outcome {
        let mut attempt = 0;
        loop {
            match self.send_with_refresh(&request).await {
                Ok(value) => return Ok(value),
                Err(e) if retry.should_retry(request.method, &e, attempt) => {
                    let delay = retry.delay_for(attempt);
                    warn!(
                        "{} {} failed ({}), retrying in {:?} ({}/{})",
                        request.method,
                        request.path,
                        e,
                        delay,
                        attempt + 1,
                        retry.max_retries
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One attempt, with at most one refresh-and-resend on 401.
    async fn send_with_refresh(&self, request: &ApiRequest) -> Outcome {
        match self.send_once(request).await {
            Err(HttpError::Unauthorized) if !is_auth_endpoint(&request.path) => {
                debug!("{} {} returned 401, refreshing", request.method, request.path);
                self.refresh.refresh().await?;
                self.send_once(request).await
            }
            other => other,
        }
    }

    async fn send_once(&self, request: &ApiRequest) -> Outcome {
        let url = resolve_url(&self.current_base_url(), &request.path, &request.query)?;
        debug!("{} {}", request.method, url.path());

        let response = self
            .transport
            .send(WireRequest {
                method: request.method,
                url,
                bearer: self.tokens.access_token().filter(|t| !t.is_empty()),
                body: request.body.clone(),
            })
            .await?;

        if !response.is_success() {
            return Err(HttpError::from_status(response.status, response.text()));
        }

        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&response.body).map_err(|e| HttpError::Decode(e.to_string()))
    }
}
