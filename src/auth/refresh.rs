//! Single-flight token refresh.
//!
//! Any number of requests may hit a 401 at once. The first one starts a refresh,
//! the rest queue behind it, and all of them are released in arrival order with
//! the same outcome once the single refresh call settles.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use url::Url;

use super::models::{RefreshResponse, RefreshedTokens};
use crate::error::RefreshError;
use crate::http::request::{resolve_url, Method, RequestBody};
use crate::http::transport::{Transport, WireRequest};
use crate::store::{SecureString, TokenStore};

/// Invoked once when a refresh fails and the session has been cleared.
pub type LogoutCallback = Arc<dyn Fn() + Send + Sync>;

/// Exchanges a refresh token for new tokens.
#[async_trait]
pub trait Refresher: Send + Sync {
    async fn refresh(&self, refresh_token: &SecureString) -> Result<RefreshedTokens, RefreshError>;
}

/// Default refresher: `POST {base}{endpoint}` with `{"refreshToken": ...}`.
///
/// Goes straight to the transport, without the bearer header or the client's
/// 401 handling, so a rejected refresh can never trigger another refresh.
pub struct EndpointRefresher {
    transport: Arc<dyn Transport>,
    base_url: Arc<RwLock<Url>>,
    endpoint: String,
}

impl EndpointRefresher {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: Arc<RwLock<Url>>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            base_url,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Refresher for EndpointRefresher {
    async fn refresh(&self, refresh_token: &SecureString) -> Result<RefreshedTokens, RefreshError> {
        let base = self
            .base_url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let url = resolve_url(&base, &self.endpoint, &[])
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        let response = self
            .transport
            .send(WireRequest {
                method: Method::Post,
                url,
                bearer: None,
                body: RequestBody::Json(json!({ "refreshToken": refresh_token.as_str() })),
            })
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        if !response.is_success() {
            return Err(RefreshError::Rejected(response.status));
        }

        serde_json::from_slice::<RefreshResponse>(&response.body)
            .ok()
            .and_then(RefreshResponse::into_tokens)
            .ok_or(RefreshError::MissingAccessToken)
    }
}

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

type Waiter = oneshot::Sender<Result<(), RefreshError>>;

struct Queue {
    state: RefreshState,
    /// Bumped for every refresh and every reset. A refresh only settles the
    /// queue, and only persists tokens, while its epoch is still current.
    epoch: u64,
    waiters: Vec<Waiter>,
}

struct Inner {
    queue: Mutex<Queue>,
    refresher: Arc<dyn Refresher>,
    tokens: Arc<dyn TokenStore>,
    on_logout: Option<LogoutCallback>,
}

/// Serializes token refreshes for one client.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        refresher: Arc<dyn Refresher>,
        tokens: Arc<dyn TokenStore>,
        on_logout: Option<LogoutCallback>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(Queue {
                    state: RefreshState::Idle,
                    epoch: 0,
                    waiters: Vec::new(),
                }),
                refresher,
                tokens,
                on_logout,
            }),
        }
    }

    /// Wait for a refresh, starting one if none is running.
    ///
    /// On failure the token store has already been cleared and the logout
    /// callback invoked by the time this returns.
    pub async fn refresh(&self) -> Result<(), RefreshError> {
        let (tx, rx) = oneshot::channel();

        let start = {
            let mut queue = self.inner.queue();
            queue.waiters.push(tx);
            match queue.state {
                RefreshState::Refreshing => {
                    debug!("Refresh in progress, queued ({} waiting)", queue.waiters.len());
                    None
                }
                RefreshState::Idle => {
                    queue.state = RefreshState::Refreshing;
                    queue.epoch += 1;
                    Some(queue.epoch)
                }
            }
        };

        if let Some(epoch) = start {
            tokio::spawn(Arc::clone(&self.inner).run(epoch));
        }

        rx.await.unwrap_or(Err(RefreshError::Abandoned))
    }

    pub fn state(&self) -> RefreshState {
        self.inner.queue().state
    }

    /// Forget the running refresh. Its waiters are released with
    /// [`RefreshError::Abandoned`] and its tokens are discarded.
    pub fn reset(&self) {
        let mut queue = self.inner.queue();
        queue.state = RefreshState::Idle;
        queue.epoch += 1;
        queue.waiters.clear();
    }
}

impl Inner {
    fn queue(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.queue().epoch == epoch
    }

    async fn run(self: Arc<Self>, epoch: u64) {
        // Waiters are released even if the refresher panics.
        let mut settle = Settle {
            inner: Arc::clone(&self),
            epoch,
            outcome: Err(RefreshError::Abandoned),
        };

        let outcome = self.perform(epoch).await;
        match &outcome {
            Ok(()) => info!("Access token refreshed"),
            Err(RefreshError::Abandoned) => debug!("Refresh superseded by a reset"),
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                if self.is_current(epoch) {
                    self.end_session();
                }
            }
        }

        settle.outcome = outcome;
    }

    async fn perform(&self, epoch: u64) -> Result<(), RefreshError> {
        let refresh_token = self
            .tokens
            .refresh_token()
            .filter(|t| !t.is_empty())
            .ok_or(RefreshError::NoRefreshToken)?;

        info!("Refreshing access token");
        let tokens = self.refresher.refresh(&refresh_token).await?;

        // A logout while the call was in flight must not bring the session back.
        if !self.is_current(epoch) {
            return Err(RefreshError::Abandoned);
        }

        self.tokens
            .set_access_token(tokens.access_token.as_str())
            .map_err(|e| RefreshError::Storage(e.to_string()))?;
        if let Some(rotated) = &tokens.refresh_token {
            self.tokens
                .set_refresh_token(rotated.as_str())
                .map_err(|e| RefreshError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    fn end_session(&self) {
        if let Err(e) = self.tokens.clear() {
            error!("Failed to clear tokens after refresh failure: {}", e);
        }
        if let Some(on_logout) = &self.on_logout {
            if catch_unwind(AssertUnwindSafe(|| on_logout())).is_err() {
                error!("Logout callback panicked");
            }
        }
    }
}

/// Releases the wait queue when a refresh task ends.
struct Settle {
    inner: Arc<Inner>,
    epoch: u64,
    outcome: Result<(), RefreshError>,
}

impl Drop for Settle {
    fn drop(&mut self) {
        let waiters = {
            let mut queue = self.inner.queue();
            if queue.epoch != self.epoch {
                return;
            }
            queue.state = RefreshState::Idle;
            std::mem::take(&mut queue.waiters)
        };

        for waiter in waiters {
            let _ = waiter.send(self.outcome.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTokenStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Scripted {
        calls: AtomicUsize,
        result: Result<RefreshedTokens, RefreshError>,
        delay: Duration,
    }

    impl Scripted {
        fn new(result: Result<RefreshedTokens, RefreshError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                result,
                delay: Duration::from_millis(20),
            })
        }
    }

    #[async_trait]
    impl Refresher for Scripted {
        async fn refresh(&self, _: &SecureString) -> Result<RefreshedTokens, RefreshError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.result.clone()
        }
    }

    fn fresh(access: &str, refresh: Option<&str>) -> RefreshedTokens {
        RefreshedTokens {
            access_token: SecureString::from(access),
            refresh_token: refresh.map(SecureString::from),
        }
    }

    fn seeded_store() -> Arc<MemoryTokenStore> {
        let store = Arc::new(MemoryTokenStore::new());
        store.set_access_token("A1").unwrap();
        store.set_refresh_token("R1").unwrap();
        store
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let refresher = Scripted::new(Ok(fresh("A2", Some("R2"))));
        let store = seeded_store();
        let coordinator = RefreshCoordinator::new(refresher.clone(), store.clone(), None);

        let results =
            futures_util::future::join_all((0..5).map(|_| coordinator.refresh())).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.access_token().unwrap().as_str(), "A2");
        assert_eq!(store.refresh_token().unwrap().as_str(), "R2");
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_are_released_in_arrival_order() {
        let coordinator =
            RefreshCoordinator::new(Scripted::new(Ok(fresh("A2", None))), seeded_store(), None);
        let (order_tx, mut order_rx) = tokio::sync::mpsc::unbounded_channel();

        let mut handles = Vec::new();
        for index in 0..5 {
            let coordinator = coordinator.clone();
            let order_tx = order_tx.clone();
            handles.push(tokio::spawn(async move {
                let result = coordinator.refresh().await;
                order_tx.send(index).unwrap();
                result
            }));
            // Let this caller join the queue before the next one arrives
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(coordinator.state(), RefreshState::Refreshing);

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(()));
        }
        drop(order_tx);

        let mut released = Vec::new();
        while let Some(index) = order_rx.recv().await {
            released.push(index);
        }
        assert_eq!(released, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token_when_not_rotated() {
        let store = seeded_store();
        let coordinator =
            RefreshCoordinator::new(Scripted::new(Ok(fresh("A2", None))), store.clone(), None);

        coordinator.refresh().await.unwrap();
        assert_eq!(store.access_token().unwrap().as_str(), "A2");
        assert_eq!(store.refresh_token().unwrap().as_str(), "R1");
    }

    #[tokio::test]
    async fn test_failure_clears_store_and_logs_out_once() {
        let store = seeded_store();
        let logouts = Arc::new(AtomicUsize::new(0));
        let counter = logouts.clone();
        let coordinator = RefreshCoordinator::new(
            Scripted::new(Err(RefreshError::Rejected(401))),
            store.clone(),
            Some(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );

        let results =
            futures_util::future::join_all((0..3).map(|_| coordinator.refresh())).await;

        for result in results {
            assert_eq!(result, Err(RefreshError::Rejected(401)));
        }
        assert!(!store.has_tokens());
        assert_eq!(logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_fails_without_calling_refresher() {
        let refresher = Scripted::new(Ok(fresh("A2", None)));
        let store = Arc::new(MemoryTokenStore::new());
        let coordinator = RefreshCoordinator::new(refresher.clone(), store, None);

        assert_eq!(coordinator.refresh().await, Err(RefreshError::NoRefreshToken));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panicking_logout_callback_is_contained() {
        let coordinator = RefreshCoordinator::new(
            Scripted::new(Err(RefreshError::MissingAccessToken)),
            seeded_store(),
            Some(Arc::new(|| panic!("ui gone"))),
        );

        assert_eq!(
            coordinator.refresh().await,
            Err(RefreshError::MissingAccessToken)
        );
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_reset_discards_in_flight_refresh() {
        let store = seeded_store();
        let coordinator =
            RefreshCoordinator::new(Scripted::new(Ok(fresh("A2", None))), store.clone(), None);

        let pending = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(coordinator.state(), RefreshState::Refreshing);

        coordinator.reset();
        store.clear().unwrap();

        assert_eq!(pending.await.unwrap(), Err(RefreshError::Abandoned));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.access_token().is_none());
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }
}
