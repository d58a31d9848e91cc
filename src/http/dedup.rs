//! In-flight request registry used to share one network call between identical requests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::HttpError;

/// Settled result of one execution, decoded to JSON but not yet to the caller's type.
pub(crate) type Outcome = Result<Value, HttpError>;

/// Handle every caller sharing a fingerprint awaits.
pub(crate) type InFlight = Shared<BoxFuture<'static, Outcome>>;

struct Entry {
    id: u64,
    future: InFlight,
}

/// Fingerprint → in-flight execution.
#[derive(Default)]
pub(crate) struct PendingRegistry {
    entries: Mutex<HashMap<String, Entry>>,
    next_id: AtomicU64,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join the execution registered under `key`, or start a new one.
    ///
    /// With `force` an existing entry is replaced rather than joined. A started
    /// execution runs on its own task, so it settles and leaves the registry even
    /// if every caller stops waiting.
    pub fn join_or_start<F, Fut>(self: &Arc<Self>, key: String, force: bool, start: F) -> (InFlight, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<Outcome>();
        let future = async move {
            rx.await.unwrap_or_else(|_| {
                Err(HttpError::Aborted(
                    "request task ended without a result".to_string(),
                ))
            })
        }
        .boxed()
        .shared();

        let id = {
            let mut entries = self.entries();
            if !force {
                if let Some(existing) = entries.get(&key) {
                    return (existing.future.clone(), true);
                }
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            entries.insert(
                key.clone(),
                Entry {
                    id,
                    future: future.clone(),
                },
            );
            id
        };

        // The entry is registered before the task exists, so removal always follows insertion.
        let release = Release {
            registry: Arc::clone(self),
            key,
            id,
        };
        let work = start();
        tokio::spawn(async move {
            let outcome = work.await;
            drop(release);
            let _ = tx.send(outcome);
        });

        (future, false)
    }

    fn release(&self, key: &str, id: u64) {
        let mut entries = self.entries();
        // A forced request may have replaced this entry; leave the newer one alone.
        if entries.get(key).is_some_and(|entry| entry.id == id) {
            entries.remove(key);
        }
    }

    /// Number of executions currently registered.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Forget every entry. Running executions still settle for their callers.
    pub fn clear(&self) {
        self.entries().clear();
    }
}

/// Removes a registry entry when the execution ends, including on panic.
struct Release {
    registry: Arc<PendingRegistry>,
    key: String,
    id: u64,
}

impl Drop for Release {
    fn drop(&mut self) {
        self.registry.release(&self.key, self.id);
    }
}
