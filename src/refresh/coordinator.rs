use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::credential::store::CredentialStore;
use crate::credential::token::Credential;
use crate::errors::RefreshError;
use crate::observability::metrics::get_metrics;
use crate::refresh::endpoint::RefreshEndpoint;

/// Shared result of one refresh, observed identically by every waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed(Credential),
    Failed,
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RefreshOutcome::Refreshed(_))
    }
}

type OutcomeReceiver = watch::Receiver<Option<RefreshOutcome>>;

enum RefreshState {
    Idle,
    /// Waiters subscribe by cloning the receiver; dropping a clone deregisters it.
    Refreshing(OutcomeReceiver),
}

struct Inner<E> {
    state: Mutex<RefreshState>,
    store: Arc<CredentialStore>,
    endpoint: E,
    timeout: Duration,
    refresh_calls: AtomicU64,
    joined_waiters: AtomicU64,
}

/// Collapses concurrent refresh demand into a single endpoint call.
///
/// The endpoint call runs on its own task: a caller that stops awaiting
/// `refresh()` never cancels the refresh for anyone else. Settlement mirrors
/// the outcome to the persisted slot first, then swaps the in-memory
/// credential, returns the state to `Idle` and publishes the outcome in one
/// critical section.
pub struct RefreshCoordinator<E: RefreshEndpoint> {
    inner: Arc<Inner<E>>,
}

impl<E: RefreshEndpoint> Clone for RefreshCoordinator<E> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<E: RefreshEndpoint> RefreshCoordinator<E> {
    pub fn new(store: Arc<CredentialStore>, endpoint: E, refresh_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(RefreshState::Idle),
                store,
                endpoint,
                timeout: refresh_timeout,
                refresh_calls: AtomicU64::new(0),
                joined_waiters: AtomicU64::new(0),
            }),
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.inner.store
    }

    /// Renew the credential, or join the renewal already in flight.
    ///
    /// Must be called from within a tokio runtime. Never fails: a refresh
    /// that could not produce a credential resolves to `RefreshOutcome::Failed`.
    pub async fn refresh(&self) -> RefreshOutcome {
        let mut receiver = self.subscribe();
        let outcome = match receiver.wait_for(Option::is_some).await {
            Ok(settled) => (*settled).clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| {
            warn!("refresh settled without publishing an outcome");
            RefreshOutcome::Failed
        })
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.inner.lock_state(), RefreshState::Refreshing(_))
    }

    /// Number of endpoint calls issued, i.e. `Idle -> Refreshing` transitions.
    pub fn refresh_calls(&self) -> u64 {
        self.inner.refresh_calls.load(Ordering::SeqCst)
    }

    /// Number of `refresh()` calls that joined an in-flight refresh.
    pub fn joined_waiters(&self) -> u64 {
        self.inner.joined_waiters.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> OutcomeReceiver {
        let mut state = self.inner.lock_state();
        if let RefreshState::Refreshing(receiver) = &*state {
            debug!("refresh in flight, joining as waiter");
            self.inner.joined_waiters.fetch_add(1, Ordering::SeqCst);
            get_metrics().refresh_waiters.inc();
            return receiver.clone();
        }

        let (sender, receiver) = watch::channel(None);
        *state = RefreshState::Refreshing(receiver.clone());
        let call_number = self.inner.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let metrics = get_metrics();
        metrics.refresh_calls.inc();
        metrics.refreshing.set(1);
        info!(call_number, "credential refresh started");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let result = Inner::call_endpoint(Arc::clone(&inner)).await;
            inner.settle(result, sender).await;
        });

        receiver
    }
}

impl<E: RefreshEndpoint> Inner<E> {
    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn call_endpoint(inner: Arc<Self>) -> Result<String, RefreshError> {
        let refresh_timeout = inner.timeout;
        // a panicking endpoint must still settle the waiters
        let joined = tokio::spawn(async move { timeout(refresh_timeout, inner.endpoint.refresh()).await }).await;
        match joined {
            Ok(Ok(result)) => result,
            Ok(Err(_elapsed)) => Err(RefreshError::Timeout(refresh_timeout.as_millis() as u64)),
            Err(_join_error) => Err(RefreshError::Abandoned),
        }
    }

    async fn settle(&self, result: Result<String, RefreshError>, sender: watch::Sender<Option<RefreshOutcome>>) {
        let metrics = get_metrics();

        let outcome = match result {
            Ok(raw_value) => {
                let credential = Credential::parse(raw_value);
                info!(expires_at = ?credential.expires_at, "credential refresh succeeded");
                RefreshOutcome::Refreshed(credential)
            }
            Err(err) => {
                metrics.refresh_failures.with_label_values(&[err.reason()]).inc();
                warn!("credential refresh failed, credential cleared: {}", err);
                RefreshOutcome::Failed
            }
        };
        let next = match &outcome {
            RefreshOutcome::Refreshed(credential) => Some(credential.clone()),
            RefreshOutcome::Failed => None,
        };

        // slot I/O runs before the state lock is taken
        let store = Arc::clone(&self.store);
        let to_persist = next.clone();
        if let Err(err) = tokio::task::spawn_blocking(move || store.persist(to_persist.as_ref())).await {
            warn!("persisting refreshed credential did not complete: {}", err);
        }

        let mut state = self.lock_state();
        self.store.replace(next);
        *state = RefreshState::Idle;
        metrics.refreshing.set(0);
        sender.send_replace(Some(outcome));
    }
}
