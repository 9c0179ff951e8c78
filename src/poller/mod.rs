//! Stale-while-revalidate polling subscription.
//!
//! A [`Poller`] owns one logical subscription: a fetch function, a refresh
//! interval, an enabled switch, a dependency key, and optional window-focus
//! awareness. It publishes a [`FetchState`] snapshot after every change.
//!
//! # Lifecycle
//!
//! ```text
//! spawn ──→ [initial fetch] ──→ timer / focus / refetch() ──→ revalidate ...
//!   │                                                            │
//!   └── set_dependencies(new key): cancel lifecycle, start fresh ┘
//!
//! dispose / drop: cancel lifecycle, stop timer and focus listener
//! ```
//!
//! Fetches are not sequenced. Two fetches in flight at once resolve in any
//! order and the last one to finish wins `data`. Fetches that finish after
//! their lifecycle was cancelled are discarded.

mod driver;
mod focus;
mod state;

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::PollerConfig;
use crate::error::{BoxError, SyncError};
use crate::lifecycle::LivenessToken;

pub use focus::FocusSignal;
pub use state::FetchState;

/// How often staleness is recomputed.
pub const STALE_TICK: Duration = Duration::from_secs(1);

/// Boxed future returned by a type-erased fetch function.
pub type FetchFuture<T> = Pin<Box<dyn Future<Output = Result<T, BoxError>> + Send>>;

type FetchFn<T> = Arc<dyn Fn() -> FetchFuture<T> + Send + Sync>;

/// Identity of a subscription's dependency list.
///
/// Built from any hashable value. A poller restarts when its key changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DependencyKey(u64);

impl DependencyKey {
    pub fn of<H: Hash + ?Sized>(value: &H) -> Self {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        DependencyKey(hasher.finish())
    }
}

#[derive(Debug, Clone)]
struct PollerOptions {
    interval: Duration,
    fetch_on_mount: bool,
    keep_previous_data: bool,
    refetch_on_focus: bool,
    pause_on_blur: bool,
}

impl From<&PollerConfig> for PollerOptions {
    fn from(config: &PollerConfig) -> Self {
        Self {
            interval: config.interval(),
            fetch_on_mount: config.fetch_on_mount,
            keep_previous_data: config.keep_previous_data,
            refetch_on_focus: config.refetch_on_focus,
            pause_on_blur: config.pause_on_blur,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    Initial,
    Revalidate,
}

impl FetchKind {
    fn set_flag<T>(self, state: &mut FetchState<T>, value: bool) {
        match self {
            FetchKind::Initial => state.is_loading = value,
            FetchKind::Revalidate => state.is_revalidating = value,
        }
    }
}

fn erase<T, F, Fut, E>(fetch_fn: F) -> FetchFn<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<BoxError>,
    T: 'static,
{
    Arc::new(move || {
        let fut = fetch_fn();
        Box::pin(async move { fut.await.map_err(Into::into) }) as FetchFuture<T>
    })
}

/// Builder for [`Poller`]. Defaults follow [`PollerConfig::default`].
pub struct PollerBuilder<T> {
    fetcher: FetchFn<T>,
    options: PollerOptions,
    enabled: bool,
    dependencies: DependencyKey,
    focus: Option<FocusSignal>,
}

impl<T> PollerBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut, E>(fetch_fn: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let config = PollerConfig::default();
        Self {
            fetcher: erase(fetch_fn),
            options: PollerOptions::from(&config),
            enabled: config.enabled,
            dependencies: DependencyKey::default(),
            focus: None,
        }
    }

    /// Take every option from a config section.
    pub fn with_config(mut self, config: &PollerConfig) -> Self {
        self.options = PollerOptions::from(config);
        self.enabled = config.enabled;
        self
    }

    /// Refresh period. `Duration::ZERO` disables the timer.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.options.interval = interval;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn fetch_on_mount(mut self, fetch_on_mount: bool) -> Self {
        self.options.fetch_on_mount = fetch_on_mount;
        self
    }

    pub fn keep_previous_data(mut self, keep: bool) -> Self {
        self.options.keep_previous_data = keep;
        self
    }

    pub fn refetch_on_focus(mut self, refetch: bool) -> Self {
        self.options.refetch_on_focus = refetch;
        self
    }

    pub fn pause_on_blur(mut self, pause: bool) -> Self {
        self.options.pause_on_blur = pause;
        self
    }

    pub fn dependencies(mut self, key: DependencyKey) -> Self {
        self.dependencies = key;
        self
    }

    /// Listen to a host-driven focus signal.
    pub fn focus(mut self, signal: &FocusSignal) -> Self {
        self.focus = Some(signal.clone());
        self
    }

    /// Start the subscription on the current tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn spawn(self) -> Poller<T> {
        let initial_loading = self.enabled && self.options.fetch_on_mount;
        let (state, _) = watch::channel(FetchState::new(initial_loading));
        let (enabled, _) = watch::channel(self.enabled);
        let focus = match &self.focus {
            Some(signal) => signal.listen(),
            None => FocusSignal::always_focused(),
        };

        let shared = Arc::new(Shared {
            id: Uuid::new_v4(),
            options: self.options,
            fetcher: RwLock::new(self.fetcher),
            state,
            enabled,
            focus,
        });

        tracing::debug!(
            poller = %shared.id,
            interval_ms = shared.options.interval.as_millis() as u64,
            enabled = self.enabled,
            "Poller started"
        );

        let lifecycle = Lifecycle::start(&shared, self.dependencies);
        Poller {
            shared,
            lifecycle: Mutex::new(lifecycle),
        }
    }
}

pub(crate) struct Shared<T> {
    id: Uuid,
    options: PollerOptions,
    fetcher: RwLock<FetchFn<T>>,
    state: watch::Sender<FetchState<T>>,
    enabled: watch::Sender<bool>,
    focus: watch::Receiver<bool>,
}

impl<T> Shared<T> {
    /// Apply a state change if the lifecycle is still alive.
    fn commit(&self, token: &LivenessToken, apply: impl FnOnce(&mut FetchState<T>)) -> bool {
        if !token.is_alive() {
            tracing::trace!(poller = %self.id, "Discarding result of cancelled lifecycle");
            return false;
        }
        self.state.send_modify(apply);
        true
    }

    /// Like [`commit`](Self::commit), but only notifies subscribers when
    /// `apply` reports a change.
    fn commit_if(&self, token: &LivenessToken, apply: impl FnOnce(&mut FetchState<T>) -> bool) {
        if token.is_alive() {
            self.state.send_if_modified(apply);
        }
    }
}

/// One fetch attempt. The kind's in-flight flag is cleared on every exit
/// path, including when the future is dropped mid-flight.
async fn run_fetch<T>(shared: Arc<Shared<T>>, token: LivenessToken, kind: FetchKind)
where
    T: Clone + Send + Sync + 'static,
{
    if !shared.commit(&token, |state| kind.set_flag(state, true)) {
        return;
    }
    let _clear_flag = scopeguard::guard((), |()| {
        shared.commit(&token, |state| kind.set_flag(state, false));
    });

    let fetcher = Arc::clone(&shared.fetcher.read());
    match fetcher().await {
        Ok(data) => {
            tracing::trace!(poller = %shared.id, ?kind, "Fetch succeeded");
            shared.commit(&token, |state| state.apply_success(data));
        }
        Err(err) => {
            let err = SyncError::fetch(err);
            tracing::warn!(poller = %shared.id, ?kind, error = %err, "Fetch failed");
            let keep = shared.options.keep_previous_data;
            shared.commit(&token, |state| state.apply_failure(err, keep));
        }
    }
}

/// Timer, focus listener and liveness token of one dependency generation.
struct Lifecycle {
    token: LivenessToken,
    driver: Option<JoinHandle<()>>,
    dependencies: DependencyKey,
    /// The initial fetch was due while disabled and has not run yet.
    mount_pending: bool,
    disposed: bool,
}

impl Lifecycle {
    fn start<T>(shared: &Arc<Shared<T>>, dependencies: DependencyKey) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        let token = LivenessToken::new();
        let enabled = *shared.enabled.borrow();
        let mount_fetch = enabled && shared.options.fetch_on_mount;

        // Flags of the previous generation can no longer be cleared by its
        // own fetches, so reset them here.
        shared.commit(&token, |state| {
            state.is_loading = mount_fetch;
            state.is_revalidating = false;
        });

        if mount_fetch {
            tokio::spawn(run_fetch(Arc::clone(shared), token.clone(), FetchKind::Initial));
        }
        let driver = tokio::spawn(driver::drive(Arc::clone(shared), token.clone()));

        Self {
            token,
            driver: Some(driver),
            dependencies,
            mount_pending: shared.options.fetch_on_mount && !enabled,
            disposed: false,
        }
    }

    /// Run the initial fetch that was skipped because the poller was disabled.
    fn resume_mount<T>(&mut self, shared: &Arc<Shared<T>>)
    where
        T: Clone + Send + Sync + 'static,
    {
        if self.disposed || !self.mount_pending {
            return;
        }
        self.mount_pending = false;
        shared.commit(&self.token, |state| state.is_loading = true);
        tokio::spawn(run_fetch(
            Arc::clone(shared),
            self.token.clone(),
            FetchKind::Initial,
        ));
    }

    fn stop(&mut self) {
        self.token.cancel();
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

/// Handle to a running subscription. Dropping it disposes the subscription.
pub struct Poller<T> {
    shared: Arc<Shared<T>>,
    lifecycle: Mutex<Lifecycle>,
}

impl<T> Poller<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn builder<F, Fut, E>(fetch_fn: F) -> PollerBuilder<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        PollerBuilder::new(fetch_fn)
    }

    /// Latest snapshot.
    pub fn state(&self) -> FetchState<T> {
        self.shared.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.shared.state.borrow().data.clone()
    }

    /// Receiver notified after every committed change.
    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.shared.state.subscribe()
    }

    /// Run one revalidation now.
    ///
    /// Does not wait for or cancel timer-driven fetches already in flight.
    /// Does nothing once the poller is disposed.
    pub async fn refetch(&self) {
        let token = self.lifecycle.lock().token.clone();
        run_fetch(Arc::clone(&self.shared), token, FetchKind::Revalidate).await;
    }

    pub fn is_enabled(&self) -> bool {
        *self.shared.enabled.borrow()
    }

    /// Suspend or resume the timer and the focus refetch.
    ///
    /// Re-enabling runs the initial fetch if the current dependencies have
    /// not been fetched yet because the poller was disabled. Otherwise it
    /// does not fetch by itself; the next fetch happens one interval later
    /// or on the next focus.
    pub fn set_enabled(&self, enabled: bool) {
        let mut lifecycle = self.lifecycle.lock();
        let changed = self.shared.enabled.send_if_modified(|current| {
            if *current == enabled {
                return false;
            }
            *current = enabled;
            true
        });
        if !changed {
            return;
        }
        tracing::debug!(poller = %self.shared.id, enabled, "Poller enablement changed");
        if enabled {
            lifecycle.resume_mount(&self.shared);
        }
    }

    pub fn dependencies(&self) -> DependencyKey {
        self.lifecycle.lock().dependencies
    }

    /// Restart the subscription if `key` differs from the current key.
    ///
    /// The old lifecycle is cancelled (its in-flight results are discarded)
    /// and a new one starts with a fresh initial fetch. Returns whether a
    /// restart happened.
    pub fn set_dependencies(&self, key: DependencyKey) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.disposed || lifecycle.dependencies == key {
            return false;
        }
        lifecycle.stop();
        *lifecycle = Lifecycle::start(&self.shared, key);
        tracing::debug!(poller = %self.shared.id, "Dependencies changed, subscription restarted");
        true
    }

    /// Swap the fetch function without restarting.
    ///
    /// Later fetches call the new function; fetches in flight are unaffected.
    pub fn set_fetcher<F, Fut, E>(&self, fetch_fn: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        *self.shared.fetcher.write() = erase(fetch_fn);
    }
}

impl<T> Poller<T> {
    /// Stop the timer and focus listener and discard any result still in flight.
    pub fn dispose(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.disposed {
            return;
        }
        lifecycle.disposed = true;
        lifecycle.stop();
        tracing::debug!(poller = %self.shared.id, "Poller disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.lifecycle.lock().disposed
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}
