//! Trailing-edge debounce with a stable handle.
//!
//! A [`Debouncer`] owns the pending timer and the latest callback. Calling
//! [`Debouncer::wrap`] again with a fresh closure updates the callback but
//! returns the same [`Debounced`] handle, so callers can rebuild closures
//! freely without resetting the coalescing. Only a new delay produces a new
//! handle.
//!
//! ```text
//! call(a) ─┐
//! call(b) ─┼─ restart timer ── delay ──→ callback(c)
//! call(c) ─┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::DebounceConfig;
use crate::lifecycle::LivenessToken;

type Callback<A> = Arc<dyn Fn(A) + Send + Sync>;

struct DebounceState<A> {
    id: Uuid,
    callback: RwLock<Option<Callback<A>>>,
    pending: Mutex<Option<JoinHandle<()>>>,
    /// Bumped on every call and cancel; a timer fires only if it still
    /// holds the latest generation.
    generation: AtomicU64,
    alive: LivenessToken,
}

impl<A> DebounceState<A> {
    fn cancel_pending(&self) -> bool {
        self.generation.fetch_add(1, Ordering::SeqCst);
        match self.pending.lock().take() {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }
}

/// Owner of one debounced callback slot.
///
/// Dropping the debouncer cancels the pending invocation; handles that
/// outlive it become no-ops.
pub struct Debouncer<A> {
    state: Arc<DebounceState<A>>,
    current: Option<Debounced<A>>,
    default_delay: Duration,
}

impl<A> Debouncer<A>
where
    A: Send + 'static,
{
    pub fn new() -> Self {
        Self::with_config(&DebounceConfig::default())
    }

    pub fn with_config(config: &DebounceConfig) -> Self {
        Self {
            state: Arc::new(DebounceState {
                id: Uuid::new_v4(),
                callback: RwLock::new(None),
                pending: Mutex::new(None),
                generation: AtomicU64::new(0),
                alive: LivenessToken::new(),
            }),
            current: None,
            default_delay: config.delay(),
        }
    }

    /// Install `callback` as the latest callback and return the handle for `delay`.
    ///
    /// The handle is reused while `delay` is unchanged. A pending invocation
    /// survives a delay change and runs the latest callback.
    pub fn wrap<F>(&mut self, callback: F, delay: Duration) -> Debounced<A>
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        *self.state.callback.write() = Some(Arc::new(callback));

        match &self.current {
            Some(handle) if handle.delay() == delay => handle.clone(),
            _ => {
                tracing::trace!(debouncer = %self.state.id, delay_ms = delay.as_millis() as u64, "New debounced handle");
                let handle = Debounced {
                    inner: Arc::new(DebouncedInner {
                        state: Arc::clone(&self.state),
                        delay,
                    }),
                };
                self.current = Some(handle.clone());
                handle
            }
        }
    }

    /// [`wrap`](Self::wrap) with the configured default delay.
    pub fn wrap_default<F>(&mut self, callback: F) -> Debounced<A>
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        let delay = self.default_delay;
        self.wrap(callback, delay)
    }
}

impl<A> Debouncer<A> {
    /// Drop the pending invocation, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        self.state.cancel_pending()
    }

    pub fn is_pending(&self) -> bool {
        self.state
            .pending
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<A> Default for Debouncer<A>
where
    A: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Drop for Debouncer<A> {
    fn drop(&mut self) {
        self.state.alive.cancel();
        if self.state.cancel_pending() {
            tracing::trace!(debouncer = %self.state.id, "Pending call cancelled on drop");
        }
    }
}

struct DebouncedInner<A> {
    state: Arc<DebounceState<A>>,
    delay: Duration,
}

/// Stable debounced callback. Clones compare equal with [`Debounced::ptr_eq`].
pub struct Debounced<A> {
    inner: Arc<DebouncedInner<A>>,
}

impl<A> Clone for Debounced<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> Debounced<A>
where
    A: Send + 'static,
{
    /// Schedule the latest callback with `args` after the delay, replacing
    /// any pending invocation.
    ///
    /// Never runs the callback synchronously, even with a zero delay.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn call(&self, args: A) {
        let state = &self.inner.state;
        if !state.alive.is_alive() {
            return;
        }

        let mut pending = state.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        let generation = state.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.inner.delay;
        let task_state = Arc::clone(state);

        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !task_state.alive.is_alive()
                || task_state.generation.load(Ordering::SeqCst) != generation
            {
                return;
            }
            let callback = task_state.callback.read().clone();
            if let Some(callback) = callback {
                callback(args);
            }
        }));
    }
}

impl<A> Debounced<A> {
    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// True when both handles are the same debounced function.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}
