//! Optimistic mutations with rollback.
//!
//! An [`OptimisticEngine`] owns one piece of client state. Each call to
//! [`OptimisticEngine::mutate`] walks the same state machine:
//!
//! ```text
//! Idle ──mutate()──→ Optimistic ──Ok──→ Settled-Success (data = server value)
//!                        │
//!                        └─────Err──→ Settled-Error   (data = rollback snapshot)
//! ```
//!
//! The rollback snapshot lives in a single slot per engine. Overlapping
//! mutations share it: the second call snapshots the data with the first
//! call's patch applied, and whichever call fails restores the slot as it
//! stands at that moment. Callers that need independent rollbacks must not
//! overlap mutations on one engine.

mod list;
mod state;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::OptimisticConfig;
use crate::error::{BoxError, SyncError};
use crate::lifecycle::LivenessToken;

pub use list::{Identified, OptimisticList};
pub use state::{MutationState, OptimisticState, Patch};

type SuccessHook<T> = Arc<dyn Fn(Option<&T>) + Send + Sync>;
type ErrorHook<T> = Arc<dyn Fn(&SyncError, Option<&T>) + Send + Sync>;
type SettledHook = Arc<dyn Fn() + Send + Sync>;

struct Hooks<T> {
    on_success: Option<SuccessHook<T>>,
    on_error: Option<ErrorHook<T>>,
    on_settled: Option<SettledHook>,
}

impl<T> Default for Hooks<T> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
            on_settled: None,
        }
    }
}

/// Builder for [`OptimisticEngine`].
pub struct OptimisticEngineBuilder<T> {
    initial: Option<T>,
    optimistic_delay: Duration,
    hooks: Hooks<T>,
}

impl<T> OptimisticEngineBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            initial: None,
            optimistic_delay: OptimisticConfig::default().optimistic_delay(),
            hooks: Hooks::default(),
        }
    }

    pub fn initial(mut self, data: T) -> Self {
        self.initial = Some(data);
        self
    }

    pub fn with_config(mut self, config: &OptimisticConfig) -> Self {
        self.optimistic_delay = config.optimistic_delay();
        self
    }

    /// Hold the optimistic patch back for `delay`. Mutations that settle
    /// sooner never show the patch.
    pub fn optimistic_delay(mut self, delay: Duration) -> Self {
        self.optimistic_delay = delay;
        self
    }

    /// Called with the new data after a successful mutation.
    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(Option<&T>) + Send + Sync + 'static,
    {
        self.hooks.on_success = Some(Arc::new(hook));
        self
    }

    /// Called with the error and the restored data after a failed mutation.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SyncError, Option<&T>) + Send + Sync + 'static,
    {
        self.hooks.on_error = Some(Arc::new(hook));
        self
    }

    /// Called after every settled mutation, after `on_success`/`on_error`.
    pub fn on_settled<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.on_settled = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> OptimisticEngine<T> {
        let (state, _) = watch::channel(OptimisticState::new(self.initial));
        OptimisticEngine {
            id: Uuid::new_v4(),
            state,
            rollback: Mutex::new(None),
            optimistic_delay: self.optimistic_delay,
            hooks: self.hooks,
            alive: LivenessToken::new(),
        }
    }
}

impl<T> Default for OptimisticEngineBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Client state plus the optimistic mutation state machine.
///
/// Share it across tasks with an `Arc`. Dropping the engine disposes it.
pub struct OptimisticEngine<T> {
    id: Uuid,
    state: watch::Sender<OptimisticState<T>>,
    rollback: Mutex<Option<T>>,
    optimistic_delay: Duration,
    hooks: Hooks<T>,
    alive: LivenessToken,
}

impl<T> OptimisticEngine<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn builder() -> OptimisticEngineBuilder<T> {
        OptimisticEngineBuilder::new()
    }

    /// Engine with default options seeded with `initial`.
    pub fn new(initial: Option<T>) -> Self {
        let builder = OptimisticEngineBuilder::new();
        match initial {
            Some(data) => builder.initial(data).build(),
            None => builder.build(),
        }
    }

    pub fn state(&self) -> OptimisticState<T> {
        self.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.state.borrow().data.clone()
    }

    pub fn mutation(&self) -> MutationState {
        self.state.borrow().mutation.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OptimisticState<T>> {
        self.state.subscribe()
    }

    /// Replace the data without a mutation, e.g. with a fresh poller snapshot.
    pub fn set_data(&self, data: Option<T>) {
        self.commit(|state| state.data = data);
    }

    /// Clear a settled error.
    pub fn reset(&self) {
        self.commit(|state| state.mutation = MutationState::default());
    }

    /// Apply `patch`, run `mutate_fn`, then keep its result or roll back.
    ///
    /// Returns the resolved value, or `None` when `mutate_fn` failed. The
    /// failure itself is recorded in [`MutationState::error`].
    pub async fn mutate<P, E, F, Fut>(&self, params: P, patch: Patch<T>, mutate_fn: F) -> Option<T>
    where
        F: FnOnce(P) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        self.mutate_reconciled(params, patch, mutate_fn, |_, resolved: &T| Some(resolved.clone()))
            .await
    }

    /// General form of [`mutate`](Self::mutate).
    ///
    /// `mutate_fn` may resolve with any `R`; on success `reconcile` receives
    /// the data as it stands at settle time and the resolved value and
    /// returns the authoritative data.
    pub async fn mutate_reconciled<P, R, E, F, Fut, C>(
        &self,
        params: P,
        patch: Patch<T>,
        mutate_fn: F,
        reconcile: C,
    ) -> Option<R>
    where
        F: FnOnce(P) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: Into<BoxError>,
        C: FnOnce(Option<T>, &R) -> Option<T>,
    {
        if !self.alive.is_alive() {
            return None;
        }

        let snapshot = self.state.borrow().data.clone();
        *self.rollback.lock() = snapshot;
        self.commit(|state| state.mutation = MutationState::pending());
        tracing::debug!(engine = %self.id, ?patch, "Mutation started");

        let outcome = if self.optimistic_delay.is_zero() {
            self.apply_patch(patch);
            mutate_fn(params).await
        } else {
            let pending = mutate_fn(params);
            tokio::pin!(pending);
            tokio::select! {
                biased;
                outcome = &mut pending => outcome,
                _ = tokio::time::sleep(self.optimistic_delay) => {
                    self.apply_patch(patch);
                    pending.as_mut().await
                }
            }
        };

        match outcome {
            Ok(resolved) => {
                let mut settled = None;
                let committed = self.commit(|state| {
                    state.data = reconcile(state.data.take(), &resolved);
                    state.mutation = MutationState::default();
                    settled = state.data.clone();
                });
                if committed {
                    tracing::debug!(engine = %self.id, "Mutation succeeded");
                    if let Some(hook) = &self.hooks.on_success {
                        hook(settled.as_ref());
                    }
                    self.settled();
                }
                Some(resolved)
            }
            Err(err) => {
                let err = SyncError::mutation(err);
                tracing::warn!(engine = %self.id, error = %err, "Mutation failed, rolling back");
                let rollback = self.rollback.lock().clone();
                let restored = rollback.clone();
                let recorded = err.clone();
                let committed = self.commit(|state| {
                    state.data = restored;
                    state.mutation = MutationState::failed(recorded);
                });
                if committed {
                    if let Some(hook) = &self.hooks.on_error {
                        hook(&err, rollback.as_ref());
                    }
                    self.settled();
                }
                None
            }
        }
    }

    fn apply_patch(&self, patch: Patch<T>) {
        self.commit(|state| state.data = patch.apply(state.data.take()));
    }

    fn settled(&self) {
        if let Some(hook) = &self.hooks.on_settled {
            hook();
        }
    }
}

impl<T> OptimisticEngine<T> {
    fn commit(&self, apply: impl FnOnce(&mut OptimisticState<T>)) -> bool {
        if !self.alive.is_alive() {
            tracing::trace!(engine = %self.id, "Discarding change on disposed engine");
            return false;
        }
        self.state.send_modify(apply);
        true
    }

    /// Stop committing. Mutations in flight finish without touching state
    /// or calling hooks.
    pub fn dispose(&self) {
        if self.alive.cancel() {
            tracing::debug!(engine = %self.id, "Optimistic engine disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        !self.alive.is_alive()
    }
}

impl<T> Drop for OptimisticEngine<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn success_replaces_with_server_value() {
        let engine = OptimisticEngine::new(Some(1));
        let result = engine
            .mutate(5, Patch::from(5), |n| async move { Ok::<_, String>(n * 10) })
            .await;

        assert_eq!(result, Some(50));
        assert_eq!(engine.data(), Some(50));
        assert!(engine.mutation().is_idle());
        assert!(!engine.mutation().is_error);
    }

    #[tokio::test]
    async fn failure_restores_snapshot() {
        let engine = OptimisticEngine::new(Some(vec!["gw-01".to_string()]));
        let result = engine
            .mutate(
                (),
                Patch::Replace(Some(vec![])),
                |()| async { Err::<Vec<String>, _>("firmware server down") },
            )
            .await;

        assert_eq!(result, None);
        assert_eq!(engine.data(), Some(vec!["gw-01".to_string()]));
        let mutation = engine.mutation();
        assert!(mutation.is_error);
        assert!(!mutation.is_pending);
        assert_eq!(
            mutation.error.map(|e| e.cause().to_string()).as_deref(),
            Some("firmware server down")
        );
    }

    #[tokio::test]
    async fn hooks_fire_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (ok_calls, err_calls, settled_calls) =
            (Arc::clone(&calls), Arc::clone(&calls), Arc::clone(&calls));

        let engine = OptimisticEngine::builder()
            .initial(1u32)
            .on_success(move |data| ok_calls.lock().push(format!("success {:?}", data)))
            .on_error(move |_, rollback| err_calls.lock().push(format!("error {:?}", rollback)))
            .on_settled(move || settled_calls.lock().push("settled".to_string()))
            .build();

        engine
            .mutate((), Patch::from(2), |()| async { Ok::<_, String>(3) })
            .await;
        engine
            .mutate((), Patch::from(4), |()| async { Err::<u32, _>("nope") })
            .await;

        assert_eq!(
            *calls.lock(),
            vec![
                "success Some(3)".to_string(),
                "settled".to_string(),
                "error Some(3)".to_string(),
                "settled".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn disposed_engine_ignores_mutations() {
        let invoked = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&invoked);
        let engine = OptimisticEngine::new(Some(1));
        engine.dispose();

        let result = engine
            .mutate((), Patch::from(2), move |()| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, String>(3) }
            })
            .await;

        assert_eq!(result, None);
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert_eq!(engine.data(), Some(1));
    }

    #[tokio::test]
    async fn reset_clears_error() {
        let engine = OptimisticEngine::new(Some(1));
        engine
            .mutate((), Patch::from(2), |()| async { Err::<i32, _>("boom") })
            .await;
        assert!(engine.mutation().is_error);

        engine.reset();
        assert!(!engine.mutation().is_error);
        assert!(engine.mutation().error.is_none());
    }
}
