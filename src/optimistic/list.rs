//! Optimistic add/update/remove over an ordered collection keyed by id.

use std::fmt;
use std::future::Future;

use tokio::sync::watch;

use super::{MutationState, OptimisticEngine, OptimisticState, Patch};
use crate::error::BoxError;

/// An item with a stable identity.
pub trait Identified {
    type Id: PartialEq + Clone + fmt::Debug + Send + Sync + 'static;

    fn id(&self) -> Self::Id;
}

/// List-shaped [`OptimisticEngine`].
///
/// Every helper routes through the engine's state machine, so the rollback
/// rules are the same for all three.
pub struct OptimisticList<T> {
    engine: OptimisticEngine<Vec<T>>,
}

impl<T> OptimisticList<T>
where
    T: Identified + Clone + Send + Sync + 'static,
{
    pub fn new(items: Vec<T>) -> Self {
        Self::from_engine(OptimisticEngine::new(Some(items)))
    }

    /// Wrap an engine configured with hooks or a delay.
    pub fn from_engine(engine: OptimisticEngine<Vec<T>>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &OptimisticEngine<Vec<T>> {
        &self.engine
    }

    /// Current items; empty when the engine holds no data.
    pub fn items(&self) -> Vec<T> {
        self.engine.data().unwrap_or_default()
    }

    pub fn state(&self) -> OptimisticState<Vec<T>> {
        self.engine.state()
    }

    pub fn mutation(&self) -> MutationState {
        self.engine.mutation()
    }

    pub fn subscribe(&self) -> watch::Receiver<OptimisticState<Vec<T>>> {
        self.engine.subscribe()
    }

    pub fn set_items(&self, items: Vec<T>) {
        self.engine.set_data(Some(items));
    }

    /// Append `temp` now, then swap it for the item the server created.
    ///
    /// `temp` carries a placeholder id; the server item replaces the entry
    /// with that id, or is appended if the entry is gone.
    pub async fn optimistic_add<E, F, Fut>(&self, temp: T, mutate_fn: F) -> Option<T>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        let temp_id = temp.id();
        let appended = temp.clone();
        let patch = Patch::update(move |items: Option<Vec<T>>| {
            let mut items = items.unwrap_or_default();
            items.push(appended);
            Some(items)
        });

        self.engine
            .mutate_reconciled(temp, patch, mutate_fn, move |items, created: &T| {
                let mut items = items.unwrap_or_default();
                match items.iter().position(|item| item.id() == temp_id) {
                    Some(index) => items[index] = created.clone(),
                    None => items.push(created.clone()),
                }
                Some(items)
            })
            .await
    }

    /// Apply `edit` to the entry with `id` now, then replace it with the
    /// server's copy.
    pub async fn optimistic_update<U, E, F, Fut>(
        &self,
        id: T::Id,
        edit: U,
        mutate_fn: F,
    ) -> Option<T>
    where
        U: FnOnce(&mut T) + Send + 'static,
        F: FnOnce(T::Id) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        let patch_id = id.clone();
        let settle_id = id.clone();
        let patch = Patch::update(move |items: Option<Vec<T>>| {
            let mut items = items.unwrap_or_default();
            if let Some(item) = items.iter_mut().find(|item| item.id() == patch_id) {
                edit(item);
            }
            Some(items)
        });

        self.engine
            .mutate_reconciled(id, patch, mutate_fn, move |items, updated: &T| {
                let mut items = items.unwrap_or_default();
                if let Some(item) = items.iter_mut().find(|item| item.id() == settle_id) {
                    *item = updated.clone();
                }
                Some(items)
            })
            .await
    }

    /// Filter the entry with `id` out now. Returns whether the server
    /// confirmed the removal.
    pub async fn optimistic_remove<R, E, F, Fut>(&self, id: T::Id, mutate_fn: F) -> bool
    where
        F: FnOnce(T::Id) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: Into<BoxError>,
    {
        let patch_id = id.clone();
        let settle_id = id.clone();
        let patch = Patch::update(move |items: Option<Vec<T>>| {
            let mut items = items.unwrap_or_default();
            items.retain(|item| item.id() != patch_id);
            Some(items)
        });

        self.engine
            .mutate_reconciled(id, patch, mutate_fn, move |items, _: &R| {
                let mut items = items.unwrap_or_default();
                items.retain(|item| item.id() != settle_id);
                Some(items)
            })
            .await
            .is_some()
    }
}
