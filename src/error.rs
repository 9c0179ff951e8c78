//! Error types recorded by the synchronization primitives.
//!
//! Producer failures are never returned to callers as `Err`. They are
//! stored in the owning primitive's state so the UI can render them.

use std::error::Error as StdError;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use thiserror::Error;

/// Any failure a fetch or mutate function may produce.
///
/// `String` and `&str` convert into this, so producers can fail with a
/// plain message.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors surfaced through `FetchState::error` and `MutationState::error`.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// The fetch function rejected.
    #[error("Fetch failed: {0}")]
    Fetch(#[source] SharedCause),

    /// The mutate function rejected.
    #[error("Mutation failed: {0}")]
    Mutation(#[source] SharedCause),
}

impl SyncError {
    pub fn fetch(err: impl Into<BoxError>) -> Self {
        SyncError::Fetch(SharedCause::new(err))
    }

    pub fn mutation(err: impl Into<BoxError>) -> Self {
        SyncError::Mutation(SharedCause::new(err))
    }

    /// The producer's original error.
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        match self {
            SyncError::Fetch(cause) | SyncError::Mutation(cause) => cause.get(),
        }
    }

    /// Downcast the producer's original error.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.cause().downcast_ref::<E>()
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self, SyncError::Fetch(_))
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self, SyncError::Mutation(_))
    }
}

/// Cloneable wrapper around a producer error.
///
/// State snapshots are cloned on every read, so the cause is reference
/// counted instead of boxed. It derefs to the producer's error, which is
/// what `SyncError::source` returns; the wrapper never shows up in an
/// error chain.
#[derive(Clone)]
pub struct SharedCause(Arc<dyn StdError + Send + Sync + 'static>);

impl SharedCause {
    pub fn new(err: impl Into<BoxError>) -> Self {
        SharedCause(Arc::from(err.into()))
    }

    pub fn get(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

impl fmt::Debug for SharedCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for SharedCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Deref for SharedCause {
    type Target = dyn StdError + Send + Sync + 'static;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}
