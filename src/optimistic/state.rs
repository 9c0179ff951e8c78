use crate::error::SyncError;

/// Progress of the engine's mutation. Pending and settled are exclusive.
#[derive(Debug, Clone, Default)]
pub struct MutationState {
    pub is_pending: bool,
    pub is_error: bool,
    pub error: Option<SyncError>,
}

impl MutationState {
    pub(crate) fn pending() -> Self {
        Self {
            is_pending: true,
            is_error: false,
            error: None,
        }
    }

    pub(crate) fn failed(error: SyncError) -> Self {
        Self {
            is_pending: false,
            is_error: true,
            error: Some(error),
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.is_pending
    }
}

/// Snapshot published by an optimistic engine.
#[derive(Debug, Clone)]
pub struct OptimisticState<T> {
    pub data: Option<T>,
    pub mutation: MutationState,
}

impl<T> OptimisticState<T> {
    pub(crate) fn new(data: Option<T>) -> Self {
        Self {
            data,
            mutation: MutationState::default(),
        }
    }
}

/// Change applied to the engine's data before the mutation settles.
pub enum Patch<T> {
    /// Replace the data outright.
    Replace(Option<T>),
    /// Compute the new data from the current data.
    Update(Box<dyn FnOnce(Option<T>) -> Option<T> + Send>),
}

impl<T> Patch<T> {
    pub fn update<F>(f: F) -> Self
    where
        F: FnOnce(Option<T>) -> Option<T> + Send + 'static,
    {
        Patch::Update(Box::new(f))
    }

    pub(crate) fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Replace(value) => value,
            Patch::Update(f) => f(current),
        }
    }
}

impl<T> From<T> for Patch<T> {
    fn from(value: T) -> Self {
        Patch::Replace(Some(value))
    }
}

impl<T> std::fmt::Debug for Patch<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Patch::Replace(_) => f.write_str("Patch::Replace"),
            Patch::Update(_) => f.write_str("Patch::Update"),
        }
    }
}
