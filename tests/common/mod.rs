//! Shared test utilities: scripted and hand-resolved producers.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: i64,
    pub name: String,
}

pub fn device(id: i64, name: &str) -> Device {
    Device {
        id,
        name: name.to_string(),
    }
}

impl fleetsync::Identified for Device {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }
}

pub type BoxedResult<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

/// Let spawned tasks run without moving the paused clock.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Fetch function whose result is set by the test and resolves immediately.
#[derive(Clone)]
pub struct ScriptedFetch<T> {
    next: Arc<Mutex<Result<T, String>>>,
    calls: Arc<AtomicUsize>,
}

impl<T: Clone + Send + Sync + 'static> ScriptedFetch<T> {
    pub fn ok(value: T) -> Self {
        Self {
            next: Arc::new(Mutex::new(Ok(value))),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_ok(&self, value: T) {
        *self.next.lock() = Ok(value);
    }

    pub fn set_err(&self, message: &str) {
        *self.next.lock() = Err(message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fetcher(&self) -> impl Fn() -> Ready<Result<T, String>> + Send + Sync + 'static {
        let next = Arc::clone(&self.next);
        let calls = Arc::clone(&self.calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            ready(next.lock().clone())
        }
    }
}

/// Producer whose calls stay in flight until the test resolves them.
pub struct ManualFetch<T> {
    pending: Arc<Mutex<VecDeque<oneshot::Sender<Result<T, String>>>>>,
    calls: Arc<AtomicUsize>,
}

// Handles share the queue; `T` itself never needs to be `Clone`.
impl<T> Clone for ManualFetch<T> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<T: Send + 'static> ManualFetch<T> {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }

    /// Resolve the oldest call still in flight.
    pub fn resolve_first(&self, result: Result<T, String>) -> bool {
        let sender = self.pending.lock().pop_front();
        sender.is_some_and(|tx| tx.send(result).is_ok())
    }

    /// Resolve the newest call still in flight.
    pub fn resolve_last(&self, result: Result<T, String>) -> bool {
        let sender = self.pending.lock().pop_back();
        sender.is_some_and(|tx| tx.send(result).is_ok())
    }

    fn start(&self) -> impl Future<Output = Result<T, String>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().push_back(tx);
        self.calls.fetch_add(1, Ordering::SeqCst);
        async move {
            rx.await
                .unwrap_or_else(|_| Err("resolver dropped".to_string()))
        }
    }

    /// Nullary form, for pollers.
    pub fn fetcher(&self) -> impl Fn() -> BoxedResult<T> + Send + Sync + 'static {
        let this = self.clone();
        move || Box::pin(this.start()) as BoxedResult<T>
    }

    /// Unary form, for mutations. The params are ignored.
    pub fn mutator<P>(&self) -> impl FnOnce(P) -> BoxedResult<T> + Send + 'static {
        let this = self.clone();
        move |_: P| Box::pin(this.start()) as BoxedResult<T>
    }
}
