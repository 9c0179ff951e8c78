//! Liveness tracking for asynchronous work owned by a primitive.
//!
//! Every poller lifecycle and every optimistic engine holds one token.
//! Async results are committed only while the token is alive; once it is
//! cancelled, in-flight futures still run to completion but their results
//! are discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Cancellation token checked before every state commit.
///
/// Clones share the same flag. Cancellation is one-way.
#[derive(Clone)]
pub struct LivenessToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl LivenessToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// True until [`cancel`](Self::cancel) is called on any clone.
    pub fn is_alive(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst)
    }

    /// Mark the owner as gone and wake every task waiting in [`cancelled`](Self::cancelled).
    ///
    /// Returns true if this call performed the cancellation.
    pub fn cancel(&self) -> bool {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
            return true;
        }
        false
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        // Register interest before reading the flag, otherwise a cancel()
        // landing between the check and the await is lost.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if !self.is_alive() {
            return;
        }
        notified.await;
    }
}

impl Default for LivenessToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LivenessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivenessToken")
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn new_token_is_alive() {
        let token = LivenessToken::new();
        assert!(token.is_alive());
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = LivenessToken::new();
        let clone = token.clone();
        assert!(clone.cancel());
        assert!(!token.is_alive());
        assert!(!token.cancel());
    }

    #[tokio::test]
    async fn cancelled_returns_immediately_when_already_cancelled() {
        let token = LivenessToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(50), token.cancelled())
            .await
            .expect("cancelled() should resolve");
    }

    #[tokio::test]
    async fn cancelled_wakes_waiting_task() {
        let token = LivenessToken::new();
        let waiter = token.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });

        tokio::task::yield_now().await;
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("waiter should finish")
            .expect("task should not panic");
    }
}
