use std::sync::Arc;

use tokio::sync::watch;

/// Window focus as seen by pollers.
///
/// The host drives it with [`focus`](Self::focus) and [`blur`](Self::blur);
/// every poller built with this signal listens for transitions. Dropping the
/// signal freezes its last value for existing listeners.
#[derive(Debug, Clone)]
pub struct FocusSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl FocusSignal {
    /// A new signal that starts focused.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(true);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn focus(&self) {
        self.set(true);
    }

    pub fn blur(&self) {
        self.set(false);
    }

    pub fn is_focused(&self) -> bool {
        *self.sender.borrow()
    }

    fn set(&self, focused: bool) {
        self.sender.send_if_modified(|current| {
            if *current == focused {
                return false;
            }
            *current = focused;
            true
        });
    }

    pub(crate) fn listen(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    /// Listener for pollers without a host signal: focused, never changes.
    pub(crate) fn always_focused() -> watch::Receiver<bool> {
        let (_, receiver) = watch::channel(true);
        receiver
    }
}

impl Default for FocusSignal {
    fn default() -> Self {
        Self::new()
    }
}
