//! Host visibility signal.

use std::sync::Arc;

use tokio::sync::watch;

/// Whether the host (tab, window) is in the foreground.
///
/// Owned by the host; the agent subscribes and reports each change to
/// the hub. Setting the current value again does not notify.
#[derive(Debug, Clone)]
pub struct VisibilitySignal {
    tx: Arc<watch::Sender<bool>>,
}

impl VisibilitySignal {
    /// Creates a signal with the given initial visibility.
    pub fn new(visible: bool) -> Self {
        let (tx, _rx) = watch::channel(visible);
        Self { tx: Arc::new(tx) }
    }

    /// Update visibility; returns whether it changed.
    pub fn set_visible(&self, visible: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == visible {
                return false;
            }
            *current = visible;
            true
        })
    }

    /// Current visibility.
    pub fn is_visible(&self) -> bool {
        *self.tx.borrow()
    }

    /// Receiver notified on each change.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for VisibilitySignal {
    fn default() -> Self {
        Self::new(true)
    }
}
