use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use tracing::{debug, warn};

/// Sending side of a bounded notification channel.
#[derive(Debug)]
pub struct Notifier<T> {
    name: &'static str,
    tx: SyncSender<T>,
}

impl<T> Clone for Notifier<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
        }
    }
}

impl<T> Notifier<T> {
    /// Create a channel holding at most `capacity` undelivered items.
    pub fn channel(name: &'static str, capacity: usize) -> (Self, Receiver<T>) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        (Self { name, tx }, rx)
    }

    /// Send without blocking. When the channel is full the new item is
    /// dropped. Returns true if the item was queued.
    pub fn notify(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(sink = self.name, "notification dropped, sink full");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Send, waiting for room. Returns false if the receiver is gone.
    pub fn deliver(&self, item: T) -> bool {
        if self.tx.send(item).is_err() {
            debug!(sink = self.name, "receiver dropped");
            return false;
        }
        true
    }
}
