use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use sds011_frame::Frame;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Single-slot mailbox for the acknowledgement of the request in flight.
///
/// The requester clears the slot before sending and then waits; the receive
/// loop deposits acknowledgements. A newer acknowledgement replaces an
/// unclaimed older one, so the slot never blocks the receive loop.
#[derive(Debug, Default)]
pub struct AckSlot {
    slot: Mutex<Option<Frame>>,
    ready: Condvar,
}

impl AckSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop any stale acknowledgement.
    pub fn clear(&self) {
        lock(&self.slot).take();
    }

    /// Deposit an acknowledgement and wake the waiter.
    pub fn deliver(&self, frame: Frame) {
        *lock(&self.slot) = Some(frame);
        self.ready.notify_all();
    }

    /// Wait up to `timeout` for an acknowledgement and take it.
    pub fn wait(&self, timeout: Duration) -> Option<Frame> {
        let guard = lock(&self.slot);
        let (mut guard, _) = self
            .ready
            .wait_timeout_while(guard, timeout, |slot| slot.is_none())
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.take()
    }
}
