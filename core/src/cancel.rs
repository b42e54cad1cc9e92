//! Cancellation for long-running operation polling.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// A cloneable handle that requests cancellation of a poll loop.
///
/// The poller checks the handle before each sleep, and a pending sleep
/// wakes as soon as `cancel` is called.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    signal: Arc<Signal>,
}

#[derive(Debug, Default)]
struct Signal {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every sleeping poller.
    pub fn cancel(&self) {
        let mut cancelled = self
            .signal
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        self.signal.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .signal
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `duration` or until cancelled. Returns true when cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let guard = self
            .signal
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .signal
            .wake
            .wait_timeout_while(guard, duration, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}
