//! Per-thread wake primitive.
//!
//! A [`Parker`] lets exactly one thread (its owner) block until another thread
//! unparks or interrupts it. Monitors enqueue a waiter's parker under their own
//! lock before releasing ownership, and unpark it under the same lock, so a
//! wake-up can never fall between "enqueued" and "parked".

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};

/// Reason a [`Parker::park`] call returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wakeup {
    /// Another thread called [`Parker::unpark`].
    Notified,
    /// Another thread called [`Parker::interrupt`].
    Interrupted,
    /// The timeout elapsed first.
    TimedOut,
}

#[derive(Debug, Default)]
struct ParkState {
    notified: bool,
    interrupted: bool,
}

#[derive(Debug, Default)]
struct ParkerInner {
    state: Mutex<ParkState>,
    signal: Condvar,
}

/// Wake primitive owned by one thread.
///
/// Cloning yields another reference to the same primitive.
#[derive(Clone, Debug, Default)]
pub struct Parker {
    inner: Arc<ParkerInner>,
}

impl Parker {
    /// Creates a parker with no pending signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears a stale notification before the owner enqueues itself somewhere.
    pub fn prepare(&self) {
        self.inner.state.lock().notified = false;
    }

    /// Blocks the owner until notified, interrupted, or `timeout` elapses.
    ///
    /// `None` waits indefinitely. A pending notification or interrupt is consumed
    /// and returns immediately. An interrupt takes precedence over a notification
    /// delivered at the same time; the notification stays pending.
    pub fn park(&self, timeout: Option<Duration>) -> Wakeup {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.inner.state.lock();

        loop {
            if state.interrupted {
                state.interrupted = false;
                return Wakeup::Interrupted;
            }
            if state.notified {
                state.notified = false;
                return Wakeup::Notified;
            }

            match deadline {
                None => self.inner.signal.wait(&mut state),
                Some(deadline) => {
                    if self
                        .inner
                        .signal
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        // Signals raced with the timeout still win.
                        if state.interrupted || state.notified {
                            continue;
                        }
                        return Wakeup::TimedOut;
                    }
                }
            }
        }
    }

    /// Wakes the owner with a notification.
    pub fn unpark(&self) {
        let mut state = self.inner.state.lock();
        state.notified = true;
        self.inner.signal.notify_all();
    }

    /// Wakes the owner with an interrupt. Stays pending until consumed.
    pub fn interrupt(&self) {
        let mut state = self.inner.state.lock();
        state.interrupted = true;
        self.inner.signal.notify_all();
    }

    /// Consumes a pending interrupt without blocking.
    pub fn take_interrupt(&self) -> bool {
        std::mem::take(&mut self.inner.state.lock().interrupted)
    }

    /// Returns `true` if both refer to the same primitive.
    #[must_use]
    pub fn ptr_eq(&self, other: &Parker) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns `true` if an interrupt is pending.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.inner.state.lock().interrupted
    }
}
