//! Host monitor implementation.
//!
//! The monitor keeps its whole state behind one internal lock:
//!
//! - the owner and recursion depth (as in a reentrant `lock`)
//! - a FIFO queue of entrants blocked in `acquire`
//! - a FIFO queue of waiters parked in `wait`, each with its thread's [`Parker`]
//!
//! Entrants are admitted strictly in arrival order, so a thread blocked in
//! `acquire` is never overtaken indefinitely. Waiters are enqueued before the
//! owner gives up the monitor and are unparked while the notifier still holds
//! the internal lock, which rules out missed wake-ups.

use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::{
    sync::Monitor,
    thread::{Parker, Thread, ThreadId, Wakeup},
    System,
};

/// A thread parked in [`Monitor::wait`].
#[derive(Debug)]
struct Waiter {
    id: ThreadId,
    parker: Parker,
}

/// Ownership and queue state of a monitor.
#[derive(Debug, Default)]
struct MonitorState {
    /// The thread that currently owns this monitor, or `None` if free.
    owner: Option<ThreadId>,
    /// Number of times the owner has acquired this monitor.
    depth: u32,
    /// Threads blocked in `acquire`, in arrival order.
    entrants: VecDeque<ThreadId>,
    /// Threads parked in `wait`, in arrival order.
    waiters: VecDeque<Waiter>,
}

impl MonitorState {
    /// Non-blocking acquisition; refuses while other entrants are queued.
    fn try_enter(&mut self, id: ThreadId) -> bool {
        match self.owner {
            None if self.entrants.is_empty() => {
                self.owner = Some(id);
                self.depth = 1;
                true
            }
            Some(owner) if owner == id => {
                self.depth += 1;
                true
            }
            _ => false,
        }
    }

    fn is_owner(&self, id: ThreadId) -> bool {
        self.owner == Some(id)
    }

    /// Removes `id` from the wait queue. Returns `true` if it was still queued.
    fn remove_waiter(&mut self, id: ThreadId) -> bool {
        match self.waiters.iter().position(|waiter| waiter.id == id) {
            Some(index) => {
                self.waiters.remove(index);
                true
            }
            None => false,
        }
    }
}

/// [`Monitor`] built on a host mutex and condition variable.
///
/// Created by [`crate::System::make`].
pub struct HostMonitor {
    system: Arc<dyn System>,
    state: Mutex<MonitorState>,
    /// Signalled when the monitor becomes free while entrants are queued.
    available: Condvar,
}

impl HostMonitor {
    /// Creates a free monitor reporting invariant violations through `system`.
    #[must_use]
    pub fn new(system: Arc<dyn System>) -> Self {
        HostMonitor {
            system,
            state: Mutex::new(MonitorState::default()),
            available: Condvar::new(),
        }
    }

    /// Current recursion depth of the owner (0 when free).
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.state.lock().depth
    }

    /// Number of threads parked in [`Monitor::wait`].
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Blocks until `id` is at the head of the entrant queue and the monitor is
    /// free, then takes ownership at `depth`.
    fn enter(&self, state: &mut MutexGuard<'_, MonitorState>, id: ThreadId, depth: u32) {
        if state.owner.is_none() && state.entrants.is_empty() {
            state.owner = Some(id);
            state.depth = depth;
            return;
        }

        state.entrants.push_back(id);
        while !(state.owner.is_none() && state.entrants.front() == Some(&id)) {
            self.available.wait(state);
        }
        state.entrants.pop_front();
        state.owner = Some(id);
        state.depth = depth;

        // Whoever is next in line must see the new head.
        if !state.entrants.is_empty() {
            self.available.notify_all();
        }
    }

    /// Frees the monitor and lets the head entrant in.
    fn vacate(&self, state: &mut MonitorState) {
        state.owner = None;
        state.depth = 0;
        if !state.entrants.is_empty() {
            self.available.notify_all();
        }
    }
}

impl Monitor for HostMonitor {
    fn try_acquire(&self, context: &dyn Thread) -> bool {
        self.state.lock().try_enter(context.id())
    }

    fn acquire(&self, context: &dyn Thread) {
        let id = context.id();
        let mut state = self.state.lock();
        if state.is_owner(id) {
            state.depth += 1;
            return;
        }
        self.enter(&mut state, id, 1);
    }

    fn release(&self, context: &dyn Thread) {
        let id = context.id();
        let mut state = self.state.lock();
        sys_assert!(
            self.system,
            state.is_owner(id),
            "{} released a monitor owned by {:?}",
            id,
            state.owner
        );
        if !state.is_owner(id) {
            return;
        }

        state.depth -= 1;
        if state.depth == 0 {
            self.vacate(&mut state);
        }
    }

    fn wait(&self, context: &dyn Thread, time_millis: u64) -> bool {
        let id = context.id();
        let parker = context.parker();
        let mut state = self.state.lock();
        sys_assert!(
            self.system,
            state.is_owner(id),
            "{} waited on a monitor owned by {:?}",
            id,
            state.owner
        );
        if !state.is_owner(id) {
            return false;
        }

        // A pending interrupt is delivered without giving up the monitor.
        if context.take_interrupt() {
            return true;
        }

        let depth = state.depth;
        parker.prepare();
        state.waiters.push_back(Waiter {
            id,
            parker: parker.clone(),
        });
        self.vacate(&mut state);

        let deadline = (time_millis > 0).then(|| Instant::now() + Duration::from_millis(time_millis));
        let wakeup = MutexGuard::unlocked(&mut state, || loop {
            let timeout = deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()));
            match parker.park(timeout) {
                // The interrupt behind this wake was already withdrawn.
                Wakeup::Interrupted if !context.take_interrupt() => continue,
                wakeup => break wakeup,
            }
        });

        // Notifiers dequeue before unparking, so a waiter that is no longer
        // queued was notified even if its park timed out.
        let still_queued = state.remove_waiter(id);
        self.enter(&mut state, id, depth);

        match wakeup {
            Wakeup::Notified | Wakeup::Interrupted => true,
            Wakeup::TimedOut => !still_queued,
        }
    }

    fn notify(&self, context: &dyn Thread) {
        let id = context.id();
        let mut state = self.state.lock();
        sys_assert!(
            self.system,
            state.is_owner(id),
            "{} notified a monitor owned by {:?}",
            id,
            state.owner
        );

        if let Some(waiter) = state.waiters.pop_front() {
            waiter.parker.unpark();
        }
    }

    fn notify_all(&self, context: &dyn Thread) {
        let id = context.id();
        let mut state = self.state.lock();
        sys_assert!(
            self.system,
            state.is_owner(id),
            "{} notified a monitor owned by {:?}",
            id,
            state.owner
        );

        for waiter in state.waiters.drain(..) {
            waiter.parker.unpark();
        }
    }

    fn owner(&self) -> Option<ThreadId> {
        self.state.lock().owner
    }

    fn dispose(&self) {
        let state = self.state.lock();
        sys_assert!(
            self.system,
            state.owner.is_none() && state.entrants.is_empty() && state.waiters.is_empty(),
            "monitor disposed while in use: owner {:?}, {} entrants, {} waiters",
            state.owner,
            state.entrants.len(),
            state.waiters.len()
        );
    }
}

impl std::fmt::Debug for HostMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostMonitor")
            .field("state", &*self.state.lock())
            .finish()
    }
}
