//! Synchronization primitives.
//!
//! The [`Monitor`] is the only primitive this layer exposes for critical
//! sections: a reentrant mutual-exclusion lock with an attached condition
//! variable, implementing the semantics the managed language's `lock`/`wait`/
//! `notify` constructs rely on.
//!
//! # State Machine
//!
//! ```text
//!             try_acquire/acquire            release (depth 1)
//!   Free  ------------------------>  Owned(t, 1)  ---------------->  Free
//!                                      |    ^
//!                     acquire by t     v    |  release (depth > 1)
//!                                  Owned(t, n + 1)
//! ```
//!
//! `wait` temporarily moves an owner from `Owned(t, n)` to `Free`, parks the
//! thread, then restores `Owned(t, n)` before returning.
//!
//! # Ordering
//!
//! `release` and `notify` happen-before the next successful `acquire` or woken
//! `wait` on the same monitor. Nothing is guaranteed across monitors.

mod monitor;

pub use monitor::HostMonitor;

use crate::thread::{Thread, ThreadId};

/// Reentrant lock with an attached condition variable.
///
/// Every operation takes the calling thread as `context`. Operations other than
/// `try_acquire`, `acquire` and `owner` require the caller to own the monitor;
/// violations are caught by [`crate::fatal::assert`] in checked builds.
pub trait Monitor: Send + Sync {
    /// Acquires the monitor if it is free or already owned by `context`.
    ///
    /// Never blocks.
    fn try_acquire(&self, context: &dyn Thread) -> bool;

    /// Acquires the monitor, blocking until it is available.
    ///
    /// Reentrant: an owner acquiring again only increments the depth.
    fn acquire(&self, context: &dyn Thread);

    /// Releases one level of ownership.
    ///
    /// The monitor becomes free, and a blocked acquirer may proceed, when the
    /// depth drops to zero.
    fn release(&self, context: &dyn Thread);

    /// Releases ownership and parks until notified, interrupted, or `time_millis`
    /// elapse (`0` waits indefinitely), then re-acquires at the previous depth.
    ///
    /// Returns `true` if woken by a notification or an interrupt, `false` on
    /// timeout. Callers must re-check their condition after waking.
    fn wait(&self, context: &dyn Thread, time_millis: u64) -> bool;

    /// Wakes the longest-waiting thread, if any.
    fn notify(&self, context: &dyn Thread);

    /// Wakes every waiting thread.
    fn notify_all(&self, context: &dyn Thread);

    /// Snapshot of the current owner, for diagnostics and assertions.
    fn owner(&self) -> Option<ThreadId>;

    /// Releases the monitor. It must be free and have no waiters.
    fn dispose(&self);
}
