//! Native thread model.
//!
//! This module pairs host threads with units of work. A [`Thread`] is one host
//! execution context; a [`Runnable`] is the work it executes. The two are linked
//! both ways, but only the [`crate::HostSystem`] owns the thread object: the
//! runnable holds a weak [`ThreadHandle`].
//!
//! # Thread Lifecycle
//!
//! ```text
//! Created -> Running -> Exited -> Joined -> Disposed
//!               |          ^
//!               v          |
//!          Interrupted ----'
//! ```
//!
//! 1. [`ThreadState::Created`] - thread object exists, host thread not yet running
//! 2. [`ThreadState::Running`] - `run()` is executing
//! 3. [`ThreadState::Interrupted`] - `interrupt()` was called while running
//! 4. [`ThreadState::Exited`] - `run()` returned (or panicked)
//! 5. [`ThreadState::Joined`] / [`ThreadState::Disposed`] - released by the creator
//!
//! # Interruption
//!
//! [`Thread::interrupt`] is the wake signal: it sets the runnable's flag and
//! unparks the thread if it is blocked in [`crate::Monitor::wait`] or
//! [`Thread::join`]. The flag ([`Runnable::interrupted`]) is the single record of
//! a pending interrupt; the parker only carries the wake. A blocking operation
//! woken by an interrupt consumes it through [`Thread::take_interrupt`], which
//! clears the flag, and clearing the flag with [`Runnable::set_interrupted`]
//! withdraws the wake. Nothing here terminates a thread forcibly.
//!
//! # Components
//!
//! - [`Thread`] / [`Runnable`] - capability traits
//! - [`ThreadId`], [`ThreadHandle`], [`ThreadState`] - identity and lifecycle
//! - [`Parker`] - per-thread wake primitive
//! - [`RunnableState`], [`Task`] - building blocks for runnables
//! - [`HostThread`] - the host implementation of [`Thread`]

mod handle;
mod host;
mod parker;
mod runnable;

pub use handle::{ThreadHandle, ThreadId, ThreadState};
pub use host::HostThread;
pub use parker::{Parker, Wakeup};
pub use runnable::{Runnable, RunnableState, Task};

pub(crate) use host::{bind_current, current, next_thread_id, ThreadRegistry};

/// One host-level execution context.
///
/// Created only by [`crate::System::start`] and [`crate::System::attach`].
pub trait Thread: Send + Sync {
    /// Process-unique identity of this thread.
    fn id(&self) -> ThreadId;

    /// Signals the thread: sets its runnable's interrupted flag and wakes it if
    /// it is blocked in [`crate::Monitor::wait`] or [`Thread::join`].
    ///
    /// Callable from any thread at any time, including after the thread exited.
    fn interrupt(&self);

    /// Consumes a pending interrupt. Returns `true` if one was pending.
    ///
    /// Clears the runnable's interrupted flag together with any wake still
    /// pending on the parker.
    fn take_interrupt(&self) -> bool;

    /// Blocks until the thread has returned from [`Runnable::run`].
    ///
    /// If the calling runtime thread is interrupted first, the interrupt is
    /// consumed and `join` returns early; the target is then still unjoined and
    /// `join` may be called again. Never call it from the thread itself.
    fn join(&self);

    /// Releases the thread object. Must only follow [`Thread::join`].
    fn dispose(&self);

    /// Current lifecycle state; a racy snapshot for diagnostics.
    fn state(&self) -> ThreadState;

    /// The wake primitive monitors park this thread on.
    fn parker(&self) -> &Parker;
}
