use std::{
    fmt,
    sync::{Arc, Weak},
};

use crate::thread::Thread;

/// Process-unique thread identifier.
///
/// Identifiers come from one process-wide counter in creation order and are
/// never reused, even across systems.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u32);

impl ThreadId {
    /// Creates a new thread ID with the given value.
    ///
    /// # Arguments
    ///
    /// * `id` - The numeric thread identifier
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw numeric ID value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread#{}", self.0)
    }
}

/// Lifecycle state of a [`Thread`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ThreadState {
    /// The thread object exists; its host thread has not started `run()` yet.
    #[default]
    Created,

    /// `run()` is executing, or the host thread was attached.
    Running,

    /// `interrupt()` was called while the thread was running.
    ///
    /// The thread keeps executing; interruption is cooperative.
    Interrupted,

    /// `run()` returned or panicked.
    Exited,

    /// The creator joined the thread.
    Joined,

    /// The thread object was released.
    Disposed,
}

impl ThreadState {
    /// Returns `true` while `run()` may still be executing.
    #[must_use]
    pub fn is_alive(self) -> bool {
        matches!(
            self,
            ThreadState::Created | ThreadState::Running | ThreadState::Interrupted
        )
    }
}

/// Non-owning reference from a [`crate::Runnable`] to its attached [`Thread`].
///
/// The thread object is owned by the system's registry; the handle stays valid
/// between `attach` and `dispose`. After `dispose`, [`ThreadHandle::upgrade`]
/// returns `None` once no other strong reference remains.
#[derive(Clone)]
pub struct ThreadHandle {
    id: ThreadId,
    thread: Weak<dyn Thread>,
}

impl ThreadHandle {
    /// Creates a handle pointing at `thread`.
    #[must_use]
    pub fn new(thread: &Arc<dyn Thread>) -> Self {
        ThreadHandle {
            id: thread.id(),
            thread: Arc::downgrade(thread),
        }
    }

    /// Identity of the referenced thread, available even after disposal.
    #[must_use]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Returns the thread, if it has not been released.
    #[must_use]
    pub fn upgrade(&self) -> Option<Arc<dyn Thread>> {
        self.thread.upgrade()
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("id", &self.id)
            .field("live", &(self.thread.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_id_display() {
        assert_eq!(ThreadId::new(7).to_string(), "thread#7");
        assert_eq!(ThreadId::new(7).value(), 7);
    }

    #[test]
    fn test_state_liveness() {
        assert!(ThreadState::Created.is_alive());
        assert!(ThreadState::Interrupted.is_alive());
        assert!(!ThreadState::Exited.is_alive());
        assert!(!ThreadState::Disposed.is_alive());
    }
}
