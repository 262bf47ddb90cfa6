use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::thread::{Thread, ThreadHandle};

/// A unit of work executed on one [`Thread`].
///
/// The runnable is owned by its creator and handed to [`crate::System::start`]
/// or [`crate::System::attach`] as an `Arc`. The system calls
/// [`Runnable::attach`] exactly once, before [`Runnable::run`].
pub trait Runnable: Send + Sync {
    /// Records the thread this runnable is bound to.
    fn attach(&self, thread: ThreadHandle);

    /// Executes the work on the attached thread.
    fn run(&self);

    /// Cooperative cancellation flag.
    fn interrupted(&self) -> bool;

    /// Sets or clears the cooperative cancellation flag.
    fn set_interrupted(&self, value: bool);
}

/// Back-reference and interrupted flag, ready to embed in a [`Runnable`].
///
/// # Example
///
/// ```rust
/// use vmsys::{Runnable, RunnableState, ThreadHandle};
///
/// #[derive(Default)]
/// struct Worker {
///     state: RunnableState,
/// }
///
/// impl Runnable for Worker {
///     fn attach(&self, thread: ThreadHandle) {
///         self.state.attach(thread);
///     }
///     fn run(&self) {
///         while !self.interrupted() {
///             // ...
/// #           break;
///         }
///     }
///     fn interrupted(&self) -> bool {
///         self.state.interrupted()
///     }
///     fn set_interrupted(&self, value: bool) {
///         self.state.set_interrupted(value);
///     }
/// }
/// ```
#[derive(Debug, Default)]
pub struct RunnableState {
    thread: Mutex<Option<ThreadHandle>>,
    interrupted: AtomicBool,
}

impl RunnableState {
    /// Creates an unattached state with the flag cleared.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the back-reference.
    pub fn attach(&self, thread: ThreadHandle) {
        *self.thread.lock() = Some(thread);
    }

    /// The back-reference, if attached.
    #[must_use]
    pub fn handle(&self) -> Option<ThreadHandle> {
        self.thread.lock().clone()
    }

    /// The attached thread, if attached and not yet released.
    #[must_use]
    pub fn thread(&self) -> Option<std::sync::Arc<dyn Thread>> {
        self.thread.lock().as_ref().and_then(ThreadHandle::upgrade)
    }

    /// Reads the cooperative cancellation flag.
    #[must_use]
    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    /// Writes the cooperative cancellation flag.
    ///
    /// Clearing the flag also withdraws an interrupt wake still pending on the
    /// attached thread, so a later wait is not cut short by it.
    pub fn set_interrupted(&self, value: bool) {
        self.interrupted.store(value, Ordering::Release);
        if !value {
            if let Some(thread) = self.thread() {
                thread.parker().take_interrupt();
            }
        }
    }
}

type TaskBody = Box<dyn Fn(&RunnableState) + Send + Sync>;

/// Closure-backed [`Runnable`].
///
/// The closure receives the task's [`RunnableState`], giving it access to the
/// attached thread and the interrupted flag.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use vmsys::Task;
///
/// let task = Arc::new(Task::new(|state| {
///     let thread = state.thread().expect("attached before run");
///     println!("running on {}", thread.id());
/// }));
/// ```
pub struct Task {
    state: RunnableState,
    body: TaskBody,
}

impl Task {
    /// Wraps `body` as a runnable.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&RunnableState) + Send + Sync + 'static,
    {
        Task {
            state: RunnableState::new(),
            body: Box::new(body),
        }
    }

    /// The embedded state.
    #[must_use]
    pub fn state(&self) -> &RunnableState {
        &self.state
    }
}

impl Runnable for Task {
    fn attach(&self, thread: ThreadHandle) {
        self.state.attach(thread);
    }

    fn run(&self) {
        (self.body)(&self.state);
    }

    fn interrupted(&self) -> bool {
        self.state.interrupted()
    }

    fn set_interrupted(&self, value: bool) {
        self.state.set_interrupted(value);
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("state", &self.state).finish()
    }
}
