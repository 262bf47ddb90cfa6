//! Host implementation of [`Thread`].

use std::{
    cell::RefCell,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Weak,
    },
    thread::JoinHandle,
};

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::{
    thread::{Parker, Runnable, Thread, ThreadHandle, ThreadId, ThreadState},
    System,
};

/// Owner of every live [`HostThread`] of one system, keyed by id.
pub(crate) type ThreadRegistry = DashMap<ThreadId, Arc<HostThread>>;

/// Source of process-unique thread ids; 0 is never handed out.
static NEXT_ID: AtomicU32 = AtomicU32::new(1);

/// Allocates the next thread id.
pub(crate) fn next_thread_id() -> ThreadId {
    ThreadId::new(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

thread_local! {
    /// The runtime thread bound to the calling host thread.
    static CURRENT: RefCell<Option<ThreadHandle>> = const { RefCell::new(None) };
}

/// Returns the runtime thread bound to the calling host thread, if it is still live.
pub(crate) fn current() -> Option<ThreadHandle> {
    CURRENT.with(|current| {
        current
            .borrow()
            .as_ref()
            .filter(|handle| handle.upgrade().is_some())
            .cloned()
    })
}

/// Binds the calling host thread to `handle`.
pub(crate) fn bind_current(handle: ThreadHandle) {
    CURRENT.with(|current| *current.borrow_mut() = Some(handle));
}

/// Clears the binding of the calling host thread if it points at `id`.
fn unbind_current(id: ThreadId) {
    CURRENT.with(|current| {
        let mut current = current.borrow_mut();
        if current.as_ref().is_some_and(|handle| handle.id() == id) {
            *current = None;
        }
    });
}

/// Exit signal of a spawned thread.
#[derive(Debug, Default)]
struct ExitState {
    exited: bool,
    /// Parkers of runtime threads blocked in `join`.
    joiners: Vec<Parker>,
}

/// A runtime thread backed by a host thread.
///
/// Spawned threads own a [`JoinHandle`]; attached threads wrap a host thread
/// that was started outside the runtime and have nothing to join.
pub struct HostThread {
    id: ThreadId,
    name: String,
    runnable: Arc<dyn Runnable>,
    parker: Parker,
    state: Mutex<ThreadState>,
    host: Mutex<Option<JoinHandle<()>>>,
    exit: Mutex<ExitState>,
    /// Signalled on exit for joiners that are not runtime threads.
    exited: Condvar,
    spawned: bool,
    registry: Weak<ThreadRegistry>,
    system: Weak<dyn System>,
}

impl HostThread {
    pub(crate) fn new(
        id: ThreadId,
        name: String,
        runnable: Arc<dyn Runnable>,
        spawned: bool,
        registry: Weak<ThreadRegistry>,
        system: Weak<dyn System>,
    ) -> Self {
        HostThread {
            id,
            name,
            runnable,
            parker: Parker::new(),
            state: Mutex::new(if spawned {
                ThreadState::Created
            } else {
                ThreadState::Running
            }),
            host: Mutex::new(None),
            exit: Mutex::new(ExitState::default()),
            exited: Condvar::new(),
            spawned,
            registry,
            system,
        }
    }

    /// Name given to the host thread.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the runtime spawned this thread, `false` if it was attached.
    #[must_use]
    pub fn is_spawned(&self) -> bool {
        self.spawned
    }

    /// Spawns the host thread that executes the runnable.
    ///
    /// The join handle slot is locked across the spawn so a concurrent
    /// [`Thread::join`] cannot observe an empty slot for a running thread.
    pub(crate) fn launch(this: &Arc<HostThread>, stack_size: Option<usize>) -> std::io::Result<()> {
        let mut builder = std::thread::Builder::new().name(this.name.clone());
        if let Some(size) = stack_size {
            builder = builder.stack_size(size);
        }

        let mut slot = this.host.lock();
        let thread = Arc::clone(this);
        *slot = Some(builder.spawn(move || thread.main())?);
        Ok(())
    }

    fn main(self: Arc<Self>) {
        let this: Arc<dyn Thread> = self.clone();
        bind_current(ThreadHandle::new(&this));

        {
            let mut state = self.state.lock();
            if *state == ThreadState::Created {
                *state = ThreadState::Running;
            }
        }
        log::debug!("{} ({}) running", self.id, self.name);

        let _exit = ExitGuard(&self);
        self.runnable.run();
    }

    fn set_state(&self, next: ThreadState) {
        *self.state.lock() = next;
    }

    /// Publishes the exit and wakes every joiner.
    fn signal_exit(&self) {
        let mut exit = self.exit.lock();
        exit.exited = true;
        for joiner in exit.joiners.drain(..) {
            joiner.unpark();
        }
        self.exited.notify_all();
    }

    /// Blocks until `run()` has returned. Returns `false` if the calling
    /// runtime thread was interrupted first.
    fn await_exit(&self) -> bool {
        let joiner = current().and_then(|handle| handle.upgrade());
        let mut exit = self.exit.lock();

        let Some(joiner) = joiner else {
            // Host threads outside the runtime cannot be interrupted.
            while !exit.exited {
                self.exited.wait(&mut exit);
            }
            return true;
        };

        loop {
            if exit.exited {
                return true;
            }
            // Covers interrupts delivered before the call as well as the wake
            // below; a wake whose interrupt was already withdrawn parks again.
            if joiner.take_interrupt() {
                log::debug!("{} interrupted while joining {}", joiner.id(), self.id);
                return false;
            }

            let parker = joiner.parker().clone();
            parker.prepare();
            exit.joiners.push(parker.clone());
            MutexGuard::unlocked(&mut exit, || parker.park(None));
            exit.joiners.retain(|queued| !queued.ptr_eq(&parker));
        }
    }
}

/// Marks the thread exited when `run()` returns or unwinds.
struct ExitGuard<'a>(&'a HostThread);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        // Joiners are released first, so Exited implies a published exit.
        self.0.signal_exit();
        self.0.set_state(ThreadState::Exited);
        unbind_current(self.0.id);
        log::debug!("{} ({}) exited", self.0.id, self.0.name);
    }
}

impl Thread for HostThread {
    fn id(&self) -> ThreadId {
        self.id
    }

    fn interrupt(&self) {
        let mut state = self.state.lock();
        self.runnable.set_interrupted(true);
        if *state == ThreadState::Running {
            *state = ThreadState::Interrupted;
        }
        self.parker.interrupt();
    }

    fn take_interrupt(&self) -> bool {
        let mut state = self.state.lock();
        let pending = self.runnable.interrupted();
        if pending {
            self.runnable.set_interrupted(false);
            if *state == ThreadState::Interrupted {
                *state = ThreadState::Running;
            }
        }
        self.parker.take_interrupt();
        pending
    }

    fn join(&self) {
        if current().is_some_and(|handle| handle.id() == self.id) {
            log::warn!("{} attempted to join itself", self.id);
            return;
        }
        if self.spawned && !self.await_exit() {
            return;
        }

        let handle = self.host.lock().take();
        match handle {
            Some(handle) => {
                if handle.join().is_err() {
                    log::error!("{} ({}) panicked in run()", self.id, self.name);
                }
                self.set_state(ThreadState::Joined);
            }
            None if self.spawned => log::warn!("{} joined more than once", self.id),
            None => {}
        }
    }

    fn dispose(&self) {
        if let Some(system) = self.system.upgrade() {
            let state = *self.state.lock();
            sys_assert!(
                system,
                !self.spawned || state == ThreadState::Joined,
                "{} disposed in state {:?} before join",
                self.id,
                state
            );
        }

        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.id);
        }
        unbind_current(self.id);
        self.set_state(ThreadState::Disposed);
        log::debug!("{} ({}) disposed", self.id, self.name);
    }

    fn state(&self) -> ThreadState {
        *self.state.lock()
    }

    fn parker(&self) -> &Parker {
        &self.parker
    }
}

impl std::fmt::Debug for HostThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostThread")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("spawned", &self.spawned)
            .finish()
    }
}
