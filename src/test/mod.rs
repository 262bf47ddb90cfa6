//! Shared fixtures for unit tests.

use std::{
    ffi::c_void,
    ptr::NonNull,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use crate::{
    memory::{Allocator, HostAllocator},
    native::{self, Library, NativeType},
    sync::{HostMonitor, Monitor},
    system::{LoadFailure, Status, System},
    thread::{Parker, Runnable, Thread, ThreadId, ThreadState},
    Error,
};

/// Routes `log` output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// System double that counts abort requests instead of terminating.
///
/// Owns no threads and loads no libraries. [`crate::fatal::abort`] still ends
/// the process after `abort` returns, so only success paths can run against it.
#[derive(Debug, Default)]
pub struct RecordingSystem {
    allocator: HostAllocator,
    aborts: AtomicUsize,
}

impl RecordingSystem {
    /// Number of times `abort` was requested.
    pub fn abort_calls(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }
}

/// A [`RecordingSystem`] behind the trait object monitors expect.
pub fn recording_system() -> Arc<dyn System> {
    Arc::new(RecordingSystem::default())
}

impl Allocator for RecordingSystem {
    fn try_allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.allocator.try_allocate(size)
    }

    unsafe fn free(&self, block: NonNull<u8>) {
        self.allocator.free(block);
    }
}

impl System for RecordingSystem {
    fn success(&self, status: Status) -> bool {
        status == Status::OK
    }

    fn attach(&self, _runnable: Arc<dyn Runnable>) -> Status {
        Error::Disposed.status()
    }

    fn start(&self, _runnable: Arc<dyn Runnable>) -> Status {
        Error::Disposed.status()
    }

    fn make(&self) -> Result<Arc<dyn Monitor>, Status> {
        Ok(Arc::new(HostMonitor::new(recording_system())))
    }

    unsafe fn call(
        &self,
        function: NonNull<c_void>,
        arguments: &[usize],
        types: &[NativeType],
        size: usize,
        return_type: NativeType,
    ) -> u64 {
        native::dispatch(function, arguments, types, size, return_type).unwrap_or(0)
    }

    fn load(
        &self,
        _name: Option<&str>,
        next: Option<Box<dyn Library>>,
    ) -> Result<Box<dyn Library>, LoadFailure> {
        Err(LoadFailure::new(Error::Disposed.status(), next))
    }

    fn current_thread(&self) -> Option<Arc<dyn Thread>> {
        None
    }

    fn exit(&self, code: i32) -> ! {
        panic!("exit({code}) requested")
    }

    fn abort(&self) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
    }

    fn dispose(&self) {}
}

/// Minimal [`Thread`] for driving monitors from plain host threads.
///
/// Keeps its own interrupted flag in place of a runnable.
#[derive(Debug)]
pub struct TestThread {
    id: ThreadId,
    parker: Parker,
    interrupted: AtomicBool,
}

impl TestThread {
    pub fn new(id: u32) -> Self {
        TestThread {
            id: ThreadId::new(id),
            parker: Parker::new(),
            interrupted: AtomicBool::new(false),
        }
    }

    /// Reads the interrupted flag without consuming it.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

impl Thread for TestThread {
    fn id(&self) -> ThreadId {
        self.id
    }

    fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        self.parker.interrupt();
    }

    fn take_interrupt(&self) -> bool {
        self.parker.take_interrupt();
        self.interrupted.swap(false, Ordering::SeqCst)
    }

    fn join(&self) {}

    fn dispose(&self) {}

    fn state(&self) -> ThreadState {
        ThreadState::Running
    }

    fn parker(&self) -> &Parker {
        &self.parker
    }
}
