use std::{
    ffi::c_void,
    ptr::NonNull,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
};

use crate::{
    memory::{Allocator, AllocatorStats, HostAllocator},
    native::{self, HostLibrary, Library, NativeType},
    sync::{HostMonitor, Monitor},
    system::{LoadFailure, Status, System, SystemConfig},
    thread::{
        bind_current, current, next_thread_id, HostThread, Runnable, Thread, ThreadHandle,
        ThreadId, ThreadRegistry,
    },
    Error, Result,
};

/// Creates the system with a heap size hint of `heap_size` bytes.
///
/// Call once at startup; the returned object lives for the rest of the process.
#[must_use]
pub fn make_system(heap_size: usize) -> Arc<HostSystem> {
    make_system_with_config(SystemConfig::new(heap_size))
}

/// Creates the system from an explicit configuration.
#[must_use]
pub fn make_system_with_config(config: SystemConfig) -> Arc<HostSystem> {
    HostSystem::new(config)
}

/// [`System`] backed by the host operating system.
///
/// Owns every thread it created in a registry until the thread is disposed, and
/// hands monitors and threads a reference to itself for their invariant checks.
pub struct HostSystem {
    this: Weak<HostSystem>,
    allocator: HostAllocator,
    threads: Arc<ThreadRegistry>,
    config: SystemConfig,
    disposed: AtomicBool,
}

impl HostSystem {
    /// Creates a system from `config`.
    #[must_use]
    pub fn new(config: SystemConfig) -> Arc<Self> {
        let allocator = HostAllocator::new(config.heap_size, config.heap_limit());
        log::debug!(
            "system created: heap {} bytes ({})",
            config.heap_size,
            if config.enforce_heap_limit {
                "limit"
            } else {
                "hint"
            }
        );

        Arc::new_cyclic(|this| HostSystem {
            this: this.clone(),
            allocator,
            threads: Arc::new(ThreadRegistry::new()),
            config,
            disposed: AtomicBool::new(false),
        })
    }

    /// The configuration this system was created with.
    #[must_use]
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Allocator usage statistics.
    #[must_use]
    pub fn stats(&self) -> AllocatorStats {
        self.allocator.stats()
    }

    /// Number of threads created and not yet disposed.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Looks up a live thread by id.
    #[must_use]
    pub fn thread(&self, id: ThreadId) -> Option<Arc<dyn Thread>> {
        self.threads
            .get(&id)
            .map(|entry| Arc::clone(entry.value()) as Arc<dyn Thread>)
    }

    /// Returns `true` once [`System::dispose`] has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Fallible form of [`System::call`].
    ///
    /// # Safety
    ///
    /// Same contract as [`System::call`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::VoidArgument`] or [`Error::Marshal`] if the arguments do
    /// not match their types, and [`Error::CallInterface`] if the call cannot be
    /// prepared.
    pub unsafe fn try_call(
        &self,
        function: NonNull<c_void>,
        arguments: &[usize],
        types: &[NativeType],
        size: usize,
        return_type: NativeType,
    ) -> Result<u64> {
        native::dispatch(function, arguments, types, size, return_type)
    }

    fn weak(&self) -> Weak<dyn System> {
        self.this.clone()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            Err(Error::Disposed)
        } else {
            Ok(())
        }
    }

    /// Logs a recoverable failure and reduces it to a status.
    fn report(&self, operation: &str, error: &Error) -> Status {
        log::warn!("{} failed - {}", operation, error);
        error.status()
    }

    fn create_thread(&self, runnable: &Arc<dyn Runnable>, spawned: bool) -> Arc<HostThread> {
        let id = next_thread_id();
        let thread = Arc::new(HostThread::new(
            id,
            format!("{}-{}", self.config.thread_name_prefix, id.value()),
            Arc::clone(runnable),
            spawned,
            Arc::downgrade(&self.threads),
            self.weak(),
        ));

        let handle: Arc<dyn Thread> = thread.clone();
        runnable.attach(ThreadHandle::new(&handle));
        self.threads.insert(id, Arc::clone(&thread));
        thread
    }

    fn spawn(&self, runnable: Arc<dyn Runnable>) -> Result<ThreadId> {
        self.ensure_live()?;

        let thread = self.create_thread(&runnable, true);
        let id = thread.id();
        if let Err(error) = HostThread::launch(&thread, self.config.thread_stack_size) {
            self.threads.remove(&id);
            return Err(Error::ThreadSpawn(error));
        }

        log::debug!("{} started as '{}'", id, thread.name());
        Ok(id)
    }

    fn bind(&self, runnable: Arc<dyn Runnable>) -> Result<ThreadId> {
        self.ensure_live()?;
        if let Some(existing) = current() {
            return Err(Error::AlreadyAttached(existing.id()));
        }

        let thread = self.create_thread(&runnable, false);
        let handle: Arc<dyn Thread> = thread.clone();
        bind_current(ThreadHandle::new(&handle));

        log::debug!("{} attached to the calling host thread", thread.id());
        Ok(thread.id())
    }
}

impl Allocator for HostSystem {
    fn try_allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.allocator.try_allocate(size)
    }

    fn allocate(&self, size: usize) -> NonNull<u8> {
        self.allocator.try_allocate(size).unwrap_or_else(|| {
            log::error!(
                "heap exhausted allocating {} bytes ({} live)",
                size,
                self.allocator.stats().live_bytes
            );
            crate::fatal::abort(self)
        })
    }

    unsafe fn free(&self, block: NonNull<u8>) {
        self.allocator.free(block);
    }
}

impl System for HostSystem {
    fn success(&self, status: Status) -> bool {
        status.is_ok()
    }

    fn attach(&self, runnable: Arc<dyn Runnable>) -> Status {
        match self.bind(runnable) {
            Ok(_) => Status::OK,
            Err(error) => self.report("attach", &error),
        }
    }

    fn start(&self, runnable: Arc<dyn Runnable>) -> Status {
        match self.spawn(runnable) {
            Ok(_) => Status::OK,
            Err(error) => self.report("start", &error),
        }
    }

    fn make(&self) -> std::result::Result<Arc<dyn Monitor>, Status> {
        let system = self
            .ensure_live()
            .and_then(|()| self.this.upgrade().ok_or(Error::Disposed))
            .map_err(|error| self.report("make", &error))?;

        Ok(Arc::new(HostMonitor::new(system)))
    }

    unsafe fn call(
        &self,
        function: NonNull<c_void>,
        arguments: &[usize],
        types: &[NativeType],
        size: usize,
        return_type: NativeType,
    ) -> u64 {
        match self.try_call(function, arguments, types, size, return_type) {
            Ok(value) => value,
            Err(error) => {
                log::error!("native call to {:p} failed - {}", function, error);
                crate::fatal::abort(self)
            }
        }
    }

    fn load(
        &self,
        name: Option<&str>,
        next: Option<Box<dyn Library>>,
    ) -> std::result::Result<Box<dyn Library>, LoadFailure> {
        let opened = self.ensure_live().and_then(|()| {
            HostLibrary::open(name, &self.config.library_search_paths, self.config.load_flags)
        });

        match opened {
            Ok(library) => Ok(Box::new(library.with_next(next))),
            Err(error) => Err(LoadFailure::new(self.report("load", &error), next)),
        }
    }

    fn current_thread(&self) -> Option<Arc<dyn Thread>> {
        current()
            .filter(|handle| self.threads.contains_key(&handle.id()))
            .and_then(|handle| handle.upgrade())
    }

    fn exit(&self, code: i32) -> ! {
        log::debug!("exiting with code {}", code);
        std::process::exit(code)
    }

    fn abort(&self) {
        log::error!("aborting process");
        std::process::abort()
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            log::warn!("system disposed more than once");
            return;
        }

        for entry in self.threads.iter() {
            log::warn!(
                "{} ({}) still registered at dispose in state {:?}",
                entry.key(),
                entry.value().name(),
                entry.value().state()
            );
        }
        self.threads.clear();

        let stats = self.allocator.stats();
        log::debug!(
            "system disposed: {} allocations, {} frees, peak {} bytes, {} bytes live",
            stats.allocations,
            stats.frees,
            stats.peak_bytes,
            stats.live_bytes
        );
    }
}

impl std::fmt::Debug for HostSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSystem")
            .field("config", &self.config)
            .field("threads", &self.threads.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
