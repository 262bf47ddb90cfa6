//! The process-wide system object.
//!
//! A runtime creates one [`System`] at startup with [`make_system`] and uses it
//! for the life of the process. It is the raw memory provider of the garbage
//! collector, the only factory for [`crate::Thread`]s, [`crate::Monitor`]s and
//! [`crate::Library`] chains, and the gateway for native calls and process
//! termination.
//!
//! # Failure Reporting
//!
//! Factory operations report a [`Status`] (or carry one in their error), tested
//! with [`System::success`]. Failures above this layer cannot be repaired, such as
//! heap exhaustion in [`crate::Allocator::allocate`] or a malformed
//! [`System::call`], terminate the process.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vmsys::prelude::*;
//!
//! let system = make_system(16 * 1024 * 1024);
//!
//! let task = Arc::new(Task::new(|state| {
//!     assert!(state.thread().is_some());
//! }));
//! let status = system.start(task.clone());
//! assert!(system.success(status));
//!
//! let thread = task.state().thread().unwrap();
//! thread.join();
//! thread.dispose();
//! system.dispose();
//! ```

mod config;
mod host;
mod status;

pub use config::{SystemConfig, DEFAULT_HEAP_SIZE};
pub use host::{make_system, make_system_with_config, HostSystem};
pub use status::{LoadFailure, Status};

use std::{ffi::c_void, ptr::NonNull, sync::Arc};

use crate::{
    memory::Allocator,
    native::{Library, NativeType},
    sync::Monitor,
    thread::{Runnable, Thread},
};

/// Operating-system services required by the runtime.
///
/// Also the runtime's raw memory provider through its [`Allocator`] supertrait.
pub trait System: Allocator {
    /// Returns `true` if `status` reports success. Pure; no side effects.
    fn success(&self, status: Status) -> bool;

    /// Binds the calling host thread to `runnable` as a new [`Thread`].
    ///
    /// The thread is not started; the caller continues to execute on it.
    /// Fails if the calling host thread is already attached.
    fn attach(&self, runnable: Arc<dyn Runnable>) -> Status;

    /// Spawns a host thread that executes `runnable`.
    ///
    /// [`Runnable::attach`] is called before the thread begins executing. The
    /// status reports only whether the thread could be created.
    fn start(&self, runnable: Arc<dyn Runnable>) -> Status;

    /// Creates a free [`Monitor`].
    ///
    /// # Errors
    ///
    /// Returns the failure status if no monitor can be created.
    fn make(&self) -> Result<Arc<dyn Monitor>, Status>;

    /// Invokes the native `function` and returns its result widened to 64 bits.
    ///
    /// `arguments` holds the raw slots, `types` one tag per argument and `size`
    /// the byte size of the slots. There is no separate count: the number of
    /// arguments is `types.len()`, which differs from `arguments.len()` when a
    /// 64-bit argument spans two slots. Arguments that do not match their tags
    /// terminate the process.
    ///
    /// # Safety
    ///
    /// `function` must have the C signature described by `types` and
    /// `return_type`, taking exactly `types.len()` arguments, and every pointer
    /// argument must be valid for it.
    unsafe fn call(
        &self,
        function: NonNull<c_void>,
        arguments: &[usize],
        types: &[NativeType],
        size: usize,
        return_type: NativeType,
    ) -> u64;

    /// Opens the library `name` (the executable image for `None`) ahead of `next`.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadFailure`] that hands `next` back to the caller.
    fn load(
        &self,
        name: Option<&str>,
        next: Option<Box<dyn Library>>,
    ) -> Result<Box<dyn Library>, LoadFailure>;

    /// The thread bound to the calling host thread by `start` or `attach`.
    fn current_thread(&self) -> Option<Arc<dyn Thread>>;

    /// Terminates the process with `code`. No cleanup beyond the host's.
    fn exit(&self, code: i32) -> !;

    /// Terminates the process abnormally. Must not return.
    fn abort(&self);

    /// Releases the system. Nothing may be created through it afterwards.
    fn dispose(&self);
}
