// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
#![allow(clippy::too_many_arguments)]
// unsafe is confined to:
// - 'memory/allocator.rs' for raw block headers
// - 'native/call.rs' for libffi dispatch
// - 'native/library.rs' for dlopen/dlsym

//! # vmsys
//!
//! The operating-system abstraction layer of a managed-code runtime. Everything the
//! interpreter, garbage collector and class loader need from the host goes through
//! one [`System`] object:
//!
//! - **Raw memory** - [`Allocator::try_allocate`], [`Allocator::allocate`], [`Allocator::free`]
//! - **Threads** - [`System::start`] and [`System::attach`] bind a [`Runnable`] to a [`Thread`]
//! - **Monitors** - [`System::make`] creates reentrant locks with condition variables
//! - **Native libraries** - [`System::load`] builds a chain of [`Library`] objects
//! - **Native calls** - [`System::call`] invokes a resolved function with dynamically typed arguments
//! - **Termination** - [`System::exit`] and [`System::abort`]
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use vmsys::prelude::*;
//!
//! let system = make_system(64 * 1024 * 1024);
//!
//! // Raw memory for the heap
//! let block = system.allocate(4096);
//! unsafe { system.free(block) };
//!
//! // A monitor shared between two threads
//! let monitor = system.make().expect("monitor");
//! let task = {
//!     let monitor = Arc::clone(&monitor);
//!     Arc::new(Task::new(move |state| {
//!         let me = state.thread().expect("attached");
//!         monitor.acquire(&*me);
//!         monitor.notify_all(&*me);
//!         monitor.release(&*me);
//!     }))
//! };
//!
//! let status = system.start(task.clone());
//! assert!(system.success(status));
//!
//! let thread = task.state().thread().expect("started");
//! thread.join();
//! thread.dispose();
//! monitor.dispose();
//! system.dispose();
//! ```
//!
//! ## Architecture
//!
//! - [`memory`] - the [`Allocator`] contract and [`HostAllocator`]
//! - [`thread`] - [`Thread`], [`Runnable`] and the host thread model
//! - [`sync`] - the [`Monitor`] contract and [`HostMonitor`]
//! - [`native`] - [`Library`] loading and native call dispatch
//! - [`system`] - the [`System`] contract, [`HostSystem`] and [`SystemConfig`]
//! - [`fatal`] - process-terminating assertion helpers
//!
//! ## Error Handling
//!
//! Failures come in two kinds. Recoverable ones are reported as a [`Status`] by
//! the factory operations and logged at `warn` level; the detailed [`Error`] is
//! available through the fallible twins such as [`HostSystem::try_call`].
//! Unrecoverable ones (heap exhaustion in `allocate`, violated invariants, a
//! malformed native call) are logged at `error` level and abort the process.
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade; install any logger to see thread
//! lifecycle and library loading at `debug` level.
#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use vmsys::prelude::*;
///
/// let system = make_system(1024 * 1024);
/// let monitor = system.make().unwrap();
/// assert_eq!(monitor.owner(), None);
/// ```
pub mod prelude;

pub mod fatal;
pub mod memory;
pub mod native;
pub mod sync;
pub mod system;
pub mod thread;

/// `vmsys` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

pub use error::Error;

pub use memory::{Allocator, AllocatorStats, HostAllocator};
pub use native::{resolve_in_chain, HostLibrary, Library, LoadFlags, NativeType};
pub use sync::{HostMonitor, Monitor};
pub use system::{
    make_system, make_system_with_config, HostSystem, LoadFailure, Status, System, SystemConfig,
};
pub use thread::{Runnable, RunnableState, Task, Thread, ThreadHandle, ThreadId, ThreadState};
