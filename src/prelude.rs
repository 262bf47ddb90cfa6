//! # vmsys Prelude
//!
//! The traits and entry points a runtime touches on every path. Importing the
//! traits is what makes their methods callable on `Arc<HostSystem>` and the
//! trait objects the system hands out.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all vmsys operations
pub use crate::Error;

/// The result type used throughout vmsys
pub use crate::Result;

/// Opaque result code of the factory operations
pub use crate::{LoadFailure, Status};

// ================================================================================================
// Entry Points
// ================================================================================================

/// System construction
pub use crate::{make_system, make_system_with_config, HostSystem, SystemConfig};

// ================================================================================================
// Capability Traits
// ================================================================================================

/// The operating-system services and raw memory contracts
pub use crate::{Allocator, System};

/// Threads and units of work
pub use crate::{Runnable, Thread, ThreadId};

/// Monitors
pub use crate::Monitor;

/// Native libraries and calls
pub use crate::{Library, NativeType};

// ================================================================================================
// Helpers
// ================================================================================================

/// Building blocks for runnables
pub use crate::{RunnableState, Task};
