//! System configuration.
//!
//! [`SystemConfig`] collects the knobs of a [`crate::HostSystem`]: heap sizing,
//! host thread parameters and native library lookup.
//!
//! # Presets
//!
//! - [`SystemConfig::new()`] - the heap size as a soft hint, everything else default
//! - [`SystemConfig::strict()`] - the heap size as a hard limit
//!
//! # Example
//!
//! ```rust
//! use vmsys::{make_system_with_config, SystemConfig};
//!
//! let config = SystemConfig::strict(32 * 1024 * 1024)
//!     .with_thread_stack_size(512 * 1024)
//!     .with_thread_name_prefix("worker")
//!     .with_library_search_path("/opt/vm/native");
//! let system = make_system_with_config(config);
//! ```

use std::path::PathBuf;

use crate::native::LoadFlags;

/// Default heap size hint: 64 MB.
pub const DEFAULT_HEAP_SIZE: usize = 64 * 1024 * 1024;

/// Configuration of a [`crate::HostSystem`].
///
/// # Default Values
///
/// | Field | Default Value |
/// |-------|---------------|
/// | `heap_size` | 64 MB |
/// | `enforce_heap_limit` | `false` |
/// | `thread_stack_size` | host default |
/// | `thread_name_prefix` | `"vm-thread"` |
/// | `library_search_paths` | empty |
/// | `load_flags` | `LAZY \| LOCAL` |
#[derive(Clone, Debug)]
pub struct SystemConfig {
    /// Expected heap size in bytes.
    ///
    /// A sizing hint for the allocator; crossing it is logged. Becomes a hard
    /// limit when `enforce_heap_limit` is set.
    pub heap_size: usize,

    /// Whether allocations past `heap_size` fail instead of succeeding.
    pub enforce_heap_limit: bool,

    /// Stack size for spawned threads, `None` for the host default.
    pub thread_stack_size: Option<usize>,

    /// Prefix of host thread names; the thread id is appended.
    pub thread_name_prefix: String,

    /// Directories searched for bare library file names before the host linker's
    /// own search, in order.
    pub library_search_paths: Vec<PathBuf>,

    /// Flags passed to the host linker when opening libraries.
    pub load_flags: LoadFlags,
}

impl Default for SystemConfig {
    /// Creates the default configuration.
    ///
    /// See the struct documentation for default values.
    fn default() -> Self {
        Self {
            heap_size: DEFAULT_HEAP_SIZE,
            enforce_heap_limit: false,
            thread_stack_size: None,
            thread_name_prefix: "vm-thread".to_string(),
            library_search_paths: Vec::new(),
            load_flags: LoadFlags::default(),
        }
    }
}

impl SystemConfig {
    /// Default configuration with a heap size hint of `heap_size` bytes.
    #[must_use]
    pub fn new(heap_size: usize) -> Self {
        Self {
            heap_size,
            ..Default::default()
        }
    }

    /// Configuration that refuses allocations beyond `heap_size` bytes.
    #[must_use]
    pub fn strict(heap_size: usize) -> Self {
        Self {
            heap_size,
            enforce_heap_limit: true,
            ..Default::default()
        }
    }

    /// The hard heap limit, if one is enforced.
    #[must_use]
    pub fn heap_limit(&self) -> Option<usize> {
        self.enforce_heap_limit.then_some(self.heap_size)
    }

    /// Sets the heap size.
    ///
    /// # Returns
    ///
    /// Returns `self` for method chaining.
    #[must_use]
    pub fn with_heap_size(mut self, bytes: usize) -> Self {
        self.heap_size = bytes;
        self
    }

    /// Enables or disables the hard heap limit.
    #[must_use]
    pub fn with_heap_limit(mut self, enforce: bool) -> Self {
        self.enforce_heap_limit = enforce;
        self
    }

    /// Sets the stack size of spawned threads.
    #[must_use]
    pub fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = Some(bytes);
        self
    }

    /// Sets the host thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Appends a library search directory.
    #[must_use]
    pub fn with_library_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_search_paths.push(dir.into());
        self
    }

    /// Sets the library open flags.
    #[must_use]
    pub fn with_load_flags(mut self, flags: LoadFlags) -> Self {
        self.load_flags = flags;
        self
    }
}
