//! Dynamic library loading.
//!
//! Libraries form a chain, most recently loaded first, that the class loader
//! searches when binding native methods. Each node owns the node behind it, so
//! disposing the head releases the whole chain.

use std::{
    ffi::c_void,
    fmt,
    path::{Path, PathBuf},
    ptr::NonNull,
};

use bitflags::bitflags;

use crate::{Error, Result};

bitflags! {
    /// Flags controlling how the host dynamic linker opens a library.
    ///
    /// Only honoured on Unix hosts; Windows always binds eagerly.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct LoadFlags: u32 {
        /// Resolve symbols when first used
        const LAZY = 0x0001;
        /// Resolve all symbols at load time
        const NOW = 0x0002;
        /// Make symbols available to subsequently loaded libraries
        const GLOBAL = 0x0004;
        /// Keep symbols private to this library
        const LOCAL = 0x0008;
    }
}

impl Default for LoadFlags {
    fn default() -> Self {
        LoadFlags::LAZY | LoadFlags::LOCAL
    }
}

impl LoadFlags {
    /// Translates to `dlopen` mode bits. `NOW` wins over `LAZY`, `GLOBAL` over `LOCAL`.
    #[cfg(unix)]
    fn to_rtld(self) -> std::os::raw::c_int {
        use libloading::os::unix::{RTLD_GLOBAL, RTLD_LAZY, RTLD_LOCAL, RTLD_NOW};

        let binding = if self.contains(LoadFlags::NOW) {
            RTLD_NOW
        } else {
            RTLD_LAZY
        };
        let scope = if self.contains(LoadFlags::GLOBAL) {
            RTLD_GLOBAL
        } else {
            RTLD_LOCAL
        };
        binding | scope
    }
}

/// A node in a chain of opened native libraries.
pub trait Library: Send + Sync + fmt::Debug {
    /// Looks up `function` in this library only.
    ///
    /// The name is matched exactly. Returns `None` if the symbol is absent or
    /// the name cannot be represented as a C string.
    fn resolve(&self, function: &str) -> Option<NonNull<c_void>>;

    /// The name this library was requested under, `None` for the executable image.
    fn name(&self) -> Option<&str>;

    /// The library loaded before this one.
    fn next(&self) -> Option<&dyn Library>;

    /// Closes this library and every library behind it.
    fn dispose(self: Box<Self>);
}

/// Looks up `function` along the chain starting at `head`, most recent first.
///
/// Returns the address together with the library that supplied it.
pub fn resolve_in_chain<'a>(
    head: &'a dyn Library,
    function: &str,
) -> Option<(NonNull<c_void>, &'a dyn Library)> {
    let mut library = Some(head);
    while let Some(current) = library {
        if let Some(address) = current.resolve(function) {
            return Some((address, current));
        }
        library = current.next();
    }
    None
}

/// Finds the file to open for `name`.
///
/// A bare file name is looked up in `search_paths` first; anything else, and a
/// bare name not found there, is left to the host linker's own search.
pub(crate) fn locate(name: &str, search_paths: &[PathBuf]) -> PathBuf {
    if !name.chars().any(std::path::is_separator) {
        if let Some(found) = search_paths
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
        {
            return found;
        }
    }
    PathBuf::from(name)
}

/// [`Library`] opened through the host dynamic linker.
pub struct HostLibrary {
    name: Option<String>,
    path: Option<PathBuf>,
    handle: libloading::Library,
    next: Option<Box<dyn Library>>,
}

impl HostLibrary {
    /// Opens `name`, or the executable image when `name` is `None`.
    ///
    /// The returned library has no successor; see [`HostLibrary::with_next`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::LibraryLoad`] if the host linker rejects the library.
    pub fn open(name: Option<&str>, search_paths: &[PathBuf], flags: LoadFlags) -> Result<Self> {
        let Some(name) = name else {
            return Ok(HostLibrary {
                name: None,
                path: None,
                handle: open_self()?,
                next: None,
            });
        };

        let path = locate(name, search_paths);
        let handle = open_path(&path, flags).map_err(|source| Error::LibraryLoad {
            name: name.to_string(),
            source,
        })?;
        log::debug!("loaded native library '{}' from {}", name, path.display());

        Ok(HostLibrary {
            name: Some(name.to_string()),
            path: Some(path),
            handle,
            next: None,
        })
    }

    /// Links `next` behind this library.
    #[must_use]
    pub fn with_next(mut self, next: Option<Box<dyn Library>>) -> Self {
        self.next = next;
        self
    }

    /// The file that was opened, `None` for the executable image.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(unix)]
fn open_self() -> Result<libloading::Library> {
    Ok(libloading::os::unix::Library::this().into())
}

#[cfg(windows)]
fn open_self() -> Result<libloading::Library> {
    libloading::os::windows::Library::this()
        .map(Into::into)
        .map_err(|source| Error::LibraryLoad {
            name: "<main>".to_string(),
            source,
        })
}

#[cfg(unix)]
fn open_path(path: &Path, flags: LoadFlags) -> std::result::Result<libloading::Library, libloading::Error> {
    unsafe { libloading::os::unix::Library::open(Some(path), flags.to_rtld()).map(Into::into) }
}

#[cfg(windows)]
fn open_path(path: &Path, _flags: LoadFlags) -> std::result::Result<libloading::Library, libloading::Error> {
    unsafe { libloading::Library::new(path) }
}

impl Library for HostLibrary {
    fn resolve(&self, function: &str) -> Option<NonNull<c_void>> {
        let symbol = unsafe { self.handle.get::<*mut c_void>(function.as_bytes()) }.ok()?;
        NonNull::new(*symbol)
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn next(&self) -> Option<&dyn Library> {
        self.next.as_deref()
    }

    fn dispose(self: Box<Self>) {
        let HostLibrary {
            name, handle, next, ..
        } = *self;

        if let Err(error) = handle.close() {
            log::warn!(
                "failed to close native library '{}' - {}",
                name.as_deref().unwrap_or("<main>"),
                error
            );
        }
        if let Some(next) = next {
            next.dispose();
        }
    }
}

impl fmt::Debug for HostLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostLibrary")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("next", &self.next.as_ref().map(|next| next.name()))
            .finish()
    }
}
