//! Opaque result codes of the factory operations.

use std::fmt;

use crate::{native::Library, Error};

// Internal codes are negative so they never collide with host error numbers.
const ALREADY_ATTACHED: isize = -1;
const LIBRARY_LOAD: isize = -2;
const MARSHAL: isize = -3;
const CALL_INTERFACE: isize = -4;
const DISPOSED: isize = -5;
const THREAD_SPAWN: isize = -6;

/// Result code of [`crate::System::attach`], [`crate::System::start`],
/// [`crate::System::make`] and [`crate::System::load`].
///
/// Test it with [`crate::System::success`]. The encoding is private; the host
/// error number is preserved where the failure came from the host.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(isize);

impl Status {
    /// The success code.
    pub const OK: Status = Status(0);

    pub(crate) fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// The host error number behind this status, if any.
    #[must_use]
    pub fn os_error(self) -> Option<i32> {
        (self.0 > 0).then(|| i32::try_from(self.0).unwrap_or(i32::MAX))
    }
}

impl From<&Error> for Status {
    fn from(error: &Error) -> Self {
        if let Some(code) = error.raw_os_error().filter(|code| *code > 0) {
            return Status(code as isize);
        }

        Status(match error {
            Error::ThreadSpawn(_) => THREAD_SPAWN,
            Error::AlreadyAttached(_) => ALREADY_ATTACHED,
            Error::LibraryLoad { .. } => LIBRARY_LOAD,
            Error::Marshal { .. } | Error::VoidArgument { .. } => MARSHAL,
            Error::CallInterface(_) => CALL_INTERFACE,
            Error::Disposed => DISPOSED,
        })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => write!(f, "ok"),
            code if code > 0 => write!(f, "os error {code}"),
            ALREADY_ATTACHED => write!(f, "thread already attached"),
            LIBRARY_LOAD => write!(f, "library load failed"),
            MARSHAL => write!(f, "argument marshaling failed"),
            CALL_INTERFACE => write!(f, "call interface rejected"),
            DISPOSED => write!(f, "system disposed"),
            THREAD_SPAWN => write!(f, "thread spawn failed"),
            code => write!(f, "status {code}"),
        }
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status({self})")
    }
}

/// Failure of [`crate::System::load`].
///
/// Carries the status and hands back the chain that was passed in, so a failed
/// load never loses the libraries opened before it.
pub struct LoadFailure {
    status: Status,
    next: Option<Box<dyn Library>>,
}

impl LoadFailure {
    pub(crate) fn new(status: Status, next: Option<Box<dyn Library>>) -> Self {
        LoadFailure { status, next }
    }

    /// Why the load failed.
    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Takes back the chain that was passed to `load`.
    #[must_use]
    pub fn into_next(self) -> Option<Box<dyn Library>> {
        self.next
    }
}

impl fmt::Debug for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadFailure")
            .field("status", &self.status)
            .field("next", &self.next.as_ref().map(|next| next.name()))
            .finish()
    }
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to load library: {}", self.status)
    }
}

impl std::error::Error for LoadFailure {}
