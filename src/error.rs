use thiserror::Error;

use crate::{native::NativeType, thread::ThreadId};

macro_rules! marshal_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Marshal {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Marshal {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors are the detailed form of a failure. At the [`crate::System`] boundary they are
/// reduced to an opaque [`crate::Status`] (see [`Error::status`]); the detailed error is
/// logged where that reduction happens. Operations with a fallible twin such as
/// [`crate::HostSystem::try_call`] return it directly.
///
/// # Error Categories
///
/// ## Thread Errors
/// - [`Error::ThreadSpawn`] - The host refused to create a thread
/// - [`Error::AlreadyAttached`] - The calling host thread is already bound to a runtime thread
///
/// ## Library Errors
/// - [`Error::LibraryLoad`] - A native library could not be opened
///
/// ## Native Call Errors
/// - [`Error::Marshal`] - Arguments did not match their type tags
/// - [`Error::VoidArgument`] - `Void` used as an argument type
/// - [`Error::CallInterface`] - The call interface could not be prepared
///
/// ## Lifecycle Errors
/// - [`Error::Disposed`] - The system was already disposed
#[derive(Error, Debug)]
pub enum Error {
    /// Creating a host thread failed.
    ///
    /// Wraps the I/O error reported by the host, typically resource
    /// exhaustion (`EAGAIN`) or an invalid stack size.
    #[error("Failed to spawn host thread - {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// The calling host thread is already attached to a runtime thread.
    ///
    /// A host thread can only ever be bound to one [`crate::Thread`].
    #[error("Host thread is already attached as {0}")]
    AlreadyAttached(ThreadId),

    /// A native library could not be opened.
    ///
    /// # Fields
    ///
    /// * `name` - The name or path that was requested (`<main>` for the executable image)
    /// * `source` - The error reported by the dynamic linker
    #[error("Failed to load library '{name}' - {source}")]
    LibraryLoad {
        /// The library name or path that was requested
        name: String,
        /// The dynamic linker error
        #[source]
        source: libloading::Error,
    },

    /// The argument slots do not match the supplied type tags.
    ///
    /// Carries the source location where the mismatch was detected.
    #[error("Marshal - {file}:{line}: {message}")]
    Marshal {
        /// The message to be printed for the Marshal error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// [`NativeType::Void`] was supplied as the type of an argument.
    #[error("Argument {index} has type {kind}, which has no value")]
    VoidArgument {
        /// Position of the offending argument
        index: usize,
        /// The offending type tag
        kind: NativeType,
    },

    /// libffi refused to prepare the call interface.
    #[error("Failed to prepare call interface - {0}")]
    CallInterface(String),

    /// The system was disposed and no longer creates resources.
    #[error("The system has been disposed")]
    Disposed,
}

impl Error {
    /// Returns the host error code carried by this error, if any.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::ThreadSpawn(io) => io.raw_os_error(),
            _ => None,
        }
    }

    /// Reduces this error to the opaque [`crate::Status`] reported by the factory operations.
    #[must_use]
    pub fn status(&self) -> crate::Status {
        crate::Status::from(self)
    }
}
