//! Native interop: library loading and call dispatch.
//!
//! The class loader opens libraries through [`crate::System::load`] and binds
//! native methods with [`Library::resolve`] or [`resolve_in_chain`]. The
//! interpreter invokes the resolved addresses through [`crate::System::call`],
//! describing each argument with a [`NativeType`].
//!
//! # Example
//!
//! ```rust,no_run
//! use vmsys::prelude::*;
//! use vmsys::native::ArgumentList;
//!
//! let system = make_system(64 * 1024 * 1024);
//! let libc = system.load(None, None).ok().expect("executable image");
//! let strlen = libc.resolve("strlen").expect("strlen");
//!
//! let text = b"hello\0";
//! let mut args = ArgumentList::new();
//! args.push_ptr(text.as_ptr());
//!
//! let length = unsafe {
//!     system.call(strlen, args.slots(), args.types(), args.size(), NativeType::Pointer)
//! };
//! assert_eq!(length, 5);
//! ```

mod call;
mod library;
mod types;

pub use call::{check_arguments, dispatch, ArgumentList};
pub use library::{resolve_in_chain, HostLibrary, LoadFlags, Library};
pub use types::{NativeType, WORD_SIZE};
