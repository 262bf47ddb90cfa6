//! Fatal-path helpers.
//!
//! Everything in this module ends the process on failure. There is no unwinding
//! and no retry: these helpers guard conditions whose violation leaves the runtime
//! in a state nothing above this layer can repair (corrupted ownership of a monitor,
//! an exhausted allocator, a malformed native call).
//!
//! - [`abort`] - terminate through the [`System`], with a host-level fallback
//! - [`expect`] - abort when a condition is false, in every build
//! - [`assert`] - [`expect`] in checked builds, nothing in release builds

use crate::System;

/// Terminates the process through `system`.
///
/// [`System::abort`] must not return. If a misbehaving backend does return, the
/// process is ended with [`std::process::abort`] so control never continues past
/// this call.
pub fn abort(system: &dyn System) -> ! {
    system.abort();
    std::process::abort()
}

/// Aborts through `system` unless `condition` holds.
///
/// Used for preconditions that must be checked in every build.
#[inline]
pub fn expect(system: &dyn System, condition: bool) {
    if !condition {
        abort(system);
    }
}

/// Checked-build invariant test.
///
/// Identical to [`expect`] when `debug_assertions` are enabled; compiles to nothing
/// otherwise.
#[cfg(debug_assertions)]
#[inline]
pub fn assert(system: &dyn System, condition: bool) {
    expect(system, condition);
}

/// Checked-build invariant test.
///
/// Identical to [`expect`] when `debug_assertions` are enabled; compiles to nothing
/// otherwise.
#[cfg(not(debug_assertions))]
#[inline(always)]
pub fn assert(_system: &dyn System, _condition: bool) {}
