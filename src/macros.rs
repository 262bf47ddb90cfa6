#![allow(unused_macros)]

/// Aborts through the given system when the condition does not hold, in every build.
///
/// The condition and source location are logged at `error` level first.
///
/// ```rust, ignore
///  sys_expect!(self.system, state.owner == Some(id), "release by non-owner {}", id);
/// ```
macro_rules! sys_expect {
    ($system:expr, $cond:expr) => {
        sys_expect!($system, $cond, "{}", stringify!($cond))
    };
    ($system:expr, $cond:expr, $($arg:tt)+) => {
        if !$cond {
            log::error!(
                "invariant violated at {}:{}: {}",
                file!(),
                line!(),
                format_args!($($arg)+)
            );
            $crate::fatal::abort(&*$system)
        }
    };
}

/// Like [`sys_expect!`] in checked builds, compiled out when `debug_assertions` is off.
///
/// ```rust, ignore
///  sys_assert!(self.system, state.waiters.is_empty());
/// ```
macro_rules! sys_assert {
    ($system:expr, $($arg:tt)+) => {
        if cfg!(debug_assertions) {
            sys_expect!($system, $($arg)+);
        }
    };
}
