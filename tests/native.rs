//! Integration tests for library loading and native call dispatch.

use std::{ffi::c_void, ptr::NonNull, sync::Arc};

use vmsys::{native::ArgumentList, prelude::*, resolve_in_chain};

fn system() -> Arc<HostSystem> {
    let _ = env_logger::builder().is_test(true).try_init();
    make_system(16 * 1024 * 1024)
}

extern "C" fn scale(value: f32, factor: f64) -> f64 {
    f64::from(value) * factor
}

extern "C" fn halve(value: f32) -> f32 {
    value / 2.0
}

extern "C" fn wide_sum(a: i64, b: i32, c: i64) -> i64 {
    a + i64::from(b) + c
}

extern "C" fn narrow(value: i32) -> i16 {
    value as i16
}

fn code(function: *const ()) -> NonNull<c_void> {
    NonNull::new(function as *mut c_void).unwrap()
}

#[test]
fn test_float_and_double_through_system() {
    let system = system();

    let mut args = ArgumentList::new();
    args.push_f32(1.5).push_f64(4.0);
    let bits = unsafe {
        system.call(
            code(scale as *const ()),
            args.slots(),
            args.types(),
            args.size(),
            NativeType::Double,
        )
    };
    assert_eq!(f64::from_bits(bits), 6.0);

    let mut args = ArgumentList::new();
    args.push_f32(-3.0);
    let bits = unsafe {
        system.call(
            code(halve as *const ()),
            args.slots(),
            args.types(),
            args.size(),
            NativeType::Float,
        )
    };
    assert_eq!(bits >> 32, 0);
    assert_eq!(f32::from_bits(bits as u32), -1.5);
}

#[test]
fn test_int64_arguments_span_slots() {
    let system = system();

    let mut args = ArgumentList::new();
    args.push_i64(-(1 << 40)).push_i32(7).push_i64(1 << 41);
    let value = unsafe {
        system.call(
            code(wide_sum as *const ()),
            args.slots(),
            args.types(),
            args.size(),
            NativeType::Int64,
        )
    };
    assert_eq!(value as i64, (1 << 40) + 7);
}

#[test]
fn test_narrow_return_is_sign_extended() {
    let system = system();

    let mut args = ArgumentList::new();
    args.push_i32(0x1_8000);
    let value = unsafe {
        system.try_call(
            code(narrow as *const ()),
            args.slots(),
            args.types(),
            args.size(),
            NativeType::Int16,
        )
    }
    .unwrap();
    assert_eq!(value, i16::MIN as i64 as u64);
}

#[test]
fn test_try_call_rejects_size_mismatch() {
    let system = system();

    let mut args = ArgumentList::new();
    args.push_i32(1);
    let result = unsafe {
        system.try_call(
            code(narrow as *const ()),
            args.slots(),
            args.types(),
            args.size() + 1,
            NativeType::Int16,
        )
    };
    assert!(matches!(result, Err(Error::Marshal { .. })));
}

#[cfg(unix)]
mod libc_image {
    use super::*;

    #[test]
    fn test_resolve_known_and_fabricated_symbols() {
        let system = system();
        let image = system.load(None, None).unwrap();

        assert_eq!(image.name(), None);
        assert!(image.resolve("strlen").is_some());
        assert!(image.resolve("malloc").is_some());
        assert!(image.resolve("vmsys_fabricated_symbol_8c1e").is_none());
        // Names are case-sensitive
        assert!(image.resolve("STRLEN").is_none());

        image.dispose();
    }

    #[test]
    fn test_call_strlen() {
        let system = system();
        let image = system.load(None, None).unwrap();
        let strlen = image.resolve("strlen").unwrap();

        let text = b"managed runtime\0";
        let mut args = ArgumentList::new();
        args.push_ptr(text.as_ptr());
        let length = unsafe {
            system.call(strlen, args.slots(), args.types(), args.size(), NativeType::Pointer)
        };
        assert_eq!(length, 15);

        image.dispose();
    }

    #[test]
    fn test_call_malloc_and_free() {
        let system = system();
        let image = system.load(None, None).unwrap();
        let malloc = image.resolve("malloc").unwrap();
        let free = image.resolve("free").unwrap();

        let mut args = ArgumentList::new();
        args.push(NativeType::Pointer, 64);
        let block = unsafe {
            system.call(malloc, args.slots(), args.types(), args.size(), NativeType::Pointer)
        };
        assert_ne!(block, 0);

        let mut args = ArgumentList::new();
        args.push(NativeType::Pointer, block);
        let result =
            unsafe { system.call(free, args.slots(), args.types(), args.size(), NativeType::Void) };
        assert_eq!(result, 0);

        image.dispose();
    }

    #[test]
    fn test_call_abs() {
        let system = system();
        let image = system.load(None, None).unwrap();
        let abs = image.resolve("abs").unwrap();

        let mut args = ArgumentList::new();
        args.push_i32(-42);
        let value =
            unsafe { system.call(abs, args.slots(), args.types(), args.size(), NativeType::Int32) };
        assert_eq!(value, 42);

        image.dispose();
    }

    #[test]
    fn test_chain_resolution_prefers_most_recent() {
        let system = system();
        let older = system.load(None, None).unwrap();
        let head = system.load(None, Some(older)).unwrap();

        let (address, supplier) = resolve_in_chain(head.as_ref(), "strlen").unwrap();
        assert_eq!(Some(address), head.resolve("strlen"));
        assert!(std::ptr::addr_eq(supplier, head.as_ref()));
        assert!(head.next().is_some());

        head.dispose();
    }
}

#[test]
fn test_failed_load_keeps_chain() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("libbroken.so"), b"\x7fELF truncated").unwrap();

    let system =
        make_system_with_config(SystemConfig::default().with_library_search_path(dir.path()));
    let head = system.load(None, None).unwrap();

    let failure = system.load(Some("libbroken.so"), Some(head)).unwrap_err();
    assert!(!system.success(failure.status()));

    let head = failure.into_next().expect("chain returned");
    assert!(head.next().is_none());
    head.dispose();
}
