//! Native call dispatch.
//!
//! An interpreter hands over a call as three parallel pieces: the raw argument
//! slots, one [`NativeType`] per argument, and the total byte size of the slots.
//! [`dispatch`] validates that the three agree, rebuilds each argument in a
//! typed cell, prepares a libffi call interface for the host's default ABI and
//! invokes the function. The return value comes back widened into a `u64`:
//!
//! | Return type                 | Encoding                          |
//! |-----------------------------|-----------------------------------|
//! | `Int8`, `Int16`, `Int32`    | sign-extended                     |
//! | `Int64`                     | as-is                             |
//! | `Pointer`                   | zero-extended                     |
//! | `Float`                     | IEEE bits, zero-extended          |
//! | `Double`                    | IEEE bits                         |
//! | `Void`                      | `0`                               |
//!
//! # Slot layout
//!
//! Each argument occupies [`NativeType::slots`] consecutive slots. Narrow
//! integers and `Float` live in the low bits of their slot. On 32-bit hosts
//! `Int64` and `Double` span two slots, low word first.

use std::{ffi::c_void, ptr::NonNull};

use libffi::low::{self, ffi_abi_FFI_DEFAULT_ABI, ffi_cif, ffi_type, prep_cif, CodePtr};

use crate::{
    native::{NativeType, WORD_SIZE},
    Error, Result,
};

/// One decoded argument, addressed by libffi through a pointer to the cell.
///
/// Reading through the union keeps narrow values at the address libffi expects
/// on both little- and big-endian hosts.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) union ArgCell {
    int8: i8,
    int16: i16,
    int32: i32,
    int64: i64,
    float: f32,
    double: f64,
    pointer: *mut c_void,
}

impl ArgCell {
    fn decode(kind: NativeType, slots: &[usize]) -> ArgCell {
        match kind {
            NativeType::Int8 => ArgCell {
                int8: slots[0] as i8,
            },
            NativeType::Int16 => ArgCell {
                int16: slots[0] as i16,
            },
            NativeType::Int32 => ArgCell {
                int32: slots[0] as i32,
            },
            NativeType::Int64 => ArgCell {
                int64: wide(slots) as i64,
            },
            NativeType::Float => ArgCell {
                float: f32::from_bits(slots[0] as u32),
            },
            NativeType::Double => ArgCell {
                double: f64::from_bits(wide(slots)),
            },
            NativeType::Pointer => ArgCell {
                pointer: slots[0] as *mut c_void,
            },
            // Rejected before decoding.
            NativeType::Void => ArgCell { int64: 0 },
        }
    }
}

/// Joins the slots of a 64-bit argument.
fn wide(slots: &[usize]) -> u64 {
    match slots {
        [single] => *single as u64,
        [low, high, ..] => (*low as u64 & 0xFFFF_FFFF) | ((*high as u64) << 32),
        [] => 0,
    }
}

/// Splits a 64-bit value into argument slots, low word first.
fn split(bits: u64, slots: usize) -> impl Iterator<Item = usize> {
    (0..slots).map(move |index| (bits >> (index * WORD_SIZE * 8)) as usize)
}

/// Decodes `arguments` according to `types`, checking that every slot is
/// consumed and that `size` matches.
pub(crate) fn marshal(arguments: &[usize], types: &[NativeType], size: usize) -> Result<Vec<ArgCell>> {
    let mut cells = Vec::with_capacity(types.len());
    let mut cursor = 0;

    for (index, &kind) in types.iter().enumerate() {
        if kind == NativeType::Void {
            return Err(Error::VoidArgument { index, kind });
        }

        let needed = kind.slots();
        let Some(slots) = arguments.get(cursor..cursor + needed) else {
            return Err(marshal_error!(
                "Argument {} ({}) needs {} slot(s) at offset {}, but only {} slot(s) were supplied",
                index,
                kind,
                needed,
                cursor,
                arguments.len()
            ));
        };

        cells.push(ArgCell::decode(kind, slots));
        cursor += needed;
    }

    if cursor != arguments.len() {
        return Err(marshal_error!(
            "{} slot(s) supplied but the signature consumes {}",
            arguments.len(),
            cursor
        ));
    }
    if size != cursor * WORD_SIZE {
        return Err(marshal_error!(
            "Declared argument size {} does not match {} slot(s) of {} bytes",
            size,
            cursor,
            WORD_SIZE
        ));
    }

    Ok(cells)
}

/// Validates an argument list without calling anything.
///
/// # Errors
///
/// Returns [`Error::VoidArgument`] if an argument is typed `Void`, and
/// [`Error::Marshal`] if the slots or `size` disagree with `types`.
pub fn check_arguments(arguments: &[usize], types: &[NativeType], size: usize) -> Result<()> {
    marshal(arguments, types, size).map(|_| ())
}

fn ffi_type_of(kind: NativeType) -> *mut ffi_type {
    unsafe {
        match kind {
            NativeType::Void => std::ptr::addr_of_mut!(low::types::void),
            NativeType::Int8 => std::ptr::addr_of_mut!(low::types::sint8),
            NativeType::Int16 => std::ptr::addr_of_mut!(low::types::sint16),
            NativeType::Int32 => std::ptr::addr_of_mut!(low::types::sint32),
            NativeType::Int64 => std::ptr::addr_of_mut!(low::types::sint64),
            NativeType::Float => std::ptr::addr_of_mut!(low::types::float),
            NativeType::Double => std::ptr::addr_of_mut!(low::types::double),
            NativeType::Pointer => std::ptr::addr_of_mut!(low::types::pointer),
        }
    }
}

/// Calls `function` with the marshaled arguments and widens its result.
///
/// # Safety
///
/// `function` must point to a function whose C signature matches `types` and
/// `return_type`, and every pointer argument must be valid for that function.
///
/// # Errors
///
/// Returns the errors of [`check_arguments`], and [`Error::CallInterface`] if
/// libffi cannot prepare the call interface.
pub unsafe fn dispatch(
    function: NonNull<c_void>,
    arguments: &[usize],
    types: &[NativeType],
    size: usize,
    return_type: NativeType,
) -> Result<u64> {
    let mut cells = marshal(arguments, types, size)?;

    let mut arg_types: Vec<*mut ffi_type> = types.iter().map(|&kind| ffi_type_of(kind)).collect();
    let mut cif: ffi_cif = std::mem::zeroed();
    prep_cif(
        &mut cif,
        ffi_abi_FFI_DEFAULT_ABI,
        types.len(),
        ffi_type_of(return_type),
        if arg_types.is_empty() {
            std::ptr::null_mut()
        } else {
            arg_types.as_mut_ptr()
        },
    )
    .map_err(|error| Error::CallInterface(format!("{error:?}")))?;

    let mut values: Vec<*mut c_void> = cells
        .iter_mut()
        .map(|cell| (cell as *mut ArgCell).cast::<c_void>())
        .collect();
    let args = if values.is_empty() {
        std::ptr::null_mut()
    } else {
        values.as_mut_ptr()
    };
    let code = CodePtr::from_ptr(function.as_ptr().cast_const());

    // libffi widens integral results narrower than a word to a full word.
    let result = match return_type {
        NativeType::Void => {
            low::call::<()>(&mut cif, code, args);
            0
        }
        NativeType::Int8 => low::call::<usize>(&mut cif, code, args) as i8 as i64 as u64,
        NativeType::Int16 => low::call::<usize>(&mut cif, code, args) as i16 as i64 as u64,
        NativeType::Int32 => low::call::<usize>(&mut cif, code, args) as i32 as i64 as u64,
        NativeType::Int64 => low::call::<u64>(&mut cif, code, args),
        NativeType::Float => u64::from(low::call::<f32>(&mut cif, code, args).to_bits()),
        NativeType::Double => low::call::<f64>(&mut cif, code, args).to_bits(),
        NativeType::Pointer => low::call::<usize>(&mut cif, code, args) as u64,
    };

    Ok(result)
}

/// Builder for argument slots and their type tags.
///
/// # Example
///
/// ```rust
/// use vmsys::native::{check_arguments, ArgumentList};
///
/// let mut args = ArgumentList::new();
/// args.push_i32(-7).push_f64(0.5).push_i64(1 << 40);
/// assert!(check_arguments(args.slots(), args.types(), args.size()).is_ok());
/// ```
#[derive(Clone, Debug, Default)]
pub struct ArgumentList {
    slots: Vec<usize>,
    types: Vec<NativeType>,
}

impl ArgumentList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an argument of `kind` whose value is the low bits of `bits`.
    ///
    /// `Void` is recorded as a tag without slots, so validation will reject it.
    pub fn push(&mut self, kind: NativeType, bits: u64) -> &mut Self {
        self.slots.extend(split(bits, kind.slots()));
        self.types.push(kind);
        self
    }

    /// Appends an `Int8`.
    pub fn push_i8(&mut self, value: i8) -> &mut Self {
        self.push(NativeType::Int8, value as u64)
    }

    /// Appends an `Int16`.
    pub fn push_i16(&mut self, value: i16) -> &mut Self {
        self.push(NativeType::Int16, value as u64)
    }

    /// Appends an `Int32`.
    pub fn push_i32(&mut self, value: i32) -> &mut Self {
        self.push(NativeType::Int32, value as u64)
    }

    /// Appends an `Int64`.
    pub fn push_i64(&mut self, value: i64) -> &mut Self {
        self.push(NativeType::Int64, value as u64)
    }

    /// Appends a `Float`.
    pub fn push_f32(&mut self, value: f32) -> &mut Self {
        self.push(NativeType::Float, u64::from(value.to_bits()))
    }

    /// Appends a `Double`.
    pub fn push_f64(&mut self, value: f64) -> &mut Self {
        self.push(NativeType::Double, value.to_bits())
    }

    /// Appends a `Pointer`.
    pub fn push_ptr<T>(&mut self, value: *const T) -> &mut Self {
        self.push(NativeType::Pointer, value as usize as u64)
    }

    /// The raw argument slots.
    #[must_use]
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    /// The type tag of each argument.
    #[must_use]
    pub fn types(&self) -> &[NativeType] {
        &self.types
    }

    /// Total size of the slots in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.slots.len() * WORD_SIZE
    }
}
