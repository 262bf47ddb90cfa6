//! Native type tags used to describe call signatures.

use strum::{Display, EnumCount, EnumIter, FromRepr};

/// Size of one argument slot in bytes.
pub const WORD_SIZE: usize = std::mem::size_of::<usize>();

/// Type tag of one argument or of a return value in a native call.
///
/// The discriminants are stable and match the values the interpreter stores in
/// compiled call descriptors, so tags can be recovered with [`NativeType::from_repr`].
///
/// Aggregates have no tag: a single tag cannot describe a struct's layout, and
/// by-value structs are passed by the interpreter as a [`NativeType::Pointer`]
/// to a caller-owned copy.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display, EnumIter, EnumCount, FromRepr)]
#[repr(u8)]
pub enum NativeType {
    /// No value. Only valid as a return type.
    Void = 0,
    /// Signed 8-bit integer.
    Int8 = 1,
    /// Signed 16-bit integer.
    Int16 = 2,
    /// Signed 32-bit integer.
    Int32 = 3,
    /// Signed 64-bit integer.
    Int64 = 4,
    /// IEEE-754 single precision.
    Float = 5,
    /// IEEE-754 double precision.
    Double = 6,
    /// Data or code address.
    Pointer = 7,
}

impl NativeType {
    /// Number of bytes a value of this type occupies in native memory.
    #[must_use]
    pub const fn byte_size(self) -> usize {
        match self {
            NativeType::Void => 0,
            NativeType::Int8 => 1,
            NativeType::Int16 => 2,
            NativeType::Int32 | NativeType::Float => 4,
            NativeType::Int64 | NativeType::Double => 8,
            NativeType::Pointer => WORD_SIZE,
        }
    }

    /// Number of argument slots a value of this type consumes.
    ///
    /// 64-bit kinds span two slots on 32-bit hosts, low word first.
    #[must_use]
    pub const fn slots(self) -> usize {
        match self {
            NativeType::Void => 0,
            _ => self.byte_size().div_ceil(WORD_SIZE),
        }
    }

    /// Returns `true` for the floating-point kinds.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, NativeType::Float | NativeType::Double)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_repr_roundtrip() {
        for kind in NativeType::iter() {
            assert_eq!(NativeType::from_repr(kind as u8), Some(kind));
        }
        assert_eq!(NativeType::from_repr(NativeType::COUNT as u8), None);
    }

    #[test]
    fn test_slot_counts() {
        assert_eq!(NativeType::Void.slots(), 0);
        assert_eq!(NativeType::Int8.slots(), 1);
        assert_eq!(NativeType::Int32.slots(), 1);
        assert_eq!(NativeType::Float.slots(), 1);
        assert_eq!(NativeType::Pointer.slots(), 1);

        let wide = if WORD_SIZE == 8 { 1 } else { 2 };
        assert_eq!(NativeType::Int64.slots(), wide);
        assert_eq!(NativeType::Double.slots(), wide);
    }

    #[test]
    fn test_display() {
        assert_eq!(NativeType::Int32.to_string(), "Int32");
        assert_eq!(NativeType::Pointer.to_string(), "Pointer");
    }
}
