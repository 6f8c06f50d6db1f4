//! Field types and runtime values.

use std::collections::BTreeMap;

use crate::error::{CodecError, Result};

/// Wire field types.
///
/// The discriminant is the `type:u8` byte of the packed form. Fixed-width
/// integers come in both endiannesses including the 24- and 48-bit widths;
/// fixed byte blobs cover sizes 1–8, 16, 32, and 64; the three variable
/// types carry a `u16` BE length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    /// Unsigned 8-bit integer.
    UInt8 = 0,
    /// Signed 8-bit integer.
    Int8 = 1,
    /// Unsigned 16-bit big-endian.
    UInt16BE = 2,
    /// Unsigned 16-bit little-endian.
    UInt16LE = 3,
    /// Signed 16-bit big-endian.
    Int16BE = 4,
    /// Signed 16-bit little-endian.
    Int16LE = 5,
    /// Unsigned 24-bit big-endian.
    UInt24BE = 6,
    /// Unsigned 24-bit little-endian.
    UInt24LE = 7,
    /// Unsigned 32-bit big-endian.
    UInt32BE = 8,
    /// Unsigned 32-bit little-endian.
    UInt32LE = 9,
    /// Signed 32-bit big-endian.
    Int32BE = 10,
    /// Signed 32-bit little-endian.
    Int32LE = 11,
    /// Signed 24-bit big-endian.
    Int24BE = 12,
    /// Signed 24-bit little-endian.
    Int24LE = 13,
    /// Unsigned 48-bit big-endian.
    UInt48BE = 14,
    /// Unsigned 48-bit little-endian.
    UInt48LE = 15,
    /// Signed 48-bit big-endian.
    Int48BE = 16,
    /// Signed 48-bit little-endian.
    Int48LE = 17,
    /// Unsigned 64-bit big-endian.
    UInt64BE = 18,
    /// Unsigned 64-bit little-endian.
    UInt64LE = 19,
    /// Signed 64-bit big-endian.
    Int64BE = 20,
    /// Signed 64-bit little-endian.
    Int64LE = 21,
    /// Fixed 1-byte blob.
    Bytes1 = 22,
    /// Fixed 2-byte blob.
    Bytes2 = 23,
    /// Fixed 3-byte blob.
    Bytes3 = 24,
    /// Fixed 4-byte blob.
    Bytes4 = 25,
    /// Fixed 5-byte blob.
    Bytes5 = 26,
    /// Fixed 6-byte blob.
    Bytes6 = 27,
    /// Fixed 7-byte blob.
    Bytes7 = 28,
    /// Fixed 8-byte blob.
    Bytes8 = 29,
    /// Fixed 16-byte blob.
    Bytes16 = 30,
    /// Fixed 32-byte blob.
    Bytes32 = 31,
    /// Fixed 64-byte blob.
    Bytes64 = 32,
    /// Variable-length byte blob.
    Bytes = 33,
    /// Variable-length UTF-8 string.
    String = 34,
    /// Nested sub-schema, packed as a variable-length blob.
    Schema = 35,
}

impl FieldType {
    /// Parse a wire type byte.
    pub fn from_u8(index: u8, type_byte: u8) -> Result<Self> {
        use FieldType::*;
        Ok(match type_byte {
            0 => UInt8,
            1 => Int8,
            2 => UInt16BE,
            3 => UInt16LE,
            4 => Int16BE,
            5 => Int16LE,
            6 => UInt24BE,
            7 => UInt24LE,
            8 => UInt32BE,
            9 => UInt32LE,
            10 => Int32BE,
            11 => Int32LE,
            12 => Int24BE,
            13 => Int24LE,
            14 => UInt48BE,
            15 => UInt48LE,
            16 => Int48BE,
            17 => Int48LE,
            18 => UInt64BE,
            19 => UInt64LE,
            20 => Int64BE,
            21 => Int64LE,
            22 => Bytes1,
            23 => Bytes2,
            24 => Bytes3,
            25 => Bytes4,
            26 => Bytes5,
            27 => Bytes6,
            28 => Bytes7,
            29 => Bytes8,
            30 => Bytes16,
            31 => Bytes32,
            32 => Bytes64,
            33 => Bytes,
            34 => String,
            35 => Schema,
            other => return Err(CodecError::UnknownType {
                index,
                type_byte: other,
            }),
        })
    }

    /// Wire byte of this type.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Value width of a fixed-size type; `None` for variable types.
    #[must_use]
    pub fn fixed_size(self) -> Option<usize> {
        use FieldType::*;
        match self {
            UInt8 | Int8 | Bytes1 => Some(1),
            UInt16BE | UInt16LE | Int16BE | Int16LE | Bytes2 => Some(2),
            UInt24BE | UInt24LE | Int24BE | Int24LE | Bytes3 => Some(3),
            UInt32BE | UInt32LE | Int32BE | Int32LE | Bytes4 => Some(4),
            Bytes5 => Some(5),
            UInt48BE | UInt48LE | Int48BE | Int48LE | Bytes6 => Some(6),
            Bytes7 => Some(7),
            UInt64BE | UInt64LE | Int64BE | Int64LE | Bytes8 => Some(8),
            Bytes16 => Some(16),
            Bytes32 => Some(32),
            Bytes64 => Some(64),
            Bytes | String | Schema => None,
        }
    }

    /// Whether the packed form carries a `u16` BE length prefix.
    #[must_use]
    pub fn is_variable(self) -> bool {
        self.fixed_size().is_none()
    }

    /// Whether this is an unsigned integer type.
    #[must_use]
    pub fn is_unsigned(self) -> bool {
        use FieldType::*;
        matches!(
            self,
            UInt8 | UInt16BE | UInt16LE | UInt24BE | UInt24LE | UInt32BE | UInt32LE | UInt48BE
                | UInt48LE | UInt64BE | UInt64LE
        )
    }

    /// Whether this is a signed integer type.
    #[must_use]
    pub fn is_signed(self) -> bool {
        use FieldType::*;
        matches!(
            self,
            Int8 | Int16BE | Int16LE | Int24BE | Int24LE | Int32BE | Int32LE | Int48BE | Int48LE
                | Int64BE | Int64LE
        )
    }

    /// Whether this is a big-endian integer type.
    #[must_use]
    pub(crate) fn is_big_endian(self) -> bool {
        use FieldType::*;
        matches!(
            self,
            UInt16BE | Int16BE | UInt24BE | Int24BE | UInt32BE | Int32BE | UInt48BE | Int48BE
                | UInt64BE | Int64BE
        )
    }
}

/// A property bag keyed by field index.
///
/// Ordered so that packing walks ascending indices for free.
pub type Props = BTreeMap<u8, Value>;

/// A runtime field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Unsigned integer (any unsigned width).
    UInt(u64),
    /// Signed integer (any signed width).
    Int(i64),
    /// Byte blob, fixed or variable. Also carries a pre-packed sub-schema.
    Bytes(Vec<u8>),
    /// UTF-8 string.
    String(String),
    /// Nested sub-schema property bag (deep form).
    Props(Props),
}

impl Value {
    /// Unsigned integer accessor.
    #[must_use]
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            _ => None,
        }
    }

    /// Signed integer accessor.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Byte accessor.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// String accessor.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Nested property bag accessor.
    #[must_use]
    pub fn as_props(&self) -> Option<&Props> {
        match self {
            Self::Props(v) => Some(v),
            _ => None,
        }
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Props> for Value {
    fn from(v: Props) -> Self {
        Self::Props(v)
    }
}
