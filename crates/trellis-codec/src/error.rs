//! Codec error type.

/// Error type for pack/unpack/iterate failures.
///
/// Codec errors are always fatal to the current operation; no partial state
/// is ever exposed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A declared `required` field was absent.
    #[error("required field {index} ({name}) missing")]
    RequiredMissing {
        /// Field index.
        index: u8,
        /// Field name from the schema.
        name: &'static str,
    },

    /// A property index is not in the schema, or exceeds the pack bound.
    #[error("field index {index} out of range: {reason}")]
    OutOfRange {
        /// Offending index.
        index: u8,
        /// What made it out of range.
        reason: &'static str,
    },

    /// A value's variant or magnitude does not fit the declared field type.
    #[error("type mismatch at field {index} ({name})")]
    TypeMismatch {
        /// Field index.
        index: u8,
        /// Field name from the schema.
        name: &'static str,
    },

    /// A variable-length value exceeds its cap.
    #[error("field {index} length {len} exceeds max {max}")]
    LengthExceedsMax {
        /// Field index.
        index: u8,
        /// Supplied length.
        len: usize,
        /// Allowed maximum.
        max: usize,
    },

    /// A static or static-prefix constant was violated.
    #[error("static value mismatch at field {index}")]
    StaticMismatch {
        /// Field index.
        index: u8,
    },

    /// Packed indices were not strictly increasing.
    #[error("field index {index} not increasing (previous {previous})")]
    IndexNotIncreasing {
        /// Offending index.
        index: u8,
        /// Index seen before it.
        previous: u8,
    },

    /// A type byte no reader version understands.
    #[error("unknown field type {type_byte} at index {index}")]
    UnknownType {
        /// Field index.
        index: u8,
        /// The unrecognized type byte.
        type_byte: u8,
    },

    /// The byte stream ended inside a field.
    #[error("packed data truncated at offset {offset}")]
    Truncated {
        /// Offset of the first missing byte.
        offset: usize,
    },

    /// Random lookup of an index that is not present.
    #[error("field {index} not present")]
    NotFound {
        /// Requested index.
        index: u8,
    },

    /// An array schema's entries were not contiguous from zero.
    #[error("array entries not contiguous at index {index}")]
    ArrayNotContiguous {
        /// First non-contiguous index.
        index: u8,
    },
}

/// Standard Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
