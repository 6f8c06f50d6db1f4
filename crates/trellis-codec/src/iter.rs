//! Raw field iteration over packed bytes.

use crate::error::{CodecError, Result};
use crate::field::FieldType;

/// One field as it sits in the packed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawField<'a> {
    /// Field index.
    pub index: u8,
    /// Parsed wire type.
    pub field_type: FieldType,
    /// Value bytes (without index/type/length).
    pub value: &'a [u8],
    /// The complete field encoding: `index || type || [length] || value`.
    pub raw: &'a [u8],
}

/// Iterator over the fields of a packed model.
///
/// Yields fields in stream order, enforcing strictly increasing indices,
/// known type bytes, and complete values. Once an error is yielded the
/// iterator is exhausted.
#[derive(Debug, Clone)]
pub struct FieldIterator<'a> {
    bytes: &'a [u8],
    offset: usize,
    previous: Option<u8>,
    failed: bool,
}

impl<'a> FieldIterator<'a> {
    /// Iterate the given packed bytes.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            previous: None,
            failed: false,
        }
    }

    /// Random lookup of a single field.
    ///
    /// Scans from the start and fails on the same malformed inputs iteration
    /// does. `Ok(None)` means the stream is well-formed up to and beyond
    /// `index` but does not contain it.
    pub fn get(bytes: &'a [u8], index: u8) -> Result<Option<RawField<'a>>> {
        for field in FieldIterator::new(bytes) {
            let field = field?;
            if field.index == index {
                return Ok(Some(field));
            }
            if field.index > index {
                // Indices are strictly increasing; it cannot appear later.
                return Ok(None);
            }
        }
        Ok(None)
    }

    fn parse_next(&mut self) -> Result<Option<RawField<'a>>> {
        if self.offset >= self.bytes.len() {
            return Ok(None);
        }
        let start = self.offset;
        if self.bytes.len() - start < 2 {
            return Err(CodecError::Truncated {
                offset: self.bytes.len(),
            });
        }
        let index = self.bytes[start];
        let type_byte = self.bytes[start + 1];

        if let Some(previous) = self.previous {
            if index <= previous {
                return Err(CodecError::IndexNotIncreasing { index, previous });
            }
        }

        let field_type = FieldType::from_u8(index, type_byte)?;
        let mut cursor = start + 2;

        let value_len = match field_type.fixed_size() {
            Some(size) => size,
            None => {
                if self.bytes.len() - cursor < 2 {
                    return Err(CodecError::Truncated {
                        offset: self.bytes.len(),
                    });
                }
                let len = u16::from_be_bytes([self.bytes[cursor], self.bytes[cursor + 1]]);
                cursor += 2;
                len as usize
            }
        };

        if self.bytes.len() - cursor < value_len {
            return Err(CodecError::Truncated {
                offset: self.bytes.len(),
            });
        }
        let value = &self.bytes[cursor..cursor + value_len];
        cursor += value_len;

        let raw = &self.bytes[start..cursor];
        self.offset = cursor;
        self.previous = Some(index);

        Ok(Some(RawField {
            index,
            field_type,
            value,
            raw,
        }))
    }
}

impl<'a> Iterator for FieldIterator<'a> {
    type Item = Result<RawField<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.parse_next() {
            Ok(Some(field)) => Some(Ok(field)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
