//! Schema declarations.
//!
//! Schemas are static tables: each model kind declares a `&'static [FieldDef]`
//! and the codec walks it. An "array" schema has a single element definition
//! and entries occupy contiguous indices `0..N-1`, `N <= 256`.

use crate::field::FieldType;

/// A static or static-prefix constant on a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticValue {
    /// The constant bytes.
    pub bytes: &'static [u8],
    /// When set, the constant is only a required prefix of the value.
    ///
    /// Used to identify model types across the hierarchy: a base schema pins
    /// the shared tuple prefix while subtypes extend it.
    pub prefix: bool,
}

impl StaticValue {
    /// Exact-match constant.
    #[must_use]
    pub const fn exact(bytes: &'static [u8]) -> Self {
        Self {
            bytes,
            prefix: false,
        }
    }

    /// Prefix-match constant.
    #[must_use]
    pub const fn prefix(bytes: &'static [u8]) -> Self {
        Self {
            bytes,
            prefix: true,
        }
    }

    /// Whether a value satisfies this constant.
    #[must_use]
    pub fn matches(&self, value: &[u8]) -> bool {
        if self.prefix {
            value.starts_with(self.bytes)
        } else {
            value == self.bytes
        }
    }
}

/// One field declaration.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// Field index (0–255), unique and ascending within a schema.
    pub index: u8,
    /// Human name, used in error messages only.
    pub name: &'static str,
    /// Wire type.
    pub ty: FieldType,
    /// Whether pack/unpack fail when the field is absent.
    pub required: bool,
    /// Static or static-prefix constant, if any.
    pub static_value: Option<StaticValue>,
    /// Tighter byte cap for variable fields (defaults to 65 535).
    pub max_len: Option<u16>,
    /// Element schema for `FieldType::Schema` fields.
    pub sub: Option<&'static Schema>,
}

impl FieldDef {
    /// Plain field with no constant and no cap.
    #[must_use]
    pub const fn new(index: u8, name: &'static str, ty: FieldType, required: bool) -> Self {
        Self {
            index,
            name,
            ty,
            required,
            static_value: None,
            max_len: None,
            sub: None,
        }
    }

    /// Attach a static constant.
    #[must_use]
    pub const fn with_static(mut self, value: StaticValue) -> Self {
        self.static_value = Some(value);
        self
    }

    /// Attach a variable-length cap.
    #[must_use]
    pub const fn with_max_len(mut self, max_len: u16) -> Self {
        self.max_len = Some(max_len);
        self
    }

    /// Attach a nested schema.
    #[must_use]
    pub const fn with_sub(mut self, sub: &'static Schema) -> Self {
        self.sub = Some(sub);
        self
    }

    /// Effective byte cap of a variable field.
    #[must_use]
    pub fn effective_max_len(&self) -> usize {
        match self.max_len {
            Some(cap) => cap as usize,
            None => u16::MAX as usize,
        }
    }
}

/// A model schema: an ordered set of field declarations.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    /// Schema name, used in error context and debugging.
    pub name: &'static str,
    /// Field declarations, ascending by index.
    pub fields: &'static [FieldDef],
    /// Array form: `fields` holds exactly one element definition and entries
    /// occupy contiguous indices from zero.
    pub array: bool,
}

impl Schema {
    /// Record schema over the given field declarations.
    #[must_use]
    pub const fn new(name: &'static str, fields: &'static [FieldDef]) -> Self {
        Self {
            name,
            fields,
            array: false,
        }
    }

    /// Array schema over a single element declaration.
    #[must_use]
    pub const fn array(name: &'static str, element: &'static [FieldDef; 1]) -> Self {
        Self {
            name,
            fields: element,
            array: true,
        }
    }

    /// Look up the declaration governing `index`.
    ///
    /// For array schemas every index maps to the single element declaration.
    #[must_use]
    pub fn field(&self, index: u8) -> Option<&FieldDef> {
        if self.array {
            return self.fields.first();
        }
        self.fields.iter().find(|def| def.index == index)
    }
}
