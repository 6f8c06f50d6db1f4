//! Self-describing, index-tagged binary field format.
//!
//! Every Trellis model is a sequence of fields, each tagged by a one-byte
//! index (0–255) that is strictly increasing in the packed form. Each field
//! is encoded as:
//!
//! ```text
//! index:u8 || type:u8 || [length:u16 BE, variable types only] || value
//! ```
//!
//! The type byte makes the stream self-describing: a reader can skip fields
//! at indices it does not know, which is the format's only forward
//! compatibility mechanism. Unknown *types* are an error since their width
//! cannot be derived.
//!
//! # Index semantics
//!
//! - `0..=127` signed area, covered by signatures and constraint hashes
//! - `8..=15` sub-models verified recursively by the signature chain
//! - `124..=126` up to three signatures
//! - `127` work-proof nonce
//! - `128..=159` transient fields included in the transient hash
//! - `160..=191` transient fields never hashed
//! - `192..=255` reserved

#![forbid(unsafe_code)]

pub mod error;
pub mod field;
pub mod hashing;
pub mod iter;
pub mod pack;
pub mod schema;

pub use error::{CodecError, Result};
pub use field::{FieldType, Props, Value};
pub use hashing::{hash_fields, hash_specific_fields};
pub use iter::{FieldIterator, RawField};
pub use pack::{pack, unpack};
pub use schema::{FieldDef, Schema, StaticValue};

/// Highest index of the signed area, and the default pack/unpack bound.
pub const MAX_SIGNED_INDEX: u8 = 127;

/// First index of the hashed transient range.
pub const TRANSIENT_HASH_FROM: u8 = 128;
/// Last index of the hashed transient range.
pub const TRANSIENT_HASH_TO: u8 = 159;

/// Maximum byte length of a variable-length field value.
pub const MAX_VARIABLE_LEN: usize = u16::MAX as usize;
