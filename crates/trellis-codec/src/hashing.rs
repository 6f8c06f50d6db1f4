//! Field-range and field-selection digests.

use trellis_crypto::{ChainHasher, HASH_LEN};

use crate::error::Result;
use crate::iter::FieldIterator;

/// Chain-hash every field whose index lies in `[from, to]`.
///
/// Each in-range field folds its complete raw encoding (index, type, length
/// prefix, value) into the Blake2b-256 chain, in stream order. An empty
/// range yields the 32 zero bytes.
pub fn hash_fields(bytes: &[u8], from: u8, to: u8) -> Result<[u8; HASH_LEN]> {
    let mut chain = ChainHasher::new();
    for field in FieldIterator::new(bytes) {
        let field = field?;
        if field.index >= from && field.index <= to {
            chain.update(field.raw);
        }
    }
    Ok(chain.finalize())
}

/// Chain-hash a selected set of field indices.
///
/// Indices are sorted ascending before hashing. Each index folds one chain
/// round: the field's value bytes alone when present (never its index, type,
/// or length bytes), or an empty round when absent. Absent but referenced
/// indices therefore still influence the output.
pub fn hash_specific_fields(bytes: &[u8], indices: &[u8]) -> Result<[u8; HASH_LEN]> {
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();

    let mut values: Vec<Option<&[u8]>> = vec![None; 256];
    for field in FieldIterator::new(bytes) {
        let field = field?;
        values[field.index as usize] = Some(field.value);
    }

    let mut chain = ChainHasher::new();
    for index in sorted {
        match values[index as usize] {
            Some(value) => chain.update(value),
            None => chain.update_absent(),
        }
    }
    Ok(chain.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    // index 1 u8=7, index 2 u8=9, index 40 bytes [1,2].
    fn sample() -> Vec<u8> {
        vec![1, 0, 7, 2, 0, 9, 40, 33, 0, 2, 1, 2]
    }

    #[test]
    fn empty_range_is_zero() {
        assert_eq!(hash_fields(&sample(), 50, 60).unwrap(), [0u8; HASH_LEN]);
        assert_eq!(hash_fields(&[], 0, 127).unwrap(), [0u8; HASH_LEN]);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let all = hash_fields(&sample(), 0, 127).unwrap();
        let through_two = hash_fields(&sample(), 0, 2).unwrap();
        let from_two = hash_fields(&sample(), 2, 127).unwrap();
        assert_ne!(all, through_two);
        assert_ne!(all, from_two);
        assert_ne!(through_two, from_two);
    }

    #[test]
    fn raw_field_bytes_are_hashed() {
        // Same value at the same index but a different type byte must differ.
        let a = vec![1u8, 0, 7]; // UInt8
        let b = vec![1u8, 22, 7]; // Bytes1
        assert_ne!(
            hash_fields(&a, 0, 127).unwrap(),
            hash_fields(&b, 0, 127).unwrap()
        );
    }

    #[test]
    fn specific_fields_sorts_indices() {
        let bytes = sample();
        let forward = hash_specific_fields(&bytes, &[1, 2, 40]).unwrap();
        let shuffled = hash_specific_fields(&bytes, &[40, 1, 2]).unwrap();
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn absent_index_still_influences_digest() {
        let bytes = sample();
        let without = hash_specific_fields(&bytes, &[1, 2]).unwrap();
        let with_absent = hash_specific_fields(&bytes, &[1, 2, 99]).unwrap();
        assert_ne!(without, with_absent);
    }

    #[test]
    fn value_only_not_type() {
        // Two encodings with identical values but different types hash equal
        // under the selected-fields digest (it covers values only).
        let a = vec![1u8, 0, 7]; // UInt8 7
        let b = vec![1u8, 22, 7]; // Bytes1 [7]
        assert_eq!(
            hash_specific_fields(&a, &[1]).unwrap(),
            hash_specific_fields(&b, &[1]).unwrap()
        );
    }
}
