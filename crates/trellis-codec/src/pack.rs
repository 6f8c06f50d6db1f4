//! Pack and unpack.

use crate::error::{CodecError, Result};
use crate::field::{FieldType, Props, Value};
use crate::iter::FieldIterator;
use crate::schema::{FieldDef, Schema};

/// Pack a property bag against a schema.
///
/// Fields are emitted in ascending index order; optional absent fields are
/// skipped; exact static constants are materialized even when absent from
/// the bag. Fields above `max_index` are not emitted (this is how a caller
/// packs the signed area only).
pub fn pack(schema: &Schema, props: &Props, max_index: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();

    if schema.array {
        let element = schema.fields.first().ok_or(CodecError::OutOfRange {
            index: 0,
            reason: "array schema without element definition",
        })?;
        for (position, (&index, value)) in props.iter().enumerate() {
            if index as usize != position {
                return Err(CodecError::ArrayNotContiguous { index });
            }
            encode_field(&mut out, index, element, value)?;
        }
        return Ok(out);
    }

    for def in schema.fields {
        if def.index > max_index {
            continue;
        }
        match props.get(&def.index) {
            Some(value) => encode_field(&mut out, def.index, def, value)?,
            None => {
                // Exact constants carry no information; emit them for the
                // caller. Prefix constants need the caller's suffix.
                if let Some(st) = def.static_value {
                    if !st.prefix {
                        encode_field(&mut out, def.index, def, &Value::Bytes(st.bytes.to_vec()))?;
                        continue;
                    }
                }
                if def.required {
                    return Err(CodecError::RequiredMissing {
                        index: def.index,
                        name: def.name,
                    });
                }
            }
        }
    }

    // Reject bag entries the schema does not know.
    for &index in props.keys() {
        if index > max_index {
            continue;
        }
        if schema.field(index).is_none() {
            return Err(CodecError::OutOfRange {
                index,
                reason: "not declared in schema",
            });
        }
    }

    Ok(out)
}

/// Unpack packed bytes against a schema.
///
/// Unknown field indices are silently skipped (the format's forward
/// compatibility rule); unknown types, non-increasing indices, and
/// truncation are fatal. When `deep`, nested sub-schema fields are
/// recursively unpacked into [`Value::Props`]; otherwise their raw packed
/// bytes are returned as [`Value::Bytes`].
pub fn unpack(bytes: &[u8], schema: &Schema, deep: bool, max_index: u8) -> Result<Props> {
    let mut props = Props::new();
    let mut array_expected: u8 = 0;

    for field in FieldIterator::new(bytes) {
        let field = field?;
        if field.index > max_index {
            continue;
        }
        let Some(def) = schema.field(field.index) else {
            continue;
        };
        if schema.array {
            if field.index != array_expected {
                return Err(CodecError::ArrayNotContiguous { index: field.index });
            }
            array_expected = array_expected.wrapping_add(1);
        }
        if def.ty != field.field_type {
            return Err(CodecError::TypeMismatch {
                index: field.index,
                name: def.name,
            });
        }
        if def.ty.is_variable() && field.value.len() > def.effective_max_len() {
            return Err(CodecError::LengthExceedsMax {
                index: field.index,
                len: field.value.len(),
                max: def.effective_max_len(),
            });
        }
        if let Some(st) = def.static_value {
            if !st.matches(field.value) {
                return Err(CodecError::StaticMismatch { index: field.index });
            }
        }
        let value = decode_value(field.index, def, field.value, deep)?;
        props.insert(field.index, value);
    }

    for def in schema.fields {
        if schema.array {
            break;
        }
        if def.index > max_index {
            continue;
        }
        if def.required && !props.contains_key(&def.index) {
            return Err(CodecError::RequiredMissing {
                index: def.index,
                name: def.name,
            });
        }
    }

    Ok(props)
}

fn encode_field(out: &mut Vec<u8>, index: u8, def: &FieldDef, value: &Value) -> Result<()> {
    let value_bytes = encode_value(index, def, value)?;

    if let Some(st) = def.static_value {
        if !st.matches(&value_bytes) {
            return Err(CodecError::StaticMismatch { index });
        }
    }

    out.push(index);
    out.push(def.ty.as_u8());
    if def.ty.is_variable() {
        let cap = def.effective_max_len();
        if value_bytes.len() > cap {
            return Err(CodecError::LengthExceedsMax {
                index,
                len: value_bytes.len(),
                max: cap,
            });
        }
        let len = value_bytes.len() as u16;
        out.extend_from_slice(&len.to_be_bytes());
    }
    out.extend_from_slice(&value_bytes);
    Ok(())
}

fn encode_value(index: u8, def: &FieldDef, value: &Value) -> Result<Vec<u8>> {
    let mismatch = || CodecError::TypeMismatch {
        index,
        name: def.name,
    };

    if def.ty.is_unsigned() {
        let v = value.as_uint().ok_or_else(mismatch)?;
        let width = def.ty.fixed_size().unwrap_or(8);
        if width < 8 && v >= 1u64 << (width * 8) {
            return Err(CodecError::OutOfRange {
                index,
                reason: "unsigned value exceeds field width",
            });
        }
        return Ok(encode_uint(v, width, def.ty.is_big_endian()));
    }

    if def.ty.is_signed() {
        let v = value.as_int().ok_or_else(mismatch)?;
        let width = def.ty.fixed_size().unwrap_or(8);
        if width < 8 {
            let bits = (width * 8 - 1) as u32;
            let max = (1i64 << bits) - 1;
            let min = -(1i64 << bits);
            if v > max || v < min {
                return Err(CodecError::OutOfRange {
                    index,
                    reason: "signed value exceeds field width",
                });
            }
        }
        return Ok(encode_uint(v as u64, width, def.ty.is_big_endian()));
    }

    match def.ty {
        FieldType::String => {
            let s = value.as_str().ok_or_else(mismatch)?;
            Ok(s.as_bytes().to_vec())
        }
        FieldType::Schema => match value {
            Value::Props(sub_props) => {
                let sub = def.sub.ok_or_else(mismatch)?;
                pack(sub, sub_props, u8::MAX)
            }
            // Pre-packed sub-model bytes pass through untouched.
            Value::Bytes(bytes) => Ok(bytes.clone()),
            _ => Err(mismatch()),
        },
        FieldType::Bytes => {
            let b = value.as_bytes().ok_or_else(mismatch)?;
            Ok(b.to_vec())
        }
        // Remaining types are the fixed blobs.
        _ => {
            let b = value.as_bytes().ok_or_else(mismatch)?;
            let size = def.ty.fixed_size().unwrap_or(0);
            if b.len() != size {
                return Err(mismatch());
            }
            Ok(b.to_vec())
        }
    }
}

fn decode_value(index: u8, def: &FieldDef, value: &[u8], deep: bool) -> Result<Value> {
    let mismatch = || CodecError::TypeMismatch {
        index,
        name: def.name,
    };

    if def.ty.is_unsigned() {
        return Ok(Value::UInt(decode_uint(value, def.ty.is_big_endian())));
    }
    if def.ty.is_signed() {
        let width = value.len();
        let raw = decode_uint(value, def.ty.is_big_endian());
        return Ok(Value::Int(sign_extend(raw, width)));
    }

    match def.ty {
        FieldType::String => {
            let s = std::str::from_utf8(value).map_err(|_| mismatch())?;
            Ok(Value::String(s.to_string()))
        }
        FieldType::Schema if deep => {
            let sub = def.sub.ok_or_else(mismatch)?;
            Ok(Value::Props(unpack(value, sub, true, u8::MAX)?))
        }
        _ => Ok(Value::Bytes(value.to_vec())),
    }
}

fn encode_uint(v: u64, width: usize, big_endian: bool) -> Vec<u8> {
    if big_endian {
        v.to_be_bytes()[8 - width..].to_vec()
    } else {
        v.to_le_bytes()[..width].to_vec()
    }
}

fn decode_uint(bytes: &[u8], big_endian: bool) -> u64 {
    let mut v: u64 = 0;
    if big_endian {
        for &b in bytes {
            v = (v << 8) | u64::from(b);
        }
    } else {
        for &b in bytes.iter().rev() {
            v = (v << 8) | u64::from(b);
        }
    }
    v
}

fn sign_extend(raw: u64, width: usize) -> i64 {
    if width >= 8 {
        return raw as i64;
    }
    let shift = (8 - width) * 8;
    ((raw << shift) as i64) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StaticValue;

    static TEST_FIELDS: [FieldDef; 4] = [
        FieldDef::new(0, "kind", FieldType::Bytes, true)
            .with_static(StaticValue::prefix(&[0x01, 0x02])),
        FieldDef::new(33, "amount", FieldType::UInt48BE, false),
        FieldDef::new(40, "label", FieldType::String, false).with_max_len(16),
        FieldDef::new(50, "payload", FieldType::Bytes, false),
    ];
    static TEST_SCHEMA: Schema = Schema::new("test", &TEST_FIELDS);

    fn base_props() -> Props {
        let mut props = Props::new();
        props.insert(0, Value::Bytes(vec![0x01, 0x02, 0x09]));
        props
    }

    #[test]
    fn uint48be_wire_bytes() {
        let mut props = base_props();
        props.insert(33, Value::UInt(0x0102_0304_0506));
        let packed = pack(&TEST_SCHEMA, &props, 127).unwrap();
        // Field 33: `21 0e 01 02 03 04 05 06`.
        let tail = &packed[packed.len() - 8..];
        assert_eq!(tail, &[0x21, 0x0e, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);

        let unpacked = unpack(&packed, &TEST_SCHEMA, false, 127).unwrap();
        assert_eq!(unpacked.get(&33).unwrap().as_uint(), Some(0x0102_0304_0506));
    }

    #[test]
    fn round_trip_preserves_bag() {
        let mut props = base_props();
        props.insert(33, Value::UInt(99));
        props.insert(40, Value::String("hello".into()));
        props.insert(50, Value::Bytes(vec![1, 2, 3]));
        let packed = pack(&TEST_SCHEMA, &props, 127).unwrap();
        let unpacked = unpack(&packed, &TEST_SCHEMA, false, 127).unwrap();
        assert_eq!(props, unpacked);
    }

    #[test]
    fn unknown_indices_are_skipped_on_unpack() {
        let mut props = base_props();
        props.insert(33, Value::UInt(7));
        let mut packed = pack(&TEST_SCHEMA, &props, 127).unwrap();
        // Append a field at an index the schema does not declare.
        packed.extend_from_slice(&[77, 0, 0xff]);
        let unpacked = unpack(&packed, &TEST_SCHEMA, false, 127).unwrap();
        assert!(!unpacked.contains_key(&77));
        assert_eq!(unpacked.get(&33).unwrap().as_uint(), Some(7));
    }

    #[test]
    fn required_missing_fails_both_ways() {
        let props = Props::new();
        assert!(matches!(
            pack(&TEST_SCHEMA, &props, 127),
            Err(CodecError::RequiredMissing { index: 0, .. })
        ));
        assert!(matches!(
            unpack(&[], &TEST_SCHEMA, false, 127),
            Err(CodecError::RequiredMissing { index: 0, .. })
        ));
    }

    #[test]
    fn static_prefix_enforced() {
        let mut props = Props::new();
        props.insert(0, Value::Bytes(vec![0x09, 0x09, 0x09]));
        assert!(matches!(
            pack(&TEST_SCHEMA, &props, 127),
            Err(CodecError::StaticMismatch { index: 0 })
        ));
    }

    #[test]
    fn unknown_prop_index_rejected_on_pack() {
        let mut props = base_props();
        props.insert(99, Value::UInt(1));
        assert!(matches!(
            pack(&TEST_SCHEMA, &props, 127),
            Err(CodecError::OutOfRange { index: 99, .. })
        ));
    }

    #[test]
    fn fields_above_max_index_are_not_packed() {
        let mut props = base_props();
        props.insert(33, Value::UInt(7));
        let packed = pack(&TEST_SCHEMA, &props, 32).unwrap();
        let unpacked = unpack(&packed, &TEST_SCHEMA, false, 127).unwrap();
        assert!(!unpacked.contains_key(&33));
    }

    #[test]
    fn length_cap_enforced() {
        let mut props = base_props();
        props.insert(40, Value::String("x".repeat(17)));
        assert!(matches!(
            pack(&TEST_SCHEMA, &props, 127),
            Err(CodecError::LengthExceedsMax { index: 40, .. })
        ));
    }

    #[test]
    fn signed_values_round_trip() {
        static SIGNED_FIELDS: [FieldDef; 2] = [
            FieldDef::new(1, "a", FieldType::Int24BE, true),
            FieldDef::new(2, "b", FieldType::Int16LE, true),
        ];
        static SIGNED: Schema = Schema::new("signed", &SIGNED_FIELDS);

        let mut props = Props::new();
        props.insert(1, Value::Int(-5));
        props.insert(2, Value::Int(-30000));
        let packed = pack(&SIGNED, &props, 127).unwrap();
        let unpacked = unpack(&packed, &SIGNED, false, 127).unwrap();
        assert_eq!(unpacked.get(&1).unwrap().as_int(), Some(-5));
        assert_eq!(unpacked.get(&2).unwrap().as_int(), Some(-30000));
    }

    #[test]
    fn signed_overflow_rejected() {
        static SIGNED_FIELDS: [FieldDef; 1] = [FieldDef::new(1, "a", FieldType::Int8, true)];
        static SIGNED: Schema = Schema::new("signed8", &SIGNED_FIELDS);
        let mut props = Props::new();
        props.insert(1, Value::Int(200));
        assert!(matches!(
            pack(&SIGNED, &props, 127),
            Err(CodecError::OutOfRange { .. })
        ));
    }

    #[test]
    fn array_schema_round_trip_and_contiguity() {
        static ELEMENT: [FieldDef; 1] = [FieldDef::new(0, "entry", FieldType::Bytes, false)];
        static ARR: Schema = Schema::array("keys", &ELEMENT);

        let mut props = Props::new();
        props.insert(0, Value::Bytes(vec![1; 4]));
        props.insert(1, Value::Bytes(vec![2; 4]));
        let packed = pack(&ARR, &props, 127).unwrap();
        let unpacked = unpack(&packed, &ARR, false, 127).unwrap();
        assert_eq!(props, unpacked);

        let mut gapped = Props::new();
        gapped.insert(0, Value::Bytes(vec![1]));
        gapped.insert(2, Value::Bytes(vec![2]));
        assert!(matches!(
            pack(&ARR, &gapped, 127),
            Err(CodecError::ArrayNotContiguous { index: 2 })
        ));
    }

    #[test]
    fn nested_schema_deep_and_shallow() {
        static INNER_FIELDS: [FieldDef; 2] = [
            FieldDef::new(0, "slot", FieldType::UInt8, true),
            FieldDef::new(2, "sig", FieldType::Bytes, true),
        ];
        static INNER: Schema = Schema::new("inner", &INNER_FIELDS);
        static OUTER_FIELDS: [FieldDef; 1] =
            [FieldDef::new(10, "inner", FieldType::Schema, true).with_sub(&INNER)];
        static OUTER: Schema = Schema::new("outer", &OUTER_FIELDS);

        let mut inner = Props::new();
        inner.insert(0, Value::UInt(1));
        inner.insert(2, Value::Bytes(vec![9, 9]));
        let mut props = Props::new();
        props.insert(10, Value::Props(inner.clone()));

        let packed = pack(&OUTER, &props, 127).unwrap();

        let deep = unpack(&packed, &OUTER, true, 127).unwrap();
        assert_eq!(deep.get(&10).unwrap().as_props(), Some(&inner));

        let shallow = unpack(&packed, &OUTER, false, 127).unwrap();
        let raw = shallow.get(&10).unwrap().as_bytes().unwrap();
        assert_eq!(unpack(raw, &INNER, false, u8::MAX).unwrap(), inner);
    }
}
