//! Property tests: pack/unpack round-trips and digest determinism.

use proptest::prelude::*;

use trellis_codec::{
    hash_fields, hash_specific_fields, pack, unpack, FieldDef, FieldType, Props, Schema, Value,
};

static FIELDS: [FieldDef; 6] = [
    FieldDef::new(1, "a", FieldType::UInt8, false),
    FieldDef::new(5, "b", FieldType::UInt48BE, false),
    FieldDef::new(9, "c", FieldType::Int16LE, false),
    FieldDef::new(20, "d", FieldType::Bytes, false),
    FieldDef::new(40, "e", FieldType::String, false),
    FieldDef::new(90, "f", FieldType::Bytes32, false),
];
static SCHEMA: Schema = Schema::new("prop-test", &FIELDS);

fn arb_props() -> impl Strategy<Value = Props> {
    (
        proptest::option::of(any::<u8>()),
        proptest::option::of(0u64..(1 << 48)),
        proptest::option::of(any::<i16>()),
        proptest::option::of(proptest::collection::vec(any::<u8>(), 0..256)),
        proptest::option::of("[a-zA-Z0-9 ]{0,32}"),
        proptest::option::of(proptest::collection::vec(any::<u8>(), 32..=32)),
    )
        .prop_map(|(a, b, c, d, e, f)| {
            let mut props = Props::new();
            if let Some(v) = a {
                props.insert(1, Value::UInt(u64::from(v)));
            }
            if let Some(v) = b {
                props.insert(5, Value::UInt(v));
            }
            if let Some(v) = c {
                props.insert(9, Value::Int(i64::from(v)));
            }
            if let Some(v) = d {
                props.insert(20, Value::Bytes(v));
            }
            if let Some(v) = e {
                props.insert(40, Value::String(v));
            }
            if let Some(v) = f {
                props.insert(90, Value::Bytes(v));
            }
            props
        })
}

proptest! {
    #[test]
    fn pack_unpack_round_trip(props in arb_props()) {
        let packed = pack(&SCHEMA, &props, 127).unwrap();
        let unpacked = unpack(&packed, &SCHEMA, false, 127).unwrap();
        prop_assert_eq!(&props, &unpacked);
    }

    #[test]
    fn packing_is_deterministic(props in arb_props()) {
        let first = pack(&SCHEMA, &props, 127).unwrap();
        let second = pack(&SCHEMA, &props, 127).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn unknown_extra_fields_are_ignored(props in arb_props(), extra in proptest::collection::vec(any::<u8>(), 0..16)) {
        let mut packed = pack(&SCHEMA, &props, 127).unwrap();
        // Append a well-formed field at an undeclared index above all others.
        packed.push(200);
        packed.push(33); // variable bytes
        let len = extra.len() as u16;
        packed.extend_from_slice(&len.to_be_bytes());
        packed.extend_from_slice(&extra);

        let unpacked = unpack(&packed, &SCHEMA, false, u8::MAX).unwrap();
        prop_assert_eq!(&props, &unpacked);
    }

    #[test]
    fn hash_fields_is_pure(props in arb_props()) {
        let packed = pack(&SCHEMA, &props, 127).unwrap();
        prop_assert_eq!(
            hash_fields(&packed, 0, 127).unwrap(),
            hash_fields(&packed, 0, 127).unwrap()
        );
    }

    #[test]
    fn selected_digest_ignores_order(props in arb_props()) {
        let packed = pack(&SCHEMA, &props, 127).unwrap();
        let forward = hash_specific_fields(&packed, &[1, 5, 9, 20]).unwrap();
        let shuffled = hash_specific_fields(&packed, &[20, 9, 5, 1]).unwrap();
        prop_assert_eq!(forward, shuffled);
    }
}
