//! Field index assignments and the static schema tables.
//!
//! Index layout (shared across kinds):
//!
//! - `0..=3` identity: model type, owner, creation/expire times
//! - `4..=7` node graph placement and license distances / cert binding
//! - `8..=15` embedded sub-models, covered by the signature chain
//! - `16..=18` node reference and locality / cert targets
//! - `32..` kind-specific fields
//! - `122` id2, `123` difficulty, `124..=126` signatures, `127` nonce
//! - `128` hashed transient config, `160` storage time (never hashed)

use trellis_codec::{FieldDef, FieldType, Props, Schema, StaticValue, Value};
use trellis_crypto::Scheme;

use crate::error::{ModelError, Result};
use crate::kind;

// Shared field indices.

/// Model-type tuple.
pub const IDX_MODEL_TYPE: u8 = 0;
/// Owner public key.
pub const IDX_OWNER: u8 = 1;
/// Creation time, milliseconds.
pub const IDX_CREATION_TIME: u8 = 2;
/// Expire time, milliseconds.
pub const IDX_EXPIRE_TIME: u8 = 3;
/// Packed sign cert.
pub const IDX_SIGN_CERT: u8 = 8;
/// Packed embedded sub-model.
pub const IDX_EMBEDDED: u8 = 9;
/// Preserved original id on copies.
pub const IDX_ID2: u8 = 122;
/// Work-proof difficulty in bits.
pub const IDX_DIFFICULTY: u8 = 123;
/// First signature slot.
pub const IDX_SIGNATURE1: u8 = 124;
/// Second signature slot.
pub const IDX_SIGNATURE2: u8 = 125;
/// Third signature slot.
pub const IDX_SIGNATURE3: u8 = 126;
/// Work-proof nonce.
pub const IDX_NONCE: u8 = 127;
/// Transient config, included in the transient hash.
pub const IDX_TRANSIENT_CONFIG: u8 = 128;
/// Storage arrival time, never hashed.
pub const IDX_STORAGE_TIME: u8 = 160;

// Node field indices.

/// Parent node id.
pub const IDX_PARENT_ID: u8 = 4;
/// Base node config bits.
pub const IDX_CONFIG: u8 = 5;
/// Minimum license stack distance.
pub const IDX_LICENSE_MIN_DISTANCE: u8 = 6;
/// Maximum license stack distance.
pub const IDX_LICENSE_MAX_DISTANCE: u8 = 7;
/// Referenced node id (rights by association, license subject).
pub const IDX_REF_ID: u8 = 16;
/// Region code.
pub const IDX_REGION: u8 = 17;
/// Jurisdiction code.
pub const IDX_JURISDICTION: u8 = 18;

// Data node field indices.

/// Data node config bits.
pub const IDX_DATA_CONFIG: u8 = 32;
/// MIME-ish content type.
pub const IDX_CONTENT_TYPE: u8 = 33;
/// Inline payload, up to 1 KiB.
pub const IDX_DATA: u8 = 34;
/// External blob content hash.
pub const IDX_BLOB_HASH: u8 = 35;
/// External blob byte length.
pub const IDX_BLOB_LENGTH: u8 = 36;
/// Original parent id on a copy.
pub const IDX_COPIED_PARENT_ID: u8 = 40;
/// Original creation time on a copy.
pub const IDX_COPIED_CREATION_TIME: u8 = 41;
/// Original signature stack on a copy.
pub const IDX_COPIED_SIGNATURES: u8 = 42;

// License node field indices.

/// License node config bits.
pub const IDX_LICENSE_CONFIG: u8 = 32;
/// Public key the grant targets.
pub const IDX_TARGET_PUBLIC_KEY: u8 = 33;
/// Remaining extension count.
pub const IDX_EXTENSIONS: u8 = 34;
/// Optional intermediary peer key.
pub const IDX_JUMP_PEER_PUBLIC_KEY: u8 = 35;

// Carrier node field indices.

/// Declared payload type of the carried node.
pub const IDX_CARRIER_PAYLOAD_TYPE: u8 = 32;

// Cert field indices.

/// Constraints digest binding the cert to its subject.
pub const IDX_CONSTRAINTS: u8 = 5;
/// Locked-config bitmap selecting constrained fields/flags.
pub const IDX_LOCKED_CONFIG: u8 = 6;
/// Model-type prefix the cert may sign.
pub const IDX_TARGET_TYPE: u8 = 7;
/// Delegated signer keys (array, up to five).
pub const IDX_TARGET_PUBLIC_KEYS: u8 = 16;
/// Required signature count.
pub const IDX_MULTISIG_THRESHOLD: u8 = 17;
/// Chain countdown toward the leaf.
pub const IDX_COUNTDOWN: u8 = 18;
/// Kind-specific cert config bits.
pub const IDX_CERT_CONFIG: u8 = 32;

// Friend cert field indices.

/// Pair-distinct salt.
pub const IDX_FRIEND_SALT: u8 = 33;
/// Friendship level.
pub const IDX_FRIEND_LEVEL: u8 = 34;
/// Upper bound on licenses minted through the pairing.
pub const IDX_LICENSE_MAX_EXPIRE_TIME: u8 = 35;
/// Region the pairing is valid in.
pub const IDX_CERT_REGION: u8 = 36;
/// Jurisdiction the pairing is valid in.
pub const IDX_CERT_JURISDICTION: u8 = 37;

/// Maximum inline data payload.
pub const MAX_DATA_LEN: u16 = 1024;
/// Maximum entries in a cert's target key array.
pub const MAX_TARGET_PUBLIC_KEYS: usize = 5;
/// Maximum signatures on one model.
pub const MAX_SIGNATURES: usize = 3;

// Signature sub-schema: `{0 index:u8, 1 type:u8, 2 signature:bytes}`.
const SIGNATURE_FIELDS: [FieldDef; 3] = [
    FieldDef::new(0, "index", FieldType::UInt8, true),
    FieldDef::new(1, "type", FieldType::UInt8, true),
    FieldDef::new(2, "signature", FieldType::Bytes, true).with_max_len(65),
];
/// Schema of one signature object.
pub const SIGNATURE_SCHEMA: Schema = Schema::new("signature", &SIGNATURE_FIELDS);

const TARGET_KEY_ELEMENT: [FieldDef; 1] =
    [FieldDef::new(0, "key", FieldType::Bytes, false).with_max_len(32)];
/// Array schema for a cert's target public keys.
pub const TARGET_KEYS_SCHEMA: Schema = Schema::array("target-public-keys", &TARGET_KEY_ELEMENT);

macro_rules! shared_head {
    ($tuple:expr) => {
        FieldDef::new(IDX_MODEL_TYPE, "modelType", FieldType::Bytes, true)
            .with_static(StaticValue::prefix($tuple))
            .with_max_len(8)
    };
}

macro_rules! shared_tail {
    () => {
        [
            FieldDef::new(IDX_DIFFICULTY, "difficulty", FieldType::UInt8, false),
            FieldDef::new(IDX_SIGNATURE1, "signature1", FieldType::Schema, false)
                .with_sub(&SIGNATURE_SCHEMA),
            FieldDef::new(IDX_SIGNATURE2, "signature2", FieldType::Schema, false)
                .with_sub(&SIGNATURE_SCHEMA),
            FieldDef::new(IDX_SIGNATURE3, "signature3", FieldType::Schema, false)
                .with_sub(&SIGNATURE_SCHEMA),
            FieldDef::new(IDX_NONCE, "nonce", FieldType::Bytes8, false),
            FieldDef::new(
                IDX_TRANSIENT_CONFIG,
                "transientConfig",
                FieldType::UInt8,
                false,
            ),
            FieldDef::new(IDX_STORAGE_TIME, "storageTime", FieldType::UInt48BE, false),
        ]
    };
}

macro_rules! node_head {
    ($tuple:expr) => {
        [
            shared_head!($tuple),
            FieldDef::new(IDX_OWNER, "owner", FieldType::Bytes, true).with_max_len(32),
            FieldDef::new(IDX_CREATION_TIME, "creationTime", FieldType::UInt48BE, true),
            FieldDef::new(IDX_EXPIRE_TIME, "expireTime", FieldType::UInt48BE, false),
            FieldDef::new(IDX_PARENT_ID, "parentId", FieldType::Bytes32, false),
            FieldDef::new(IDX_CONFIG, "config", FieldType::UInt16BE, false),
            FieldDef::new(
                IDX_LICENSE_MIN_DISTANCE,
                "licenseMinDistance",
                FieldType::UInt8,
                false,
            ),
            FieldDef::new(
                IDX_LICENSE_MAX_DISTANCE,
                "licenseMaxDistance",
                FieldType::UInt8,
                false,
            ),
            FieldDef::new(IDX_SIGN_CERT, "signCert", FieldType::Bytes, false),
            FieldDef::new(IDX_EMBEDDED, "embedded", FieldType::Bytes, false),
            FieldDef::new(IDX_REF_ID, "refId", FieldType::Bytes32, false),
            FieldDef::new(IDX_REGION, "region", FieldType::String, false).with_max_len(32),
            FieldDef::new(IDX_JURISDICTION, "jurisdiction", FieldType::String, false)
                .with_max_len(32),
        ]
    };
}

const DATA_NODE_HEAD: [FieldDef; 13] = node_head!(kind::DATA_NODE_TYPE);
const LICENSE_NODE_HEAD: [FieldDef; 13] = node_head!(kind::LICENSE_NODE_TYPE);
const CARRIER_NODE_HEAD: [FieldDef; 13] = node_head!(kind::CARRIER_NODE_TYPE);
const SHARED_TAIL: [FieldDef; 7] = shared_tail!();

const DATA_NODE_FIELDS: [FieldDef; 29] = {
    let mut fields = [FieldDef::new(0, "", FieldType::UInt8, false); 29];
    let mut i = 0;
    while i < 13 {
        fields[i] = DATA_NODE_HEAD[i];
        i += 1;
    }
    fields[13] = FieldDef::new(IDX_DATA_CONFIG, "dataConfig", FieldType::UInt8, false);
    fields[14] =
        FieldDef::new(IDX_CONTENT_TYPE, "contentType", FieldType::String, false).with_max_len(64);
    fields[15] = FieldDef::new(IDX_DATA, "data", FieldType::Bytes, false).with_max_len(MAX_DATA_LEN);
    fields[16] = FieldDef::new(IDX_BLOB_HASH, "blobHash", FieldType::Bytes32, false);
    fields[17] = FieldDef::new(IDX_BLOB_LENGTH, "blobLength", FieldType::UInt64BE, false);
    fields[18] = FieldDef::new(
        IDX_COPIED_PARENT_ID,
        "copiedParentId",
        FieldType::Bytes32,
        false,
    );
    fields[19] = FieldDef::new(
        IDX_COPIED_CREATION_TIME,
        "copiedCreationTime",
        FieldType::UInt48BE,
        false,
    );
    fields[20] = FieldDef::new(
        IDX_COPIED_SIGNATURES,
        "copiedSignatures",
        FieldType::Bytes,
        false,
    )
    .with_max_len(1024);
    fields[21] = FieldDef::new(IDX_ID2, "id2", FieldType::Bytes32, false);
    let mut j = 0;
    while j < 7 {
        fields[22 + j] = SHARED_TAIL[j];
        j += 1;
    }
    fields
};
/// Data node schema.
pub const DATA_NODE_SCHEMA: Schema = Schema::new("data-node", &DATA_NODE_FIELDS);

const LICENSE_NODE_FIELDS: [FieldDef; 25] = {
    let mut fields = [FieldDef::new(0, "", FieldType::UInt8, false); 25];
    let mut i = 0;
    while i < 13 {
        fields[i] = LICENSE_NODE_HEAD[i];
        i += 1;
    }
    // Licenses always expire; the schema makes the field mandatory.
    fields[3] = FieldDef::new(IDX_EXPIRE_TIME, "expireTime", FieldType::UInt48BE, true);
    fields[13] = FieldDef::new(IDX_LICENSE_CONFIG, "licenseConfig", FieldType::UInt8, false);
    fields[14] = FieldDef::new(
        IDX_TARGET_PUBLIC_KEY,
        "targetPublicKey",
        FieldType::Bytes,
        true,
    )
    .with_max_len(32);
    fields[15] = FieldDef::new(IDX_EXTENSIONS, "extensions", FieldType::UInt8, false);
    fields[16] = FieldDef::new(
        IDX_JUMP_PEER_PUBLIC_KEY,
        "jumpPeerPublicKey",
        FieldType::Bytes,
        false,
    )
    .with_max_len(32);
    fields[17] = FieldDef::new(IDX_ID2, "id2", FieldType::Bytes32, false);
    let mut j = 0;
    while j < 7 {
        fields[18 + j] = SHARED_TAIL[j];
        j += 1;
    }
    fields
};
/// License node schema.
pub const LICENSE_NODE_SCHEMA: Schema = Schema::new("license-node", &LICENSE_NODE_FIELDS);

const CARRIER_NODE_FIELDS: [FieldDef; 22] = {
    let mut fields = [FieldDef::new(0, "", FieldType::UInt8, false); 22];
    let mut i = 0;
    while i < 13 {
        fields[i] = CARRIER_NODE_HEAD[i];
        i += 1;
    }
    fields[13] = FieldDef::new(
        IDX_CARRIER_PAYLOAD_TYPE,
        "payloadType",
        FieldType::String,
        false,
    )
    .with_max_len(64);
    fields[14] = FieldDef::new(IDX_ID2, "id2", FieldType::Bytes32, false);
    let mut j = 0;
    while j < 7 {
        fields[15 + j] = SHARED_TAIL[j];
        j += 1;
    }
    fields
};
/// Carrier node schema.
pub const CARRIER_NODE_SCHEMA: Schema = Schema::new("carrier-node", &CARRIER_NODE_FIELDS);

macro_rules! cert_head {
    ($tuple:expr) => {
        [
            shared_head!($tuple),
            FieldDef::new(IDX_OWNER, "owner", FieldType::Bytes, true).with_max_len(32),
            FieldDef::new(IDX_CREATION_TIME, "creationTime", FieldType::UInt48BE, true),
            // Certs must always expire.
            FieldDef::new(IDX_EXPIRE_TIME, "expireTime", FieldType::UInt48BE, true),
            FieldDef::new(IDX_CONSTRAINTS, "constraints", FieldType::Bytes32, false),
            FieldDef::new(IDX_LOCKED_CONFIG, "lockedConfig", FieldType::UInt48BE, false),
            FieldDef::new(IDX_TARGET_TYPE, "targetType", FieldType::Bytes, false).with_max_len(8),
            FieldDef::new(IDX_SIGN_CERT, "signCert", FieldType::Bytes, false),
            FieldDef::new(
                IDX_TARGET_PUBLIC_KEYS,
                "targetPublicKeys",
                FieldType::Schema,
                false,
            )
            .with_sub(&TARGET_KEYS_SCHEMA),
            FieldDef::new(
                IDX_MULTISIG_THRESHOLD,
                "multisigThreshold",
                FieldType::UInt8,
                false,
            ),
            FieldDef::new(IDX_COUNTDOWN, "countdown", FieldType::UInt8, false),
        ]
    };
}

const SIGN_CERT_HEAD: [FieldDef; 11] = cert_head!(kind::SIGN_CERT_TYPE);
const AUTH_CERT_HEAD: [FieldDef; 11] = cert_head!(kind::AUTH_CERT_TYPE);
const FRIEND_CERT_HEAD: [FieldDef; 11] = cert_head!(kind::FRIEND_CERT_TYPE);

const SIGN_CERT_FIELDS: [FieldDef; 19] = {
    let mut fields = [FieldDef::new(0, "", FieldType::UInt8, false); 19];
    let mut i = 0;
    while i < 11 {
        fields[i] = SIGN_CERT_HEAD[i];
        i += 1;
    }
    fields[11] = FieldDef::new(IDX_CERT_CONFIG, "signCertConfig", FieldType::UInt8, false);
    let mut j = 0;
    while j < 7 {
        fields[12 + j] = SHARED_TAIL[j];
        j += 1;
    }
    fields
};
/// Sign cert schema.
pub const SIGN_CERT_SCHEMA: Schema = Schema::new("sign-cert", &SIGN_CERT_FIELDS);

const AUTH_CERT_FIELDS: [FieldDef; 21] = {
    let mut fields = [FieldDef::new(0, "", FieldType::UInt8, false); 21];
    let mut i = 0;
    while i < 11 {
        fields[i] = AUTH_CERT_HEAD[i];
        i += 1;
    }
    fields[11] = FieldDef::new(IDX_CERT_CONFIG, "authCertConfig", FieldType::UInt8, false);
    fields[12] =
        FieldDef::new(IDX_CERT_REGION, "region", FieldType::String, false).with_max_len(32);
    fields[13] = FieldDef::new(
        IDX_CERT_JURISDICTION,
        "jurisdiction",
        FieldType::String,
        false,
    )
    .with_max_len(32);
    let mut j = 0;
    while j < 7 {
        fields[14 + j] = SHARED_TAIL[j];
        j += 1;
    }
    fields
};
/// Auth cert schema.
pub const AUTH_CERT_SCHEMA: Schema = Schema::new("auth-cert", &AUTH_CERT_FIELDS);

const FRIEND_CERT_FIELDS: [FieldDef; 24] = {
    let mut fields = [FieldDef::new(0, "", FieldType::UInt8, false); 24];
    let mut i = 0;
    while i < 11 {
        fields[i] = FRIEND_CERT_HEAD[i];
        i += 1;
    }
    fields[11] = FieldDef::new(IDX_CERT_CONFIG, "friendCertConfig", FieldType::UInt8, false);
    fields[12] = FieldDef::new(IDX_FRIEND_SALT, "salt", FieldType::Bytes, true).with_max_len(32);
    fields[13] = FieldDef::new(IDX_FRIEND_LEVEL, "friendLevel", FieldType::UInt8, true);
    fields[14] = FieldDef::new(
        IDX_LICENSE_MAX_EXPIRE_TIME,
        "licenseMaxExpireTime",
        FieldType::UInt48BE,
        false,
    );
    fields[15] =
        FieldDef::new(IDX_CERT_REGION, "region", FieldType::String, false).with_max_len(32);
    fields[16] = FieldDef::new(
        IDX_CERT_JURISDICTION,
        "jurisdiction",
        FieldType::String,
        false,
    )
    .with_max_len(32);
    let mut j = 0;
    while j < 7 {
        fields[17 + j] = SHARED_TAIL[j];
        j += 1;
    }
    fields
};
/// Friend cert schema.
pub const FRIEND_CERT_SCHEMA: Schema = Schema::new("friend-cert", &FRIEND_CERT_FIELDS);

/// One parsed signature slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureObject {
    /// Index into the cert's target keys (0 when the owner signs).
    pub index: u8,
    /// Signature scheme.
    pub scheme: Scheme,
    /// Raw signature bytes.
    pub signature: Vec<u8>,
}

impl SignatureObject {
    /// Build the nested property bag for packing.
    #[must_use]
    pub fn to_props(&self) -> Props {
        let mut props = Props::new();
        props.insert(0, Value::UInt(u64::from(self.index)));
        props.insert(1, Value::UInt(u64::from(self.scheme.as_u8())));
        props.insert(2, Value::Bytes(self.signature.clone()));
        props
    }

    /// Parse from an unpacked nested bag.
    pub fn from_props(props: &Props) -> Result<Self> {
        let index = props
            .get(&0)
            .and_then(Value::as_uint)
            .ok_or_else(|| ModelError::validation("signature object missing index"))?;
        let scheme_byte = props
            .get(&1)
            .and_then(Value::as_uint)
            .ok_or_else(|| ModelError::validation("signature object missing type"))?;
        let signature = props
            .get(&2)
            .and_then(Value::as_bytes)
            .ok_or_else(|| ModelError::validation("signature object missing signature"))?;
        Ok(Self {
            index: index as u8,
            scheme: Scheme::from_u8(scheme_byte as u8)?,
            signature: signature.to_vec(),
        })
    }

    /// Parse from packed signature-object bytes.
    pub fn from_packed(bytes: &[u8]) -> Result<Self> {
        let props = trellis_codec::unpack(bytes, &SIGNATURE_SCHEMA, false, u8::MAX)?;
        Self::from_props(&props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_ascending(schema: &Schema) {
        let mut previous: Option<u8> = None;
        for def in schema.fields {
            if let Some(p) = previous {
                assert!(def.index > p, "{}: {} after {}", schema.name, def.index, p);
            }
            previous = Some(def.index);
        }
    }

    #[test]
    fn schemas_declare_ascending_indices() {
        for schema in [
            &DATA_NODE_SCHEMA,
            &LICENSE_NODE_SCHEMA,
            &CARRIER_NODE_SCHEMA,
            &SIGN_CERT_SCHEMA,
            &AUTH_CERT_SCHEMA,
            &FRIEND_CERT_SCHEMA,
        ] {
            assert_ascending(schema);
        }
    }

    #[test]
    fn cert_schemas_require_expire_time() {
        for schema in [&SIGN_CERT_SCHEMA, &AUTH_CERT_SCHEMA, &FRIEND_CERT_SCHEMA] {
            let def = schema.field(IDX_EXPIRE_TIME).unwrap();
            assert!(def.required, "{} expireTime must be required", schema.name);
        }
        assert!(!DATA_NODE_SCHEMA.field(IDX_EXPIRE_TIME).unwrap().required);
        assert!(LICENSE_NODE_SCHEMA.field(IDX_EXPIRE_TIME).unwrap().required);
    }

    #[test]
    fn signature_object_round_trip() {
        let object = SignatureObject {
            index: 2,
            scheme: Scheme::Ed25519,
            signature: vec![7u8; 64],
        };
        let packed =
            trellis_codec::pack(&SIGNATURE_SCHEMA, &object.to_props(), u8::MAX).unwrap();
        assert_eq!(SignatureObject::from_packed(&packed).unwrap(), object);
    }
}
