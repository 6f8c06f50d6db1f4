//! The constraints engine.
//!
//! A cert binds to exactly the fields and flag bits its issuer selected.
//! The issuer publishes a 48-bit `lockedConfig` bitmap; each model kind maps
//! bitmap positions to field indices and to individual config bits. Hashing
//! walks the selection deterministically, so no re-ordering of fields or
//! flags can produce the same digest from different content.

use trellis_codec::hash_specific_fields;
use trellis_crypto::{ChainHasher, HASH_LEN};

use crate::error::Result;
use crate::fields;
use crate::flags;

/// Per-kind mapping from `lockedConfig` bit positions to model content.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintTable {
    /// `(bitmap bit, field index)` pairs.
    pub field_bits: &'static [(u8, u8)],
    /// `(bitmap bit, config field index, bit within config)` triples,
    /// ascending by bitmap bit.
    pub flag_bits: &'static [(u8, u8, u8)],
}

/// Compute the constraints digest of a packed model.
///
/// 1. Collect the field indices whose bitmap bit is set and digest them with
///    the selected-fields hash (values and presence only).
/// 2. For each selected flag bit, ascending, extend the digest with a single
///    byte carrying that config bit's current value.
pub fn hash_constraints(
    packed: &[u8],
    locked_config: u64,
    table: &ConstraintTable,
    config_value: impl Fn(u8) -> u64,
) -> Result<[u8; HASH_LEN]> {
    let mut field_idxs: Vec<u8> = Vec::new();
    for &(bit, field_index) in table.field_bits {
        if locked_config >> bit & 1 == 1 {
            field_idxs.push(field_index);
        }
    }
    field_idxs.sort_unstable();

    let field_digest = hash_specific_fields(packed, &field_idxs)?;

    let mut chain = ChainHasher::from_digest(field_digest);
    for &(bit, config_index, config_bit) in table.flag_bits {
        if locked_config >> bit & 1 == 1 {
            let value = config_value(config_index) >> config_bit & 1;
            chain.update(&[value as u8]);
        }
    }
    Ok(chain.finalize())
}

// Bitmap layout shared by the node kinds: bits 0..=15 select fields, bits
// 24..=39 select base-config flags, bits 40.. select kind-config flags.

/// First bitmap bit of the base-config flag block.
pub const FLAG_BIT_BASE: u8 = 24;
/// First bitmap bit of the kind-config flag block.
pub const FLAG_BIT_KIND: u8 = 40;

/// Data node constraint mapping.
pub const DATA_NODE_CONSTRAINTS: ConstraintTable = ConstraintTable {
    field_bits: &[
        (0, fields::IDX_OWNER),
        (1, fields::IDX_CREATION_TIME),
        (2, fields::IDX_EXPIRE_TIME),
        (3, fields::IDX_PARENT_ID),
        (4, fields::IDX_REF_ID),
        (5, fields::IDX_REGION),
        (6, fields::IDX_JURISDICTION),
        (7, fields::IDX_CONTENT_TYPE),
        (8, fields::IDX_DATA),
        (9, fields::IDX_BLOB_HASH),
        (10, fields::IDX_BLOB_LENGTH),
    ],
    flag_bits: &[
        (24, fields::IDX_CONFIG, flags::NODE_IS_LEAF),
        (25, fields::IDX_CONFIG, flags::NODE_IS_PUBLIC),
        (26, fields::IDX_CONFIG, flags::NODE_IS_LICENSED),
        (27, fields::IDX_CONFIG, flags::NODE_ALLOW_EMBED),
        (28, fields::IDX_CONFIG, flags::NODE_ALLOW_EMBED_MOVE),
        (29, fields::IDX_CONFIG, flags::NODE_IS_UNIQUE),
        (30, fields::IDX_CONFIG, flags::NODE_BEGIN_RESTRICTIVE_WRITER),
        (31, fields::IDX_CONFIG, flags::NODE_END_RESTRICTIVE_WRITER),
        (32, fields::IDX_CONFIG, flags::NODE_IS_INDESTRUCTIBLE),
        (33, fields::IDX_CONFIG, flags::NODE_HAS_RIGHTS_BY_ASSOCIATION),
        (34, fields::IDX_CONFIG, flags::NODE_DISALLOW_PARENT_LICENSING),
        (35, fields::IDX_CONFIG, flags::NODE_ONLY_OWN_CHILDREN),
        (36, fields::IDX_CONFIG, flags::NODE_DISALLOW_PUBLIC_CHILDREN),
        (37, fields::IDX_CONFIG, flags::NODE_BUBBLE_TRIGGER),
        (40, fields::IDX_DATA_CONFIG, flags::DATA_IS_DESTROY),
        (41, fields::IDX_DATA_CONFIG, flags::DATA_IS_ANNOTATION_EDIT),
        (42, fields::IDX_DATA_CONFIG, flags::DATA_IS_ANNOTATION_REACTION),
    ],
};

/// License node constraint mapping.
pub const LICENSE_NODE_CONSTRAINTS: ConstraintTable = ConstraintTable {
    field_bits: &[
        (0, fields::IDX_OWNER),
        (1, fields::IDX_CREATION_TIME),
        (2, fields::IDX_EXPIRE_TIME),
        (3, fields::IDX_PARENT_ID),
        (4, fields::IDX_REF_ID),
        (5, fields::IDX_REGION),
        (6, fields::IDX_JURISDICTION),
        (7, fields::IDX_TARGET_PUBLIC_KEY),
        (8, fields::IDX_EXTENSIONS),
        (9, fields::IDX_JUMP_PEER_PUBLIC_KEY),
    ],
    flag_bits: &[
        (24, fields::IDX_CONFIG, flags::NODE_IS_LEAF),
        (25, fields::IDX_CONFIG, flags::NODE_IS_PUBLIC),
        (26, fields::IDX_CONFIG, flags::NODE_IS_LICENSED),
        (27, fields::IDX_CONFIG, flags::NODE_ALLOW_EMBED),
        (28, fields::IDX_CONFIG, flags::NODE_ALLOW_EMBED_MOVE),
        (29, fields::IDX_CONFIG, flags::NODE_IS_UNIQUE),
        (
            40,
            fields::IDX_LICENSE_CONFIG,
            flags::LICENSE_ALLOW_TARGET_SEND_PRIVATELY,
        ),
        (
            41,
            fields::IDX_LICENSE_CONFIG,
            flags::LICENSE_DISALLOW_RETRO_LICENSING,
        ),
        (
            42,
            fields::IDX_LICENSE_CONFIG,
            flags::LICENSE_RESTRICTIVE_MODE_WRITER,
        ),
        (
            43,
            fields::IDX_LICENSE_CONFIG,
            flags::LICENSE_RESTRICTIVE_MODE_MANAGER,
        ),
    ],
};

/// Carrier node constraint mapping.
pub const CARRIER_NODE_CONSTRAINTS: ConstraintTable = ConstraintTable {
    field_bits: &[
        (0, fields::IDX_OWNER),
        (1, fields::IDX_CREATION_TIME),
        (2, fields::IDX_EXPIRE_TIME),
        (3, fields::IDX_PARENT_ID),
        (4, fields::IDX_REF_ID),
        (5, fields::IDX_REGION),
        (6, fields::IDX_JURISDICTION),
        (7, fields::IDX_CARRIER_PAYLOAD_TYPE),
    ],
    flag_bits: &[
        (24, fields::IDX_CONFIG, flags::NODE_IS_LEAF),
        (25, fields::IDX_CONFIG, flags::NODE_IS_PUBLIC),
        (26, fields::IDX_CONFIG, flags::NODE_IS_LICENSED),
        (27, fields::IDX_CONFIG, flags::NODE_ALLOW_EMBED),
        (28, fields::IDX_CONFIG, flags::NODE_ALLOW_EMBED_MOVE),
        (29, fields::IDX_CONFIG, flags::NODE_IS_UNIQUE),
    ],
};

/// Cert constraint mapping, shared by the three cert kinds.
pub const CERT_CONSTRAINTS: ConstraintTable = ConstraintTable {
    field_bits: &[
        (0, fields::IDX_OWNER),
        (1, fields::IDX_CREATION_TIME),
        (2, fields::IDX_EXPIRE_TIME),
        (3, fields::IDX_TARGET_TYPE),
        (4, fields::IDX_TARGET_PUBLIC_KEYS),
        (5, fields::IDX_MULTISIG_THRESHOLD),
        (6, fields::IDX_COUNTDOWN),
    ],
    flag_bits: &[(24, fields::IDX_CERT_CONFIG, 0)],
};
