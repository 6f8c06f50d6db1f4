//! Flag/config bit packing.
//!
//! Every hierarchy level packs its named booleans into an integer config
//! field. The bit assignments below are wire constants.

// Base node config bits (u16 at field 5).

/// Node has no children.
pub const NODE_IS_LEAF: u8 = 0;
/// Node is readable by anyone.
pub const NODE_IS_PUBLIC: u8 = 1;
/// Node requires a license to read.
pub const NODE_IS_LICENSED: u8 = 2;
/// Node may be embedded into another node.
pub const NODE_ALLOW_EMBED: u8 = 3;
/// Node may be embedded under a different parent.
pub const NODE_ALLOW_EMBED_MOVE: u8 = 4;
/// Node deduplicates on its unique hash.
pub const NODE_IS_UNIQUE: u8 = 5;
/// Node starts a restrictive-writer scope.
pub const NODE_BEGIN_RESTRICTIVE_WRITER: u8 = 6;
/// Node ends a restrictive-writer scope.
pub const NODE_END_RESTRICTIVE_WRITER: u8 = 7;
/// Node cannot be destroyed.
pub const NODE_IS_INDESTRUCTIBLE: u8 = 8;
/// Node inherits read rights from its referenced node.
pub const NODE_HAS_RIGHTS_BY_ASSOCIATION: u8 = 9;
/// Parent licenses do not extend to this node.
pub const NODE_DISALLOW_PARENT_LICENSING: u8 = 10;
/// Only the owner may attach children.
pub const NODE_ONLY_OWN_CHILDREN: u8 = 11;
/// Public children are rejected.
pub const NODE_DISALLOW_PUBLIC_CHILDREN: u8 = 12;
/// Triggers bubble to the parent.
pub const NODE_BUBBLE_TRIGGER: u8 = 13;

// Transient config bits (u8 at field 128).

/// Node is present but inactive.
pub const TRANSIENT_IS_INACTIVE: u8 = 0;

// Data node config bits (u8 at field 32).

/// Node marks its referenced node destroyed.
pub const DATA_IS_DESTROY: u8 = 0;
/// Node is an annotation edit.
pub const DATA_IS_ANNOTATION_EDIT: u8 = 1;
/// Node is an annotation reaction.
pub const DATA_IS_ANNOTATION_REACTION: u8 = 2;

// License node config bits (u8 at field 32).

/// The target may send the licensed node privately.
pub const LICENSE_ALLOW_TARGET_SEND_PRIVATELY: u8 = 0;
/// The license does not apply to nodes created before it.
pub const LICENSE_DISALLOW_RETRO_LICENSING: u8 = 1;
/// The license grants restrictive-writer mode.
pub const LICENSE_RESTRICTIVE_MODE_WRITER: u8 = 2;
/// The license grants restrictive-manager mode.
pub const LICENSE_RESTRICTIVE_MODE_MANAGER: u8 = 3;

// Sign cert config bits (u8 at field 32).

/// Cert cannot be destroyed.
pub const SIGN_CERT_IS_INDESTRUCTIBLE: u8 = 0;

// Friend cert config bits (u8 at field 32).

/// Include the extender public key in the pair constraints hash.
pub const FRIEND_CERT_HASH_EXTENDER_PUBLIC_KEY: u8 = 0;

/// Read one bit of a config value.
#[must_use]
pub fn bit(config: u64, bit: u8) -> bool {
    config >> bit & 1 == 1
}

/// Write one bit of a config value.
#[must_use]
pub fn set_bit(config: u64, bit: u8, on: bool) -> u64 {
    if on {
        config | (1 << bit)
    } else {
        config & !(1 << bit)
    }
}

/// Named view of the base node config bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeFlags {
    /// `NODE_IS_LEAF`
    pub is_leaf: bool,
    /// `NODE_IS_PUBLIC`
    pub is_public: bool,
    /// `NODE_IS_LICENSED`
    pub is_licensed: bool,
    /// `NODE_ALLOW_EMBED`
    pub allow_embed: bool,
    /// `NODE_ALLOW_EMBED_MOVE`
    pub allow_embed_move: bool,
    /// `NODE_IS_UNIQUE`
    pub is_unique: bool,
    /// `NODE_BEGIN_RESTRICTIVE_WRITER`
    pub begin_restrictive_writer: bool,
    /// `NODE_END_RESTRICTIVE_WRITER`
    pub end_restrictive_writer: bool,
    /// `NODE_IS_INDESTRUCTIBLE`
    pub is_indestructible: bool,
    /// `NODE_HAS_RIGHTS_BY_ASSOCIATION`
    pub has_rights_by_association: bool,
    /// `NODE_DISALLOW_PARENT_LICENSING`
    pub disallow_parent_licensing: bool,
    /// `NODE_ONLY_OWN_CHILDREN`
    pub only_own_children: bool,
    /// `NODE_DISALLOW_PUBLIC_CHILDREN`
    pub disallow_public_children: bool,
    /// `NODE_BUBBLE_TRIGGER`
    pub bubble_trigger: bool,
}

impl NodeFlags {
    /// Decode from the packed config value.
    #[must_use]
    pub fn from_bits(config: u64) -> Self {
        Self {
            is_leaf: bit(config, NODE_IS_LEAF),
            is_public: bit(config, NODE_IS_PUBLIC),
            is_licensed: bit(config, NODE_IS_LICENSED),
            allow_embed: bit(config, NODE_ALLOW_EMBED),
            allow_embed_move: bit(config, NODE_ALLOW_EMBED_MOVE),
            is_unique: bit(config, NODE_IS_UNIQUE),
            begin_restrictive_writer: bit(config, NODE_BEGIN_RESTRICTIVE_WRITER),
            end_restrictive_writer: bit(config, NODE_END_RESTRICTIVE_WRITER),
            is_indestructible: bit(config, NODE_IS_INDESTRUCTIBLE),
            has_rights_by_association: bit(config, NODE_HAS_RIGHTS_BY_ASSOCIATION),
            disallow_parent_licensing: bit(config, NODE_DISALLOW_PARENT_LICENSING),
            only_own_children: bit(config, NODE_ONLY_OWN_CHILDREN),
            disallow_public_children: bit(config, NODE_DISALLOW_PUBLIC_CHILDREN),
            bubble_trigger: bit(config, NODE_BUBBLE_TRIGGER),
        }
    }

    /// Encode to the packed config value.
    #[must_use]
    pub fn to_bits(self) -> u64 {
        let mut config = 0;
        config = set_bit(config, NODE_IS_LEAF, self.is_leaf);
        config = set_bit(config, NODE_IS_PUBLIC, self.is_public);
        config = set_bit(config, NODE_IS_LICENSED, self.is_licensed);
        config = set_bit(config, NODE_ALLOW_EMBED, self.allow_embed);
        config = set_bit(config, NODE_ALLOW_EMBED_MOVE, self.allow_embed_move);
        config = set_bit(config, NODE_IS_UNIQUE, self.is_unique);
        config = set_bit(
            config,
            NODE_BEGIN_RESTRICTIVE_WRITER,
            self.begin_restrictive_writer,
        );
        config = set_bit(
            config,
            NODE_END_RESTRICTIVE_WRITER,
            self.end_restrictive_writer,
        );
        config = set_bit(config, NODE_IS_INDESTRUCTIBLE, self.is_indestructible);
        config = set_bit(
            config,
            NODE_HAS_RIGHTS_BY_ASSOCIATION,
            self.has_rights_by_association,
        );
        config = set_bit(
            config,
            NODE_DISALLOW_PARENT_LICENSING,
            self.disallow_parent_licensing,
        );
        config = set_bit(config, NODE_ONLY_OWN_CHILDREN, self.only_own_children);
        config = set_bit(
            config,
            NODE_DISALLOW_PUBLIC_CHILDREN,
            self.disallow_public_children,
        );
        config = set_bit(config, NODE_BUBBLE_TRIGGER, self.bubble_trigger);
        config
    }
}

/// Named view of the data node config bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataNodeFlags {
    /// `DATA_IS_DESTROY`
    pub is_destroy: bool,
    /// `DATA_IS_ANNOTATION_EDIT`
    pub is_annotation_edit: bool,
    /// `DATA_IS_ANNOTATION_REACTION`
    pub is_annotation_reaction: bool,
}

impl DataNodeFlags {
    /// Decode from the packed config value.
    #[must_use]
    pub fn from_bits(config: u64) -> Self {
        Self {
            is_destroy: bit(config, DATA_IS_DESTROY),
            is_annotation_edit: bit(config, DATA_IS_ANNOTATION_EDIT),
            is_annotation_reaction: bit(config, DATA_IS_ANNOTATION_REACTION),
        }
    }

    /// Encode to the packed config value.
    #[must_use]
    pub fn to_bits(self) -> u64 {
        let mut config = 0;
        config = set_bit(config, DATA_IS_DESTROY, self.is_destroy);
        config = set_bit(config, DATA_IS_ANNOTATION_EDIT, self.is_annotation_edit);
        config = set_bit(
            config,
            DATA_IS_ANNOTATION_REACTION,
            self.is_annotation_reaction,
        );
        config
    }
}

/// Named view of the license node config bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LicenseNodeFlags {
    /// `LICENSE_ALLOW_TARGET_SEND_PRIVATELY`
    pub allow_target_send_privately: bool,
    /// `LICENSE_DISALLOW_RETRO_LICENSING`
    pub disallow_retro_licensing: bool,
    /// `LICENSE_RESTRICTIVE_MODE_WRITER`
    pub restrictive_mode_writer: bool,
    /// `LICENSE_RESTRICTIVE_MODE_MANAGER`
    pub restrictive_mode_manager: bool,
}

impl LicenseNodeFlags {
    /// Decode from the packed config value.
    #[must_use]
    pub fn from_bits(config: u64) -> Self {
        Self {
            allow_target_send_privately: bit(config, LICENSE_ALLOW_TARGET_SEND_PRIVATELY),
            disallow_retro_licensing: bit(config, LICENSE_DISALLOW_RETRO_LICENSING),
            restrictive_mode_writer: bit(config, LICENSE_RESTRICTIVE_MODE_WRITER),
            restrictive_mode_manager: bit(config, LICENSE_RESTRICTIVE_MODE_MANAGER),
        }
    }

    /// Encode to the packed config value.
    #[must_use]
    pub fn to_bits(self) -> u64 {
        let mut config = 0;
        config = set_bit(
            config,
            LICENSE_ALLOW_TARGET_SEND_PRIVATELY,
            self.allow_target_send_privately,
        );
        config = set_bit(
            config,
            LICENSE_DISALLOW_RETRO_LICENSING,
            self.disallow_retro_licensing,
        );
        config = set_bit(
            config,
            LICENSE_RESTRICTIVE_MODE_WRITER,
            self.restrictive_mode_writer,
        );
        config = set_bit(
            config,
            LICENSE_RESTRICTIVE_MODE_MANAGER,
            self.restrictive_mode_manager,
        );
        config
    }

    /// The write-restrictive bits that license extensions must preserve.
    #[must_use]
    pub fn is_write_restrictive(self) -> bool {
        self.restrictive_mode_writer || self.restrictive_mode_manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_flags_round_trip_every_bit() {
        for b in 0..14u8 {
            let config = 1u64 << b;
            let flags = NodeFlags::from_bits(config);
            assert_eq!(flags.to_bits(), config, "bit {b}");
        }
    }

    #[test]
    fn data_flags_round_trip() {
        let flags = DataNodeFlags {
            is_destroy: true,
            is_annotation_edit: false,
            is_annotation_reaction: true,
        };
        assert_eq!(DataNodeFlags::from_bits(flags.to_bits()), flags);
    }

    #[test]
    fn license_flags_round_trip() {
        let flags = LicenseNodeFlags {
            allow_target_send_privately: true,
            disallow_retro_licensing: true,
            restrictive_mode_writer: false,
            restrictive_mode_manager: true,
        };
        assert_eq!(LicenseNodeFlags::from_bits(flags.to_bits()), flags);
        assert!(flags.is_write_restrictive());
    }
}
