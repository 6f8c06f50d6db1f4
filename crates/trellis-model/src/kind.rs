//! Model-type tuples and kind dispatch.
//!
//! Field index 0 carries the model-type tuple: three bytes at the root,
//! one more byte per hierarchy level. Subtype testing is a byte-prefix
//! test, which is what lets permission filters match whole families with
//! a short prefix.

use trellis_codec::Schema;

use crate::error::{ModelError, Result};

/// Root model tuple (level 0). Every Trellis model starts with these bytes.
pub const MODEL_TYPE: &[u8] = &[0x01, 0x02, 0x01];

/// Base node tuple (level 1).
pub const NODE_TYPE: &[u8] = &[0x01, 0x02, 0x01, 0x01];
/// Base cert tuple (level 1).
pub const CERT_TYPE: &[u8] = &[0x01, 0x02, 0x01, 0x02];

/// Base data-node tuple (level 2).
pub const DATA_NODE_BASE_TYPE: &[u8] = &[0x01, 0x02, 0x01, 0x01, 0x01];
/// Base license-node tuple (level 2).
pub const LICENSE_NODE_BASE_TYPE: &[u8] = &[0x01, 0x02, 0x01, 0x01, 0x02];
/// Base carrier-node tuple (level 2).
pub const CARRIER_NODE_BASE_TYPE: &[u8] = &[0x01, 0x02, 0x01, 0x01, 0x03];
/// Base sign-cert tuple (level 2).
pub const SIGN_CERT_BASE_TYPE: &[u8] = &[0x01, 0x02, 0x01, 0x02, 0x01];
/// Base auth-cert tuple (level 2).
pub const AUTH_CERT_BASE_TYPE: &[u8] = &[0x01, 0x02, 0x01, 0x02, 0x02];
/// Base friend-cert tuple (level 2).
pub const FRIEND_CERT_BASE_TYPE: &[u8] = &[0x01, 0x02, 0x01, 0x02, 0x03];

/// Concrete data-node tuple (level 3).
pub const DATA_NODE_TYPE: &[u8] = &[0x01, 0x02, 0x01, 0x01, 0x01, 0x00];
/// Concrete license-node tuple (level 3).
pub const LICENSE_NODE_TYPE: &[u8] = &[0x01, 0x02, 0x01, 0x01, 0x02, 0x00];
/// Concrete carrier-node tuple (level 3).
pub const CARRIER_NODE_TYPE: &[u8] = &[0x01, 0x02, 0x01, 0x01, 0x03, 0x00];
/// Concrete sign-cert tuple (level 3).
pub const SIGN_CERT_TYPE: &[u8] = &[0x01, 0x02, 0x01, 0x02, 0x01, 0x00];
/// Concrete auth-cert tuple (level 3).
pub const AUTH_CERT_TYPE: &[u8] = &[0x01, 0x02, 0x01, 0x02, 0x02, 0x00];
/// Concrete friend-cert tuple (level 3).
pub const FRIEND_CERT_TYPE: &[u8] = &[0x01, 0x02, 0x01, 0x02, 0x03, 0x00];

/// Byte-prefix subtype test.
#[must_use]
pub fn is_subtype(model_type: &[u8], prefix: &[u8]) -> bool {
    model_type.starts_with(prefix)
}

/// The six concrete model kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Data-carrying graph node.
    DataNode,
    /// License grant node.
    LicenseNode,
    /// Transport wrapper node.
    CarrierNode,
    /// Signing-delegation cert.
    SignCert,
    /// Connection-authorization cert.
    AuthCert,
    /// Friend-pairing cert.
    FriendCert,
}

impl ModelKind {
    /// The kind's full level-3 type tuple.
    #[must_use]
    pub fn type_tuple(self) -> &'static [u8] {
        match self {
            Self::DataNode => DATA_NODE_TYPE,
            Self::LicenseNode => LICENSE_NODE_TYPE,
            Self::CarrierNode => CARRIER_NODE_TYPE,
            Self::SignCert => SIGN_CERT_TYPE,
            Self::AuthCert => AUTH_CERT_TYPE,
            Self::FriendCert => FRIEND_CERT_TYPE,
        }
    }

    /// The kind's field schema.
    #[must_use]
    pub fn schema(self) -> &'static Schema {
        match self {
            Self::DataNode => &crate::fields::DATA_NODE_SCHEMA,
            Self::LicenseNode => &crate::fields::LICENSE_NODE_SCHEMA,
            Self::CarrierNode => &crate::fields::CARRIER_NODE_SCHEMA,
            Self::SignCert => &crate::fields::SIGN_CERT_SCHEMA,
            Self::AuthCert => &crate::fields::AUTH_CERT_SCHEMA,
            Self::FriendCert => &crate::fields::FRIEND_CERT_SCHEMA,
        }
    }

    /// Whether this kind participates in the parent/child graph.
    #[must_use]
    pub fn is_node(self) -> bool {
        matches!(
            self,
            Self::DataNode | Self::LicenseNode | Self::CarrierNode
        )
    }

    /// Whether this kind delegates signing or connection authority.
    #[must_use]
    pub fn is_cert(self) -> bool {
        !self.is_node()
    }

    /// Resolve the kind of a model-type tuple.
    ///
    /// The tuple must carry one of the known level-3 prefixes; readers never
    /// instantiate abstract levels.
    pub fn detect(model_type: &[u8]) -> Result<Self> {
        for kind in [
            Self::DataNode,
            Self::LicenseNode,
            Self::CarrierNode,
            Self::SignCert,
            Self::AuthCert,
            Self::FriendCert,
        ] {
            if is_subtype(model_type, kind.type_tuple()) {
                return Ok(kind);
            }
        }
        Err(ModelError::UnknownModelType(hex::encode(model_type)))
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::DataNode => "data-node",
            Self::LicenseNode => "license-node",
            Self::CarrierNode => "carrier-node",
            Self::SignCert => "sign-cert",
            Self::AuthCert => "auth-cert",
            Self::FriendCert => "friend-cert",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuples_extend_one_byte_per_level() {
        assert_eq!(MODEL_TYPE.len(), 3);
        assert_eq!(NODE_TYPE.len(), 4);
        assert_eq!(DATA_NODE_BASE_TYPE.len(), 5);
        assert_eq!(DATA_NODE_TYPE.len(), 6);
    }

    #[test]
    fn every_concrete_kind_is_a_model_subtype() {
        for kind in [
            ModelKind::DataNode,
            ModelKind::LicenseNode,
            ModelKind::CarrierNode,
            ModelKind::SignCert,
            ModelKind::AuthCert,
            ModelKind::FriendCert,
        ] {
            assert!(is_subtype(kind.type_tuple(), MODEL_TYPE));
            assert_eq!(ModelKind::detect(kind.type_tuple()).unwrap(), kind);
        }
    }

    #[test]
    fn nodes_and_certs_split_at_level_one() {
        assert!(is_subtype(DATA_NODE_TYPE, NODE_TYPE));
        assert!(is_subtype(LICENSE_NODE_TYPE, NODE_TYPE));
        assert!(is_subtype(SIGN_CERT_TYPE, CERT_TYPE));
        assert!(!is_subtype(SIGN_CERT_TYPE, NODE_TYPE));
    }

    #[test]
    fn unknown_tuple_is_rejected() {
        assert!(ModelKind::detect(&[0x01, 0x02, 0x01, 0x07]).is_err());
        assert!(ModelKind::detect(&[]).is_err());
    }
}
