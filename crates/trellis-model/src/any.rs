//! Tagged-variant dispatch over the six concrete kinds.

use trellis_crypto::HASH_LEN;

use crate::cert::{AuthCert, Cert, FriendCert, SignCert};
use crate::error::Result;
use crate::kind::ModelKind;
use crate::model::Model;
use crate::node::{CarrierNode, DataNode, LicenseNode, Node};

/// Any concrete model, dispatched on the model-type prefix.
#[derive(Debug, Clone)]
pub enum AnyModel {
    /// Data-carrying graph node.
    DataNode(DataNode),
    /// License grant node.
    LicenseNode(LicenseNode),
    /// Transport wrapper node.
    CarrierNode(CarrierNode),
    /// Signing-delegation cert.
    SignCert(SignCert),
    /// Connection-authorization cert.
    AuthCert(AuthCert),
    /// Friend-pairing cert.
    FriendCert(FriendCert),
}

impl AnyModel {
    /// Decode packed bytes into the kind its type tuple names.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let model = Model::unpack(bytes)?;
        Self::from_model(model)
    }

    /// Wrap a carrier into its typed variant.
    pub fn from_model(model: Model) -> Result<Self> {
        Ok(match model.kind() {
            ModelKind::DataNode => Self::DataNode(DataNode::from_model(model)?),
            ModelKind::LicenseNode => Self::LicenseNode(LicenseNode::from_model(model)?),
            ModelKind::CarrierNode => Self::CarrierNode(CarrierNode::from_model(model)?),
            ModelKind::SignCert => Self::SignCert(SignCert::from_model(model)?),
            ModelKind::AuthCert => Self::AuthCert(AuthCert::from_model(model)?),
            ModelKind::FriendCert => Self::FriendCert(FriendCert::from_model(model)?),
        })
    }

    /// The concrete kind.
    #[must_use]
    pub fn kind(&self) -> ModelKind {
        self.model().kind()
    }

    /// The underlying carrier.
    #[must_use]
    pub fn model(&self) -> &Model {
        match self {
            Self::DataNode(node) => node.model(),
            Self::LicenseNode(node) => node.model(),
            Self::CarrierNode(node) => node.model(),
            Self::SignCert(cert) => cert.model(),
            Self::AuthCert(cert) => cert.model(),
            Self::FriendCert(cert) => cert.model(),
        }
    }

    /// Validate the kind-specific invariants.
    pub fn validate(&self, deep: bool, now: Option<u64>) -> Result<()> {
        match self {
            Self::DataNode(node) => node.validate(deep, now),
            Self::LicenseNode(node) => node.validate(deep, now),
            Self::CarrierNode(node) => node.validate(deep, now),
            Self::SignCert(cert) => cert.validate(deep, now),
            Self::AuthCert(cert) => cert.validate(deep, now),
            Self::FriendCert(cert) => cert.validate(deep, now),
        }
    }

    /// Verify the signature tree.
    pub fn verify(&self, allow_unsigned: bool) -> Result<bool> {
        self.model().verify(allow_unsigned)
    }

    /// Constraints digest under the kind's own mapping table.
    pub fn hash_constraints(&self, locked_config: u64) -> Result<[u8; HASH_LEN]> {
        match self {
            Self::DataNode(node) => node.hash_constraints(locked_config),
            Self::LicenseNode(node) => node.hash_constraints(locked_config),
            Self::CarrierNode(node) => node.hash_constraints(locked_config),
            Self::SignCert(cert) => cert.own_constraints_digest(locked_config),
            Self::AuthCert(cert) => cert.own_constraints_digest(locked_config),
            Self::FriendCert(cert) => cert.own_constraints_digest(locked_config),
        }
    }

    /// Data node accessor.
    #[must_use]
    pub fn as_data_node(&self) -> Option<&DataNode> {
        match self {
            Self::DataNode(node) => Some(node),
            _ => None,
        }
    }

    /// License node accessor.
    #[must_use]
    pub fn as_license_node(&self) -> Option<&LicenseNode> {
        match self {
            Self::LicenseNode(node) => Some(node),
            _ => None,
        }
    }

    /// Sign cert accessor.
    #[must_use]
    pub fn as_sign_cert(&self) -> Option<&SignCert> {
        match self {
            Self::SignCert(cert) => Some(cert),
            _ => None,
        }
    }
}

impl From<DataNode> for AnyModel {
    fn from(node: DataNode) -> Self {
        Self::DataNode(node)
    }
}

impl From<LicenseNode> for AnyModel {
    fn from(node: LicenseNode) -> Self {
        Self::LicenseNode(node)
    }
}

impl From<CarrierNode> for AnyModel {
    fn from(node: CarrierNode) -> Self {
        Self::CarrierNode(node)
    }
}

impl From<SignCert> for AnyModel {
    fn from(cert: SignCert) -> Self {
        Self::SignCert(cert)
    }
}

impl From<AuthCert> for AnyModel {
    fn from(cert: AuthCert) -> Self {
        Self::AuthCert(cert)
    }
}

impl From<FriendCert> for AnyModel {
    fn from(cert: FriendCert) -> Self {
        Self::FriendCert(cert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{IDX_CREATION_TIME, IDX_DATA, IDX_OWNER, IDX_PARENT_ID};
    use crate::node::Node;
    use trellis_codec::Value;
    use trellis_crypto::{KeyPair, Scheme};

    #[test]
    fn decode_dispatches_on_type_tuple() {
        let owner = KeyPair::generate(Scheme::Ed25519).unwrap();
        let mut node = DataNode::new();
        node.model_mut()
            .set(IDX_OWNER, Value::Bytes(owner.public_key().as_bytes().to_vec()))
            .unwrap();
        node.model_mut()
            .set(IDX_CREATION_TIME, Value::UInt(1_000))
            .unwrap();
        node.model_mut()
            .set(IDX_PARENT_ID, Value::Bytes(vec![1; 32]))
            .unwrap();
        node.model_mut()
            .set(IDX_DATA, Value::Bytes(b"x".to_vec()))
            .unwrap();
        node.model_mut().sign(&owner).unwrap();
        let bytes = node.model_mut().pack().unwrap().to_vec();

        let any = AnyModel::decode(&bytes).unwrap();
        assert_eq!(any.kind(), ModelKind::DataNode);
        assert!(any.as_data_node().is_some());
        assert!(any.as_license_node().is_none());
        assert!(any.verify(false).unwrap());
    }
}
