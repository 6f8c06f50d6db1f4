//! Sign cert: delegation of signing authority.

use trellis_codec::{Props, Value};
use trellis_crypto::HASH_LEN;

use crate::cert::{validate_chain, Cert};
use crate::error::{ModelError, Result};
use crate::fields::{IDX_CERT_CONFIG, IDX_TARGET_PUBLIC_KEYS};
use crate::flags;
use crate::kind::{is_subtype, ModelKind};
use crate::model::Model;

/// A signing-delegation cert.
///
/// The owner authorizes the target keys to sign models of the target type
/// on the owner's behalf. The cert binds to the signed model's selected
/// fields through its constraints digest.
#[derive(Debug, Clone)]
pub struct SignCert {
    model: Model,
}

impl SignCert {
    /// Start a new mutable sign cert.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: Model::new(ModelKind::SignCert),
        }
    }

    /// Wrap an existing carrier; the kind must match.
    pub fn from_model(model: Model) -> Result<Self> {
        if model.kind() != ModelKind::SignCert {
            return Err(ModelError::validation("not a sign cert"));
        }
        Ok(Self { model })
    }

    /// Decode from packed bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::from_model(Model::unpack(bytes)?)
    }

    /// Consume into the carrier.
    #[must_use]
    pub fn into_model(self) -> Model {
        self.model
    }

    /// Whether the cert survives destroy requests.
    #[must_use]
    pub fn is_indestructible(&self) -> bool {
        flags::bit(
            self.model.config_value(IDX_CERT_CONFIG),
            flags::SIGN_CERT_IS_INDESTRUCTIBLE,
        )
    }

    /// Set the delegated signer keys.
    pub fn set_target_public_keys(&mut self, keys: &[&[u8]]) -> Result<()> {
        let mut props = Props::new();
        for (position, key) in keys.iter().enumerate() {
            props.insert(position as u8, Value::Bytes(key.to_vec()));
        }
        self.model.set(IDX_TARGET_PUBLIC_KEYS, Value::Props(props))
    }

    /// Whether this cert may sign a model of the given type tuple.
    #[must_use]
    pub fn may_sign_type(&self, model_type: &[u8]) -> bool {
        match self.target_type() {
            Some(prefix) => is_subtype(model_type, prefix),
            // No target type restricts nothing.
            None => true,
        }
    }

    /// Check the cert's binding to the constraints digest of the model it
    /// sits on.
    pub fn binds_digest(&self, subject_digest: [u8; HASH_LEN]) -> Result<()> {
        match self.constraints() {
            Some(digest) if digest == subject_digest => Ok(()),
            Some(_) => Err(ModelError::validation(
                "cert constraints do not match the signed model",
            )),
            None => Err(ModelError::validation("cert carries no constraints")),
        }
    }

    /// Validate the cert and, when `deep`, its chain and signatures.
    pub fn validate(&self, deep: bool, now: Option<u64>) -> Result<()> {
        self.validate_cert_base(now)?;
        if deep {
            validate_chain(self, false)?;
            if !self.model.verify(false)? {
                return Err(ModelError::validation("signature verification failed"));
            }
        }
        Ok(())
    }
}

impl Default for SignCert {
    fn default() -> Self {
        Self::new()
    }
}

impl Cert for SignCert {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{
        IDX_COUNTDOWN, IDX_CREATION_TIME, IDX_EXPIRE_TIME, IDX_MULTISIG_THRESHOLD, IDX_OWNER,
        IDX_SIGN_CERT, IDX_TARGET_TYPE,
    };
    use crate::kind;
    use trellis_crypto::{KeyPair, Scheme};

    fn keypair() -> KeyPair {
        KeyPair::generate(Scheme::Ed25519).unwrap()
    }

    pub(crate) fn draft(owner: &KeyPair, countdown: u64) -> SignCert {
        let mut cert = SignCert::new();
        let model = cert.model_mut();
        model
            .set(IDX_OWNER, Value::Bytes(owner.public_key().as_bytes().to_vec()))
            .unwrap();
        model.set(IDX_CREATION_TIME, Value::UInt(1_000)).unwrap();
        model.set(IDX_EXPIRE_TIME, Value::UInt(1_000_000)).unwrap();
        model.set(IDX_COUNTDOWN, Value::UInt(countdown)).unwrap();
        cert
    }

    #[test]
    fn times_are_mandatory_and_ordered() {
        let owner = keypair();
        let mut cert = draft(&owner, 0);
        cert.model_mut().set(IDX_EXPIRE_TIME, Value::UInt(500)).unwrap();
        assert!(cert.validate(false, None).is_err());
    }

    #[test]
    fn threshold_bounds() {
        let owner = keypair();
        let a = keypair();
        let b = keypair();

        let mut cert = draft(&owner, 0);
        cert.set_target_public_keys(&[a.public_key().as_bytes(), b.public_key().as_bytes()])
            .unwrap();
        cert.model_mut()
            .set(IDX_MULTISIG_THRESHOLD, Value::UInt(2))
            .unwrap();
        cert.validate(false, None).unwrap();

        cert.model_mut()
            .set(IDX_MULTISIG_THRESHOLD, Value::UInt(3))
            .unwrap();
        assert!(cert.validate(false, None).is_err());
    }

    #[test]
    fn empty_targets_with_unset_threshold_is_legal() {
        let owner = keypair();
        let cert = draft(&owner, 0);
        cert.validate(false, None).unwrap();
        assert_eq!(cert.multisig_threshold(), 1);
    }

    #[test]
    fn target_type_prefix_gates_signing() {
        let owner = keypair();
        let mut cert = draft(&owner, 0);
        cert.model_mut()
            .set(IDX_TARGET_TYPE, Value::Bytes(kind::NODE_TYPE.to_vec()))
            .unwrap();
        assert!(cert.may_sign_type(kind::DATA_NODE_TYPE));
        assert!(!cert.may_sign_type(kind::SIGN_CERT_TYPE));
    }

    #[test]
    fn chain_countdown_must_decrease() {
        let root_owner = keypair();
        let delegate = keypair();

        let mut root = draft(&root_owner, 2);
        root.set_target_public_keys(&[delegate.public_key().as_bytes()])
            .unwrap();
        root.model_mut().sign(&root_owner).unwrap();
        let root_bytes = root.model_mut().pack().unwrap().to_vec();

        // Leaf with countdown 0 under root countdown 2: valid.
        let mut leaf = draft(&delegate, 0);
        leaf.model_mut()
            .set(IDX_SIGN_CERT, Value::Bytes(root_bytes.clone()))
            .unwrap();
        leaf.model_mut().sign(&delegate).unwrap();
        leaf.model_mut().pack().unwrap();
        validate_chain(&leaf, true).unwrap();

        // Leaf with countdown 2 does not decrease: invalid.
        let mut stuck = draft(&delegate, 2);
        stuck
            .model_mut()
            .set(IDX_SIGN_CERT, Value::Bytes(root_bytes))
            .unwrap();
        stuck.model_mut().sign(&delegate).unwrap();
        stuck.model_mut().pack().unwrap();
        assert!(validate_chain(&stuck, false).is_err());
        // And a non-zero leaf cannot terminate on a node.
        assert!(validate_chain(&stuck, true).is_err());
    }
}
