//! Friend cert: one half of a mutual pairing.
//!
//! Two friend certs, one per party, share every pairing parameter except
//! the salt and the owner. Both carry the same constraints digest, computed
//! over the sorted owner/salt material plus the shared time/level tuple, so
//! neither side can unilaterally alter the pairing.

use trellis_crypto::{ChainHasher, HASH_LEN};

use crate::cert::{validate_chain, Cert};
use crate::error::{ModelError, Result};
use crate::fields::{
    IDX_CERT_CONFIG, IDX_CERT_JURISDICTION, IDX_CERT_REGION, IDX_FRIEND_LEVEL, IDX_FRIEND_SALT,
    IDX_LICENSE_MAX_EXPIRE_TIME,
};
use crate::flags;
use crate::kind::ModelKind;
use crate::model::Model;

/// One side of a friend pairing.
#[derive(Debug, Clone)]
pub struct FriendCert {
    model: Model,
}

impl FriendCert {
    /// Start a new mutable friend cert.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: Model::new(ModelKind::FriendCert),
        }
    }

    /// Wrap an existing carrier; the kind must match.
    pub fn from_model(model: Model) -> Result<Self> {
        if model.kind() != ModelKind::FriendCert {
            return Err(ModelError::validation("not a friend cert"));
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

    /// The pair-distinct salt.
    pub fn salt(&self) -> Result<&[u8]> {
        self.model
            .bytes_field(IDX_FRIEND_SALT)
            .ok_or_else(|| ModelError::validation("friend cert missing salt"))
    }

    /// The shared friendship level.
    pub fn friend_level(&self) -> Result<u64> {
        self.model
            .uint_field(IDX_FRIEND_LEVEL)
            .ok_or_else(|| ModelError::validation("friend cert missing friendLevel"))
    }

    /// Upper bound on license expiry minted through this pairing.
    #[must_use]
    pub fn license_max_expire_time(&self) -> Option<u64> {
        self.model.uint_field(IDX_LICENSE_MAX_EXPIRE_TIME)
    }

    /// Region the pairing is valid in.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.model.str_field(IDX_CERT_REGION)
    }

    /// Jurisdiction the pairing is valid in.
    #[must_use]
    pub fn jurisdiction(&self) -> Option<&str> {
        self.model.str_field(IDX_CERT_JURISDICTION)
    }

    /// Whether the pair constraints must include the extender key.
    #[must_use]
    pub fn hashes_extender_key(&self) -> bool {
        flags::bit(
            self.model.config_value(IDX_CERT_CONFIG),
            flags::FRIEND_CERT_HASH_EXTENDER_PUBLIC_KEY,
        )
    }

    /// Compute the pairing constraints digest against the other side.
    ///
    /// Both owners and both salts (plus the shared region and jurisdiction
    /// when set) are sorted lexicographically so either side computes the
    /// same digest, then the shared time/level tuple is folded in. When
    /// either cert sets `HashExtenderPublicKey` the extender key is appended
    /// and becomes mandatory.
    pub fn hash_friend_constraints(
        &self,
        other: &FriendCert,
        extender: Option<&[u8]>,
    ) -> Result<[u8; HASH_LEN]> {
        let mut elements: Vec<Vec<u8>> = vec![
            self.model.owner()?.as_bytes().to_vec(),
            other.model.owner()?.as_bytes().to_vec(),
            self.salt()?.to_vec(),
            other.salt()?.to_vec(),
        ];
        if let Some(region) = self.region() {
            elements.push(region.as_bytes().to_vec());
        }
        if let Some(jurisdiction) = self.jurisdiction() {
            elements.push(jurisdiction.as_bytes().to_vec());
        }
        elements.sort();

        let mut chain = ChainHasher::new();
        for element in &elements {
            chain.update(element);
        }

        let creation = self
            .model
            .creation_time()
            .ok_or_else(|| ModelError::validation("friend cert missing creationTime"))?;
        let expire = self
            .model
            .expire_time()
            .ok_or_else(|| ModelError::validation("friend cert missing expireTime"))?;
        chain.update(&creation.to_be_bytes()[2..]);
        chain.update(&expire.to_be_bytes()[2..]);
        match self.license_max_expire_time() {
            Some(limit) => chain.update(&limit.to_be_bytes()[2..]),
            None => chain.update_absent(),
        }
        chain.update(&[self.friend_level()? as u8]);

        if self.hashes_extender_key() || other.hashes_extender_key() {
            let extender = extender.ok_or_else(|| {
                ModelError::validation("pair constraints require the extender key")
            })?;
            chain.update(extender);
        }
        Ok(chain.finalize())
    }

    /// Validate one cert of a pair against the other.
    ///
    /// The shared parameters must be identical, the salts and owners
    /// distinct, and both certs must carry the same constraints digest equal
    /// to [`Self::hash_friend_constraints`].
    pub fn validate_pair(
        &self,
        other: &FriendCert,
        extender: Option<&[u8]>,
        now: Option<u64>,
    ) -> Result<()> {
        self.validate_cert_base(now)?;
        other.validate_cert_base(now)?;

        let same_times = self.model.creation_time() == other.model.creation_time()
            && self.model.expire_time() == other.model.expire_time()
            && self.license_max_expire_time() == other.license_max_expire_time();
        if !same_times {
            return Err(ModelError::validation("pair times must be identical"));
        }
        if self.friend_level()? != other.friend_level()? {
            return Err(ModelError::validation("pair friendLevel must be identical"));
        }
        if self.region() != other.region() || self.jurisdiction() != other.jurisdiction() {
            return Err(ModelError::validation(
                "pair region and jurisdiction must be identical",
            ));
        }
        if self.salt()? == other.salt()? {
            return Err(ModelError::validation("pair salts must be distinct"));
        }
        if self.model.owner()? == other.model.owner()? {
            return Err(ModelError::validation("pair owners must be distinct"));
        }

        let digest = self.hash_friend_constraints(other, extender)?;
        let mirrored = other.hash_friend_constraints(self, extender)?;
        if digest != mirrored {
            return Err(ModelError::validation(
                "pair constraints are not symmetric",
            ));
        }
        for cert in [self, other] {
            match cert.constraints() {
                Some(found) if found == digest => {}
                _ => {
                    return Err(ModelError::validation(
                        "friend cert constraints do not match the pair digest",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Validate the cert and, when `deep`, its chain and signatures.
    pub fn validate(&self, deep: bool, now: Option<u64>) -> Result<()> {
        self.validate_cert_base(now)?;
        self.salt()?;
        self.friend_level()?;
        if deep {
            validate_chain(self, false)?;
            if !self.model.verify(false)? {
                return Err(ModelError::validation("signature verification failed"));
            }
        }
        Ok(())
    }
}

impl Default for FriendCert {
    fn default() -> Self {
        Self::new()
    }
}

impl Cert for FriendCert {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }
}
