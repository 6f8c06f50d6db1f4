//! License node: a grant of read (or write) access to a licensed node.
//!
//! Licenses chain into stacks: each extension embeds the previous license,
//! decrements the remaining extension budget, and must tighten, never widen,
//! the grant (times shrink, write-restrictive flags are preserved). A node
//! is licensed iff one of the stack's licensing hashes matches the node's
//! own license hash.

use trellis_codec::Value;
use trellis_crypto::HASH_LEN;

use crate::constraints::{ConstraintTable, LICENSE_NODE_CONSTRAINTS};
use crate::error::{ModelError, Result};
use crate::fields::{
    IDX_CREATION_TIME, IDX_EMBEDDED, IDX_EXPIRE_TIME, IDX_EXTENSIONS, IDX_JUMP_PEER_PUBLIC_KEY,
    IDX_LICENSE_CONFIG, IDX_OWNER, IDX_PARENT_ID, IDX_REF_ID, IDX_TARGET_PUBLIC_KEY,
};
use crate::flags::LicenseNodeFlags;
use crate::kind::ModelKind;
use crate::model::Model;
use crate::node::{license_hash, Node};

/// A license grant node.
#[derive(Debug, Clone)]
pub struct LicenseNode {
    model: Model,
}

impl LicenseNode {
    /// Start a new mutable license node.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: Model::new(ModelKind::LicenseNode),
        }
    }

    /// Wrap an existing carrier; the kind must match.
    pub fn from_model(model: Model) -> Result<Self> {
        if model.kind() != ModelKind::LicenseNode {
            return Err(ModelError::validation("not a license node"));
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

    /// Decoded license config flags.
    #[must_use]
    pub fn license_flags(&self) -> LicenseNodeFlags {
        LicenseNodeFlags::from_bits(self.model.config_value(IDX_LICENSE_CONFIG))
    }

    /// Store license config flags.
    pub fn store_license_flags(&mut self, license_flags: LicenseNodeFlags) -> Result<()> {
        self.model
            .set(IDX_LICENSE_CONFIG, Value::UInt(license_flags.to_bits()))
    }

    /// The public key this grant targets.
    pub fn target_public_key(&self) -> Result<&[u8]> {
        self.model
            .bytes_field(IDX_TARGET_PUBLIC_KEY)
            .ok_or_else(|| ModelError::validation("license missing targetPublicKey"))
    }

    /// Remaining extension budget.
    #[must_use]
    pub fn extensions(&self) -> u64 {
        self.model.uint_field(IDX_EXTENSIONS).unwrap_or(0)
    }

    /// Optional intermediary peer the grant may route through.
    #[must_use]
    pub fn jump_peer_public_key(&self) -> Option<&[u8]> {
        self.model.bytes_field(IDX_JUMP_PEER_PUBLIC_KEY)
    }

    /// Load the embedded (previous) license of the stack.
    pub fn load_embedded(&self) -> Result<Option<LicenseNode>> {
        match self.embedded_bytes() {
            Some(bytes) => Ok(Some(LicenseNode::decode(bytes)?)),
            None => Ok(None),
        }
    }

    /// Owner of the innermost license: the party that originally granted.
    pub fn root_issuer(&self) -> Result<Vec<u8>> {
        let mut current = self.clone();
        loop {
            match current.load_embedded()? {
                Some(inner) => current = inner,
                None => return Ok(current.model.owner()?.as_bytes().to_vec()),
            }
        }
    }

    /// Draft the next license of the stack toward `new_target`.
    ///
    /// The current target becomes the new issuer (owner); the caller signs
    /// with that key. Times must stay inside the embedded license's window
    /// and the extension budget decrements.
    pub fn extend_for(
        &self,
        new_target: &[u8],
        creation_time: u64,
        expire_time: u64,
    ) -> Result<LicenseNode> {
        if self.extensions() == 0 {
            return Err(ModelError::validation("license extension budget exhausted"));
        }
        let packed = self.model.packed()?.to_vec();

        let mut next = LicenseNode::new();
        let next_model = next.model_mut();
        next_model.set(
            IDX_OWNER,
            Value::Bytes(self.target_public_key()?.to_vec()),
        )?;
        next_model.set(IDX_CREATION_TIME, Value::UInt(creation_time))?;
        next_model.set(IDX_EXPIRE_TIME, Value::UInt(expire_time))?;
        if let Some(parent) = self.parent_id() {
            next_model.set(IDX_PARENT_ID, Value::Bytes(parent.to_vec()))?;
        }
        if let Some(ref_id) = self.ref_id() {
            next_model.set(IDX_REF_ID, Value::Bytes(ref_id.to_vec()))?;
        }
        next_model.set(IDX_TARGET_PUBLIC_KEY, Value::Bytes(new_target.to_vec()))?;
        next_model.set(IDX_EXTENSIONS, Value::UInt(self.extensions() - 1))?;
        next_model.set(IDX_EMBEDDED, Value::Bytes(packed))?;
        next.store_license_flags(self.license_flags())?;
        next.store_node_flags(self.node_flags())?;
        Ok(next)
    }

    /// The hashes this grant publishes for intersection with licensed nodes.
    ///
    /// Exactly four: every combination of last-issuer and target presence.
    /// Two more when a jump peer is declared, treating the jump peer as the
    /// target.
    pub fn licensing_hashes(&self) -> Result<Vec<[u8; HASH_LEN]>> {
        let ref_id = self
            .ref_id()
            .ok_or_else(|| ModelError::validation("license missing refId"))?;
        let parent = self.parent_id();
        let parent_ref = parent.as_ref().map(|p| p.as_slice());
        let root_issuer = self.root_issuer()?;
        let last_issuer = self.model.owner()?.as_bytes().to_vec();
        let target = self.target_public_key()?.to_vec();
        let write = self.license_flags().is_write_restrictive();

        let mut hashes = vec![
            license_hash(write, &ref_id, parent_ref, &root_issuer, None, None),
            license_hash(
                write,
                &ref_id,
                parent_ref,
                &root_issuer,
                Some(last_issuer.as_slice()),
                None,
            ),
            license_hash(
                write,
                &ref_id,
                parent_ref,
                &root_issuer,
                None,
                Some(target.as_slice()),
            ),
            license_hash(
                write,
                &ref_id,
                parent_ref,
                &root_issuer,
                Some(last_issuer.as_slice()),
                Some(target.as_slice()),
            ),
        ];
        if let Some(jump) = self.jump_peer_public_key() {
            let jump = jump.to_vec();
            hashes.push(license_hash(
                write,
                &ref_id,
                parent_ref,
                &root_issuer,
                None,
                Some(jump.as_slice()),
            ));
            hashes.push(license_hash(
                write,
                &ref_id,
                parent_ref,
                &root_issuer,
                Some(last_issuer.as_slice()),
                Some(jump.as_slice()),
            ));
        }
        Ok(hashes)
    }

    /// Validate the license node's invariants.
    pub fn validate(&self, deep: bool, now: Option<u64>) -> Result<()> {
        self.validate_base(now)?;

        let node_flags = self.node_flags();
        if !node_flags.is_leaf {
            return Err(ModelError::validation("license must be a leaf"));
        }
        if node_flags.is_public || node_flags.is_licensed {
            return Err(ModelError::validation("license must be private"));
        }
        if !node_flags.is_unique {
            return Err(ModelError::validation("license must be unique"));
        }
        if self.ref_id().is_none() {
            return Err(ModelError::validation("license missing refId"));
        }
        self.target_public_key()?;

        if let Some(embedded) = self.load_embedded()? {
            self.validate_extension(&embedded)?;
            if deep {
                embedded.validate(deep, now)?;
            }
        }

        if deep {
            if !self.model.verify(false)? {
                return Err(ModelError::validation("signature verification failed"));
            }
            if !self.model.verify_work()? {
                return Err(ModelError::Work("work proof does not hold".to_string()));
            }
            self.validate_sign_cert(now)?;
        }

        Ok(())
    }

    /// The tightening rules an extension must satisfy against the license it
    /// embeds.
    fn validate_extension(&self, embedded: &LicenseNode) -> Result<()> {
        if self.extensions() >= embedded.extensions() {
            return Err(ModelError::validation(
                "extension must decrement the extension budget",
            ));
        }
        let creation = self
            .model
            .creation_time()
            .ok_or_else(|| ModelError::validation("license missing creationTime"))?;
        let embedded_creation = embedded
            .model
            .creation_time()
            .ok_or_else(|| ModelError::validation("embedded license missing creationTime"))?;
        if creation < embedded_creation {
            return Err(ModelError::validation(
                "extension cannot predate the embedded license",
            ));
        }
        let expire = self
            .model
            .expire_time()
            .ok_or_else(|| ModelError::validation("license missing expireTime"))?;
        let embedded_expire = embedded
            .model
            .expire_time()
            .ok_or_else(|| ModelError::validation("embedded license missing expireTime"))?;
        if expire > embedded_expire {
            return Err(ModelError::validation(
                "extension cannot outlive the embedded license",
            ));
        }

        if self.ref_id() != embedded.ref_id() {
            return Err(ModelError::validation("extension must keep refId"));
        }
        if self.model.owner()?.as_bytes() != embedded.target_public_key()? {
            return Err(ModelError::validation(
                "extension owner must be the embedded license's target",
            ));
        }

        let own = self.license_flags();
        let inner = embedded.license_flags();
        if inner.restrictive_mode_writer && !own.restrictive_mode_writer {
            return Err(ModelError::validation(
                "extension must preserve restrictive writer mode",
            ));
        }
        if inner.restrictive_mode_manager && !own.restrictive_mode_manager {
            return Err(ModelError::validation(
                "extension must preserve restrictive manager mode",
            ));
        }
        Ok(())
    }
}

impl Default for LicenseNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for LicenseNode {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    fn constraint_table(&self) -> &'static ConstraintTable {
        &LICENSE_NODE_CONSTRAINTS
    }

    /// Licenses travel privately only issuer-to-target (or back), unless the
    /// grant allows the target to forward.
    fn can_send_privately(&self, source: &[u8], target: &[u8]) -> bool {
        let Ok(owner) = self.model.owner() else {
            return false;
        };
        let Ok(license_target) = self.target_public_key() else {
            return false;
        };
        if owner.as_bytes() == source && license_target == target {
            return true;
        }
        self.license_flags().allow_target_send_privately && license_target == source
    }

    fn can_receive_privately(&self, _source: &[u8], target: &[u8]) -> bool {
        match self.target_public_key() {
            Ok(license_target) => license_target == target,
            Err(_) => false,
        }
    }
}
