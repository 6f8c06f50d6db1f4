//! Node kinds: data, license, carrier.
//!
//! Nodes participate in the parent/child graph. Shared behavior (flags,
//! placement, private/public/licensed classification, base invariants) lives
//! on the [`Node`] trait; kind-specific rules live on the wrappers.

mod carrier;
mod data;
mod license;

pub use carrier::CarrierNode;
pub use data::DataNode;
pub use license::LicenseNode;

use tracing::debug;
use trellis_crypto::{ChainHasher, HASH_LEN};

use crate::cert::{validate_chain, Cert, SignCert};
use crate::constraints::ConstraintTable;
use crate::error::{ModelError, Result};
use crate::fields::{
    IDX_CONFIG, IDX_EMBEDDED, IDX_JURISDICTION, IDX_LICENSE_MAX_DISTANCE,
    IDX_LICENSE_MIN_DISTANCE, IDX_PARENT_ID, IDX_REF_ID, IDX_REGION, IDX_SIGN_CERT,
    IDX_TRANSIENT_CONFIG,
};
use crate::flags::{self, NodeFlags};
use crate::model::Model;

/// Largest permitted license stack distance.
pub const LICENSE_MAX_DISTANCE_LIMIT: u64 = 4;

/// Shared node behavior over the generic carrier.
pub trait Node {
    /// The underlying model.
    fn model(&self) -> &Model;
    /// The underlying model, mutably.
    fn model_mut(&mut self) -> &mut Model;
    /// The kind's locked-config mapping.
    fn constraint_table(&self) -> &'static ConstraintTable;

    /// Constraints digest for a locked-config bitmap, under this kind's
    /// mapping table.
    fn hash_constraints(&self, locked_config: u64) -> Result<[u8; HASH_LEN]> {
        let model = self.model();
        Ok(crate::constraints::hash_constraints(
            model.packed()?,
            locked_config,
            self.constraint_table(),
            |index| model.config_value(index),
        )?)
    }

    /// Parent node id.
    fn parent_id(&self) -> Option<[u8; 32]> {
        self.model()
            .bytes_field(IDX_PARENT_ID)
            .and_then(|b| <[u8; 32]>::try_from(b).ok())
    }

    /// Decoded base config flags.
    fn node_flags(&self) -> NodeFlags {
        NodeFlags::from_bits(self.model().config_value(IDX_CONFIG))
    }

    /// Store base config flags.
    fn store_node_flags(&mut self, node_flags: NodeFlags) -> Result<()> {
        self.model_mut()
            .set(IDX_CONFIG, trellis_codec::Value::UInt(node_flags.to_bits()))
    }

    /// Whether the node is inactive (transient bit).
    fn is_inactive(&self) -> bool {
        flags::bit(
            self.model().config_value(IDX_TRANSIENT_CONFIG),
            flags::TRANSIENT_IS_INACTIVE,
        )
    }

    /// Readable by anyone.
    fn is_public(&self) -> bool {
        self.node_flags().is_public
    }

    /// Requires a license to read.
    fn is_licensed(&self) -> bool {
        self.node_flags().is_licensed
    }

    /// Neither public nor licensed.
    fn is_private(&self) -> bool {
        !self.is_public() && !self.is_licensed()
    }

    /// Region code, if declared.
    fn region(&self) -> Option<&str> {
        self.model().str_field(IDX_REGION)
    }

    /// Jurisdiction code, if declared.
    fn jurisdiction(&self) -> Option<&str> {
        self.model().str_field(IDX_JURISDICTION)
    }

    /// Referenced node id.
    fn ref_id(&self) -> Option<[u8; 32]> {
        self.model()
            .bytes_field(IDX_REF_ID)
            .and_then(|b| <[u8; 32]>::try_from(b).ok())
    }

    /// Whether another node may be packed inside this one.
    fn can_send_embedded(&self) -> bool {
        self.node_flags().allow_embed
    }

    /// Whether this node may travel privately from `source` to `target`.
    ///
    /// Public nodes always may; private and licensed nodes only between
    /// their owner and a counterparty.
    fn can_send_privately(&self, source: &[u8], target: &[u8]) -> bool {
        if self.is_public() {
            return true;
        }
        match self.model().owner() {
            Ok(owner) => owner.as_bytes() == source || owner.as_bytes() == target,
            Err(_) => false,
        }
    }

    /// Whether `target` may hold this node when it arrives privately.
    fn can_receive_privately(&self, _source: &[u8], target: &[u8]) -> bool {
        if self.is_public() {
            return true;
        }
        match self.model().owner() {
            Ok(owner) => owner.as_bytes() == target,
            Err(_) => false,
        }
    }

    /// Deduplication hash for `IsUnique` nodes.
    ///
    /// Binds the parent, the owner (or the referenced node when rights come
    /// by association), and the node's kind.
    fn unique_hash(&self) -> Result<[u8; 32]> {
        let model = self.model();
        let mut chain = ChainHasher::new();
        chain.update(model.kind().type_tuple());
        match self.parent_id() {
            Some(parent) => chain.update(&parent),
            None => chain.update_absent(),
        }
        if self.node_flags().has_rights_by_association {
            match self.ref_id() {
                Some(ref_id) => chain.update(&ref_id),
                None => chain.update_absent(),
            }
        } else {
            chain.update(model.owner()?.as_bytes());
        }
        Ok(chain.finalize())
    }

    /// Base node invariants, shared by every node kind.
    ///
    /// `now` bounds the creation time when given.
    fn validate_base(&self, now: Option<u64>) -> Result<()> {
        let model = self.model();
        let node_flags = self.node_flags();

        let creation = model
            .creation_time()
            .ok_or_else(|| ModelError::validation("creationTime missing"))?;
        if let Some(expire) = model.expire_time() {
            if expire <= creation {
                return Err(ModelError::validation(
                    "expireTime must exceed creationTime",
                ));
            }
        }
        if let Some(now) = now {
            if creation > now {
                return Err(ModelError::validation("creationTime in the future"));
            }
            if let Some(expire) = model.expire_time() {
                if now > expire {
                    return Err(ModelError::validation("node expired"));
                }
            }
        }

        if node_flags.is_public && node_flags.is_licensed {
            return Err(ModelError::validation(
                "node cannot be both public and licensed",
            ));
        }

        if node_flags.has_rights_by_association {
            if !self.is_private() {
                return Err(ModelError::validation(
                    "rights by association requires a private node",
                ));
            }
            if self.ref_id().is_none() {
                return Err(ModelError::validation(
                    "rights by association requires refId",
                ));
            }
            if node_flags.allow_embed {
                return Err(ModelError::validation(
                    "rights by association excludes allowEmbed",
                ));
            }
        }

        let min_distance = model.uint_field(IDX_LICENSE_MIN_DISTANCE);
        let max_distance = model.uint_field(IDX_LICENSE_MAX_DISTANCE);
        match (min_distance, max_distance) {
            (None, None) => {}
            (Some(min), Some(max)) => {
                if min > max || max > LICENSE_MAX_DISTANCE_LIMIT {
                    return Err(ModelError::validation(
                        "license distances must satisfy min <= max <= 4",
                    ));
                }
            }
            _ => {
                return Err(ModelError::validation(
                    "license distances must both be set or neither",
                ));
            }
        }

        Ok(())
    }

    /// Validate an attached sign cert's authority over this node.
    ///
    /// The cert must cover this node's type, terminate its chain at
    /// countdown zero, and (when it pins content) bind this node's
    /// constraints digest under its locked config.
    fn validate_sign_cert(&self, now: Option<u64>) -> Result<()> {
        let Some(cert_bytes) = self.model().bytes_field(IDX_SIGN_CERT) else {
            return Ok(());
        };
        let cert = SignCert::decode(cert_bytes)?;
        cert.validate(false, now)?;
        if !cert.may_sign_type(self.model().kind().type_tuple()) {
            debug!(kind = %self.model().kind(), "sign cert target type does not cover the node");
            return Err(ModelError::validation(
                "sign cert does not cover this model type",
            ));
        }
        validate_chain(&cert, true)?;
        if let Some(locked_config) = cert.locked_config() {
            cert.binds_digest(self.hash_constraints(locked_config)?)?;
        }
        Ok(())
    }

    /// Enforce the embedding rule against a node being packed inside this
    /// one: private sub-models only embed under the same owner, and the
    /// sub-model must allow embedding at all.
    fn check_embed<N: Node + ?Sized>(&self, embedded: &N) -> Result<()> {
        if !embedded.can_send_embedded() {
            return Err(ModelError::validation("embedded node disallows embedding"));
        }
        if embedded.is_private() {
            let outer = self.model().owner()?;
            let inner = embedded.model().owner()?;
            if outer != inner {
                return Err(ModelError::validation(
                    "private node embeds only under the same owner",
                ));
            }
        }
        Ok(())
    }

    /// Raw bytes of the embedded sub-model, if any.
    fn embedded_bytes(&self) -> Option<&[u8]> {
        self.model().bytes_field(IDX_EMBEDDED)
    }
}

/// The hash shape shared by license grants and licensed nodes.
///
/// Binds `(mode, refId, parentId, rootIssuer, lastIssuer?, targetPublicKey?)`.
/// Absent components advance the chain without content so every combination
/// occupies a distinct position.
#[must_use]
pub fn license_hash(
    write: bool,
    ref_id: &[u8],
    parent_id: Option<&[u8]>,
    root_issuer: &[u8],
    last_issuer: Option<&[u8]>,
    target: Option<&[u8]>,
) -> [u8; 32] {
    let mut chain = ChainHasher::new();
    chain.update(&[u8::from(write)]);
    chain.update(ref_id);
    match parent_id {
        Some(parent) => chain.update(parent),
        None => chain.update_absent(),
    }
    chain.update(root_issuer);
    match last_issuer {
        Some(issuer) => chain.update(issuer),
        None => chain.update_absent(),
    }
    match target {
        Some(target) => chain.update(target),
        None => chain.update_absent(),
    }
    chain.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn license_hash_distinguishes_modes_and_presence() {
        let ref_id = [1u8; 32];
        let parent = [2u8; 32];
        let issuer = [3u8; 32];

        let parent_ref = Some(parent.as_slice());
        let read = license_hash(false, &ref_id, parent_ref, &issuer, None, None);
        let write = license_hash(true, &ref_id, parent_ref, &issuer, None, None);
        assert_ne!(read, write);

        let key = [4u8; 32];
        let with_last =
            license_hash(false, &ref_id, parent_ref, &issuer, Some(key.as_slice()), None);
        let with_target =
            license_hash(false, &ref_id, parent_ref, &issuer, None, Some(key.as_slice()));
        // Same key bytes in a different position must produce different hashes.
        assert_ne!(with_last, with_target);
    }
}
