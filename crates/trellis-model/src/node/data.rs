//! Data node: the general-purpose content carrier.

use trellis_codec::{FieldIterator, Value};
use trellis_crypto::HASH_LEN;

use crate::constraints::{ConstraintTable, DATA_NODE_CONSTRAINTS};
use crate::error::{ModelError, Result};
use crate::fields::{
    IDX_BLOB_HASH, IDX_BLOB_LENGTH, IDX_CONTENT_TYPE, IDX_COPIED_CREATION_TIME,
    IDX_COPIED_PARENT_ID, IDX_COPIED_SIGNATURES, IDX_CREATION_TIME, IDX_DATA, IDX_DATA_CONFIG,
    IDX_EMBEDDED, IDX_ID2, IDX_PARENT_ID, IDX_SIGNATURE1, IDX_SIGNATURE3,
};
use crate::flags::DataNodeFlags;
use crate::kind::ModelKind;
use crate::model::Model;
use crate::node::{license_hash, Node};

/// A data-carrying graph node.
///
/// Carries either an inline payload (up to 1 KiB) or a reference to an
/// external blob by content hash and length. May embed another data node
/// when the embedded node allows it, and supports copying: a copy keeps the
/// original's identity as `id2` while moving to a new parent.
#[derive(Debug, Clone)]
pub struct DataNode {
    model: Model,
}

impl DataNode {
    /// Start a new mutable data node.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: Model::new(ModelKind::DataNode),
        }
    }

    /// Wrap an existing carrier; the kind must match.
    pub fn from_model(model: Model) -> Result<Self> {
        if model.kind() != ModelKind::DataNode {
            return Err(ModelError::validation("not a data node"));
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

    /// Decoded data-node config flags.
    #[must_use]
    pub fn data_flags(&self) -> DataNodeFlags {
        DataNodeFlags::from_bits(self.model.config_value(IDX_DATA_CONFIG))
    }

    /// Store data-node config flags.
    pub fn store_data_flags(&mut self, data_flags: DataNodeFlags) -> Result<()> {
        self.model
            .set(IDX_DATA_CONFIG, Value::UInt(data_flags.to_bits()))
    }

    /// Inline payload.
    #[must_use]
    pub fn data(&self) -> Option<&[u8]> {
        self.model.bytes_field(IDX_DATA)
    }

    /// Declared content type.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.model.str_field(IDX_CONTENT_TYPE)
    }

    /// External blob reference: `(content hash, byte length)`.
    #[must_use]
    pub fn blob(&self) -> Option<([u8; HASH_LEN], u64)> {
        let hash = self
            .model
            .bytes_field(IDX_BLOB_HASH)
            .and_then(|b| <[u8; HASH_LEN]>::try_from(b).ok())?;
        let length = self.model.uint_field(IDX_BLOB_LENGTH)?;
        Some((hash, length))
    }

    /// Embed another data node; the embedding rules are checked here.
    pub fn embed(&mut self, embedded: &mut DataNode) -> Result<()> {
        self.check_embed(embedded)?;
        let bytes = embedded.model.pack()?.to_vec();
        self.model.set(IDX_EMBEDDED, Value::Bytes(bytes))
    }

    /// Load the embedded data node, if any.
    pub fn load_embedded(&self) -> Result<Option<DataNode>> {
        match self.embedded_bytes() {
            Some(bytes) => Ok(Some(DataNode::decode(bytes)?)),
            None => Ok(None),
        }
    }

    /// Derive a copy of this node under a new parent.
    ///
    /// The copy records the original parent id, creation time, and signature
    /// stack in reserved fields, and exposes the original `id1` as its
    /// `id2`. The caller signs the copy afresh; `creation_time` must be at
    /// or after the original's.
    pub fn copy_to(&self, new_parent: [u8; 32], creation_time: u64) -> Result<DataNode> {
        let packed = self.model.packed()?;
        let original_creation = self
            .model
            .creation_time()
            .ok_or_else(|| ModelError::validation("original lacks creationTime"))?;
        if creation_time < original_creation {
            return Err(ModelError::validation(
                "copy creationTime must not precede the original",
            ));
        }
        let original_parent = self
            .parent_id()
            .ok_or_else(|| ModelError::validation("original lacks parentId"))?;
        if original_parent == new_parent {
            return Err(ModelError::validation("copy must move to a new parent"));
        }

        let mut props = self.model.props().clone();
        // Strip the original's signatures and transient fields; preserve them
        // in the copy's reserved fields instead.
        let mut original_signatures = Vec::new();
        for index in IDX_SIGNATURE1..=IDX_SIGNATURE3 {
            if let Some(field) = FieldIterator::get(packed, index)? {
                original_signatures.extend_from_slice(field.raw);
            }
            props.remove(&index);
        }
        props.retain(|&index, _| index < 128);

        props.insert(IDX_PARENT_ID, Value::Bytes(new_parent.to_vec()));
        props.insert(IDX_CREATION_TIME, Value::UInt(creation_time));
        props.insert(
            IDX_COPIED_PARENT_ID,
            Value::Bytes(original_parent.to_vec()),
        );
        props.insert(IDX_COPIED_CREATION_TIME, Value::UInt(original_creation));
        props.insert(IDX_COPIED_SIGNATURES, Value::Bytes(original_signatures));
        props.insert(IDX_ID2, Value::Bytes(self.model.id1()?.to_vec()));

        Ok(DataNode {
            model: Model::from_props(ModelKind::DataNode, props),
        })
    }

    /// Whether this node is a copy.
    #[must_use]
    pub fn is_copy(&self) -> bool {
        self.model.bytes_field(IDX_COPIED_PARENT_ID).is_some()
    }

    /// The single license hash this node matches against a grant.
    pub fn license_hash_for(
        &self,
        is_write: bool,
        last_issuer: Option<&[u8]>,
        target: Option<&[u8]>,
    ) -> Result<[u8; HASH_LEN]> {
        let ref_id = self.model.id()?;
        let owner = self.model.owner()?;
        Ok(license_hash(
            is_write,
            &ref_id,
            self.parent_id().as_ref().map(|p| p.as_slice()),
            owner.as_bytes(),
            last_issuer,
            target,
        ))
    }

    /// Whether a license stack grants access to this node.
    pub fn is_licensed_by(
        &self,
        license: &super::LicenseNode,
        is_write: bool,
        target: &[u8],
    ) -> Result<bool> {
        let node_hash =
            self.license_hash_for(is_write, Some(license.model().owner()?.as_bytes()), Some(target))?;
        Ok(license.licensing_hashes()?.contains(&node_hash))
    }

    /// Validate the data node's invariants.
    ///
    /// When `deep`, also verifies signatures, the work proof, and the
    /// embedded sub-model's own validity.
    pub fn validate(&self, deep: bool, now: Option<u64>) -> Result<()> {
        self.validate_base(now)?;

        let has_data = self.data().is_some();
        let has_blob = self.model.bytes_field(IDX_BLOB_HASH).is_some();
        if has_blob && self.model.uint_field(IDX_BLOB_LENGTH).is_none() {
            return Err(ModelError::validation("blobHash requires blobLength"));
        }
        if has_data && has_blob {
            return Err(ModelError::validation(
                "inline data and blob reference are mutually exclusive",
            ));
        }

        if self.is_copy() {
            self.validate_copy()?;
        }

        if deep {
            if !self.model.verify(false)? {
                return Err(ModelError::validation("signature verification failed"));
            }
            if !self.model.verify_work()? {
                return Err(ModelError::Work("work proof does not hold".to_string()));
            }
            self.validate_sign_cert(now)?;
            if let Some(embedded) = self.load_embedded()? {
                self.check_embed(&embedded)?;
                embedded.validate(false, now)?;
            }
        }

        Ok(())
    }

    fn validate_copy(&self) -> Result<()> {
        let copied_parent = self
            .model
            .bytes_field(IDX_COPIED_PARENT_ID)
            .ok_or_else(|| ModelError::validation("copy missing copiedParentId"))?;
        let parent = self
            .parent_id()
            .ok_or_else(|| ModelError::validation("copy missing parentId"))?;
        if copied_parent == parent {
            return Err(ModelError::validation("not a valid copy: same parent"));
        }
        let copied_creation = self
            .model
            .uint_field(IDX_COPIED_CREATION_TIME)
            .ok_or_else(|| ModelError::validation("copy missing copiedCreationTime"))?;
        let creation = self
            .model
            .creation_time()
            .ok_or_else(|| ModelError::validation("copy missing creationTime"))?;
        if copied_creation > creation {
            return Err(ModelError::validation(
                "not a valid copy: original is newer",
            ));
        }
        if self.model.id2().is_none() {
            return Err(ModelError::validation("copy missing id2"));
        }
        Ok(())
    }
}

impl Default for DataNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for DataNode {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    fn constraint_table(&self) -> &'static ConstraintTable {
        &DATA_NODE_CONSTRAINTS
    }
}
