//! Carrier node: a transport wrapper around another node.
//!
//! A carrier moves a node across peers that should not interpret the
//! payload, typically alongside a declared payload type. The carried node
//! sits in the embedded slot and stays covered by the carrier's signature
//! chain.

use trellis_codec::Value;

use crate::constraints::{CARRIER_NODE_CONSTRAINTS, ConstraintTable};
use crate::error::{ModelError, Result};
use crate::fields::{IDX_CARRIER_PAYLOAD_TYPE, IDX_EMBEDDED};
use crate::kind::ModelKind;
use crate::model::Model;
use crate::node::Node;

/// A transport wrapper node.
#[derive(Debug, Clone)]
pub struct CarrierNode {
    model: Model,
}

impl CarrierNode {
    /// Start a new mutable carrier node.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: Model::new(ModelKind::CarrierNode),
        }
    }

    /// Wrap an existing carrier model; the kind must match.
    pub fn from_model(model: Model) -> Result<Self> {
        if model.kind() != ModelKind::CarrierNode {
            return Err(ModelError::validation("not a carrier node"));
        }
        Ok(Self { model })
    }

    /// Decode from packed bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::from_model(Model::unpack(bytes)?)
    }

    /// Consume into the carrier model.
    #[must_use]
    pub fn into_model(self) -> Model {
        self.model
    }

    /// Declared payload type of the carried node.
    #[must_use]
    pub fn payload_type(&self) -> Option<&str> {
        self.model.str_field(IDX_CARRIER_PAYLOAD_TYPE)
    }

    /// Carry a node, enforcing the embedding rules.
    pub fn carry<N: Node>(&mut self, node: &mut N) -> Result<()> {
        self.check_embed(node)?;
        let bytes = node.model_mut().pack()?.to_vec();
        self.model.set(IDX_EMBEDDED, Value::Bytes(bytes))
    }

    /// Load the carried node as a generic model.
    pub fn load_carried(&self) -> Result<Option<Model>> {
        match self.embedded_bytes() {
            Some(bytes) => Ok(Some(Model::unpack(bytes)?)),
            None => Ok(None),
        }
    }

    /// Validate the carrier node's invariants.
    ///
    /// A carrier must actually carry something and is always a leaf in the
    /// graph.
    pub fn validate(&self, deep: bool, now: Option<u64>) -> Result<()> {
        self.validate_base(now)?;

        if !self.node_flags().is_leaf {
            return Err(ModelError::validation("carrier must be a leaf"));
        }
        if self.embedded_bytes().is_none() {
            return Err(ModelError::validation("carrier must carry a node"));
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
}

impl Default for CarrierNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for CarrierNode {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    fn constraint_table(&self) -> &'static ConstraintTable {
        &CARRIER_NODE_CONSTRAINTS
    }
}
