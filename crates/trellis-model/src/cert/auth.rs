//! Auth cert: authorization of a connecting key.
//!
//! Presented during the transport handshake: the owner authorizes the
//! handshaking key (a target key) to connect on its behalf, optionally
//! bounded to a region and jurisdiction.

use crate::cert::{validate_chain, Cert};
use crate::error::{ModelError, Result};
use crate::fields::{IDX_CERT_JURISDICTION, IDX_CERT_REGION};
use crate::kind::ModelKind;
use crate::model::Model;

/// A connection-authorization cert.
#[derive(Debug, Clone)]
pub struct AuthCert {
    model: Model,
}

impl AuthCert {
    /// Start a new mutable auth cert.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: Model::new(ModelKind::AuthCert),
        }
    }

    /// Wrap an existing carrier; the kind must match.
    pub fn from_model(model: Model) -> Result<Self> {
        if model.kind() != ModelKind::AuthCert {
            return Err(ModelError::validation("not an auth cert"));
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

    /// Region the authorization is valid in.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.model.str_field(IDX_CERT_REGION)
    }

    /// Jurisdiction the authorization is valid in.
    #[must_use]
    pub fn jurisdiction(&self) -> Option<&str> {
        self.model.str_field(IDX_CERT_JURISDICTION)
    }

    /// Whether a handshaking key is one of the authorized targets.
    pub fn authorizes(&self, handshaked_key: &[u8]) -> Result<bool> {
        let keys = self.target_public_keys()?;
        if keys.is_empty() {
            // Implicit single-target form: the owner connects itself.
            return Ok(self.model.owner()?.as_bytes() == handshaked_key);
        }
        Ok(keys.iter().any(|k| k.as_slice() == handshaked_key))
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

impl Default for AuthCert {
    fn default() -> Self {
        Self::new()
    }
}

impl Cert for AuthCert {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }
}
