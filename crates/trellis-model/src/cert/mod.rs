//! Cert kinds: sign, auth, friend.
//!
//! Certs delegate authority. A sign cert lets target keys sign models on the
//! owner's behalf; chains of sign certs walk a strictly decreasing countdown
//! toward the leaf. Every cert may pin the exact content it is willing to
//! cover through the constraints digest.

mod auth;
mod friend;
mod sign;

pub use auth::AuthCert;
pub use friend::FriendCert;
pub use sign::SignCert;

use trellis_codec::{unpack as codec_unpack, Value};
use trellis_crypto::HASH_LEN;

use crate::constraints::{hash_constraints, CERT_CONSTRAINTS};
use crate::error::{ModelError, Result};
use crate::fields::{
    IDX_CONSTRAINTS, IDX_COUNTDOWN, IDX_LOCKED_CONFIG, IDX_MULTISIG_THRESHOLD, IDX_SIGN_CERT,
    IDX_TARGET_PUBLIC_KEYS, IDX_TARGET_TYPE, MAX_SIGNATURES, MAX_TARGET_PUBLIC_KEYS,
    TARGET_KEYS_SCHEMA,
};
use crate::model::Model;

/// Shared cert behavior over the generic carrier.
pub trait Cert {
    /// The underlying model.
    fn model(&self) -> &Model;
    /// The underlying model, mutably.
    fn model_mut(&mut self) -> &mut Model;

    /// The constraints digest, if the cert pins content.
    fn constraints(&self) -> Option<[u8; HASH_LEN]> {
        self.model()
            .bytes_field(IDX_CONSTRAINTS)
            .and_then(|b| <[u8; HASH_LEN]>::try_from(b).ok())
    }

    /// The locked-config bitmap selecting constrained fields and flags.
    fn locked_config(&self) -> Option<u64> {
        self.model().uint_field(IDX_LOCKED_CONFIG)
    }

    /// Model-type prefix the cert may sign.
    fn target_type(&self) -> Option<&[u8]> {
        self.model().bytes_field(IDX_TARGET_TYPE)
    }

    /// Delegated signer keys, in slot order.
    fn target_public_keys(&self) -> Result<Vec<Vec<u8>>> {
        match self.model().get(IDX_TARGET_PUBLIC_KEYS) {
            None => Ok(Vec::new()),
            Some(Value::Props(props)) => Ok(props
                .values()
                .filter_map(|v| v.as_bytes().map(<[u8]>::to_vec))
                .collect()),
            Some(Value::Bytes(bytes)) => {
                let props = codec_unpack(bytes, &TARGET_KEYS_SCHEMA, false, u8::MAX)?;
                Ok(props
                    .values()
                    .filter_map(|v| v.as_bytes().map(<[u8]>::to_vec))
                    .collect())
            }
            Some(_) => Err(ModelError::validation("malformed targetPublicKeys")),
        }
    }

    /// Required signature count; one when unset.
    fn multisig_threshold(&self) -> u64 {
        self.model().uint_field(IDX_MULTISIG_THRESHOLD).unwrap_or(1)
    }

    /// Chain countdown, zero at a terminal cert.
    fn countdown(&self) -> u64 {
        self.model().uint_field(IDX_COUNTDOWN).unwrap_or(0)
    }

    /// Load the parent cert of the chain, if any.
    fn load_sign_cert(&self) -> Result<Option<SignCert>> {
        match self.model().bytes_field(IDX_SIGN_CERT) {
            Some(bytes) => Ok(Some(SignCert::decode(bytes)?)),
            None => Ok(None),
        }
    }

    /// Constraints digest of this cert itself, as seen by the cert above it
    /// in a chain.
    fn own_constraints_digest(&self, locked_config: u64) -> Result<[u8; HASH_LEN]> {
        let model = self.model();
        Ok(hash_constraints(
            model.packed()?,
            locked_config,
            &CERT_CONSTRAINTS,
            |index| model.config_value(index),
        )?)
    }

    /// Invariants shared by every cert kind.
    ///
    /// Both times are mandatory and ordered; the target key list is capped
    /// and the multisig threshold cannot exceed the signable slots. An empty
    /// key list with an unset threshold is the implicit single-target form.
    fn validate_cert_base(&self, now: Option<u64>) -> Result<()> {
        let model = self.model();
        let creation = model
            .creation_time()
            .ok_or_else(|| ModelError::validation("cert missing creationTime"))?;
        let expire = model
            .expire_time()
            .ok_or_else(|| ModelError::validation("cert missing expireTime"))?;
        if expire <= creation {
            return Err(ModelError::validation(
                "cert expireTime must exceed creationTime",
            ));
        }
        if let Some(now) = now {
            if creation > now {
                return Err(ModelError::validation("cert creationTime in the future"));
            }
            if now > expire {
                return Err(ModelError::validation("cert expired"));
            }
        }

        let keys = self.target_public_keys()?;
        if keys.len() > MAX_TARGET_PUBLIC_KEYS {
            return Err(ModelError::validation("too many target public keys"));
        }
        if let Some(threshold) = model.uint_field(IDX_MULTISIG_THRESHOLD) {
            let max = (MAX_SIGNATURES).min(keys.len().max(1)) as u64;
            if threshold == 0 || threshold > max {
                return Err(ModelError::validation(
                    "multisig threshold exceeds signable slots",
                ));
            }
        }
        Ok(())
    }
}

/// Walk a cert chain from its leaf, enforcing the countdown and the
/// cert-to-cert constraint bindings.
///
/// `signs_node` marks a chain whose leaf sits on a node (or another final
/// subject); such a leaf must have `countdown == 0`.
pub fn validate_chain<C: Cert>(leaf: &C, signs_node: bool) -> Result<()> {
    if signs_node && leaf.countdown() != 0 {
        return Err(ModelError::validation(
            "terminal cert must have countdown zero",
        ));
    }

    let mut child_countdown = leaf.countdown();
    let mut child_digest_input = leaf.model().packed()?.to_vec();
    let mut child_config: Vec<(u8, u64)> = config_snapshot(leaf.model());
    let mut parent = leaf.load_sign_cert()?;

    while let Some(cert) = parent {
        if cert.countdown() <= child_countdown {
            return Err(ModelError::validation(
                "cert chain countdown must strictly decrease toward the leaf",
            ));
        }
        if let Some(locked) = cert.locked_config() {
            let expected = hash_constraints(
                &child_digest_input,
                locked,
                &CERT_CONSTRAINTS,
                |index| {
                    child_config
                        .iter()
                        .find(|(i, _)| *i == index)
                        .map(|(_, v)| *v)
                        .unwrap_or(0)
                },
            )?;
            match cert.constraints() {
                Some(digest) if digest == expected => {}
                _ => {
                    return Err(ModelError::validation(
                        "cert constraints do not bind the cert it signs",
                    ));
                }
            }
        }
        child_countdown = cert.countdown();
        child_digest_input = cert.model().packed()?.to_vec();
        child_config = config_snapshot(cert.model());
        parent = cert.load_sign_cert()?;
    }
    Ok(())
}

fn config_snapshot(model: &Model) -> Vec<(u8, u64)> {
    let mut snapshot = Vec::new();
    for (&index, value) in model.props() {
        if let Some(v) = value.as_uint() {
            snapshot.push((index, v));
        }
    }
    snapshot
}
