//! Deterministic fixtures for tests.

#![allow(clippy::expect_used)]

use trellis_codec::Value;
use trellis_crypto::{KeyPair, Scheme};
use trellis_model::fields::{
    IDX_CREATION_TIME, IDX_DATA, IDX_EXPIRE_TIME, IDX_EXTENSIONS, IDX_OWNER, IDX_PARENT_ID,
    IDX_REF_ID, IDX_TARGET_PUBLIC_KEY,
};
use trellis_model::{DataNode, LicenseNode, Node, NodeFlags};
use trellis_protocol::{PeerProps, Version, SERIALIZE_FORMAT_BINCODE};

/// Deterministic Ed25519 key pair from a one-byte seed.
#[must_use]
pub fn keypair_from_seed(seed: u8) -> KeyPair {
    KeyPair::from_secret(Scheme::Ed25519, [seed; 32]).expect("seeded keypair")
}

/// A mutable data node draft with the standard fixture fields.
#[must_use]
pub fn data_node_draft(owner: &KeyPair, parent: [u8; 32], data: &[u8]) -> DataNode {
    let mut node = DataNode::new();
    let model = node.model_mut();
    model
        .set(IDX_OWNER, Value::Bytes(owner.public_key().as_bytes().to_vec()))
        .expect("draft owner");
    model
        .set(IDX_CREATION_TIME, Value::UInt(1_700_000_000_000))
        .expect("draft creationTime");
    model
        .set(IDX_PARENT_ID, Value::Bytes(parent.to_vec()))
        .expect("draft parentId");
    model
        .set(IDX_DATA, Value::Bytes(data.to_vec()))
        .expect("draft data");
    node
}

/// A packed, signed data node; returns the node and its packed image.
#[must_use]
pub fn signed_data_node(owner: &KeyPair, parent: [u8; 32], data: &[u8]) -> (DataNode, Vec<u8>) {
    let mut node = data_node_draft(owner, parent, data);
    node.model_mut().sign(owner).expect("sign fixture node");
    let bytes = node.model_mut().pack().expect("pack fixture node").to_vec();
    (node, bytes)
}

/// A mutable license node draft granting `ref_id` under `parent` to
/// `target`, issued by `issuer`.
#[must_use]
pub fn license_draft(
    issuer: &KeyPair,
    target: &[u8],
    ref_id: [u8; 32],
    parent: [u8; 32],
) -> LicenseNode {
    let mut license = LicenseNode::new();
    license
        .store_node_flags(NodeFlags {
            is_leaf: true,
            is_unique: true,
            ..Default::default()
        })
        .expect("license flags");
    let model = license.model_mut();
    model
        .set(IDX_OWNER, Value::Bytes(issuer.public_key().as_bytes().to_vec()))
        .expect("license owner");
    model
        .set(IDX_CREATION_TIME, Value::UInt(1_700_000_000_000))
        .expect("license creationTime");
    model
        .set(IDX_EXPIRE_TIME, Value::UInt(1_800_000_000_000))
        .expect("license expireTime");
    model
        .set(IDX_PARENT_ID, Value::Bytes(parent.to_vec()))
        .expect("license parentId");
    model
        .set(IDX_REF_ID, Value::Bytes(ref_id.to_vec()))
        .expect("license refId");
    model
        .set(IDX_TARGET_PUBLIC_KEY, Value::Bytes(target.to_vec()))
        .expect("license target");
    model
        .set(IDX_EXTENSIONS, Value::UInt(2))
        .expect("license extensions");
    license
}

/// Handshake properties for a peer presenting `public_key`.
#[must_use]
pub fn peer_props(public_key: &[u8]) -> PeerProps {
    PeerProps {
        version: Version::new(0, 1, 0),
        serialize_format: SERIALIZE_FORMAT_BINCODE,
        clock: 1_700_000_000_000,
        handshaked_public_key: public_key.to_vec(),
        auth_cert: None,
        auth_cert_public_key: None,
        app_version: None,
        region: None,
        jurisdiction: None,
    }
}
