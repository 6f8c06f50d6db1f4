//! Per-connection permissions and the standard presets.

use serde::{Deserialize, Serialize};

use trellis_model::kind::{MODEL_TYPE, NODE_TYPE};

use crate::messages::AllowEmbed;

/// What a remote peer may ask of the local side.
///
/// Enforced on every inbound request before it reaches the application
/// handler; see the peer client for the enforcement rules.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Permissions {
    /// Skip rewriting the request's source key to the handshaked key.
    pub allow_unchecked_access: bool,
    /// Permit trigger subscriptions on fetch.
    pub allow_trigger: bool,
    /// Model-type prefixes the remote may fetch; empty denies all fetches.
    pub allow_node_types: Vec<Vec<u8>>,
    /// CRDT algorithm ids the remote may request views with.
    pub allow_algos: Vec<u32>,
    /// Embed clauses the remote's fetches are intersected against.
    pub allow_embed: Vec<AllowEmbed>,
    /// Permit store requests.
    pub allow_store: bool,
    /// Permit blob reads.
    pub allow_read_blob: bool,
    /// Permit blob writes.
    pub allow_write_blob: bool,
}

impl Permissions {
    /// Deny everything (unsubscribe and generic messages still pass).
    #[must_use]
    pub fn locked() -> Self {
        Self::default()
    }

    /// Permit fetching the base-node prefix; deny store and blobs.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            allow_node_types: vec![NODE_TYPE.to_vec()],
            ..Self::default()
        }
    }

    /// Permit all fetches and stores; source keys still rewritten.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            allow_unchecked_access: false,
            allow_trigger: true,
            allow_node_types: vec![MODEL_TYPE.to_vec()],
            // CRDT algorithm ids are assigned by the storage collaborator.
            allow_algos: vec![1, 2, 3],
            allow_embed: vec![AllowEmbed {
                node_type: MODEL_TYPE.to_vec(),
                filters: Vec::new(),
            }],
            allow_store: true,
            allow_read_blob: true,
            allow_write_blob: true,
        }
    }

    /// Permissive plus unchecked access: source keys pass through.
    #[must_use]
    pub fn unchecked_permissive() -> Self {
        Self {
            allow_unchecked_access: true,
            ..Self::permissive()
        }
    }

    /// Whether a requested model-type prefix is fetchable.
    ///
    /// The request's type must extend (or equal) one of the allowed
    /// prefixes.
    #[must_use]
    pub fn node_type_allowed(&self, node_type: &[u8]) -> bool {
        self.allow_node_types
            .iter()
            .any(|allowed| node_type.starts_with(allowed))
    }

    /// Whether a CRDT algorithm id may be used; zero (no view) always may.
    #[must_use]
    pub fn algo_allowed(&self, algo: u32) -> bool {
        algo == 0 || self.allow_algos.contains(&algo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_model::kind::{DATA_NODE_TYPE, SIGN_CERT_TYPE};

    #[test]
    fn locked_denies_everything() {
        let perms = Permissions::locked();
        assert!(!perms.allow_store);
        assert!(!perms.node_type_allowed(DATA_NODE_TYPE));
        assert!(perms.algo_allowed(0));
        assert!(!perms.algo_allowed(1));
    }

    #[test]
    fn standard_permits_node_prefix_only() {
        let perms = Permissions::standard();
        assert!(perms.node_type_allowed(DATA_NODE_TYPE));
        assert!(!perms.node_type_allowed(SIGN_CERT_TYPE));
        assert!(!perms.allow_store);
    }

    #[test]
    fn permissive_presets() {
        let perms = Permissions::permissive();
        assert!(perms.node_type_allowed(SIGN_CERT_TYPE));
        assert!(perms.allow_store);
        assert!(!perms.allow_unchecked_access);

        let unchecked = Permissions::unchecked_permissive();
        assert!(unchecked.allow_unchecked_access);
        assert!(unchecked.allow_store);
    }

    #[test]
    fn prefix_match_rejects_diverging_type() {
        let perms = Permissions {
            allow_node_types: vec![vec![0x01, 0x02, 0x01]],
            ..Permissions::default()
        };
        assert!(perms.node_type_allowed(&[0x01, 0x02, 0x01, 0x01]));
        assert!(!perms.node_type_allowed(&[0x01, 0x02, 0x02]));
    }
}
