//! Inbound permission enforcement.
//!
//! Pure functions applied to every inbound request before it reaches the
//! application handler. A denial carries the explanation string sent back
//! with the `NotAllowed` status; an accepted request may come back rewritten
//! (source key, embed clauses, locality scope).

use std::collections::HashSet;

use trellis_protocol::{AllowEmbed, FetchRequest, Filter, Permissions};

/// Locality the enforcement rewrites requests against.
#[derive(Debug, Clone, Default)]
pub struct Locality {
    /// Locally declared region.
    pub region: Option<String>,
    /// Locally declared jurisdiction.
    pub jurisdiction: Option<String>,
    /// Region the remote declared at handshake.
    pub remote_region: Option<String>,
    /// Jurisdiction the remote declared at handshake.
    pub remote_jurisdiction: Option<String>,
}

/// Intersection of two declared locality values.
///
/// An undeclared side is a wildcard; diverging declarations intersect to
/// empty, which storage treats as "no locality access".
fn intersect(local: Option<&str>, remote: Option<&str>) -> String {
    match (local, remote) {
        (Some(a), Some(b)) if a == b => a.to_string(),
        (Some(_), Some(_)) => String::new(),
        (Some(a), None) => a.to_string(),
        (None, Some(b)) => b.to_string(),
        (None, None) => String::new(),
    }
}

/// Enforce fetch permissions, rewriting the request in place.
///
/// Rejections name the failed rule; on success the request's embed clauses
/// are intersected with the allowed ones, locality is rewritten, and the
/// source key is pinned to the verified remote key unless unchecked access
/// is on.
pub fn enforce_fetch(
    perms: &Permissions,
    locality: &Locality,
    remote_public_key: &[u8],
    request: &mut FetchRequest,
) -> Result<(), String> {
    let wants_trigger =
        !request.query.trigger_node_id.is_empty() || request.query.trigger_interval > 0;
    if wants_trigger && !perms.allow_trigger {
        return Err("trigger subscriptions not permitted".to_string());
    }

    for clause in &request.query.match_clauses {
        if !perms.node_type_allowed(&clause.node_type) {
            return Err(format!(
                "node type {} not permitted",
                hex::encode(&clause.node_type)
            ));
        }
    }

    if !perms.algo_allowed(request.crdt.algo) {
        return Err(format!("crdt algorithm {} not permitted", request.crdt.algo));
    }

    request.query.embed = intersect_embed(&request.query.embed, &perms.allow_embed);

    request.query.region = intersect(
        locality.region.as_deref(),
        locality.remote_region.as_deref(),
    );
    request.query.jurisdiction = intersect(
        locality.jurisdiction.as_deref(),
        locality.remote_jurisdiction.as_deref(),
    );

    if !perms.allow_unchecked_access {
        request.query.source_public_key = remote_public_key.to_vec();
    }
    Ok(())
}

/// Intersect requested embed clauses with the permitted ones.
///
/// A requested clause survives when its node type extends a permitted
/// clause's prefix; the filters of every matching permitted clause are
/// unioned into it and de-duplicated.
fn intersect_embed(requested: &[AllowEmbed], allowed: &[AllowEmbed]) -> Vec<AllowEmbed> {
    let mut result = Vec::new();
    for request_clause in requested {
        let mut filters: Vec<Filter> = Vec::new();
        let mut seen: HashSet<Filter> = HashSet::new();
        let mut matched = false;
        for allowed_clause in allowed {
            if !request_clause.node_type.starts_with(&allowed_clause.node_type[..]) {
                continue;
            }
            matched = true;
            for filter in request_clause
                .filters
                .iter()
                .chain(allowed_clause.filters.iter())
            {
                if seen.insert(filter.clone()) {
                    filters.push(filter.clone());
                }
            }
        }
        if matched {
            result.push(AllowEmbed {
                node_type: request_clause.node_type.clone(),
                filters,
            });
        }
    }
    result
}

/// Enforce a boolean permission (store, read-blob, write-blob), returning
/// the rewritten source key.
pub fn enforce_simple(
    allowed: bool,
    what: &str,
    perms: &Permissions,
    remote_public_key: &[u8],
    source_public_key: &mut Vec<u8>,
) -> Result<(), String> {
    if !allowed {
        return Err(format!("{what} not permitted"));
    }
    rewrite_source_key(perms, remote_public_key, source_public_key);
    Ok(())
}

/// Pin a request's source key to the verified remote key unless unchecked
/// access is granted.
pub fn rewrite_source_key(
    perms: &Permissions,
    remote_public_key: &[u8],
    source_public_key: &mut Vec<u8>,
) {
    if !perms.allow_unchecked_access {
        *source_public_key = remote_public_key.to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_model::kind::{DATA_NODE_TYPE, NODE_TYPE};
    use trellis_protocol::{FetchQuery, Match};

    fn fetch_for(node_type: &[u8]) -> FetchRequest {
        FetchRequest {
            query: FetchQuery {
                match_clauses: vec![Match {
                    node_type: node_type.to_vec(),
                    filters: Vec::new(),
                    limit: 0,
                }],
                source_public_key: b"claimed".to_vec(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn node_type_prefix_denial() {
        let perms = Permissions {
            allow_node_types: vec![vec![0x01, 0x02, 0x01]],
            ..Permissions::default()
        };
        let mut request = fetch_for(&[0x01, 0x02, 0x02]);
        let denial = enforce_fetch(&perms, &Locality::default(), &[9; 32], &mut request);
        assert!(denial.is_err());
        assert!(!denial.unwrap_err().is_empty());
    }

    #[test]
    fn trigger_denied_without_permission() {
        let perms = Permissions {
            allow_node_types: vec![NODE_TYPE.to_vec()],
            ..Permissions::default()
        };
        let mut request = fetch_for(DATA_NODE_TYPE);
        request.query.trigger_interval = 30;
        assert!(enforce_fetch(&perms, &Locality::default(), &[9; 32], &mut request).is_err());
    }

    #[test]
    fn source_key_rewritten_unless_unchecked() {
        let perms = Permissions {
            allow_node_types: vec![NODE_TYPE.to_vec()],
            ..Permissions::default()
        };
        let mut request = fetch_for(DATA_NODE_TYPE);
        enforce_fetch(&perms, &Locality::default(), &[9; 32], &mut request).unwrap();
        assert_eq!(request.query.source_public_key, vec![9; 32]);

        let unchecked = Permissions {
            allow_unchecked_access: true,
            allow_node_types: vec![NODE_TYPE.to_vec()],
            ..Permissions::default()
        };
        let mut request = fetch_for(DATA_NODE_TYPE);
        enforce_fetch(&unchecked, &Locality::default(), &[9; 32], &mut request).unwrap();
        assert_eq!(request.query.source_public_key, b"claimed".to_vec());
    }

    #[test]
    fn embed_clauses_intersect_and_union_filters() {
        let allowed = vec![AllowEmbed {
            node_type: NODE_TYPE.to_vec(),
            filters: vec![Filter {
                field: "owner".into(),
                operator: "=".into(),
                value: "self".into(),
            }],
        }];
        let requested = vec![
            AllowEmbed {
                node_type: DATA_NODE_TYPE.to_vec(),
                filters: vec![Filter {
                    field: "owner".into(),
                    operator: "=".into(),
                    value: "self".into(),
                }],
            },
            AllowEmbed {
                // Cert prefix: not under the allowed node prefix.
                node_type: vec![0x01, 0x02, 0x01, 0x02],
                filters: Vec::new(),
            },
        ];
        let result = intersect_embed(&requested, &allowed);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].node_type, DATA_NODE_TYPE.to_vec());
        // The duplicate filter is collapsed.
        assert_eq!(result[0].filters.len(), 1);
    }

    #[test]
    fn locality_intersection_rules() {
        assert_eq!(intersect(Some("EU"), Some("EU")), "EU");
        assert_eq!(intersect(Some("EU"), Some("US")), "");
        assert_eq!(intersect(Some("EU"), None), "EU");
        assert_eq!(intersect(None, Some("US")), "US");
        assert_eq!(intersect(None, None), "");
    }

    #[test]
    fn simple_permission_gate() {
        let perms = Permissions::default();
        let mut key = b"claimed".to_vec();
        assert!(enforce_simple(false, "store", &perms, &[9; 32], &mut key).is_err());
        enforce_simple(true, "store", &perms, &[9; 32], &mut key).unwrap();
        assert_eq!(key, vec![9; 32]);
    }
}
