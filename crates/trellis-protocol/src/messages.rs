//! The six request/response bodies.
//!
//! All bodies are serde structs encoded with the negotiated serialize
//! format. Node and model images stay as opaque packed byte strings.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::status::Status;

/// How a fetch treats licenses of matched nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum IncludeLicenses {
    /// Do not include licenses.
    #[default]
    None = 0,
    /// Include licenses covering matched nodes.
    Include = 1,
    /// Include licenses and offer extension candidates in `embed`.
    IncludeExtend = 2,
}

impl IncludeLicenses {
    /// Parse the wire byte.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Include),
            2 => Ok(Self::IncludeExtend),
            other => Err(ProtocolError::Malformed(format!(
                "includeLicenses value {other} out of range"
            ))),
        }
    }
}

/// An opaque query filter, interpreted by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    /// Field the filter applies to.
    pub field: String,
    /// Comparison operator.
    pub operator: String,
    /// Comparison operand.
    pub value: String,
}

/// One match clause of a fetch query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Model-type prefix the clause matches.
    #[serde(with = "serde_bytes")]
    pub node_type: Vec<u8>,
    /// Storage-interpreted filters.
    pub filters: Vec<Filter>,
    /// Per-clause result bound; zero means unbounded.
    pub limit: u32,
}

/// An embed clause: which nodes the caller wants offered for embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowEmbed {
    /// Model-type prefix the clause covers.
    #[serde(with = "serde_bytes")]
    pub node_type: Vec<u8>,
    /// Storage-interpreted filters.
    pub filters: Vec<Filter>,
}

/// The graph query of a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FetchQuery {
    /// Maximum traversal depth; negative means unbounded.
    pub depth: i32,
    /// Maximum node count; negative means unbounded.
    pub limit: i32,
    /// Only nodes stored at or after this time.
    pub cutoff_time: u64,
    /// Root of the traversal.
    #[serde(with = "serde_bytes")]
    pub root_node_id1: Vec<u8>,
    /// Drop the root itself from the result.
    pub discard_root: bool,
    /// Alternative traversal start by parent.
    #[serde(with = "serde_bytes")]
    pub parent_id: Vec<u8>,
    /// Key results are destined for.
    #[serde(with = "serde_bytes")]
    pub target_public_key: Vec<u8>,
    /// Key results are fetched on behalf of.
    #[serde(with = "serde_bytes")]
    pub source_public_key: Vec<u8>,
    /// Match clauses, unioned.
    #[serde(rename = "match")]
    pub match_clauses: Vec<Match>,
    /// Embed clauses the caller wants candidates for.
    pub embed: Vec<AllowEmbed>,
    /// Node whose change re-runs the query.
    #[serde(with = "serde_bytes")]
    pub trigger_node_id: Vec<u8>,
    /// Interval re-run in seconds; zero disables.
    pub trigger_interval: u32,
    /// Suppress the initial run, only fire on triggers.
    pub only_trigger: bool,
    /// Reverse traversal order.
    pub descending: bool,
    /// Order by storage arrival instead of creation time.
    pub order_by_storage_time: bool,
    /// Skip inactive nodes.
    pub ignore_inactive: bool,
    /// Skip nodes owned by the source key.
    pub ignore_own: bool,
    /// Keep transient fields in returned images.
    pub preserve_transient: bool,
    /// Region scope.
    pub region: String,
    /// Jurisdiction scope.
    pub jurisdiction: String,
    /// License handling.
    pub include_licenses: IncludeLicenses,
}

/// CRDT view parameters of a fetch, interpreted by the storage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FetchCrdt {
    /// CRDT algorithm id; zero means no CRDT view.
    pub algo: u32,
    /// Algorithm configuration blob.
    #[serde(with = "serde_bytes")]
    pub conf: Vec<u8>,
    /// Message id an updating view is bound to.
    #[serde(with = "serde_bytes")]
    pub msg_id: Vec<u8>,
    /// Reverse the view.
    pub reverse: bool,
    /// Head element count.
    pub head: i32,
    /// Tail element count.
    pub tail: i32,
    /// Cursor element id.
    #[serde(with = "serde_bytes")]
    pub cursor_id1: Vec<u8>,
    /// Cursor offset.
    pub cursor_index: i32,
}

/// Fetch request: query plus optional CRDT view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Graph query.
    pub query: FetchQuery,
    /// CRDT view parameters.
    pub crdt: FetchCrdt,
}

/// CRDT view delta attached to a fetch response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CrdtResult {
    /// Opaque view delta.
    #[serde(with = "serde_bytes")]
    pub delta: Vec<u8>,
    /// Updated cursor offset.
    pub cursor_index: i32,
    /// Total view length.
    pub length: i32,
}

/// One streamed fetch response message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    /// Response status.
    pub status: Status,
    /// Human-readable error when status is not `Result`.
    pub error: String,
    /// Position in the stream, starting at one; zero aborts.
    pub seq: u32,
    /// Final position of the current stream.
    pub end_seq: u32,
    /// Packed node images.
    pub nodes: Vec<serde_bytes::ByteBuf>,
    /// Packed embed-candidate images.
    pub embed: Vec<serde_bytes::ByteBuf>,
    /// CRDT view delta.
    pub crdt_result: CrdtResult,
}

impl FetchResponse {
    /// A single-message success carrying the given images.
    #[must_use]
    pub fn result(nodes: Vec<Vec<u8>>, embed: Vec<Vec<u8>>) -> Self {
        Self {
            status: Status::Result,
            error: String::new(),
            seq: 1,
            end_seq: 1,
            nodes: nodes.into_iter().map(serde_bytes::ByteBuf::from).collect(),
            embed: embed.into_iter().map(serde_bytes::ByteBuf::from).collect(),
            crdt_result: CrdtResult::default(),
        }
    }

    /// An error response, aborting the stream.
    #[must_use]
    pub fn error(status: Status, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            seq: 0,
            end_seq: 0,
            nodes: Vec::new(),
            embed: Vec::new(),
            crdt_result: CrdtResult::default(),
        }
    }

    /// Whether this message ends the current stream.
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        self.seq == self.end_seq && self.end_seq > 0
    }

    /// Whether this message aborts the stream.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        self.seq == 0
    }
}

/// Store request: node images toward the peer's storage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreRequest {
    /// Packed node images to store.
    pub nodes: Vec<serde_bytes::ByteBuf>,
    /// Key the nodes originate from.
    #[serde(with = "serde_bytes")]
    pub source_public_key: Vec<u8>,
    /// Key the nodes are stored for.
    #[serde(with = "serde_bytes")]
    pub target_public_key: Vec<u8>,
    /// Subscription message ids whose change notifications to suppress.
    pub mute_msg_ids: Vec<serde_bytes::ByteBuf>,
    /// Keep transient fields of the images.
    pub preserve_transient: bool,
    /// Batch tag; side-effects may be deferred until the batch closes.
    pub batch_id: u32,
    /// More requests of this batch follow.
    pub has_more: bool,
}

/// Store response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreResponse {
    /// Response status.
    pub status: Status,
    /// Human-readable error.
    pub error: String,
    /// `id1`s the storage accepted.
    pub stored_id1s: Vec<serde_bytes::ByteBuf>,
    /// Blob ids the storage still lacks bytes for.
    pub missing_blob_id1s: Vec<serde_bytes::ByteBuf>,
    /// Advertised sizes of the missing blobs, index-aligned.
    pub missing_blob_sizes: Vec<u64>,
}

/// Read a range of an external blob.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadBlobRequest {
    /// Node the blob belongs to.
    #[serde(with = "serde_bytes")]
    pub node_id1: Vec<u8>,
    /// Key the read is performed for.
    #[serde(with = "serde_bytes")]
    pub target_public_key: Vec<u8>,
    /// Key the read is performed by.
    #[serde(with = "serde_bytes")]
    pub source_public_key: Vec<u8>,
    /// Byte offset.
    pub pos: u64,
    /// Byte count.
    pub length: u32,
}

/// One streamed blob read response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadBlobResponse {
    /// Response status.
    pub status: Status,
    /// Human-readable error.
    pub error: String,
    /// Position in the stream, starting at one; zero aborts.
    pub seq: u32,
    /// Final position of the stream.
    pub end_seq: u32,
    /// Blob bytes of this chunk.
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    /// Offset of this chunk.
    pub pos: u64,
    /// Total blob length.
    pub blob_length: u64,
}

/// Write a range of an external blob.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WriteBlobRequest {
    /// Node the blob belongs to.
    #[serde(with = "serde_bytes")]
    pub node_id1: Vec<u8>,
    /// Key the write is performed by.
    #[serde(with = "serde_bytes")]
    pub source_public_key: Vec<u8>,
    /// Key the write is performed for.
    #[serde(with = "serde_bytes")]
    pub target_public_key: Vec<u8>,
    /// Byte offset.
    pub pos: u64,
    /// Bytes to write.
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    /// Subscription message ids whose change notifications to suppress.
    pub mute_msg_ids: Vec<serde_bytes::ByteBuf>,
}

/// Write blob response; the current length enables resume.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WriteBlobResponse {
    /// Response status.
    pub status: Status,
    /// Human-readable error.
    pub error: String,
    /// Bytes currently present on disk.
    pub current_length: u64,
}

/// Cancel a prior fetch subscription.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
    /// The message id of the original fetch.
    #[serde(with = "serde_bytes")]
    pub original_msg_id: Vec<u8>,
    /// Key the subscription was held for.
    #[serde(with = "serde_bytes")]
    pub target_public_key: Vec<u8>,
}

/// Unsubscribe response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnsubscribeResponse {
    /// Response status.
    pub status: Status,
    /// Human-readable error.
    pub error: String,
}

/// Opaque application-layer message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenericMessageRequest {
    /// Application action name.
    pub action: String,
    /// Key the message is sent by.
    #[serde(with = "serde_bytes")]
    pub source_public_key: Vec<u8>,
    /// Application payload.
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

/// Generic message response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenericMessageResponse {
    /// Response status.
    pub status: Status,
    /// Human-readable error.
    pub error: String,
    /// Application payload.
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_licenses_parses_wire_byte() {
        assert_eq!(IncludeLicenses::from_u8(0).unwrap(), IncludeLicenses::None);
        assert_eq!(
            IncludeLicenses::from_u8(2).unwrap(),
            IncludeLicenses::IncludeExtend
        );
        assert!(IncludeLicenses::from_u8(3).is_err());
    }

    #[test]
    fn fetch_response_stream_markers() {
        let end = FetchResponse {
            seq: 3,
            end_seq: 3,
            ..FetchResponse::result(vec![], vec![])
        };
        assert!(end.is_end_of_stream());
        assert!(!end.is_abort());

        let mid = FetchResponse {
            seq: 1,
            end_seq: 3,
            ..FetchResponse::result(vec![], vec![])
        };
        assert!(!mid.is_end_of_stream());

        let abort = FetchResponse::error(Status::Error, "boom");
        assert!(abort.is_abort());
        assert!(!abort.is_end_of_stream());
    }
}
