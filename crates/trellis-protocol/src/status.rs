//! Response status codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a response message.
///
/// `Result` is the success code; everything else names a failure class the
/// peer can react to. The wire value is the variant discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Status {
    /// Success.
    Result = 1,
    /// The request could not be decoded or failed basic validation.
    Malformed = 2,
    /// Unclassified error; see the `error` string.
    Error = 3,
    /// Storage rejected the store.
    StoreFailed = 4,
    /// Storage rejected the fetch.
    FetchFailed = 5,
    /// The fetch root node does not exist.
    MissingRootnode = 6,
    /// The fetch root node is licensed away from the caller.
    RootnodeLicensed = 7,
    /// The permission layer rejected the request.
    NotAllowed = 8,
    /// A parameter mismatch between peers.
    Mismatch = 9,
    /// The stored item already exists.
    Exists = 10,
    /// The CRDT cursor was not found.
    MissingCursor = 11,
    /// A trigger subscription was dropped by the storage.
    DroppedTrigger = 12,
}

impl Status {
    /// Whether this status terminates the stream successfully.
    #[must_use]
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Result)
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::Result
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Result => "result",
            Self::Malformed => "malformed",
            Self::Error => "error",
            Self::StoreFailed => "store-failed",
            Self::FetchFailed => "fetch-failed",
            Self::MissingRootnode => "missing-rootnode",
            Self::RootnodeLicensed => "rootnode-licensed",
            Self::NotAllowed => "not-allowed",
            Self::Mismatch => "mismatch",
            Self::Exists => "exists",
            Self::MissingCursor => "missing-cursor",
            Self::DroppedTrigger => "dropped-trigger",
        };
        write!(f, "{name}")
    }
}
