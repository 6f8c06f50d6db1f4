//! Peer request/response wire format.
//!
//! Six request/response pairs travel over an already-established framed
//! channel. Each message is `opcode:u32 BE || body`, with the body encoded
//! in the negotiated serialize format (format 0, bincode, is the one this
//! crate implements). Model and node images inside the bodies stay in their
//! own packed binary form and are never re-encoded.

#![forbid(unsafe_code)]

pub mod error;
pub mod frame;
pub mod handshake;
pub mod messages;
pub mod perms;
pub mod status;

pub use error::{ProtocolError, Result};
pub use frame::{decode_frame, encode_frame, PeerMessage};
pub use handshake::{PeerProps, Version, SERIALIZE_FORMAT_BINCODE};
pub use messages::{
    AllowEmbed, CrdtResult, FetchCrdt, FetchQuery, FetchRequest, FetchResponse, Filter,
    GenericMessageRequest, GenericMessageResponse, IncludeLicenses, Match, ReadBlobRequest,
    ReadBlobResponse, StoreRequest, StoreResponse, UnsubscribeRequest, UnsubscribeResponse,
    WriteBlobRequest, WriteBlobResponse,
};
pub use perms::Permissions;
pub use status::Status;

/// Hard cap on a decoded frame body, guarding allocation on hostile input.
pub const MAX_FRAME_BODY: usize = 16 * 1024 * 1024;
