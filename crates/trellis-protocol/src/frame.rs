//! Opcode framing: `opcode:u32 BE || body`.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::messages::{
    FetchRequest, FetchResponse, GenericMessageRequest, GenericMessageResponse, ReadBlobRequest,
    ReadBlobResponse, StoreRequest, StoreResponse, UnsubscribeRequest, UnsubscribeResponse,
    WriteBlobRequest, WriteBlobResponse,
};
use crate::MAX_FRAME_BODY;

/// Fetch request opcode.
pub const OPCODE_FETCH_REQUEST: u32 = 1;
/// Fetch response opcode.
pub const OPCODE_FETCH_RESPONSE: u32 = 2;
/// Store request opcode.
pub const OPCODE_STORE_REQUEST: u32 = 3;
/// Store response opcode.
pub const OPCODE_STORE_RESPONSE: u32 = 4;
/// Unsubscribe request opcode.
pub const OPCODE_UNSUBSCRIBE_REQUEST: u32 = 5;
/// Unsubscribe response opcode.
pub const OPCODE_UNSUBSCRIBE_RESPONSE: u32 = 6;
/// Write blob request opcode.
pub const OPCODE_WRITE_BLOB_REQUEST: u32 = 7;
/// Write blob response opcode.
pub const OPCODE_WRITE_BLOB_RESPONSE: u32 = 8;
/// Read blob request opcode.
pub const OPCODE_READ_BLOB_REQUEST: u32 = 9;
/// Read blob response opcode.
pub const OPCODE_READ_BLOB_RESPONSE: u32 = 10;
/// Generic message request opcode.
pub const OPCODE_GENERIC_MESSAGE_REQUEST: u32 = 11;
/// Generic message response opcode.
pub const OPCODE_GENERIC_MESSAGE_RESPONSE: u32 = 12;

/// Any framed peer message.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerMessage {
    /// Fetch request.
    FetchRequest(FetchRequest),
    /// Fetch response.
    FetchResponse(FetchResponse),
    /// Store request.
    StoreRequest(StoreRequest),
    /// Store response.
    StoreResponse(StoreResponse),
    /// Unsubscribe request.
    UnsubscribeRequest(UnsubscribeRequest),
    /// Unsubscribe response.
    UnsubscribeResponse(UnsubscribeResponse),
    /// Write blob request.
    WriteBlobRequest(WriteBlobRequest),
    /// Write blob response.
    WriteBlobResponse(WriteBlobResponse),
    /// Read blob request.
    ReadBlobRequest(ReadBlobRequest),
    /// Read blob response.
    ReadBlobResponse(ReadBlobResponse),
    /// Generic message request.
    GenericMessageRequest(GenericMessageRequest),
    /// Generic message response.
    GenericMessageResponse(GenericMessageResponse),
}

impl PeerMessage {
    /// The opcode this message frames under.
    #[must_use]
    pub fn opcode(&self) -> u32 {
        match self {
            Self::FetchRequest(_) => OPCODE_FETCH_REQUEST,
            Self::FetchResponse(_) => OPCODE_FETCH_RESPONSE,
            Self::StoreRequest(_) => OPCODE_STORE_REQUEST,
            Self::StoreResponse(_) => OPCODE_STORE_RESPONSE,
            Self::UnsubscribeRequest(_) => OPCODE_UNSUBSCRIBE_REQUEST,
            Self::UnsubscribeResponse(_) => OPCODE_UNSUBSCRIBE_RESPONSE,
            Self::WriteBlobRequest(_) => OPCODE_WRITE_BLOB_REQUEST,
            Self::WriteBlobResponse(_) => OPCODE_WRITE_BLOB_RESPONSE,
            Self::ReadBlobRequest(_) => OPCODE_READ_BLOB_REQUEST,
            Self::ReadBlobResponse(_) => OPCODE_READ_BLOB_RESPONSE,
            Self::GenericMessageRequest(_) => OPCODE_GENERIC_MESSAGE_REQUEST,
            Self::GenericMessageResponse(_) => OPCODE_GENERIC_MESSAGE_RESPONSE,
        }
    }

    /// Whether this is a request (as opposed to a response).
    #[must_use]
    pub fn is_request(&self) -> bool {
        self.opcode() % 2 == 1
    }
}

fn serialize_body<T: Serialize>(body: &T) -> Result<Vec<u8>> {
    bincode::serialize(body).map_err(|e| ProtocolError::Serialize(e.to_string()))
}

fn deserialize_body<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| ProtocolError::Deserialize(e.to_string()))
}

/// Encode a message into its wire frame.
pub fn encode_frame(message: &PeerMessage) -> Result<Vec<u8>> {
    let body = match message {
        PeerMessage::FetchRequest(m) => serialize_body(m)?,
        PeerMessage::FetchResponse(m) => serialize_body(m)?,
        PeerMessage::StoreRequest(m) => serialize_body(m)?,
        PeerMessage::StoreResponse(m) => serialize_body(m)?,
        PeerMessage::UnsubscribeRequest(m) => serialize_body(m)?,
        PeerMessage::UnsubscribeResponse(m) => serialize_body(m)?,
        PeerMessage::WriteBlobRequest(m) => serialize_body(m)?,
        PeerMessage::WriteBlobResponse(m) => serialize_body(m)?,
        PeerMessage::ReadBlobRequest(m) => serialize_body(m)?,
        PeerMessage::ReadBlobResponse(m) => serialize_body(m)?,
        PeerMessage::GenericMessageRequest(m) => serialize_body(m)?,
        PeerMessage::GenericMessageResponse(m) => serialize_body(m)?,
    };
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&message.opcode().to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decode a wire frame into its message.
pub fn decode_frame(frame: &[u8]) -> Result<PeerMessage> {
    if frame.len() < 4 {
        return Err(ProtocolError::Truncated);
    }
    let opcode = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
    let body = &frame[4..];
    if body.len() > MAX_FRAME_BODY {
        return Err(ProtocolError::BodyTooLarge(body.len()));
    }
    Ok(match opcode {
        OPCODE_FETCH_REQUEST => PeerMessage::FetchRequest(deserialize_body(body)?),
        OPCODE_FETCH_RESPONSE => PeerMessage::FetchResponse(deserialize_body(body)?),
        OPCODE_STORE_REQUEST => PeerMessage::StoreRequest(deserialize_body(body)?),
        OPCODE_STORE_RESPONSE => PeerMessage::StoreResponse(deserialize_body(body)?),
        OPCODE_UNSUBSCRIBE_REQUEST => PeerMessage::UnsubscribeRequest(deserialize_body(body)?),
        OPCODE_UNSUBSCRIBE_RESPONSE => PeerMessage::UnsubscribeResponse(deserialize_body(body)?),
        OPCODE_WRITE_BLOB_REQUEST => PeerMessage::WriteBlobRequest(deserialize_body(body)?),
        OPCODE_WRITE_BLOB_RESPONSE => PeerMessage::WriteBlobResponse(deserialize_body(body)?),
        OPCODE_READ_BLOB_REQUEST => PeerMessage::ReadBlobRequest(deserialize_body(body)?),
        OPCODE_READ_BLOB_RESPONSE => PeerMessage::ReadBlobResponse(deserialize_body(body)?),
        OPCODE_GENERIC_MESSAGE_REQUEST => {
            PeerMessage::GenericMessageRequest(deserialize_body(body)?)
        }
        OPCODE_GENERIC_MESSAGE_RESPONSE => {
            PeerMessage::GenericMessageResponse(deserialize_body(body)?)
        }
        other => return Err(ProtocolError::UnknownOpcode(other)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::FetchQuery;
    use crate::status::Status;

    #[test]
    fn frame_round_trip() {
        let request = PeerMessage::FetchRequest(FetchRequest {
            query: FetchQuery {
                depth: 3,
                limit: 100,
                root_node_id1: vec![7u8; 32],
                ..Default::default()
            },
            ..Default::default()
        });
        let frame = encode_frame(&request).unwrap();
        assert_eq!(&frame[..4], &1u32.to_be_bytes());
        assert_eq!(decode_frame(&frame).unwrap(), request);
    }

    #[test]
    fn every_opcode_round_trips() {
        let messages = vec![
            PeerMessage::FetchRequest(FetchRequest::default()),
            PeerMessage::FetchResponse(FetchResponse::result(vec![b"n".to_vec()], vec![])),
            PeerMessage::StoreRequest(StoreRequest::default()),
            PeerMessage::StoreResponse(StoreResponse::default()),
            PeerMessage::UnsubscribeRequest(UnsubscribeRequest::default()),
            PeerMessage::UnsubscribeResponse(UnsubscribeResponse::default()),
            PeerMessage::WriteBlobRequest(WriteBlobRequest::default()),
            PeerMessage::WriteBlobResponse(WriteBlobResponse::default()),
            PeerMessage::ReadBlobRequest(ReadBlobRequest::default()),
            PeerMessage::ReadBlobResponse(ReadBlobResponse {
                status: Status::Result,
                error: String::new(),
                seq: 1,
                end_seq: 1,
                data: vec![1, 2, 3],
                pos: 0,
                blob_length: 3,
            }),
            PeerMessage::GenericMessageRequest(GenericMessageRequest::default()),
            PeerMessage::GenericMessageResponse(GenericMessageResponse::default()),
        ];
        for (position, message) in messages.iter().enumerate() {
            assert_eq!(message.opcode(), position as u32 + 1);
            let frame = encode_frame(message).unwrap();
            assert_eq!(&decode_frame(&frame).unwrap(), message);
        }
        assert!(messages[0].is_request());
        assert!(!messages[1].is_request());
    }

    #[test]
    fn unknown_opcode_rejected() {
        let mut frame = 99u32.to_be_bytes().to_vec();
        frame.push(0);
        assert!(matches!(
            decode_frame(&frame),
            Err(ProtocolError::UnknownOpcode(99))
        ));
    }

    #[test]
    fn short_frame_rejected() {
        assert!(matches!(
            decode_frame(&[0, 0, 1]),
            Err(ProtocolError::Truncated)
        ));
    }
}
