//! Typed construction and parsing of every fernq payload.
//!
//! Each `create_*` function serializes the matching envelope and wraps it in a
//! frame with the right type code; each `parse_*` function takes a frame body
//! and reverses that. Requests and responses additionally carry a 16 byte
//! correlation id in front of their serialized body.

use crate::core::frame::{encode, TypeCode};
use crate::core::serialization::{
    decode_envelope, ReceiveMessage, RequestBody, ResponseBody, TransitMessage, VerifyEnvelope,
    VerifyResult,
};
use crate::error::{ProtocolError, Result};
use bytes::Bytes;
use prost::Message;
use std::fmt;
use tracing::instrument;
use uuid::Uuid;

/// Length of the raw correlation id prefix
pub const CORRELATION_ID_LEN: usize = 16;

/// HTTP-style status carried verbatim in a response body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusCode(pub i32);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const CREATED: StatusCode = StatusCode(201);
    pub const ACCEPTED: StatusCode = StatusCode(202);
    pub const NO_CONTENT: StatusCode = StatusCode(204);

    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const UNAUTHORIZED: StatusCode = StatusCode(401);
    pub const FORBIDDEN: StatusCode = StatusCode(403);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const CONFLICT: StatusCode = StatusCode(409);
    pub const PAYLOAD_TOO_LARGE: StatusCode = StatusCode(413);
    pub const TOO_MANY_REQUESTS: StatusCode = StatusCode(429);

    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    pub const BAD_GATEWAY: StatusCode = StatusCode(502);
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);

    pub fn as_i32(self) -> i32 {
        self.0
    }

    pub fn is_success(self) -> bool {
        (200..300).contains(&self.0)
    }

    /// Canonical reason phrase, if the code is one the relay defines
    pub fn reason(self) -> Option<&'static str> {
        let phrase = match self.0 {
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            409 => "Conflict",
            413 => "Payload Too Large",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            _ => return None,
        };
        Some(phrase)
    }
}

impl From<i32> for StatusCode {
    fn from(value: i32) -> Self {
        StatusCode(value)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{} {}", self.0, reason),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Message handed to the consumer by the client's read loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FernqMessage {
    /// Raw frame type the relay delivered this message under; codes outside
    /// [`TypeCode`] are delivered too
    pub type_code: u16,
    /// Sender's client name
    pub from: String,
    /// Raw message bytes
    pub message: Bytes,
}

impl FernqMessage {
    /// Typed view of the delivered frame type
    ///
    /// # Errors
    /// `UnknownType` when the relay used a code outside [`TypeCode`].
    pub fn kind(&self) -> Result<TypeCode> {
        TypeCode::try_from(self.type_code)
    }

    /// True when the relay delivered a correlated request
    pub fn is_request(&self) -> bool {
        matches!(
            self.kind(),
            Ok(TypeCode::RequestMessage | TypeCode::RequestMessageScan)
        )
    }

    pub fn is_response(&self) -> bool {
        matches!(self.kind(), Ok(TypeCode::ResponseMessage))
    }

    /// Split the correlation id and decode the request body.
    ///
    /// Fails with `UnexpectedMessage` unless this is a request.
    pub fn request(&self) -> Result<(Uuid, RequestBody)> {
        if !self.is_request() {
            return Err(ProtocolError::UnexpectedMessage(self.type_code));
        }
        decode_request_message(&self.message)
    }

    /// Split the correlation id and decode the response body
    pub fn response(&self) -> Result<(Uuid, ResponseBody)> {
        if !self.is_response() {
            return Err(ProtocolError::UnexpectedMessage(self.type_code));
        }
        decode_response_message(&self.message)
    }
}

fn transit_frame(code: TypeCode, from: &str, target: &str, message: Vec<u8>) -> Vec<u8> {
    let envelope = TransitMessage {
        from: from.to_owned(),
        target: target.to_owned(),
        message,
    };
    encode(code, &envelope.encode_to_vec())
}

/// Prefix `body` with the raw bytes of `id`.
fn correlated(id: &Uuid, body: &impl Message) -> Vec<u8> {
    let mut message = Vec::with_capacity(CORRELATION_ID_LEN + body.encoded_len());
    message.extend_from_slice(id.as_bytes());
    message.extend_from_slice(&body.encode_to_vec());
    message
}

/// Split a correlated message into its id and the serialized body after it.
///
/// The id is copied out, so it does not borrow from `message`.
pub fn split_correlation_id(message: &[u8]) -> Result<(Uuid, &[u8])> {
    if message.len() < CORRELATION_ID_LEN {
        return Err(ProtocolError::CorrelationLength(message.len()));
    }
    let (id, rest) = message.split_at(CORRELATION_ID_LEN);
    let mut raw = [0u8; CORRELATION_ID_LEN];
    raw.copy_from_slice(id);
    Ok((Uuid::from_bytes(raw), rest))
}

/// Build the join frame: client identity plus the full connection URL.
pub fn create_room_verify(client_id: &str, url: &str) -> Vec<u8> {
    let envelope = VerifyEnvelope {
        client_id: client_id.to_owned(),
        token: url.to_owned(),
    };
    encode(TypeCode::RoomVerify, &envelope.encode_to_vec())
}

/// Decode a join frame body (relay side).
pub fn parse_room_verify(payload: &[u8]) -> Result<VerifyEnvelope> {
    decode_envelope(payload)
}

/// Build the relay's verdict on a join request.
pub fn create_room_verify_res(room: &str, res: bool, msg: &str) -> Result<Vec<u8>> {
    let verdict = VerifyResult {
        res,
        msg: msg.to_owned(),
    };
    let envelope = ReceiveMessage {
        from: room.to_owned(),
        message: verdict.to_json()?,
    };
    Ok(encode(TypeCode::RoomVerifyRes, &envelope.encode_to_vec()))
}

/// Parse a verdict frame body into `(accepted, message)`.
pub fn parse_room_verify_res(payload: &[u8]) -> Result<(bool, String)> {
    let envelope: ReceiveMessage = decode_envelope(payload)?;
    let verdict = VerifyResult::from_json(&envelope.message)?;
    Ok((verdict.res, verdict.msg))
}

pub fn create_room_broadcast(from: &str, room: &str, message: &[u8]) -> Vec<u8> {
    transit_frame(TypeCode::RoomBroadcast, from, room, message.to_vec())
}

/// Multicast to every member whose name matches `pattern`.
pub fn create_user_scan(from: &str, pattern: &str, message: &[u8]) -> Vec<u8> {
    transit_frame(TypeCode::UserScan, from, pattern, message.to_vec())
}

/// Deliver to one member among those matching `pattern`.
pub fn create_user_scan_single(from: &str, pattern: &str, message: &[u8]) -> Vec<u8> {
    transit_frame(TypeCode::UserScanSingle, from, pattern, message.to_vec())
}

pub fn create_p2p_relay(from: &str, target: &str, message: &[u8]) -> Vec<u8> {
    transit_frame(TypeCode::P2PRelay, from, target, message.to_vec())
}

/// Decode any transit frame body (relay side).
pub fn parse_transit_message(payload: &[u8]) -> Result<TransitMessage> {
    decode_envelope(payload)
}

pub fn create_receive_message(from: &str, message: &[u8]) -> Vec<u8> {
    let envelope = ReceiveMessage {
        from: from.to_owned(),
        message: message.to_vec(),
    };
    encode(TypeCode::ReceiveMessage, &envelope.encode_to_vec())
}

pub fn parse_receive_message(payload: &[u8]) -> Result<ReceiveMessage> {
    decode_envelope(payload)
}

pub fn create_ping() -> Vec<u8> {
    encode(TypeCode::Ping, &[])
}

pub fn create_pong() -> Vec<u8> {
    encode(TypeCode::Pong, &[])
}

/// Build a request to a named client.
///
/// # Returns
/// The fresh correlation id as a 36 character hyphenated string, and the frame.
#[instrument(skip(body), level = "trace")]
pub fn create_request(from: &str, target: &str, url: &str, body: &[u8]) -> (String, Vec<u8>) {
    request_frame(TypeCode::RequestMessage, from, target, url, body)
}

/// Build a request delivered to one client among those matching `pattern`.
#[instrument(skip(body), level = "trace")]
pub fn create_request_scan(
    from: &str,
    pattern: &str,
    url: &str,
    body: &[u8],
) -> (String, Vec<u8>) {
    request_frame(TypeCode::RequestMessageScan, from, pattern, url, body)
}

fn request_frame(
    code: TypeCode,
    from: &str,
    target: &str,
    url: &str,
    body: &[u8],
) -> (String, Vec<u8>) {
    let id = Uuid::new_v4();
    let request = RequestBody {
        url: url.to_owned(),
        body: body.to_vec(),
    };
    let frame = transit_frame(code, from, target, correlated(&id, &request));
    (id.hyphenated().to_string(), frame)
}

/// Build a response correlated with an earlier request. `id` is the
/// requester's id, never a fresh one.
pub fn create_response(
    from: &str,
    target: &str,
    id: &Uuid,
    status: StatusCode,
    body: &[u8],
) -> Vec<u8> {
    let response = ResponseBody {
        status: status.as_i32(),
        body: body.to_vec(),
    };
    transit_frame(
        TypeCode::ResponseMessage,
        from,
        target,
        correlated(id, &response),
    )
}

/// Split and decode the `message` field of a delivered request.
pub fn decode_request_message(message: &[u8]) -> Result<(Uuid, RequestBody)> {
    let (id, rest) = split_correlation_id(message)?;
    Ok((id, decode_envelope(rest)?))
}

/// Split and decode the `message` field of a delivered response.
pub fn decode_response_message(message: &[u8]) -> Result<(Uuid, ResponseBody)> {
    let (id, rest) = split_correlation_id(message)?;
    Ok((id, decode_envelope(rest)?))
}

/// Parse a delivered request frame body into `(from, id, request)`.
pub fn parse_request(payload: &[u8]) -> Result<(String, Uuid, RequestBody)> {
    let envelope = parse_receive_message(payload)?;
    let (id, request) = decode_request_message(&envelope.message)?;
    Ok((envelope.from, id, request))
}

/// Parse a delivered response frame body into `(from, id, response)`.
pub fn parse_response(payload: &[u8]) -> Result<(String, Uuid, ResponseBody)> {
    let envelope = parse_receive_message(payload)?;
    let (id, response) = decode_response_message(&envelope.message)?;
    Ok((envelope.from, id, response))
}

/// Re-wrap a transit message as the receive message the relay forwards to its
/// target, keeping the frame type (relay side, and used to drive tests).
pub fn forward_transit(code: TypeCode, transit: &TransitMessage) -> Vec<u8> {
    let envelope = ReceiveMessage {
        from: transit.from.clone(),
        message: transit.message.clone(),
    };
    encode(code, &envelope.encode_to_vec())
}
