//! # Frame
//!
//! The transport unit of the fernq protocol.
//!
//! ```text
//! [Total Length(4, BE)] [Type Code(2, BE)] [Payload(N)]
//! ```
//!
//! `total_length` counts the whole frame, header included, so an empty frame
//! is exactly six bytes long.
//!
//! [`decode`] works on borrowed slices and signals "need more data" with
//! `Ok(None)`. A single socket read may carry zero, one or several frames
//! plus a trailing partial frame, so callers keep calling it on the returned
//! remainder until it yields `None`.

use crate::config::{FRAME_HEADER_LEN, MAX_FRAME_SIZE};
use crate::error::{ProtocolError, Result};
use bytes::Bytes;
use std::fmt;

/// Closed registry of frame type codes understood by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TypeCode {
    /// Client asks to join a room
    RoomVerify = 0x9E,
    /// Deliver to every member of the room
    RoomBroadcast = 0x9F,
    /// Deliver to every member whose name matches a pattern
    UserScan = 0xA0,
    /// Deliver to one named member
    P2PRelay = 0xA1,
    /// Relay's verdict on a join request
    RoomVerifyRes = 0xA2,
    Ping = 0xA3,
    Pong = 0xA4,
    /// Inbound application message
    ReceiveMessage = 0xA5,
    RequestMessage = 0xA6,
    ResponseMessage = 0xA7,
    /// Deliver to one member chosen among the pattern matches
    UserScanSingle = 0xA8,
    /// Request delivered to one member chosen among the pattern matches
    RequestMessageScan = 0xA9,
}

impl TypeCode {
    /// Every registered code, in wire order.
    pub const ALL: [TypeCode; 12] = [
        TypeCode::RoomVerify,
        TypeCode::RoomBroadcast,
        TypeCode::UserScan,
        TypeCode::P2PRelay,
        TypeCode::RoomVerifyRes,
        TypeCode::Ping,
        TypeCode::Pong,
        TypeCode::ReceiveMessage,
        TypeCode::RequestMessage,
        TypeCode::ResponseMessage,
        TypeCode::UserScanSingle,
        TypeCode::RequestMessageScan,
    ];

    /// Raw wire value
    #[inline]
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Heartbeat frames carry no payload and are answered with a pong.
    #[inline]
    pub fn is_heartbeat(self) -> bool {
        matches!(self, TypeCode::Ping | TypeCode::Pong)
    }
}

impl TryFrom<u16> for TypeCode {
    type Error = ProtocolError;

    fn try_from(value: u16) -> Result<Self> {
        TypeCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_u16() == value)
            .ok_or(ProtocolError::UnknownType(value))
    }
}

impl From<TypeCode> for u16 {
    fn from(code: TypeCode) -> Self {
        code.as_u16()
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeCode::RoomVerify => "ROOM_VERIFY",
            TypeCode::RoomBroadcast => "ROOM_BROADCAST",
            TypeCode::UserScan => "USER_SCAN",
            TypeCode::P2PRelay => "P2P_RELAY",
            TypeCode::RoomVerifyRes => "ROOM_VERIFY_RES",
            TypeCode::Ping => "PING",
            TypeCode::Pong => "PONG",
            TypeCode::ReceiveMessage => "RECEIVE_MESSAGE",
            TypeCode::RequestMessage => "REQUEST_MESSAGE",
            TypeCode::ResponseMessage => "RESPONSE_MESSAGE",
            TypeCode::UserScanSingle => "USER_SCAN_SINGLE",
            TypeCode::RequestMessageScan => "REQUEST_MESSAGE_SCAN",
        };
        f.write_str(name)
    }
}

/// One decoded frame. The type code is kept raw so that frames with codes
/// outside the registry still decode; [`Frame::kind`] gives the typed view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub code: u16,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(code: TypeCode, payload: impl Into<Bytes>) -> Self {
        Self {
            code: code.as_u16(),
            payload: payload.into(),
        }
    }

    /// Typed view of the frame's code
    pub fn kind(&self) -> Result<TypeCode> {
        TypeCode::try_from(self.code)
    }

    /// Encoded length on the wire
    pub fn wire_len(&self) -> usize {
        FRAME_HEADER_LEN + self.payload.len()
    }

    /// Serialize into a standalone byte vector
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_raw(self.code, &self.payload)
    }

    /// Parse a buffer that must hold exactly one complete frame.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        match decode(data)? {
            Some((code, body, rest)) if rest.is_empty() => Ok(Frame {
                code,
                payload: Bytes::copy_from_slice(body),
            }),
            Some(_) => Err(ProtocolError::InvalidHeader),
            None => Err(ProtocolError::InvalidHeader),
        }
    }

    /// Take ownership of one encoded frame, slicing the payload out without
    /// copying.
    pub fn from_encoded(data: impl Into<Bytes>) -> Result<Self> {
        let data: Bytes = data.into();
        match peek_header(&data, usize::MAX)? {
            Some((total, code)) if total == data.len() => Ok(Frame {
                code,
                payload: data.slice(FRAME_HEADER_LEN..),
            }),
            _ => Err(ProtocolError::InvalidHeader),
        }
    }
}

/// Build a frame around `payload`. Never fails; an empty payload yields a
/// six byte frame.
pub fn encode(code: TypeCode, payload: &[u8]) -> Vec<u8> {
    encode_raw(code.as_u16(), payload)
}

pub(crate) fn encode_raw(code: u16, payload: &[u8]) -> Vec<u8> {
    let total = FRAME_HEADER_LEN + payload.len();
    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&(total as u32).to_be_bytes());
    buf.extend_from_slice(&code.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Read the header of a buffered frame without consuming anything.
///
/// Returns `Ok(None)` while fewer than six bytes are available. A declared
/// length below the header size or above `max_frame_size` means the stream
/// is out of sync and is reported as an error.
pub fn peek_header(buffer: &[u8], max_frame_size: usize) -> Result<Option<(usize, u16)>> {
    if buffer.len() < FRAME_HEADER_LEN {
        return Ok(None);
    }

    let total = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
    if total < FRAME_HEADER_LEN {
        return Err(ProtocolError::InvalidHeader);
    }
    if total > max_frame_size {
        return Err(ProtocolError::OversizedFrame(total));
    }

    let code = u16::from_be_bytes([buffer[4], buffer[5]]);
    Ok(Some((total, code)))
}

/// Slice one frame off the front of `buffer`.
///
/// Returns `(type_code, body, remainder)` when a whole frame is buffered and
/// `Ok(None)` when more bytes are needed. The input is never modified.
pub fn decode(buffer: &[u8]) -> Result<Option<(u16, &[u8], &[u8])>> {
    decode_with_limit(buffer, MAX_FRAME_SIZE)
}

/// [`decode`] with an explicit frame size limit.
pub fn decode_with_limit(
    buffer: &[u8],
    max_frame_size: usize,
) -> Result<Option<(u16, &[u8], &[u8])>> {
    let Some((total, code)) = peek_header(buffer, max_frame_size)? else {
        return Ok(None);
    };
    if buffer.len() < total {
        return Ok(None);
    }

    let (frame, remainder) = buffer.split_at(total);
    Ok(Some((code, &frame[FRAME_HEADER_LEN..], remainder)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_code_values_are_bit_exact() {
        assert_eq!(TypeCode::RoomVerify.as_u16(), 0x9E);
        assert_eq!(TypeCode::RoomBroadcast.as_u16(), 0x9F);
        assert_eq!(TypeCode::UserScan.as_u16(), 0xA0);
        assert_eq!(TypeCode::P2PRelay.as_u16(), 0xA1);
        assert_eq!(TypeCode::RoomVerifyRes.as_u16(), 0xA2);
        assert_eq!(TypeCode::Ping.as_u16(), 0xA3);
        assert_eq!(TypeCode::Pong.as_u16(), 0xA4);
        assert_eq!(TypeCode::ReceiveMessage.as_u16(), 0xA5);
        assert_eq!(TypeCode::RequestMessage.as_u16(), 0xA6);
        assert_eq!(TypeCode::ResponseMessage.as_u16(), 0xA7);
        assert_eq!(TypeCode::UserScanSingle.as_u16(), 0xA8);
        assert_eq!(TypeCode::RequestMessageScan.as_u16(), 0xA9);
    }

    #[test]
    fn test_type_code_try_from() {
        for code in TypeCode::ALL {
            assert_eq!(TypeCode::try_from(code.as_u16()).unwrap(), code);
        }
        assert!(matches!(
            TypeCode::try_from(0x0001),
            Err(ProtocolError::UnknownType(0x0001))
        ));
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode(TypeCode::P2PRelay, b"hi");
        assert_eq!(bytes, vec![0, 0, 0, 8, 0x00, 0xA1, b'h', b'i']);
    }

    #[test]
    fn test_encode_empty_payload() {
        let bytes = encode(TypeCode::Ping, &[]);
        assert_eq!(bytes, vec![0, 0, 0, 6, 0x00, 0xA3]);
    }

    #[test]
    fn test_decode_short_header_needs_more() {
        assert!(decode(&[0, 0, 0]).unwrap().is_none());
        assert!(decode(&[]).unwrap().is_none());
    }

    #[test]
    fn test_decode_partial_body_needs_more() {
        let bytes = encode(TypeCode::ReceiveMessage, b"hello");
        assert!(decode(&bytes[..bytes.len() - 1]).unwrap().is_none());
    }

    #[test]
    fn test_decode_keeps_remainder() {
        let mut bytes = encode(TypeCode::ReceiveMessage, b"abc");
        bytes.extend_from_slice(&[0, 0, 0]);
        let (code, body, rest) = decode(&bytes).unwrap().unwrap();
        assert_eq!(code, 0xA5);
        assert_eq!(body, b"abc");
        assert_eq!(rest, &[0, 0, 0]);
    }

    #[test]
    fn test_decode_rejects_length_below_header() {
        let bytes = [0, 0, 0, 3, 0x00, 0xA3];
        assert!(matches!(decode(&bytes), Err(ProtocolError::InvalidHeader)));
    }

    #[test]
    fn test_decode_rejects_oversized() {
        let bytes = [0, 0, 0x10, 0x00, 0x00, 0xA5];
        assert!(matches!(
            decode_with_limit(&bytes, 1024),
            Err(ProtocolError::OversizedFrame(4096))
        ));
    }

    #[test]
    fn test_frame_from_bytes_rejects_trailing_data() {
        let mut bytes = encode(TypeCode::Pong, &[]);
        bytes.push(0);
        assert!(Frame::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_unknown_code_still_decodes() {
        let bytes = encode_raw(0x0042, b"x");
        let frame = Frame::from_bytes(&bytes).unwrap();
        assert_eq!(frame.code, 0x0042);
        assert!(frame.kind().is_err());
    }

    #[test]
    fn test_from_encoded_slices_payload() {
        let bytes = encode(TypeCode::P2PRelay, b"abc");
        let frame = Frame::from_encoded(bytes).unwrap();
        assert_eq!(frame.kind().unwrap(), TypeCode::P2PRelay);
        assert_eq!(&frame.payload[..], b"abc");

        let mut padded = encode(TypeCode::Ping, &[]);
        padded.push(0);
        assert!(Frame::from_encoded(padded).is_err());
    }
}
