//! # Envelope Serialization
//!
//! Structured payloads carried inside frames.
//!
//! The relay speaks protobuf for its envelopes. The schema is small and fixed,
//! so the messages are declared with `prost` derives rather than generated from
//! a `.proto` file:
//!
//! ```text
//! message VerifyEnvelope { string client_id = 1; string token = 2; }
//! message TransitMessage { string from = 1; string target = 2; bytes message = 3; }
//! message ReceiveMessage { string from = 1; bytes message = 2; }
//! message RequestBody    { string url = 1; bytes body = 2; }
//! message ResponseBody   { int32 status = 1; bytes body = 2; }
//! ```
//!
//! The verification verdict is the one JSON payload in the protocol; it travels
//! as the `message` field of a `ReceiveMessage`.

use crate::error::Result;
use prost::Message;
use serde::{Deserialize, Serialize};

/// Join request: the client's identity plus the full connection URL as token.
#[derive(Clone, PartialEq, Message)]
pub struct VerifyEnvelope {
    #[prost(string, tag = "1")]
    pub client_id: String,
    #[prost(string, tag = "2")]
    pub token: String,
}

/// Outbound envelope routed by the relay. `target` is a room name, a client
/// name or a pattern depending on the frame type wrapping it.
#[derive(Clone, PartialEq, Message)]
pub struct TransitMessage {
    #[prost(string, tag = "1")]
    pub from: String,
    #[prost(string, tag = "2")]
    pub target: String,
    #[prost(bytes = "vec", tag = "3")]
    pub message: Vec<u8>,
}

/// Inbound envelope delivered by the relay.
#[derive(Clone, PartialEq, Message)]
pub struct ReceiveMessage {
    #[prost(string, tag = "1")]
    pub from: String,
    #[prost(bytes = "vec", tag = "2")]
    pub message: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct RequestBody {
    #[prost(string, tag = "1")]
    pub url: String,
    #[prost(bytes = "vec", tag = "2")]
    pub body: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ResponseBody {
    #[prost(int32, tag = "1")]
    pub status: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub body: Vec<u8>,
}

/// Relay verdict on a join request, JSON encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    pub res: bool,
    pub msg: String,
}

impl VerifyResult {
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Decode any envelope from a frame payload.
pub fn decode_envelope<M: Message + Default>(payload: &[u8]) -> Result<M> {
    Ok(M::decode(payload)?)
}
