//! # Core Protocol Components
//!
//! Low-level frame handling, codecs, and envelope serialization.
//!
//! This module provides the foundation for the protocol, handling frame
//! boundaries, encoding/decoding, and the structured payloads inside frames.
//!
//! ## Components
//! - **Frame**: Length-prefixed, type-tagged frame plus slice-level encode/decode
//! - **Codec**: Tokio codec for framing over byte streams
//! - **Serialization**: Protobuf envelopes and the JSON verification verdict
//!
//! ## Wire Format
//! ```text
//! [Total Length(4)] [Type Code(2)] [Payload(N)]
//! ```
//!
//! ## Safety
//! - Maximum frame size: 16MB by default (prevents memory exhaustion)
//! - Lengths below the header size are rejected as desynchronization

pub mod codec;
pub mod frame;
pub mod serialization;
