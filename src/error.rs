//! # Error Types
//!
//! Error handling for the fernq client core.
//!
//! This module defines every error variant that can surface from framing,
//! envelope coding, address resolution and the connection lifecycle.
//!
//! ## Error Categories
//! - **Format Errors**: Malformed connection URLs, invalid hosts, invalid scan patterns.
//!   Always local, never touch the network.
//! - **Protocol Errors**: Corrupt frame headers, envelope decode failures,
//!   short correlation ids, unexpected frames during verification
//! - **Transport Errors**: Dial, write and non-timeout read failures
//! - **State Errors**: Connecting twice, stopping while idle, writing without a socket
//! - **Timeout Errors**: Verification handshake exceeded its absolute ceiling
//!
//! A read deadline expiring during normal operation is not an error; the read loop
//! uses it to poll for cancellation.
//!
//! ## Example Usage
//! ```rust
//! use fernq::error::{ProtocolError, Result};
//! use fernq::protocol::address::resolve;
//! use tracing::{error, info};
//!
//! fn dial_target(url: &str) -> Result<String> {
//!     let resolved = resolve(url, "alice")?;
//!     Ok(resolved.address)
//! }
//!
//! fn main() {
//!     match dial_target("fernq://alice@127.0.0.1/uuid#lobby") {
//!         Ok(addr) => info!(%addr, "Resolved relay address"),
//!         Err(ProtocolError::InvalidAddress(reason)) => error!(%reason, "Bad URL"),
//!         Err(e) => error!(error = %e, "Unexpected failure"),
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Address resolution errors
    pub const ERR_MISSING_SCHEME: &str = "URL must start with fernq://";
    pub const ERR_MISSING_HOST: &str = "URL is missing a host";
    pub const ERR_MISSING_ROOM_ID: &str = "URL is missing the room id path segment";
    pub const ERR_MISSING_ROOM_NAME: &str = "URL is missing the #room-name fragment";
    pub const ERR_DOMAIN_TOO_LONG: &str = "domain name exceeds 253 characters";
    pub const ERR_DOMAIN_CHARSET: &str =
        "domain name may only contain letters, digits, hyphens and dots";
    pub const ERR_DOMAIN_NUMERIC: &str = "host looks like an IP address but does not parse as one";

    /// Handshake errors
    pub const ERR_UNEXPECTED_VERIFY_FRAME: &str = "unexpected frame while awaiting verification";
    pub const ERR_VERIFY_STREAM_ENDED: &str = "relay closed the connection during verification";

    /// Delivery errors
    pub const ERR_STREAM_TAKEN: &str = "message stream already taken for this connection";
}

/// ProtocolError is the primary error type for all fernq operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid scan pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Invalid frame header")]
    InvalidHeader,

    #[error("Frame too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("Unknown frame type: 0x{0:04X}")]
    UnknownType(u16),

    #[error("Envelope decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Correlation id requires 16 bytes, got {0}")]
    CorrelationLength(usize),

    #[error("Unexpected message type: 0x{0:04X}")]
    UnexpectedMessage(u16),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Not connected")]
    NotConnected,

    #[error("Verification timed out")]
    HandshakeTimeout,

    #[error("Room verification rejected: {0}")]
    VerificationRejected(String),

    #[error("Handshake failed: {0}")]
    HandshakeError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// True for failures detected locally before anything reached the network.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::InvalidAddress(_) | ProtocolError::InvalidPattern(_)
        )
    }

    /// True for lifecycle misuse (connect twice, stop while idle, write with no socket).
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::AlreadyConnected | ProtocolError::NotConnected
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ProtocolError::InvalidAddress("x".into()).is_format_error());
        assert!(ProtocolError::NotConnected.is_state_error());
        assert!(ProtocolError::AlreadyConnected.is_state_error());
        assert!(!ProtocolError::HandshakeTimeout.is_state_error());
        assert!(!ProtocolError::ConnectionClosed.is_format_error());
    }

    #[test]
    fn test_unknown_type_display() {
        let err = ProtocolError::UnknownType(0x00AB);
        assert_eq!(err.to_string(), "Unknown frame type: 0x00AB");
    }
}
