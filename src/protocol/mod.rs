//! # Protocol Layer
//!
//! fernq message construction and connection addressing.
//!
//! ## Components
//! - **Message**: Typed builders and parsers for every frame the relay speaks,
//!   including correlated request/response bodies
//! - **Address**: `fernq://` URL parsing, host validation and join frame
//!   construction
//!
//! ## Message Flow
//! 1. Client dials the relay and sends `ROOM_VERIFY` carrying its URL
//! 2. Relay answers `ROOM_VERIFY_RES` with a JSON verdict
//! 3. Client sends transit frames (`P2P_RELAY`, `ROOM_BROADCAST`, scans, requests)
//! 4. Relay delivers receive envelopes and heartbeats; pings are answered with pongs

pub mod address;
pub mod message;

#[cfg(test)]
mod tests;
