//! # Transport Layer
//!
//! Byte-stream dialers the connection client runs over.
//!
//! The client never touches sockets directly; it asks a [`Transport`] for a
//! stream to an already-resolved `host:port` and frames whatever comes back.
//!
//! ## Implementations
//! - **TCP**: [`tcp::TcpTransport`], the production dialer
//! - **Memory**: [`memory::MemoryTransport`], in-process duplex pipes for tests
//!   and demos

use std::future::Future;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

pub mod memory;
pub mod tcp;

pub use memory::MemoryTransport;
pub use tcp::TcpTransport;

/// Dials a byte stream to the relay.
pub trait Transport: Send + Sync + 'static {
    /// Bidirectional stream produced by a successful dial
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a stream to `addr` (`host:port`, IPv6 hosts bracketed).
    fn connect(&self, addr: &str) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}
