use std::io;
use tokio::net::TcpStream;
use tracing::{debug, instrument};

use super::Transport;

/// Plain TCP dialer. Domain names are resolved by the OS at dial time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport {
    nodelay: bool,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self { nodelay: true }
    }

    /// Toggle `TCP_NODELAY` on dialed sockets
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

impl Transport for TcpTransport {
    type Stream = TcpStream;

    #[instrument(skip(self))]
    async fn connect(&self, addr: &str) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(self.nodelay)?;
        debug!(peer = ?stream.peer_addr().ok(), "TCP stream established");
        Ok(stream)
    }
}
