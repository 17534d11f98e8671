//! In-process transport.
//!
//! Every dial pops the next pre-registered pipe; the test or demo holds the
//! other end and plays the relay.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::io::DuplexStream;
use tracing::debug;

use super::Transport;

/// Default buffer size of each in-memory pipe direction
const PIPE_CAPACITY: usize = 64 * 1024;

/// Dialer backed by `tokio::io::duplex` pipes.
///
/// Cloning shares the pending queue, so a clone can hand out relay ends after
/// the original moved into a client.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    pending: Arc<Mutex<VecDeque<DuplexStream>>>,
    dialed: Arc<Mutex<Vec<String>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a pipe for the next dial and return the relay's end of it.
    pub fn accept_next(&self) -> DuplexStream {
        let (client_end, relay_end) = tokio::io::duplex(PIPE_CAPACITY);
        self.lock_pending().push_back(client_end);
        relay_end
    }

    /// Addresses dialed so far, in order
    pub fn dialed(&self) -> Vec<String> {
        match self.dialed.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, VecDeque<DuplexStream>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Transport for MemoryTransport {
    type Stream = DuplexStream;

    async fn connect(&self, addr: &str) -> io::Result<DuplexStream> {
        match self.dialed.lock() {
            Ok(mut guard) => guard.push(addr.to_owned()),
            Err(poisoned) => poisoned.into_inner().push(addr.to_owned()),
        }
        let stream = self.lock_pending().pop_front();
        match stream {
            Some(stream) => {
                debug!(%addr, "In-memory pipe connected");
                Ok(stream)
            }
            None => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("no in-memory listener for {addr}"),
            )),
        }
    }
}
