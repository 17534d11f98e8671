//! # Connection Client
//!
//! One client joins one room over one stream at a time.
//!
//! ## Lifecycle
//! ```text
//! Idle ──connect──> Handshaking ──verdict ok──> Connected ──stop / EOF / error──> Closed
//!   ^                    │                                                          │
//!   └──── any failure ───┘                     connect again <──────────────────────┘
//! ```
//!
//! ## Locks
//! - **Write lock** (`tokio::sync::Mutex`): guards the framed write half; every
//!   outbound frame and every shutdown takes it
//! - **Status lock** (`std::sync::Mutex`): guards [`ConnectionState`], never
//!   held across an await
//! - **Lifecycle lock** (`tokio::sync::Mutex`): serializes `connect` and `stop`
//!
//! Only the spawned read loop reads from the socket. It answers heartbeats,
//! pushes every other frame onto a bounded delivery queue, and on exit shuts
//! the write half, marks the client closed, then closes the queue.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, FramedParts, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::core::codec::FrameCodec;
use crate::core::frame::{Frame, TypeCode};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::address::resolve;
use crate::protocol::message::{
    create_p2p_relay, create_request, create_request_scan, create_response,
    create_room_broadcast, create_user_scan, create_user_scan_single, parse_receive_message,
    parse_room_verify_res, FernqMessage, StatusCode,
};
use crate::transport::{TcpTransport, Transport};
use crate::utils::metrics::{Metrics, MetricsSnapshot};
use crate::utils::timeout::{with_timeout_error, within};

type FrameWriter<S> = FramedWrite<WriteHalf<S>, FrameCodec>;
type SharedWriter<S> = Arc<Mutex<Option<FrameWriter<S>>>>;

/// Where a client is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Never connected, or the last attempt failed
    Idle,
    /// Stream dialed, waiting for the relay's verdict
    Handshaking,
    /// Verified; the read loop is running
    Connected,
    /// The read loop has ended
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Handshaking => "handshaking",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Per-connection handles created once the relay accepts the join.
struct Session {
    cancel: CancellationToken,
    room: String,
    inbox: Option<mpsc::Receiver<FernqMessage>>,
}

/// Lock a status mutex, recovering the data if a holder panicked.
fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Client for a fernq relay room.
///
/// # Example
/// ```no_run
/// use fernq::Client;
///
/// # async fn run() -> fernq::Result<()> {
/// let client = Client::new("alice");
/// client.connect("fernq://alice@127.0.0.1:9147/room-1#lobby").await?;
///
/// let mut inbox = client.read()?;
/// client.broadcast(b"hello room").await?;
///
/// while let Some(message) = inbox.recv().await {
///     println!("{}: {:?}", message.from, message.message);
/// }
/// client.stop().await.ok();
/// # Ok(())
/// # }
/// ```
pub struct Client<T: Transport = TcpTransport> {
    name: String,
    transport: T,
    config: ClientConfig,
    state: Arc<StdMutex<ConnectionState>>,
    writer: SharedWriter<T::Stream>,
    lifecycle: Mutex<()>,
    session: StdMutex<Option<Session>>,
    reader: StdMutex<Option<JoinHandle<()>>>,
    metrics: Arc<Metrics>,
}

impl Client<TcpTransport> {
    /// Create a TCP client with the default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, ClientConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: ClientConfig) -> Self {
        Self::with_transport(name, TcpTransport::new(), config)
    }
}

impl<T: Transport> Client<T> {
    /// Create a client over any transport.
    pub fn with_transport(name: impl Into<String>, transport: T, config: ClientConfig) -> Self {
        Self {
            name: name.into(),
            transport,
            config,
            state: Arc::new(StdMutex::new(ConnectionState::Idle)),
            writer: Arc::new(Mutex::new(None)),
            lifecycle: Mutex::new(()),
            session: StdMutex::new(None),
            reader: StdMutex::new(None),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Client name used as the sender of every outbound message
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Room name of the most recent successful connection
    pub fn room(&self) -> Option<String> {
        lock(&self.session).as_ref().map(|s| s.room.clone())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn set_state(&self, next: ConnectionState) {
        *lock(&self.state) = next;
    }

    /// Dial the relay and join the room named by `url`.
    ///
    /// Accepted from `Idle` or `Closed` only. On any failure the stream is
    /// dropped and the client returns to `Idle`.
    ///
    /// # Errors
    /// - `AlreadyConnected` while a connection is live or being set up
    /// - `InvalidAddress` for a malformed URL
    /// - `Io` when the dial or the join write fails
    /// - `VerificationRejected`, `HandshakeError`, `ConnectionClosed` or
    ///   `HandshakeTimeout` from the verification exchange
    #[instrument(skip(self, url), fields(client = %self.name))]
    pub async fn connect(&self, url: &str) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;

        match self.state() {
            ConnectionState::Idle | ConnectionState::Closed => {}
            state => {
                debug!(%state, "Rejecting connect on a live client");
                return Err(ProtocolError::AlreadyConnected);
            }
        }

        let previous = lock(&self.reader).take();
        if let Some(handle) = previous {
            if let Err(e) = handle.await {
                warn!(error = %e, "Previous read loop ended abnormally");
            }
        }

        self.set_state(ConnectionState::Handshaking);
        match self.establish(url).await {
            Ok(room) => {
                info!(%room, "Joined room");
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Idle);
                warn!(error = %e, "Connect failed");
                Err(e)
            }
        }
    }

    async fn establish(&self, url: &str) -> Result<String> {
        let resolved = resolve(url, &self.name)?;

        let stream = match self.transport.connect(&resolved.address).await {
            Ok(stream) => stream,
            Err(e) => {
                self.metrics.connection_error();
                return Err(e.into());
            }
        };
        debug!(address = %resolved.address, "Stream established");

        let codec = FrameCodec::with_max_frame_size(self.config.max_frame_size);
        let mut framed = Framed::with_capacity(stream, codec, self.config.read_buffer_size);

        let verify = Frame::from_encoded(resolved.verify_frame)?;
        let verify_len = verify.wire_len() as u64;
        self.metrics.handshake_attempt();
        if let Err(e) = framed.send(verify).await {
            self.metrics.handshake_failed();
            return Err(e);
        }
        self.metrics.message_sent(verify_len);

        let verdict = with_timeout_error(
            await_verdict(&mut framed, self.config.read_deadline),
            self.config.handshake_timeout,
            ProtocolError::HandshakeTimeout,
        )
        .await;
        if let Err(e) = verdict {
            self.metrics.handshake_failed();
            return Err(e);
        }
        self.metrics.handshake_success();

        let parts = framed.into_parts();
        let (read_half, write_half) = tokio::io::split(parts.io);
        // Frames buffered behind the verdict must decode before the next socket read.
        let mut read_parts = FramedParts::new::<Frame>(read_half, parts.codec);
        read_parts.read_buf = parts.read_buf;
        let reader = Framed::from_parts(read_parts);
        let writer = FramedWrite::new(write_half, parts.codec);

        let (inbox_tx, inbox_rx) = mpsc::channel(self.config.delivery_capacity.max(1));
        let cancel = CancellationToken::new();

        *self.writer.lock().await = Some(writer);
        *lock(&self.session) = Some(Session {
            cancel: cancel.clone(),
            room: resolved.room_name.clone(),
            inbox: Some(inbox_rx),
        });
        self.set_state(ConnectionState::Connected);
        self.metrics.connection_established();

        let read_loop = ReadLoop {
            client: self.name.clone(),
            reader,
            writer: Arc::clone(&self.writer),
            state: Arc::clone(&self.state),
            metrics: Arc::clone(&self.metrics),
            inbox: inbox_tx,
            cancel,
            read_deadline: self.config.read_deadline,
        };
        *lock(&self.reader) = Some(tokio::spawn(read_loop.run()));

        Ok(resolved.room_name)
    }

    /// Take the delivery queue for the current connection.
    ///
    /// The receiver yields `None` once the connection has ended and every
    /// buffered message has been drained.
    ///
    /// # Errors
    /// `NotConnected` when not connected or when the queue was already taken.
    pub fn read(&self) -> Result<mpsc::Receiver<FernqMessage>> {
        if !self.is_connected() {
            return Err(ProtocolError::NotConnected);
        }
        let inbox = lock(&self.session).as_mut().and_then(|s| s.inbox.take());
        inbox.ok_or_else(|| {
            debug!(client = %self.name, "{}", constants::ERR_STREAM_TAKEN);
            ProtocolError::NotConnected
        })
    }

    /// Close the connection and wait for the read loop to finish.
    ///
    /// # Errors
    /// `NotConnected` unless the client is currently connected.
    #[instrument(skip(self), fields(client = %self.name))]
    pub async fn stop(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;

        if !self.is_connected() {
            return Err(ProtocolError::NotConnected);
        }

        if let Some(session) = lock(&self.session).as_ref() {
            session.cancel.cancel();
        }

        shutdown_writer(&self.writer, self.config.read_deadline).await;

        let handle = lock(&self.reader).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Read loop ended abnormally");
            }
        }

        self.metrics.log_metrics(&self.name);
        info!("Client stopped");
        Ok(())
    }

    /// Point-to-point message to the member named `to`.
    pub async fn send(&self, to: &str, payload: &[u8]) -> Result<()> {
        self.write_frame(create_p2p_relay(&self.name, to, payload))
            .await
    }

    /// Message to every member of the connected room.
    pub async fn broadcast(&self, payload: &[u8]) -> Result<()> {
        let room = self.room().ok_or(ProtocolError::NotConnected)?;
        self.write_frame(create_room_broadcast(&self.name, &room, payload))
            .await
    }

    /// Message to every member whose name matches the regex `pattern`.
    ///
    /// # Errors
    /// `InvalidPattern` before anything is written when `pattern` does not
    /// compile.
    pub async fn scan_send(&self, pattern: &str, payload: &[u8]) -> Result<()> {
        check_pattern(pattern)?;
        self.write_frame(create_user_scan(&self.name, pattern, payload))
            .await
    }

    /// Message to one member chosen by the relay among the `pattern` matches.
    pub async fn scan_send_single(&self, pattern: &str, payload: &[u8]) -> Result<()> {
        check_pattern(pattern)?;
        self.write_frame(create_user_scan_single(&self.name, pattern, payload))
            .await
    }

    /// Send a correlated request and return its id.
    ///
    /// Fire-and-forget: the matching response arrives on the delivery queue
    /// like any other message.
    pub async fn request(&self, target: &str, url: &str, body: &[u8]) -> Result<String> {
        let (id, frame) = create_request(&self.name, target, url, body);
        self.write_frame(frame).await?;
        Ok(id)
    }

    /// Send a correlated request to one member among the `pattern` matches.
    pub async fn request_scan(&self, pattern: &str, url: &str, body: &[u8]) -> Result<String> {
        check_pattern(pattern)?;
        let (id, frame) = create_request_scan(&self.name, pattern, url, body);
        self.write_frame(frame).await?;
        Ok(id)
    }

    /// Answer a request received from `target`, echoing its id.
    pub async fn respond(
        &self,
        target: &str,
        id: &Uuid,
        status: StatusCode,
        body: &[u8],
    ) -> Result<()> {
        self.write_frame(create_response(&self.name, target, id, status, body))
            .await
    }

    async fn write_frame(&self, encoded: Vec<u8>) -> Result<()> {
        let frame = Frame::from_encoded(encoded)?;
        let code = frame.code;
        let len = frame.wire_len();

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ProtocolError::NotConnected)?;
        writer.send(frame).await?;
        drop(guard);

        self.metrics.message_sent(len as u64);
        debug!(client = %self.name, code, len, "Frame sent");
        Ok(())
    }
}

impl<T: Transport> Drop for Client<T> {
    fn drop(&mut self) {
        if let Some(session) = lock(&self.session).as_ref() {
            session.cancel.cancel();
        }
    }
}

fn check_pattern(pattern: &str) -> Result<()> {
    regex::Regex::new(pattern)?;
    Ok(())
}

/// Take the write half out of `writer` and shut it down, bounded by `deadline`.
async fn shutdown_writer<S>(writer: &SharedWriter<S>, deadline: Duration)
where
    S: AsyncRead + AsyncWrite,
{
    let mut guard = writer.lock().await;
    if let Some(mut sink) = guard.take() {
        match within(sink.close(), deadline).await {
            Some(Ok(())) => debug!("Write half shut down"),
            Some(Err(e)) => debug!(error = %e, "Write half shutdown failed"),
            None => debug!("Write half shutdown timed out"),
        }
    }
}

/// Wait for the relay's verdict on the join request.
///
/// Heartbeats are ignored; a deadline expiry just re-arms the read.
#[instrument(skip_all, level = "debug")]
async fn await_verdict<S>(framed: &mut Framed<S, FrameCodec>, read_deadline: Duration) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let Some(next) = within(framed.next(), read_deadline).await else {
            continue;
        };
        let frame = match next {
            Some(frame) => frame?,
            None => {
                debug!("{}", constants::ERR_VERIFY_STREAM_ENDED);
                return Err(ProtocolError::ConnectionClosed);
            }
        };

        match frame.kind() {
            Ok(TypeCode::Ping | TypeCode::Pong) => {
                debug!("Ignoring heartbeat during verification");
            }
            Ok(TypeCode::RoomVerifyRes) => {
                let (accepted, msg) = parse_room_verify_res(&frame.payload)?;
                if accepted {
                    debug!(%msg, "Verification accepted");
                    return Ok(());
                }
                return Err(ProtocolError::VerificationRejected(msg));
            }
            _ => {
                return Err(ProtocolError::HandshakeError(format!(
                    "{}: 0x{:04X}",
                    constants::ERR_UNEXPECTED_VERIFY_FRAME,
                    frame.code
                )));
            }
        }
    }
}

/// Why the read loop stopped
enum Exit {
    Cancelled,
    Eof,
    Failed(ProtocolError),
}

struct ReadLoop<S> {
    client: String,
    reader: Framed<ReadHalf<S>, FrameCodec>,
    writer: SharedWriter<S>,
    state: Arc<StdMutex<ConnectionState>>,
    metrics: Arc<Metrics>,
    inbox: mpsc::Sender<FernqMessage>,
    cancel: CancellationToken,
    read_deadline: Duration,
}

impl<S> ReadLoop<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    #[instrument(skip(self), fields(client = %self.client))]
    async fn run(mut self) {
        let exit = self.pump().await;
        self.teardown(exit).await;
    }

    async fn pump(&mut self) -> Exit {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Exit::Cancelled,
                next = within(self.reader.next(), self.read_deadline) => next,
            };

            let Some(next) = next else {
                continue;
            };
            let frame = match next {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return Exit::Failed(e),
                None => return Exit::Eof,
            };

            self.metrics.bytes_read(frame.wire_len() as u64);
            if self.dispatch(frame).await.is_break() {
                return Exit::Cancelled;
            }
        }
    }

    async fn dispatch(&mut self, frame: Frame) -> ControlFlow<()> {
        if frame.kind().is_ok_and(|code| code.is_heartbeat()) {
            self.reply_pong().await;
            return ControlFlow::Continue(());
        }
        let type_code = frame.code;

        let envelope = match parse_receive_message(&frame.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.metrics.decode_error();
                warn!(code = type_code, error = %e, "Skipping undecodable frame");
                return ControlFlow::Continue(());
            }
        };

        if self.inbox.is_closed() {
            debug!(code = type_code, from = %envelope.from, "Consumer gone, discarding message");
            return ControlFlow::Continue(());
        }

        let message = FernqMessage {
            type_code,
            from: envelope.from,
            message: Bytes::from(envelope.message),
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => ControlFlow::Break(()),
            sent = self.inbox.send(message) => {
                match sent {
                    Ok(()) => {
                        self.metrics.message_received();
                        debug!(code = type_code, "Message queued");
                    }
                    Err(_) => debug!(code = type_code, "Consumer gone, discarding message"),
                }
                ControlFlow::Continue(())
            }
        }
    }

    async fn reply_pong(&mut self) {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            warn!("No write half to answer heartbeat");
            return;
        };

        match within(writer.send(Frame::new(TypeCode::Pong, Bytes::new())), self.read_deadline)
            .await
        {
            Some(Ok(())) => {
                self.metrics.pong_sent();
                debug!("Heartbeat answered");
            }
            Some(Err(e)) => warn!(error = %e, "Failed to answer heartbeat"),
            None => warn!("Timed out answering heartbeat"),
        }
    }

    async fn teardown(self, exit: Exit) {
        match exit {
            Exit::Cancelled => info!("Read loop cancelled"),
            Exit::Eof => info!("Relay closed the connection"),
            Exit::Failed(e) => {
                self.metrics.connection_error();
                error!(error = %e, "Read loop terminated");
            }
        }

        shutdown_writer(&self.writer, self.read_deadline).await;

        {
            let mut state = lock(&self.state);
            if *state == ConnectionState::Connected {
                *state = ConnectionState::Closed;
            }
        }
        self.metrics.connection_closed();

        drop(self.inbox);
        debug!("Delivery queue closed");
    }
}
