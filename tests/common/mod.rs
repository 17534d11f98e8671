//! In-memory relay used by the client integration tests.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use fernq::config::ClientConfig;
use fernq::core::codec::FrameCodec;
use fernq::core::frame::{Frame, TypeCode};
use fernq::protocol::address::extract_info;
use fernq::protocol::message::create_room_verify_res;
use fernq::{Client, MemoryTransport};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio_util::codec::Framed;

pub const URL: &str = "fernq://alice@127.0.0.1/room-1#lobby?room_pass=pw";

pub type RelaySide = Framed<DuplexStream, FrameCodec>;

pub fn fast_config() -> ClientConfig {
    ClientConfig {
        read_deadline: Duration::from_millis(50),
        handshake_timeout: Duration::from_secs(2),
        ..ClientConfig::default()
    }
}

pub fn client(name: &str) -> (Client<MemoryTransport>, MemoryTransport) {
    let transport = MemoryTransport::new();
    let handle = transport.clone();
    (Client::with_transport(name, transport, fast_config()), handle)
}

/// Read the join frame and answer with the given verdict.
pub async fn verify(relay: DuplexStream, accept: bool, msg: &str) -> RelaySide {
    let mut framed = Framed::new(relay, FrameCodec::new());
    let join = framed.next().await.expect("join frame").expect("decodable");
    assert_eq!(join.kind().unwrap(), TypeCode::RoomVerify);
    let info = extract_info(&join.payload).expect("valid join");

    let verdict = create_room_verify_res(&info.room_name, accept, msg).unwrap();
    framed.send(Frame::from_encoded(verdict).unwrap()).await.unwrap();
    framed
}

/// Connect `client` through a relay that accepts the join.
pub async fn connected(
    client: &Client<MemoryTransport>,
    transport: &MemoryTransport,
) -> RelaySide {
    let relay = transport.accept_next();
    let server = tokio::spawn(verify(relay, true, "welcome"));
    client.connect(URL).await.expect("connect");
    server.await.unwrap()
}

/// Send raw encoded bytes from the relay side.
pub async fn relay_send(relay: &mut RelaySide, encoded: Vec<u8>) {
    relay.send(Frame::from_encoded(encoded).unwrap()).await.unwrap();
}

/// Next frame from the client, or `None` if nothing arrives within `wait`.
pub async fn relay_recv(relay: &mut RelaySide, wait: Duration) -> Option<Frame> {
    match tokio::time::timeout(wait, relay.next()).await {
        Ok(Some(Ok(frame))) => Some(frame),
        _ => None,
    }
}
