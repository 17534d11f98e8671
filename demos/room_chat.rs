//! Example: Two clients chatting through an in-process relay
//!
//! A toy relay routes frames between clients over the in-memory transport,
//! so the whole exchange (join, direct message, broadcast, scan, correlated
//! request/response, heartbeat) runs without any network.
//!
//! Run with: `cargo run --example room_chat`

#![allow(clippy::uninlined_format_args)]

use fernq::config::{ClientConfig, LoggingConfig};
use fernq::core::codec::FrameCodec;
use fernq::core::frame::{Frame, TypeCode};
use fernq::protocol::address::extract_info;
use fernq::protocol::message::{
    create_ping, create_room_verify_res, forward_transit, parse_transit_message, StatusCode,
};
use fernq::utils::logging::init_logging;
use fernq::{Client, MemoryTransport};
use futures::{SinkExt, StreamExt};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

type Peers = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Vec<u8>>>>>;

const ROOM_URL: &str = "fernq://{name}@127.0.0.1/demo-room#lobby?room_pass=open";

fn url_for(name: &str) -> String {
    ROOM_URL.replace("{name}", name)
}

/// Route every frame one member sends to the members it targets.
async fn serve_member(relay: DuplexStream, peers: Peers) -> fernq::Result<()> {
    let mut framed = Framed::new(relay, FrameCodec::new());

    let Some(join) = framed.next().await.transpose()? else {
        return Ok(());
    };
    let info = extract_info(&join.payload)?;
    let accepted = info.password == "open";

    // Register before answering so messages sent right after the join land.
    let (tx, mut rx) = mpsc::unbounded_channel();
    if accepted {
        peers
            .lock()
            .map_err(|_| fernq::ProtocolError::ConnectionClosed)?
            .insert(info.client_id.clone(), tx);
    }
    let verdict = create_room_verify_res(&info.room_name, accepted, "welcome to the lobby")?;
    framed.send(Frame::from_encoded(verdict)?).await?;
    if !accepted {
        return Ok(());
    }
    framed.send(Frame::from_encoded(create_ping())?).await?;

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(bytes) => framed.send(Frame::from_encoded(bytes)?).await?,
                None => break,
            },
            inbound = framed.next() => {
                let Some(frame) = inbound.transpose()? else { break };
                let code = frame.kind()?;
                if code.is_heartbeat() {
                    continue;
                }
                let transit = parse_transit_message(&frame.payload)?;
                let forwarded = forward_transit(code, &transit);

                let peers = peers.lock().map_err(|_| fernq::ProtocolError::ConnectionClosed)?;
                let targets: Vec<&String> = match code {
                    TypeCode::RoomBroadcast => peers.keys().filter(|n| **n != transit.from).collect(),
                    TypeCode::UserScan | TypeCode::UserScanSingle | TypeCode::RequestMessageScan => {
                        let pattern = Regex::new(&transit.target).map_err(fernq::ProtocolError::from)?;
                        let mut hits: Vec<&String> = peers.keys().filter(|n| pattern.is_match(n)).collect();
                        if code != TypeCode::UserScan {
                            hits.truncate(1);
                        }
                        hits
                    }
                    _ => peers.keys().filter(|n| **n == transit.target).collect(),
                };
                for name in targets {
                    if let Some(peer) = peers.get(name) {
                        let _ = peer.send(forwarded.clone());
                    }
                }
            }
        }
    }

    if let Ok(mut peers) = peers.lock() {
        peers.remove(&info.client_id);
    }
    Ok(())
}

async fn join(name: &str, transport: &MemoryTransport, peers: &Peers) -> fernq::Result<Client<MemoryTransport>> {
    let relay = transport.accept_next();
    tokio::spawn(serve_member(relay, Arc::clone(peers)));

    let client = Client::with_transport(name, transport.clone(), ClientConfig::default());
    client.connect(&url_for(name)).await?;
    println!("{} joined room {:?}", name, client.room());
    Ok(client)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&LoggingConfig::default())?;

    println!("=== fernq Room Chat Demo ===\n");

    let transport = MemoryTransport::new();
    let peers: Peers = Arc::new(Mutex::new(HashMap::new()));

    let alice = join("alice", &transport, &peers).await?;
    let bob = join("bob", &transport, &peers).await?;
    let mut bob_inbox = bob.read()?;
    let mut alice_inbox = alice.read()?;

    alice.send("bob", b"hi bob, it's alice").await?;
    alice.broadcast(b"hello, lobby").await?;
    alice.scan_send("^b", b"anyone whose name starts with b").await?;
    let request_id = alice.request("bob", "/time", b"").await?;
    println!("alice sent request {}", request_id);

    for _ in 0..4 {
        let Some(message) = bob_inbox.recv().await else {
            break;
        };
        if message.is_request() {
            let (id, request) = message.request()?;
            println!("bob <- request {} for {}", id, request.url);
            bob.respond(&message.from, &id, StatusCode::OK, b"12:00").await?;
        } else {
            println!(
                "bob <- [0x{:04X}] {}: {}",
                message.type_code,
                message.from,
                String::from_utf8_lossy(&message.message)
            );
        }
    }

    if let Some(message) = alice_inbox.recv().await {
        let (id, response) = message.response()?;
        println!(
            "alice <- response {} status {}: {}",
            id,
            StatusCode::from(response.status),
            String::from_utf8_lossy(&response.body)
        );
    }

    if let Err(e) = alice.scan_send("[unclosed", b"never sent").await {
        println!("rejected locally: {}", e);
    }

    println!("\nalice metrics: {:?}", alice.metrics());
    alice.stop().await?;
    bob.stop().await?;
    println!("both clients stopped");
    Ok(())
}
