//! # fernq
//!
//! Client core for the fernq room relay protocol.
//!
//! A fernq relay hosts rooms. Clients join a room over a single stream, then
//! exchange binary messages with one member, every member, or the members
//! whose names match a regular expression. Correlated request/response pairs
//! ride on the same transport.
//!
//! ## Layers
//! - [`core`]: frame format, tokio codec, protobuf envelopes
//! - [`protocol`]: typed message builders and `fernq://` address resolution
//! - [`transport`]: stream dialers (TCP, in-memory)
//! - [`service`]: the connection client and its read loop
//! - [`utils`]: logging, metrics and deadlines
//!
//! ## Quick Start
//! ```no_run
//! use fernq::{Client, Result};
//!
//! # async fn run() -> Result<()> {
//! let client = Client::new("alice");
//! client.connect("fernq://alice@relay.example.com/room-1#lobby?room_pass=s3cret").await?;
//!
//! let mut inbox = client.read()?;
//! client.send("bob", b"hi bob").await?;
//!
//! if let Some(message) = inbox.recv().await {
//!     println!("{} says {:?}", message.from, message.message);
//! }
//! client.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::config::FernqConfig;
pub use crate::core::frame::{Frame, TypeCode};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::message::{FernqMessage, StatusCode};
pub use crate::service::{Client, ConnectionState};
pub use crate::transport::{MemoryTransport, TcpTransport, Transport};
