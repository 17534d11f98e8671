//! # Service Layer
//!
//! The connection client built on top of the protocol and transport layers.

pub mod client;

pub use client::{Client, ConnectionState};
