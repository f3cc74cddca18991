//! Mock WebSocket harness for driving [`rpc_core`] endpoints end to end
//! over real sockets, without pulling in a full host application.
//!
//! [`TestServer`] wires one [`rpc_core::Endpoint`] into a real `axum`
//! WebSocket route; [`MockWsClient`] is a thin `tokio-tungstenite` client
//! for talking to it. Together they let `rpc-core`'s own test suite and
//! `services/gateway`'s integration tests exercise the wire protocol
//! without depending on the gateway binary.

mod client;
mod server;

pub use client::{MockFrame, MockWsClient};
pub use server::TestServer;
