//! Reference host application for `rpc-core`: a real `axum` WebSocket
//! transport, port discovery, embedded-UI serving, and the CLI/logging
//! ambient stack a standalone binary needs.
//!
//! `rpc-core` itself never opens a socket; the HTTP/WS server, static-file
//! serving, port discovery, and browser launching are all external
//! collaborators supplied by the host. This crate is that collaborator:
//! thin, but enough to exercise every public endpoint operation end to end.

pub mod cli;
pub mod connection;
pub mod ports;
pub mod rpc_methods;
pub mod ui_server;

pub use cli::Args;
pub use connection::{GatewayState, router};

use thiserror::Error;

/// Errors surfaced by the gateway binary itself, as distinct from
/// `rpc_core::RpcError`, which governs the endpoint layer.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
    #[error(transparent)]
    Rpc(#[from] rpc_core::RpcError),
}
