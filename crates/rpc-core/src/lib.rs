//! Connection admission, wire codec, and bidirectional call/response
//! protocol for a locally-hosted WebSocket RPC endpoint.
//!
//! A host application owns the actual WebSocket transport (see the
//! [`transport::Connection`] trait) and a [`registry::Registry`] of named
//! [`endpoint::Endpoint`]s. Each endpoint tracks its connected peers as
//! [`slot::Slot`]s and exposes a local function table that peers invoke by
//! name over the [`codec`] wire format, built from the dynamic
//! [`value::RpcValue`] tree.

mod codec;
mod endpoint;
mod error;
mod registry;
mod slot;
mod transport;
mod value;

pub use codec::{BUFFER_PREFIX, CHUNK_BUF, CHUNK_MSG, EncodedFrame, decode, encode};
pub use endpoint::{
    ConnectOutcome, Endpoint, EndpointInfo, Event, EventFn, RpcFn, RpcOutcome,
};
pub use error::{DecodeError, EncodeError, RpcError};
pub use registry::{Registry, RegistryConfig};
pub use slot::{ConnId, PendingResponse, ResponseFn};
pub use transport::{Connection, Frame, FrameOpcode, FragmentAssembler, Reassembled, TransportError};
pub use value::RpcValue;
