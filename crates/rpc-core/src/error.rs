//! The crate-wide error enum plus the two codec-local error types it
//! wraps.

use thiserror::Error;

/// Errors the encoder can return for a single message.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("unsupported value leaf kind")]
    UnsupportedLeaf,
    #[error("json encode failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors the decoder can return for a single frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("incomplete chunk header")]
    IncompleteHeader,
    #[error("chunk data extends past frame end")]
    ChunkOverrun,
    #[error("duplicate MSG chunk")]
    DuplicateMsg,
    #[error("unknown chunk type: {0}")]
    UnknownChunkType(u32),
    #[error("leftover bytes after final chunk")]
    TrailingBytes,
    #[error("frame contains no MSG chunk")]
    MissingMsg,
    #[error("buffer reference index {index} out of range (have {count} BUF chunks)")]
    BufferIndexOutOfRange { index: usize, count: usize },
    #[error(
        "substituted string count ({strings}) does not match delivered BUF chunk count ({chunks})"
    )]
    BufferCountMismatch { strings: usize, chunks: usize },
    #[error("json parse failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// The crate-wide error enum. Variants that belong to transport/static-file
/// collaborators outside this crate (`NoMem`, `ServerStart`, `Zip`) are kept
/// here so that `rpc-core`'s `Endpoint`/`Registry` operations and the
/// gateway's own transport-facing errors share one vocabulary.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("allocation failure")]
    NoMem,
    #[error("server failed to start")]
    ServerStart,
    #[error("zip archive error")]
    Zip,
    #[error("an endpoint is already registered for this URL")]
    EndpointExists,
    #[error("no endpoint is registered for this URL")]
    EndpointMissing,
    #[error("remote name is already bound")]
    AlreadyBound,
    #[error("remote name is not bound")]
    NotBound,
    #[error("connection id does not name an active connection")]
    InvalidConnection,
    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
}
