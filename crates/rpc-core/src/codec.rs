//! The on-the-wire representation of one logical RPC message: a JSON
//! envelope plus zero or more out-of-band byte-buffer chunks.
//!
//! A message with no buffer leaves goes out as a text WebSocket frame
//! carrying the JSON envelope verbatim. A message with one or more buffer
//! leaves goes out as a binary frame: a sequence of 4-byte-aligned chunks,
//! each with an 8-byte little-endian `{type, size}` header. Every buffer
//! leaf in the JSON is replaced by a sentinel string
//! `"\u{8}\u{8}\u{8}\u{8}\u{8}\u{8}<index>"` pointing at its `BUF` chunk.

use crate::error::{DecodeError, EncodeError};
use crate::value::{RpcValue, from_json, to_json};

pub const CHUNK_MSG: u32 = 1;
pub const CHUNK_BUF: u32 = 2;

const CHUNK_ALIGNMENT: usize = 4;
const HEADER_LEN: usize = 8;

/// ASCII BS repeated six times: visibly distinct, unlikely to collide with
/// real string content, and still valid inside a JSON string.
pub const BUFFER_PREFIX: &str = "\u{8}\u{8}\u{8}\u{8}\u{8}\u{8}";

/// The result of encoding one value tree: the physical frame bytes and
/// whether they must be sent as a text or binary WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub is_text: bool,
    pub bytes: Vec<u8>,
}

/// Encodes `value` into its physical frame representation.
///
/// Consumes `value`: every [`RpcValue::Buf`] leaf is moved into the output
/// rather than copied, since the caller has no further use for the params
/// tree after a call or response has been sent.
pub fn encode(value: RpcValue) -> Result<EncodedFrame, EncodeError> {
    let (substituted, buffers) = substitute_buffers(value);
    let json = to_json(&substituted);
    let json_bytes = serde_json::to_vec(&json)?;

    if buffers.is_empty() {
        return Ok(EncodedFrame {
            is_text: true,
            bytes: json_bytes,
        });
    }

    let mut out = Vec::with_capacity(json_bytes.len() + HEADER_LEN * (buffers.len() + 1));
    write_chunk(&mut out, CHUNK_MSG, &json_bytes);
    for buf in &buffers {
        write_chunk(&mut out, CHUNK_BUF, buf);
    }
    Ok(EncodedFrame {
        is_text: false,
        bytes: out,
    })
}

fn write_chunk(out: &mut Vec<u8>, chunk_type: u32, data: &[u8]) {
    out.extend_from_slice(&chunk_type.to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    let padding = (CHUNK_ALIGNMENT - (data.len() % CHUNK_ALIGNMENT)) % CHUNK_ALIGNMENT;
    out.resize(out.len() + padding, 0);
}

/// Walks `value`, replacing every `Buf` leaf with a sentinel string in
/// document order, and returns the transformed tree alongside the buffers
/// in the order their sentinel indices reference.
fn substitute_buffers(value: RpcValue) -> (RpcValue, Vec<Vec<u8>>) {
    let mut buffers = Vec::new();
    let substituted = substitute_buffers_rec(value, &mut buffers);
    (substituted, buffers)
}

fn substitute_buffers_rec(value: RpcValue, buffers: &mut Vec<Vec<u8>>) -> RpcValue {
    match value {
        RpcValue::Buf(bytes) => {
            let index = buffers.len();
            buffers.push(bytes);
            RpcValue::Str(format!("{BUFFER_PREFIX}{index}"))
        }
        RpcValue::Array(items) => RpcValue::Array(
            items
                .into_iter()
                .map(|v| substitute_buffers_rec(v, buffers))
                .collect(),
        ),
        RpcValue::Map(map) => RpcValue::Map(
            map.into_iter()
                .map(|(k, v)| (k, substitute_buffers_rec(v, buffers)))
                .collect(),
        ),
        scalar => scalar,
    }
}

/// Decodes a physical frame back into a value tree.
///
/// `is_text` must reflect the WebSocket opcode the frame arrived on: text
/// frames are parsed as a bare JSON envelope, binary frames as a chunk
/// sequence. The frame's own bytes are copied into owned buffers; callers
/// needing zero-copy semantics may slice `bytes` themselves before calling
/// this, since `RpcValue::Buf` always owns its data.
pub fn decode(is_text: bool, bytes: &[u8]) -> Result<RpcValue, DecodeError> {
    let (msg_bytes, buffer_chunks): (&[u8], Vec<&[u8]>) = if is_text {
        (bytes, Vec::new())
    } else {
        decode_chunks(bytes)?
    };

    let json: serde_json::Value = serde_json::from_slice(msg_bytes)?;
    let tree = from_json(&json);
    resolve_buffers(tree, &buffer_chunks)
}

/// Splits a binary frame into its `MSG` chunk and ordered `BUF` chunks.
/// Chunks may appear in any order on the wire; `BUF` chunks are collected
/// in the order they are *encountered*, which is also the order the
/// encoder assigned their sentinel indices (document order at encode
/// time), so index `i` in a sentinel string refers to the `i`-th `BUF`
/// chunk found during this scan.
fn decode_chunks(bytes: &[u8]) -> Result<(&[u8], Vec<&[u8]>), DecodeError> {
    let mut cursor = 0usize;
    let mut msg: Option<&[u8]> = None;
    let mut bufs: Vec<&[u8]> = Vec::new();

    while cursor < bytes.len() {
        if cursor + HEADER_LEN > bytes.len() {
            return Err(DecodeError::IncompleteHeader);
        }
        let chunk_type = u32::from_le_bytes(bytes[cursor..cursor + 4].try_into().unwrap());
        let chunk_size =
            u32::from_le_bytes(bytes[cursor + 4..cursor + 8].try_into().unwrap()) as usize;
        cursor += HEADER_LEN;

        if cursor + chunk_size > bytes.len() {
            return Err(DecodeError::ChunkOverrun);
        }
        let data = &bytes[cursor..cursor + chunk_size];
        cursor += chunk_size;

        match chunk_type {
            CHUNK_MSG => {
                if msg.is_some() {
                    return Err(DecodeError::DuplicateMsg);
                }
                msg = Some(data);
            }
            CHUNK_BUF => bufs.push(data),
            other => return Err(DecodeError::UnknownChunkType(other)),
        }

        let padding = (CHUNK_ALIGNMENT - (chunk_size % CHUNK_ALIGNMENT)) % CHUNK_ALIGNMENT;
        cursor += padding;
    }

    if cursor != bytes.len() {
        return Err(DecodeError::TrailingBytes);
    }
    let msg = msg.ok_or(DecodeError::MissingMsg)?;
    Ok((msg, bufs))
}

/// Scans `tree` for buffer-reference sentinel strings and re-binds them to
/// the corresponding `BUF` chunk's bytes.
fn resolve_buffers(tree: RpcValue, buffers: &[&[u8]]) -> Result<RpcValue, DecodeError> {
    let mut substituted_count = 0usize;
    let resolved = resolve_buffers_rec(tree, buffers, &mut substituted_count)?;
    if substituted_count != buffers.len() {
        return Err(DecodeError::BufferCountMismatch {
            strings: substituted_count,
            chunks: buffers.len(),
        });
    }
    Ok(resolved)
}

fn resolve_buffers_rec(
    value: RpcValue,
    buffers: &[&[u8]],
    count: &mut usize,
) -> Result<RpcValue, DecodeError> {
    match value {
        RpcValue::Str(s) => {
            let Some(index_str) = s.strip_prefix(BUFFER_PREFIX) else {
                return Ok(RpcValue::Str(s));
            };
            let index: usize = index_str
                .parse()
                .map_err(|_| DecodeError::BufferIndexOutOfRange {
                    index: usize::MAX,
                    count: buffers.len(),
                })?;
            *count += 1;
            let data = buffers
                .get(index)
                .ok_or(DecodeError::BufferIndexOutOfRange {
                    index,
                    count: buffers.len(),
                })?;
            Ok(RpcValue::Buf(data.to_vec()))
        }
        RpcValue::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(resolve_buffers_rec(item, buffers, count)?);
            }
            Ok(RpcValue::Array(out))
        }
        RpcValue::Map(map) => {
            let mut out = indexmap::IndexMap::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k, resolve_buffers_rec(v, buffers, count)?);
            }
            Ok(RpcValue::Map(out))
        }
        scalar => Ok(scalar),
    }
}
