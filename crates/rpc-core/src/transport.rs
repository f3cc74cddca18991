//! The seam between `rpc-core` and the externally-supplied WebSocket
//! transport, which provides framed text/binary message delivery,
//! per-connection user-data slots, and a connection write lock.
//!
//! `rpc-core` never opens a socket itself. A host application implements
//! [`Connection`] for whatever transport it has (axum, `tokio-tungstenite`,
//! an in-memory test double) and calls [`Endpoint`](crate::endpoint::Endpoint)
//! methods from its own connect/ready/data/close callbacks.

use std::future::Future;
use std::pin::Pin;

/// One physical WebSocket frame as delivered by the transport's single
/// data callback, opcode and payload together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOpcode {
    Continuation,
    Text,
    Binary,
    /// Anything else (control frames): logged and ignored.
    Other,
}

impl FrameOpcode {
    /// Decodes the low nibble of a raw WebSocket opcode byte. Bit 7 (FIN)
    /// is read separately by the caller.
    pub fn from_raw(low_nibble: u8) -> Self {
        match low_nibble {
            0x0 => FrameOpcode::Continuation,
            0x1 => FrameOpcode::Text,
            0x2 => FrameOpcode::Binary,
            _ => FrameOpcode::Other,
        }
    }
}

/// A logical message ready to hand to the codec: either a text payload or
/// a binary chunk sequence.
#[derive(Debug, Clone)]
pub struct Frame {
    pub is_text: bool,
    pub bytes: Vec<u8>,
}

/// Transport-level failure writing a frame to a connection (e.g. the
/// socket was closed concurrently). Opaque to `rpc-core`: the host
/// application's `Connection` impl decides what this means for its
/// transport.
#[derive(Debug, thiserror::Error)]
#[error("transport write failed: {0}")]
pub struct TransportError(pub String);

/// A live WebSocket connection handle, as held by a client slot. Exactly
/// one `Connection` impl exists per connected client; sending through it
/// must serialize writes itself — the connection write lock — since
/// `rpc-core` may call `send` from any dispatching thread.
pub trait Connection: Send + Sync {
    /// Writes one physical frame to the peer, holding whatever per-connection
    /// write lock the transport provides for the duration of the write.
    fn send<'a>(
        &'a self,
        frame: Frame,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

    /// Shuts down the underlying transport connection. Called by
    /// [`Registry::close_endpoint`](crate::registry::Registry::close_endpoint)
    /// for every still-active slot so live sockets are actually told to go
    /// away, rather than just forgotten about on this side.
    fn close<'a>(&'a self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Per-slot WebSocket fragment reassembly state.
///
/// The transport delivers every frame — fragment or not — through a single
/// callback carrying an opcode. This accumulates continuation frames until
/// FIN, then hands the dispatcher one logical payload.
#[derive(Debug, Default)]
pub struct FragmentAssembler {
    saved_opcode: Option<FrameOpcode>,
    buffer: Vec<u8>,
}

/// The outcome of feeding one physical frame to the assembler.
pub enum Reassembled<'a> {
    /// Not the final fragment of a message; caller should keep the
    /// connection open and wait for more frames.
    Pending,
    /// A control/unsupported frame type arrived while idle; logged and
    /// ignored, connection stays open.
    Ignored,
    /// FIN arrived: here is the complete logical message.
    Complete { is_text: bool, bytes: &'a [u8] },
}

impl FragmentAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one frame (`opcode`, `fin`, `payload`) into the assembler.
    ///
    /// If idle, the frame must be `Text` or `Binary` and its type is saved;
    /// bytes are appended to the accumulator unless this is a
    /// non-fragmented (`fin` on the first frame) single frame, in which
    /// case the fast path uses the frame's own bytes without a copy.
    pub fn feed<'a>(&'a mut self, opcode: FrameOpcode, fin: bool, payload: &'a [u8]) -> Reassembled<'a> {
        if self.saved_opcode.is_none() {
            match opcode {
                FrameOpcode::Text | FrameOpcode::Binary => {
                    self.saved_opcode = Some(opcode);
                    self.buffer.clear();
                }
                _ => return Reassembled::Ignored,
            }
        }

        if !fin || opcode == FrameOpcode::Continuation {
            self.buffer.extend_from_slice(payload);
        }

        if !fin {
            return Reassembled::Pending;
        }

        let saved = self
            .saved_opcode
            .take()
            .expect("saved_opcode set above before reaching FIN handling");
        let is_text = match saved {
            FrameOpcode::Text => true,
            FrameOpcode::Binary => false,
            _ => unreachable!("saved_opcode is only ever Text or Binary"),
        };

        if self.buffer.is_empty() {
            Reassembled::Complete {
                is_text,
                bytes: payload,
            }
        } else {
            // Single-frame fast path above returns early via payload; here
            // fragments were accumulated so the full message lives in
            // `self.buffer`.
            Reassembled::Complete {
                is_text,
                bytes: &self.buffer,
            }
        }
    }

    /// Resets accumulator state. Called after every `Complete` result.
    pub fn reset(&mut self) {
        self.saved_opcode = None;
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_frame_fast_path_uses_frame_bytes_directly() {
        let mut a = FragmentAssembler::new();
        match a.feed(FrameOpcode::Text, true, b"hello") {
            Reassembled::Complete { is_text, bytes } => {
                assert!(is_text);
                assert_eq!(bytes, b"hello");
            }
            _ => panic!("expected Complete"),
        }
    }

    #[test]
    fn three_fragment_message_reassembles_in_order() {
        let mut a = FragmentAssembler::new();
        assert!(matches!(
            a.feed(FrameOpcode::Binary, false, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]),
            Reassembled::Pending
        ));
        assert!(matches!(
            a.feed(
                FrameOpcode::Continuation,
                false,
                &[11, 12, 13, 14, 15, 16, 17, 18, 19, 20]
            ),
            Reassembled::Pending
        ));
        match a.feed(
            FrameOpcode::Continuation,
            true,
            &[21, 22, 23, 24, 25, 26, 27, 28, 29, 30],
        ) {
            Reassembled::Complete { is_text, bytes } => {
                assert!(!is_text);
                assert_eq!(bytes.len(), 30);
                assert_eq!(bytes[0], 1);
                assert_eq!(bytes[29], 30);
            }
            _ => panic!("expected Complete"),
        }
    }

    #[test]
    fn control_frame_while_idle_is_ignored() {
        let mut a = FragmentAssembler::new();
        assert!(matches!(
            a.feed(FrameOpcode::Other, true, b"x"),
            Reassembled::Ignored
        ));
    }

    #[test]
    fn reset_clears_state_between_messages() {
        let mut a = FragmentAssembler::new();
        let _ = a.feed(FrameOpcode::Text, false, b"part");
        a.reset();
        match a.feed(FrameOpcode::Binary, true, b"\x01\x02") {
            Reassembled::Complete { is_text, bytes } => {
                assert!(!is_text);
                assert_eq!(bytes, &[1, 2]);
            }
            _ => panic!("expected Complete"),
        }
    }
}
