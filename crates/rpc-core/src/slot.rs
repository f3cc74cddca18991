//! Per-connection client state.
//!
//! One [`Slot`] exists per concurrent connection on an endpoint, addressed
//! by a dense index (the connection id). A slot is reused in place once
//! freed: indices are stable names during a slot's active lifetime but may
//! be recycled after close.

use std::collections::HashMap;
use std::time::Instant;

use crate::endpoint::Endpoint;
use crate::transport::{Connection, FragmentAssembler};
use crate::value::RpcValue;

/// A dense integer index into an endpoint's slot vector.
pub type ConnId = usize;

/// The callback invoked when a response to a previously-sent call arrives,
/// or when the connection closes with the call still pending (never
/// invoked in that case — see [`PendingResponse`]).
///
/// Receives the endpoint the call was made through, matching `RpcFn`'s own
/// `(&Endpoint, ...)` shape so a response callback can reach back into the
/// endpoint (issue a follow-up call, read `info()`, touch userdata).
///
/// Returns the keep-connection flag: `false` keeps the connection open,
/// `true` requests it be closed on the next callback boundary.
pub type ResponseFn = Box<dyn FnOnce(&Endpoint, ConnId, &RpcValue) -> bool + Send>;

/// A call awaiting its matching response.
pub struct PendingResponse {
    pub callback: ResponseFn,
    /// Wall-clock send time, recorded for future timeout bookkeeping. The
    /// core never reads this to time anything out on its own.
    pub sent_at: Instant,
}

/// One connected client's state.
pub struct Slot {
    conn: Option<std::sync::Arc<dyn Connection>>,
    pub(crate) fragments: FragmentAssembler,
    next_cid: u64,
    pending: HashMap<u64, PendingResponse>,
}

impl Slot {
    /// The call id counter's starting value. Nonzero so a default-valued
    /// `0` int can never be mistaken for a live call id; zero itself isn't
    /// reserved, it's just never produced by this starting point and
    /// monotonic increment.
    const FIRST_CALL_ID: u64 = 100;

    pub fn new(conn: std::sync::Arc<dyn Connection>) -> Self {
        Self {
            conn: Some(conn),
            fragments: FragmentAssembler::new(),
            next_cid: Self::FIRST_CALL_ID,
            pending: HashMap::new(),
        }
    }

    /// An empty slot: the sentinel state for a never-used or freed index.
    pub fn empty() -> Self {
        Self {
            conn: None,
            fragments: FragmentAssembler::new(),
            next_cid: Self::FIRST_CALL_ID,
            pending: HashMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.conn.is_some()
    }

    pub fn connection(&self) -> Option<&std::sync::Arc<dyn Connection>> {
        self.conn.as_ref()
    }

    /// Assigns and returns the next call id (post-increment).
    pub fn next_call_id(&mut self) -> u64 {
        let id = self.next_cid;
        self.next_cid += 1;
        id
    }

    pub fn insert_pending(&mut self, cid: u64, pending: PendingResponse) {
        self.pending.insert(cid, pending);
    }

    pub fn take_pending(&mut self, rid: u64) -> Option<PendingResponse> {
        self.pending.remove(&rid)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Tears down this slot's state in place, reusing the index. Any
    /// pending response records are dropped without invoking their
    /// callbacks — the event callback's `Close` is the sole notification.
    pub fn close(&mut self) {
        self.conn = None;
        self.fragments.reset();
        self.pending.clear();
        self.next_cid = Self::FIRST_CALL_ID;
    }

    /// Replaces this (now-empty) slot's state with a freshly connected
    /// client, recycling the index.
    pub fn reopen(&mut self, conn: std::sync::Arc<dyn Connection>) {
        debug_assert!(!self.is_active(), "reopen called on an active slot");
        *self = Self::new(conn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Frame, TransportError};
    use std::future::Future;
    use std::pin::Pin;

    struct NullConn;
    impl Connection for NullConn {
        fn send<'a>(
            &'a self,
            _frame: Frame,
        ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
            Box::pin(async { Ok(()) })
        }

        fn close<'a>(&'a self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
            Box::pin(async {})
        }
    }

    #[test]
    fn empty_slot_is_inactive() {
        let slot = Slot::empty();
        assert!(!slot.is_active());
    }

    #[test]
    fn call_ids_start_at_100_and_increment() {
        let mut slot = Slot::new(std::sync::Arc::new(NullConn));
        assert_eq!(slot.next_call_id(), 100);
        assert_eq!(slot.next_call_id(), 101);
        assert_eq!(slot.next_call_id(), 102);
    }

    #[test]
    fn close_drops_pending_without_invoking_callbacks() {
        let mut slot = Slot::new(std::sync::Arc::new(NullConn));
        let invoked = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let invoked2 = invoked.clone();
        slot.insert_pending(
            100,
            PendingResponse {
                callback: Box::new(move |_ep, _connid, _resp| {
                    invoked2.store(true, std::sync::atomic::Ordering::SeqCst);
                    false
                }),
                sent_at: Instant::now(),
            },
        );
        assert_eq!(slot.pending_count(), 1);
        slot.close();
        assert_eq!(slot.pending_count(), 0);
        assert!(!invoked.load(std::sync::atomic::Ordering::SeqCst));
        assert!(!slot.is_active());
    }

    #[test]
    fn reopen_resets_call_id_counter_for_recycled_index() {
        let mut slot = Slot::new(std::sync::Arc::new(NullConn));
        let _ = slot.next_call_id();
        let _ = slot.next_call_id();
        slot.close();
        slot.reopen(std::sync::Arc::new(NullConn));
        assert_eq!(slot.next_call_id(), 100);
    }
}
