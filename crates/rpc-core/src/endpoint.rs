//! A named, URL-bound RPC handler: slot vector, bind table, and the
//! call/response protocol.
//!
//! `Endpoint` is a lightweight handle (URL + back-reference to its owning
//! [`Registry`](crate::registry::Registry)); all structural state actually
//! lives behind the registry's single coarse lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, warn};

use crate::error::RpcError;
use crate::registry::Registry;
use crate::slot::{ConnId, PendingResponse, ResponseFn, Slot};
use crate::transport::{Connection, Frame, FrameOpcode, Reassembled, TransportError};
use crate::value::RpcValue;

/// What a bound local function wants done with the response envelope it
/// was handed. `Suppress` wins even if the function already wrote into
/// `resp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcOutcome {
    Send,
    Suppress,
}

/// A bound local function: invoked when a peer sends a `call` naming it.
pub type RpcFn =
    Arc<dyn Fn(&Endpoint, ConnId, &RpcValue, &mut RpcValue) -> RpcOutcome + Send + Sync>;

/// Lifecycle events delivered outside the registry lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Open,
    Ready,
    Close,
}

/// The user event callback, invoked with `(endpoint, connid, event)`.
pub type EventFn = Arc<dyn Fn(&Endpoint, ConnId, Event) + Send + Sync>;

/// Snapshot returned by [`Endpoint::info`].
#[derive(Debug, Clone)]
pub struct EndpointInfo {
    pub url: String,
    pub nconns: usize,
    pub max_connid: usize,
}

/// The transport-facing outcome of a connect attempt.
pub enum ConnectOutcome {
    /// Admitted: here is the assigned connection id.
    Accepted(ConnId),
    /// `nconns >= max_conns`, or the endpoint was removed by a concurrent
    /// `close_endpoint`; the transport must refuse/close the connection
    /// before any event fires.
    Refused,
}

/// Structural state for one endpoint, held inside the registry's coarse
/// lock. Never exposed directly — callers only ever see [`Endpoint`]
/// handles.
pub(crate) struct EndpointState {
    pub(crate) max_conns: usize,
    pub(crate) slots: Vec<Slot>,
    pub(crate) binds: HashMap<String, RpcFn>,
    pub(crate) event_cb: Option<EventFn>,
    pub(crate) userdata: Option<Arc<dyn std::any::Any + Send + Sync>>,
}

impl EndpointState {
    pub(crate) fn new(max_conns: usize, event_cb: Option<EventFn>) -> Self {
        Self {
            max_conns,
            slots: Vec::new(),
            binds: HashMap::new(),
            event_cb,
            userdata: None,
        }
    }

    fn nconns(&self) -> usize {
        self.slots.iter().filter(|s| s.is_active()).count()
    }
}

/// A URL-bound RPC handler. Cheap to clone; all clones refer to the same
/// underlying endpoint state via the owning registry.
#[derive(Clone)]
pub struct Endpoint {
    pub(crate) url: Arc<str>,
    pub(crate) registry: Registry,
}

impl Endpoint {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Snapshot of this endpoint's current size: URL, active connection
    /// count, and slot-vector length. Errors with `EndpointMissing` if this
    /// handle outlives a `close_endpoint` for its URL.
    pub fn info(&self) -> Result<EndpointInfo, RpcError> {
        self.registry
            .with_endpoint(&self.url, |state| EndpointInfo {
                url: self.url.to_string(),
                nconns: state.nconns(),
                max_connid: state.slots.len(),
            })
            .ok_or(RpcError::EndpointMissing)
    }

    /// Closes this endpoint: unregisters it from the registry and closes
    /// every still-active slot's live connection via the transport. See
    /// [`Registry::close_endpoint`] for the ordering rationale.
    pub async fn close(&self) -> Result<(), RpcError> {
        self.registry.close_endpoint(&self.url).await
    }

    pub fn set_userdata<T: Send + Sync + 'static>(&self, value: T) {
        self.registry.with_endpoint_mut(&self.url, |state| {
            state.userdata = Some(Arc::new(value));
        });
    }

    pub fn get_userdata<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.registry
            .with_endpoint(&self.url, |state| state.userdata.clone())
            .flatten()
            .and_then(|ud| ud.downcast::<T>().ok())
    }

    /// Registers a local function under `remote_name` so peers can invoke
    /// it by name. Errors if that name is already bound, or if this handle
    /// outlives a `close_endpoint` for its URL.
    pub fn bind(&self, remote_name: impl Into<String>, f: RpcFn) -> Result<(), RpcError> {
        let name = remote_name.into();
        self.registry
            .with_endpoint_mut(&self.url, |state| {
                if state.binds.contains_key(&name) {
                    return Err(RpcError::AlreadyBound);
                }
                state.binds.insert(name, f);
                Ok(())
            })
            .ok_or(RpcError::EndpointMissing)?
    }

    /// Removes a previously bound name. Errors if nothing is bound there,
    /// or if this handle outlives a `close_endpoint` for its URL.
    pub fn unbind(&self, remote_name: &str) -> Result<(), RpcError> {
        self.registry
            .with_endpoint_mut(&self.url, |state| {
                if state.binds.remove(remote_name).is_none() {
                    return Err(RpcError::NotBound);
                }
                Ok(())
            })
            .ok_or(RpcError::EndpointMissing)?
    }

    /// Sends a named call to a connected peer, optionally registering a
    /// callback to run when (or if) its response arrives.
    pub async fn call(
        &self,
        connid: ConnId,
        remote_name: &str,
        params: RpcValue,
        response_cb: Option<ResponseFn>,
    ) -> Result<(), RpcError> {
        let (conn, cid) = self
            .registry
            .with_endpoint_mut(&self.url, |state| {
                let slot = state
                    .slots
                    .get_mut(connid)
                    .filter(|s| s.is_active())
                    .ok_or(RpcError::InvalidConnection)?;
                let cid = slot.next_call_id();
                if let Some(cb) = response_cb {
                    slot.insert_pending(
                        cid,
                        PendingResponse {
                            callback: cb,
                            sent_at: Instant::now(),
                        },
                    );
                }
                let conn = slot
                    .connection()
                    .expect("slot checked active above")
                    .clone();
                Ok::<_, RpcError>((conn, cid))
            })
            .ok_or(RpcError::EndpointMissing)??;

        let mut envelope = RpcValue::map();
        envelope.insert("cid", RpcValue::Int(cid as i64));
        envelope.insert("call", remote_name.into());
        envelope.insert("params", params);

        write_envelope(&conn, envelope).await
    }

    // -------------------------------------------------------------------
    // Transport-facing lifecycle hooks. A host application's WebSocket
    // transport calls these from its own connect/ready/data/close
    // callbacks.
    // -------------------------------------------------------------------

    /// On connect: admission control, slot allocation, and the `Open`
    /// event.
    pub fn on_connect(&self, conn: Arc<dyn Connection>) -> ConnectOutcome {
        let outcome = self
            .registry
            .with_endpoint_mut(&self.url, |state| {
                if state.nconns() >= state.max_conns {
                    return None;
                }
                if let Some((idx, slot)) = state
                    .slots
                    .iter_mut()
                    .enumerate()
                    .find(|(_, s)| !s.is_active())
                {
                    slot.reopen(conn.clone());
                    Some(idx)
                } else {
                    state.slots.push(Slot::new(conn.clone()));
                    Some(state.slots.len() - 1)
                }
            })
            .flatten();

        match outcome {
            None => ConnectOutcome::Refused,
            Some(connid) => {
                self.fire_event(connid, Event::Open);
                ConnectOutcome::Accepted(connid)
            }
        }
    }

    /// On ready: no state change, just the `Ready` event.
    pub fn on_ready(&self, connid: ConnId) {
        self.fire_event(connid, Event::Ready);
    }

    /// On close: slot teardown under the lock, then the `Close` event.
    pub fn on_close(&self, connid: ConnId) {
        let existed = self.registry.with_endpoint_mut(&self.url, |state| {
            match state.slots.get_mut(connid) {
                Some(slot) if slot.is_active() => {
                    slot.close();
                    true
                }
                _ => false,
            }
        });
        match existed {
            Some(true) => self.fire_event(connid, Event::Close),
            Some(false) => {
                warn!(connid, url = %self.url, "close callback for invalid or already-closed connid");
            }
            None => {
                // The endpoint was already removed by a concurrent
                // `close_endpoint`, which itself closed every connection it
                // found live — this callback is the transport noticing the
                // same closure a moment later. Nothing left to tear down.
                debug!(connid, url = %self.url, "close callback after endpoint was removed");
            }
        }
    }

    /// Feeds one physical WebSocket frame into this connection's fragment
    /// assembler and, once a full logical message is available, dispatches
    /// it as a CALL or RESPONSE.
    ///
    /// Returns `true` to keep the connection open, `false` to close it. A
    /// CALL or RESPONSE envelope that fails validation keeps the
    /// connection open; a frame that decodes as neither closes it.
    pub async fn on_data(&self, connid: ConnId, opcode: FrameOpcode, fin: bool, payload: &[u8]) -> bool {
        let reassembled = self.registry.with_endpoint_mut(&self.url, |state| {
            let Some(slot) = state.slots.get_mut(connid).filter(|s| s.is_active()) else {
                return Err(());
            };
            match slot.fragments.feed(opcode, fin, payload) {
                Reassembled::Pending => Ok(None),
                Reassembled::Ignored => Ok(None),
                Reassembled::Complete { is_text, bytes } => {
                    let frame = Frame {
                        is_text,
                        bytes: bytes.to_vec(),
                    };
                    slot.fragments.reset();
                    Ok(Some(frame))
                }
            }
        });

        let frame = match reassembled {
            None => {
                debug!(connid, url = %self.url, "message received after endpoint was removed");
                return false;
            }
            Some(Err(())) => {
                warn!(connid, url = %self.url, "message received for invalid connid");
                return false;
            }
            Some(Ok(None)) => return true,
            Some(Ok(Some(frame))) => frame,
        };

        let value = match crate::codec::decode(frame.is_text, &frame.bytes) {
            Ok(v) => v,
            Err(e) => {
                error!(connid, url = %self.url, error = %e, "received undecodable frame");
                return false;
            }
        };

        self.dispatch(connid, value).await
    }

    async fn dispatch(&self, connid: ConnId, msg: RpcValue) -> bool {
        if matches!(msg.get("cid"), Some(RpcValue::Int(_))) {
            return self.dispatch_call(connid, msg).await;
        }
        if matches!(msg.get("rid"), Some(RpcValue::Int(_))) {
            return self.dispatch_response(connid, msg).await;
        }
        warn!(connid, url = %self.url, "frame is neither a CALL nor a RESPONSE");
        false
    }

    /// Local dispatch for a received CALL.
    async fn dispatch_call(&self, connid: ConnId, msg: RpcValue) -> bool {
        let Some(RpcValue::Int(cid)) = msg.get("cid").cloned() else {
            unreachable!("caller verified 'cid' is present and an int");
        };
        let Some(call_name) = msg.get("call").and_then(RpcValue::as_str).map(str::to_owned) else {
            warn!(connid, url = %self.url, "CALL frame missing 'call' field");
            return true;
        };
        let params = msg.get("params").cloned().unwrap_or(RpcValue::Null);

        let f = self
            .registry
            .with_endpoint(&self.url, |state| state.binds.get(&call_name).cloned())
            .flatten();
        let Some(f) = f else {
            warn!(connid, url = %self.url, method = %call_name, "no bind for requested method");
            return true;
        };

        let mut resp_inner = RpcValue::map();
        let outcome = f(self, connid, &params, &mut resp_inner);
        if outcome == RpcOutcome::Suppress {
            debug!(connid, url = %self.url, method = %call_name, "local rpc function suppressed response");
            return true;
        }
        if resp_inner.is_empty_map() {
            return true;
        }

        let mut envelope = RpcValue::map();
        envelope.insert("rid", RpcValue::Int(cid));
        envelope.insert("resp", resp_inner);

        let conn = self
            .registry
            .with_endpoint(&self.url, |state| {
                state.slots.get(connid).and_then(Slot::connection).cloned()
            })
            .flatten();
        let Some(conn) = conn else {
            return true;
        };

        match write_envelope(&conn, envelope).await {
            Ok(()) => true,
            Err(e) => {
                error!(connid, url = %self.url, error = %e, "error writing response");
                true
            }
        }
    }

    /// Response dispatch for a received RESPONSE.
    async fn dispatch_response(&self, connid: ConnId, msg: RpcValue) -> bool {
        let Some(RpcValue::Int(rid)) = msg.get("rid").cloned() else {
            unreachable!("caller verified 'rid' is present and an int");
        };
        let resp = msg.get("resp").cloned().unwrap_or(RpcValue::Null);

        let pending = self
            .registry
            .with_endpoint_mut(&self.url, |state| {
                state
                    .slots
                    .get_mut(connid)
                    .and_then(|slot| slot.take_pending(rid as u64))
            })
            .flatten();

        let Some(pending) = pending else {
            warn!(connid, url = %self.url, rid, "response with no matching pending call");
            return true;
        };

        let close = (pending.callback)(self, connid, &resp);
        !close
    }

    fn fire_event(&self, connid: ConnId, event: Event) {
        let cb = self
            .registry
            .with_endpoint(&self.url, |state| state.event_cb.clone())
            .flatten();
        if let Some(cb) = cb {
            cb(self, connid, event);
        }
    }
}

async fn write_envelope(conn: &Arc<dyn Connection>, envelope: RpcValue) -> Result<(), RpcError> {
    let encoded = crate::codec::encode(envelope)?;
    let frame = Frame {
        is_text: encoded.is_text,
        bytes: encoded.bytes,
    };
    conn.send(frame)
        .await
        .map_err(|TransportError(msg)| {
            error!(error = %msg, "transport write failed");
            RpcError::InvalidConnection
        })
}
