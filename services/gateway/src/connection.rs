//! The `axum`-backed [`rpc_core::Connection`] implementation and the
//! WebSocket upgrade route that drives an [`rpc_core::Endpoint`]'s
//! connect/ready/data/close lifecycle from real TCP connections.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{Method, Uri};
use axum::response::IntoResponse;
use axum::routing::get;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use rpc_core::{Connection, ConnectOutcome, Endpoint, Frame, FrameOpcode, TransportError};
use rt_ui_log::UiLogger;
use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;

use crate::ui_server;

/// Shared state handed to every `axum` route: the endpoint connections are
/// dispatched into, and a ring buffer of recent lifecycle log lines
/// exposed over `/api/log`.
#[derive(Clone)]
pub struct GatewayState {
    pub endpoint: Endpoint,
    pub logger: Arc<UiLogger<String>>,
}

/// Builds the full `axum` router: the WebSocket endpoint, the log buffer
/// API, and the embedded-UI fallback.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/api/log", get(recent_log))
        .fallback(serve_ui_fallback)
        .with_state(state)
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn recent_log(State(state): State<GatewayState>) -> impl IntoResponse {
    axum::Json(state.logger.entries())
}

async fn serve_ui_fallback(method: Method, uri: Uri) -> impl IntoResponse {
    ui_server::serve_ui(method, uri).await
}

/// Drives one accepted WebSocket connection through the endpoint's
/// connect/ready/data/close hooks until the peer closes or a frame fails
/// to parse as either a CALL or a RESPONSE.
async fn serve_socket(socket: WebSocket, state: GatewayState) {
    let (sink, mut stream) = socket.split();
    let conn: Arc<dyn Connection> = Arc::new(GatewayConnection(AsyncMutex::new(sink)));

    let connid = match state.endpoint.on_connect(conn) {
        ConnectOutcome::Accepted(connid) => connid,
        ConnectOutcome::Refused => {
            warn!(url = state.endpoint.url(), "connection refused: endpoint at capacity");
            return;
        }
    };
    state.endpoint.on_ready(connid);

    while let Some(frame) = stream.next().await {
        let msg = match frame {
            Ok(m) => m,
            Err(e) => {
                warn!(connid, error = %e, "websocket read error");
                break;
            }
        };
        let (opcode, payload): (FrameOpcode, Vec<u8>) = match msg {
            Message::Text(t) => (FrameOpcode::Text, t.as_bytes().to_vec()),
            Message::Binary(b) => (FrameOpcode::Binary, b.to_vec()),
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => continue,
        };
        // `axum`'s WebSocket already reassembles fragmented frames, so
        // every message observed here arrives with an implicit FIN. The
        // endpoint's own fragment assembler still runs (trivially, one
        // frame per message) and is what a lower-level transport exercising
        // raw opcode/FIN pairs would drive instead.
        if !state.endpoint.on_data(connid, opcode, true, &payload).await {
            break;
        }
    }

    state.endpoint.on_close(connid);
}

struct GatewayConnection(AsyncMutex<futures_util::stream::SplitSink<WebSocket, Message>>);

impl Connection for GatewayConnection {
    fn send<'a>(
        &'a self,
        frame: Frame,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let msg = if frame.is_text {
                let text = String::from_utf8(frame.bytes)
                    .map_err(|e| TransportError(format!("text frame was not valid utf8: {e}")))?;
                Message::Text(text.into())
            } else {
                Message::Binary(Bytes::from(frame.bytes))
            };
            let mut sink = self.0.lock().await;
            sink.send(msg).await.map_err(|e| TransportError(e.to_string()))
        })
    }

    fn close<'a>(&'a self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let mut sink = self.0.lock().await;
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        })
    }
}
