//! A real `axum` WebSocket server wrapping exactly one [`rpc_core::Endpoint`],
//! for exercising the full network path in integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use rpc_core::{Connection, ConnectOutcome, Endpoint, Frame, FrameOpcode, TransportError};
use tokio::net::TcpListener;
use tokio::sync::Mutex as AsyncMutex;

/// A running test server bound to a random local port, serving one
/// endpoint at `/ws`. Dropping it stops the accept loop.
pub struct TestServer {
    addr: SocketAddr,
    _task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Binds to `127.0.0.1:0` and serves WebSocket upgrades at `/ws`,
    /// wiring each accepted connection into `endpoint`'s lifecycle hooks.
    pub async fn start(endpoint: Endpoint) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = Router::new().route("/ws", get(upgrade)).with_state(endpoint);
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self { addr, _task: task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

async fn upgrade(ws: WebSocketUpgrade, State(endpoint): State<Endpoint>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, endpoint))
}

async fn serve_socket(socket: WebSocket, endpoint: Endpoint) {
    let (sink, mut stream) = socket.split();
    let conn: Arc<dyn Connection> = Arc::new(AxumConnection(AsyncMutex::new(sink)));

    let connid = match endpoint.on_connect(conn) {
        ConnectOutcome::Accepted(id) => id,
        ConnectOutcome::Refused => return,
    };
    endpoint.on_ready(connid);

    while let Some(Ok(msg)) = stream.next().await {
        let (opcode, payload): (FrameOpcode, Vec<u8>) = match msg {
            Message::Text(t) => (FrameOpcode::Text, t.as_bytes().to_vec()),
            Message::Binary(b) => (FrameOpcode::Binary, b.to_vec()),
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => continue,
        };
        // axum/tungstenite reassemble fragmented WebSocket frames before
        // handing us a `Message`, so every message observed here already
        // carries an implicit FIN — the endpoint's own fragment assembler
        // is exercised separately, against raw opcode/fin pairs, in
        // `rpc-core`'s own protocol-scenario tests.
        if !endpoint.on_data(connid, opcode, true, &payload).await {
            break;
        }
    }

    endpoint.on_close(connid);
}

struct AxumConnection(AsyncMutex<futures_util::stream::SplitSink<WebSocket, Message>>);

impl Connection for AxumConnection {
    fn send<'a>(
        &'a self,
        frame: Frame,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), TransportError>> + Send + 'a>>
    {
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

    fn close<'a>(&'a self) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let mut sink = self.0.lock().await;
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        })
    }
}
