//! A thin `tokio-tungstenite` client for driving an [`rpc_core`] endpoint
//! over a real socket: whole-message send/recv, text or binary.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::tungstenite::protocol::Message;

type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// One logical message received from the server: a text envelope or a
/// binary chunk-framed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFrame {
    Text(String),
    Binary(Vec<u8>),
}

pub struct MockWsClient {
    write: futures_util::stream::SplitSink<WsStream, Message>,
    read: futures_util::stream::SplitStream<WsStream>,
}

impl MockWsClient {
    pub async fn connect(url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url).await?;
        let (write, read) = ws_stream.split();
        Ok(Self { write, read })
    }

    pub async fn send_text(
        &mut self,
        text: impl Into<String>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(Message::Text(text.into().into())).await?;
        Ok(())
    }

    pub async fn send_binary(&mut self, bytes: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(Message::Binary(bytes.into())).await?;
        Ok(())
    }

    /// Waits for the next complete text or binary message, skipping
    /// ping/pong frames.
    pub async fn recv(&mut self) -> Result<MockFrame, Box<dyn std::error::Error>> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => return Ok(MockFrame::Text(text.to_string())),
                Some(Ok(Message::Binary(bytes))) => return Ok(MockFrame::Binary(bytes.to_vec())),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) => return Err("connection closed by server".into()),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err("connection stream ended".into()),
            }
        }
    }

    pub async fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(Message::Close(None)).await?;
        Ok(())
    }
}
