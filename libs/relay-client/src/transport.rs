//! Socket abstraction so the driver can run against a mock.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::TransportError;

/// What an open transport produced.
#[derive(Debug)]
pub enum TransportEvent {
    Text(String),
    /// The peer closed. `clean` is true only for a normal close.
    Closed { clean: bool },
    Failed(TransportError),
}

/// Opens transports. Called once per (re)connect attempt.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    async fn connect(&self) -> Result<Self::Transport, TransportError>;
}

/// One open connection.
#[async_trait]
pub trait Transport: Send + 'static {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Next inbound event. After `Closed` or `Failed` the transport is discarded.
    async fn recv(&mut self) -> TransportEvent;

    async fn close(&mut self);
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self) -> Result<WsTransport, TransportError> {
        let (stream, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        Ok(WsTransport { stream })
    }
}

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream.send(Message::text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> TransportEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Text(text.to_string()),
                Some(Ok(Message::Close(frame))) => {
                    let clean = frame.is_some_and(|f| f.code == CloseCode::Normal);
                    return TransportEvent::Closed { clean };
                }
                // Ping/pong are answered by tungstenite; binary frames are not part of the protocol.
                Some(Ok(_)) => continue,
                Some(Err(err)) => return TransportEvent::Failed(err.into()),
                None => return TransportEvent::Closed { clean: false },
            }
        }
    }

    async fn close(&mut self) {
        if let Err(err) = self.stream.close(None).await {
            tracing::debug!(error = %err, "websocket close failed");
        }
    }
}
