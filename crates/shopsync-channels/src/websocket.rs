//! WebSocket transport
//!
//! Each topic connects to `{hub_url}/{topic}` and exchanges JSON text frames.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{ClientFrame, ServerFrame, Topic};
use crate::transport::{Transport, TransportSession};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport backed by `tokio-tungstenite`
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    hub_url: Url,
    connect_timeout: Duration,
}

impl WebSocketTransport {
    /// Create a transport for `hub_url`; `http(s)` schemes are mapped to `ws(s)`
    ///
    /// # Errors
    /// Returns [`Error::InvalidUrl`] when the URL cannot be parsed or uses an
    /// unsupported scheme.
    pub fn new(hub_url: &str, connect_timeout: Duration) -> Result<Self> {
        let mut url = Url::parse(hub_url).map_err(|e| Error::InvalidUrl(format!("{hub_url}: {e}")))?;
        let scheme = match url.scheme() {
            "ws" | "http" => "ws",
            "wss" | "https" => "wss",
            other => return Err(Error::InvalidUrl(format!("unsupported scheme: {other}"))),
        };
        if url.scheme() != scheme {
            url.set_scheme(scheme)
                .map_err(|()| Error::InvalidUrl(hub_url.to_string()))?;
        }
        Ok(Self {
            hub_url: url,
            connect_timeout,
        })
    }

    /// Endpoint for `topic`
    #[must_use]
    pub fn endpoint(&self, topic: Topic) -> String {
        format!("{}/{}", self.hub_url.as_str().trim_end_matches('/'), topic)
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, topic: Topic) -> Result<Box<dyn TransportSession>> {
        let endpoint = self.endpoint(topic);
        debug!(topic = %topic, endpoint = %endpoint, "Opening WebSocket session");

        let (stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(endpoint.as_str()))
            .await
            .map_err(|_| Error::transport(format!("connect to {endpoint} timed out")))??;

        let (sink, stream) = stream.split();
        Ok(Box::new(WebSocketSession { sink, stream }))
    }

    fn name(&self) -> &str {
        "websocket"
    }
}

struct WebSocketSession {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl TransportSession for WebSocketSession {
    async fn send(&mut self, frame: &ClientFrame) -> Result<()> {
        let text = serde_json::to_string(frame)?;
        self.sink.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<ServerFrame>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };
            match message {
                Message::Text(text) => {
                    return Some(serde_json::from_str(&text).map_err(Error::from));
                }
                Message::Close(_) => return None,
                other => {
                    // Ping/pong are answered by tungstenite; binary is not part of the protocol.
                    trace!(kind = ?other, "Skipping non-text message");
                }
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}
