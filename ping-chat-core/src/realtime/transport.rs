//! Transport abstraction for the realtime channel
//!
//! The channel only needs to exchange [`Envelope`]s with the chat service.
//! [`WebSocketTransport`] does that over `tokio-tungstenite`; tests plug in
//! in-memory transports through the same traits.

use super::Envelope;
use crate::{ChatError, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::fmt::{self, Debug};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

/// A connected, bidirectional event stream
#[async_trait]
pub trait Transport: Send + Debug {
    /// Send one event
    async fn send_event(&mut self, envelope: &Envelope) -> Result<()>;

    /// Receive the next event
    ///
    /// Returns `Ok(None)` once the remote side has closed the connection.
    /// Must be cancel-safe: the channel races it against outgoing commands.
    async fn receive_event(&mut self) -> Result<Option<Envelope>>;

    /// Close the connection gracefully
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Factory for realtime connections
#[async_trait]
pub trait TransportFactory: Send + Sync + Debug {
    /// Open a connection to `url`
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>>;
}

/// Build the connection URL, carrying the user id as `userId` query parameter
///
/// ```
/// use ping_chat_core::realtime::connection_url;
///
/// let url = connection_url("ws://localhost:5002", "65f0c1").unwrap();
/// assert_eq!(url, "ws://localhost:5002/?userId=65f0c1");
/// ```
pub fn connection_url(base: &str, user_id: &str) -> Result<String> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| ChatError::configuration(format!("invalid realtime URL {}: {}", base, e)))?;
    url.query_pairs_mut().append_pair("userId", user_id);
    Ok(url.into())
}

/// WebSocket transport carrying one JSON envelope per text frame
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    url: String,
}

impl Debug for WebSocketTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("url", &self.url)
            .finish()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send_event(&mut self, envelope: &Envelope) -> Result<()> {
        let text = envelope.to_text()?;
        trace!("-> {}", text);
        self.stream
            .send(WsMessage::text(text))
            .await
            .map_err(ChatError::from)
    }

    async fn receive_event(&mut self) -> Result<Option<Envelope>> {
        loop {
            let Some(frame) = self.stream.next().await else {
                return Ok(None);
            };

            match frame {
                Ok(WsMessage::Text(text)) => {
                    trace!("<- {}", text.as_str());
                    return Envelope::from_text(text.as_str()).map(Some);
                }
                Ok(WsMessage::Close(frame)) => {
                    debug!("Server closed realtime connection: {:?}", frame);
                    return Ok(None);
                }
                // Pings are answered by tungstenite itself
                Ok(_) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(e) => match ChatError::from(e) {
                ChatError::ChannelClosed => Ok(()),
                other => Err(other),
            },
        }
    }
}

/// Opens [`WebSocketTransport`]s
#[derive(Debug, Clone)]
pub struct WebSocketTransportFactory {
    connect_timeout: Duration,
}

impl WebSocketTransportFactory {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl TransportFactory for WebSocketTransportFactory {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>> {
        debug!("Connecting realtime channel to {}", url);

        let (stream, _response) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                ChatError::Timeout(format!(
                    "realtime connect did not complete within {:?}",
                    self.connect_timeout
                ))
            })??;

        Ok(Box::new(WebSocketTransport {
            stream,
            url: url.to_string(),
        }))
    }
}
