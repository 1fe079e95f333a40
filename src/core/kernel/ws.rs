use crate::core::errors::ExchangeError;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream};
use tracing::{instrument, warn};

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
        }
    }
}

/// WebSocket session trait - pure transport layer
#[async_trait]
pub trait WsSession: Send {
    /// Connect to the WebSocket
    async fn connect(&mut self) -> Result<(), ExchangeError>;

    /// Send a raw message
    async fn send_raw(&mut self, msg: Message) -> Result<(), ExchangeError>;

    /// Receive the next data or close frame
    ///
    /// Must be cancel safe: the feed relay races it against cancellation.
    async fn next_raw(&mut self) -> Option<Result<Message, ExchangeError>>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), ExchangeError>;

    /// Check if the connection is alive
    fn is_connected(&self) -> bool;
}

/// Tungstenite-based WebSocket session
pub struct TungsteniteWs {
    url: String,
    write: Option<SplitSink<Stream, Message>>,
    read: Option<SplitStream<Stream>>,
    connected: bool,
    config: WsConfig,
}

impl TungsteniteWs {
    pub fn new(url: String) -> Self {
        Self {
            url,
            write: None,
            read: None,
            connected: false,
            config: WsConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for TungsteniteWs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TungsteniteWs")
            .field("url", &self.url)
            .field("connected", &self.connected)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl WsSession for TungsteniteWs {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn connect(&mut self) -> Result<(), ExchangeError> {
        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);

        let (ws_stream, _) = tokio::time::timeout(connect_timeout, connect_async(&self.url))
            .await
            .map_err(|_| ExchangeError::NetworkError("WebSocket connection timeout".to_string()))?
            .map_err(|e| ExchangeError::NetworkError(format!("WebSocket connection failed: {}", e)))?;

        let (write, read) = ws_stream.split();
        self.write = Some(write);
        self.read = Some(read);
        self.connected = true;

        Ok(())
    }

    async fn send_raw(&mut self, msg: Message) -> Result<(), ExchangeError> {
        if !self.connected {
            return Err(ExchangeError::NetworkError(
                "WebSocket not connected".to_string(),
            ));
        }

        let write = self.write.as_mut().ok_or_else(|| {
            ExchangeError::NetworkError("WebSocket write stream not available".to_string())
        })?;

        write.send(msg).await.map_err(|e| {
            self.connected = false;
            ExchangeError::NetworkError(format!("Failed to send WebSocket message: {}", e))
        })
    }

    async fn next_raw(&mut self) -> Option<Result<Message, ExchangeError>> {
        loop {
            if !self.connected {
                return None;
            }

            let read = self.read.as_mut()?;

            match read.next().await {
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = self.send_raw(Message::Pong(data)).await {
                        warn!("Failed to send pong response: {}", e);
                    }
                }
                Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(message @ Message::Close(_))) => {
                    self.connected = false;
                    return Some(Ok(message));
                }
                Some(Ok(message)) => return Some(Ok(message)),
                Some(Err(e)) => {
                    self.connected = false;
                    return Some(Err(ExchangeError::NetworkError(format!(
                        "WebSocket error: {}",
                        e
                    ))));
                }
                None => {
                    self.connected = false;
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), ExchangeError> {
        if let Some(write) = self.write.as_mut() {
            if self.connected {
                let _ = write.send(Message::Close(None)).await;
            }
        }
        self.connected = false;
        self.write = None;
        self.read = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let mut ws = TungsteniteWs::new("wss://example.invalid".to_string());
        assert!(!ws.is_connected());

        let err = ws.send_raw(Message::Text("{}".into())).await.unwrap_err();
        assert!(matches!(err, ExchangeError::NetworkError(_)));
        assert!(ws.next_raw().await.is_none());
        assert!(ws.close().await.is_ok());
    }
}
