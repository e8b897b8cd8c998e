//! WebSocket client for the matched-order event stream
//!
//! Handles connection and message reception for one market's events.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use crate::error::{OmeError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Event stream connection for a single market
pub struct MatchedOrdersClient {
    stream: Option<WsStream>,
    endpoint: String,
    market: String,
}

impl MatchedOrdersClient {
    pub fn new(endpoint: &str, market: &str) -> Self {
        Self {
            stream: None,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            market: market.to_string(),
        }
    }

    pub fn url(&self) -> String {
        format!("{}/events/{}/matched", self.endpoint, self.market)
    }

    pub async fn connect(&mut self) -> Result<()> {
        let url = self.url();
        info!(url = %url, "Connecting to matched-order stream");

        let (ws_stream, response) = connect_async(&url)
            .await
            .map_err(|e| OmeError::WebSocketConnection(format!("Failed to connect: {}", e)))?;

        info!(status = ?response.status(), "Matched-order stream connected");
        self.stream = Some(ws_stream);

        Ok(())
    }

    /// Receive the next text payload; control frames yield `None`
    pub async fn recv(&mut self) -> Result<Option<String>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| OmeError::WebSocketConnection("Not connected".to_string()))?;

        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                debug!(len = text.len(), "Received event");
                Ok(Some(text))
            }
            Some(Ok(Message::Binary(data))) => Ok(Some(String::from_utf8_lossy(&data).to_string())),
            Some(Ok(Message::Ping(data))) => {
                if let Some(stream) = self.stream.as_mut() {
                    let _ = stream.send(Message::Pong(data)).await;
                }
                Ok(None)
            }
            Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => Ok(None),
            Some(Ok(Message::Close(frame))) => {
                warn!(frame = ?frame, "Received close frame");
                self.stream = None;
                Err(OmeError::WebSocketConnection("Connection closed".to_string()))
            }
            Some(Err(e)) => {
                error!(error = %e, "WebSocket error");
                self.stream = None;
                Err(OmeError::WebSocketMessage(e.to_string()))
            }
            None => {
                warn!("Event stream ended");
                self.stream = None;
                Err(OmeError::WebSocketConnection("Stream ended".to_string()))
            }
        }
    }

    pub async fn ping(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.as_mut() {
            stream
                .send(Message::Ping(vec![]))
                .await
                .map_err(|e| OmeError::WebSocketMessage(e.to_string()))?;
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}
