//! Publisher module for IPC communication
//!
//! Publishes store snapshots to out-of-process views over a Unix socket as
//! length-prefixed MessagePack frames.

use serde::Serialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{OmeError, Result};
use crate::store::OmeState;

/// Snapshot frame sent to views
#[derive(Debug, Serialize)]
pub struct StateFrame<'a> {
    pub market: &'a str,
    pub state: &'a OmeState,
}

/// Publisher for sending store snapshots via Unix socket
pub struct Publisher {
    socket_path: String,
    stream: Mutex<Option<UnixStream>>,
}

impl Publisher {
    /// Create a new publisher
    pub async fn new(socket_path: &str) -> Result<Self> {
        let publisher = Self {
            socket_path: socket_path.to_string(),
            stream: Mutex::new(None),
        };

        // Views may not be listening yet
        if let Err(e) = publisher.connect().await {
            warn!(error = %e, "Initial IPC connection failed, will retry on publish");
        }

        Ok(publisher)
    }

    async fn connect(&self) -> Result<()> {
        let path = Path::new(&self.socket_path);

        if !path.exists() {
            return Err(OmeError::IpcError(format!(
                "Socket path does not exist: {}",
                self.socket_path
            )));
        }

        let stream = UnixStream::connect(path).await.map_err(|e| {
            OmeError::IpcError(format!("Failed to connect to {}: {}", self.socket_path, e))
        })?;

        let mut guard = self.stream.lock().await;
        *guard = Some(stream);

        info!(path = %self.socket_path, "Connected to IPC socket");
        Ok(())
    }

    /// Encode one frame: big-endian u32 length, then the MessagePack body
    pub fn encode(market: &str, state: &OmeState) -> Result<Vec<u8>> {
        let data = rmp_serde::to_vec_named(&StateFrame { market, state })
            .map_err(|e| OmeError::SerializationError(format!("Failed to serialize: {}", e)))?;

        let len = (data.len() as u32).to_be_bytes();
        let mut message = Vec::with_capacity(4 + data.len());
        message.extend_from_slice(&len);
        message.extend_from_slice(&data);
        Ok(message)
    }

    /// Publish a store snapshot. Socket trouble is logged, never returned.
    pub async fn publish(&self, market: &str, state: &OmeState) -> Result<()> {
        let message = Self::encode(market, state)?;

        let mut guard = self.stream.lock().await;

        if guard.is_none() {
            drop(guard);
            if let Err(e) = self.connect().await {
                debug!(error = %e, "Failed to reconnect to IPC socket");
                return Ok(());
            }
            guard = self.stream.lock().await;
        }

        if let Some(stream) = guard.as_mut() {
            match stream.write_all(&message).await {
                Ok(_) => {
                    debug!(
                        market = %market,
                        ltp = %state.last_trade_price,
                        bytes = message.len(),
                        "Published store snapshot"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Failed to write to IPC socket");
                    *guard = None;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tokio::io::AsyncReadExt;
    use tokio::net::UnixListener;

    #[test]
    fn test_encode_length_prefix() {
        let mut state = OmeState::default();
        state.last_trade_price = dec!(101.5);

        let frame = Publisher::encode("0xmarket", &state).unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - 4);

        let decoded: serde_json::Value = rmp_serde::from_slice(&frame[4..]).unwrap();
        assert_eq!(decoded["market"], "0xmarket");
        assert_eq!(decoded["state"]["last_trade_price"], "101.5");
        assert_eq!(decoded["state"]["market_up"], false);
    }

    #[tokio::test]
    async fn test_publish_without_listener_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sock");
        let publisher = Publisher::new(path.to_str().unwrap()).await.unwrap();
        assert!(publisher.publish("0xmarket", &OmeState::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_publish_writes_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ome.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let publisher = Publisher::new(path.to_str().unwrap()).await.unwrap();
        let (mut conn, _) = listener.accept().await.unwrap();

        let state = OmeState::default();
        publisher.publish("0xmarket", &state).await.unwrap();

        let expected = Publisher::encode("0xmarket", &state).unwrap();
        let mut received = vec![0u8; expected.len()];
        conn.read_exact(&mut received).await.unwrap();
        assert_eq!(received, expected);
    }
}
