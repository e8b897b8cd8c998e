//! Matched-order listener
//!
//! Keeps the event stream connected and forwards matched-order events to the
//! store. A bad event is logged and skipped; a dropped connection is retried
//! with exponential backoff.

use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{error, info, trace, warn};

use super::MatchedOrdersClient;
use crate::error::{OmeError, Result};
use crate::parser::EventMessage;
use crate::store::OmeStore;

/// Maximum backoff delay in milliseconds (60 seconds)
const MAX_BACKOFF_MS: u64 = 60_000;
/// Cooldown period after which reconnect attempts are reset (5 minutes)
const RECONNECT_COOLDOWN_SECS: u64 = 300;

/// Feeds one market's matched-order events into the store
pub struct MatchedOrdersListener {
    store: OmeStore,
    client: MatchedOrdersClient,
    reconnect_delay_ms: u64,
    reconnect_attempts: u32,
    last_successful_connection: Option<Instant>,
}

impl MatchedOrdersListener {
    pub fn new(store: OmeStore, endpoint: &str, market: &str, reconnect_delay_ms: u64) -> Self {
        Self {
            store,
            client: MatchedOrdersClient::new(endpoint, market),
            reconnect_delay_ms,
            reconnect_attempts: 0,
            last_successful_connection: None,
        }
    }

    /// Run until the store is unmounted
    pub async fn run(&mut self) {
        info!(url = %self.client.url(), "Starting matched-order listener");

        while self.store.is_mounted() {
            if let Some(last_success) = self.last_successful_connection {
                if last_success.elapsed() > Duration::from_secs(RECONNECT_COOLDOWN_SECS)
                    && self.reconnect_attempts > 0
                {
                    info!(
                        previous_attempts = self.reconnect_attempts,
                        "Resetting reconnect counter after cooldown period"
                    );
                    self.reconnect_attempts = 0;
                }
            }

            match self.connect_and_process().await {
                Ok(()) => {
                    info!("Matched-order stream stopped");
                    sleep(Duration::from_secs(1)).await;
                }
                Err(e) => {
                    error!(error = %e, "Matched-order stream error");
                    self.reconnect_attempts += 1;
                    let delay = backoff_delay(self.reconnect_delay_ms, self.reconnect_attempts);
                    warn!(
                        attempt = self.reconnect_attempts,
                        delay_secs = delay.as_secs(),
                        "Reconnecting after error..."
                    );
                    sleep(delay).await;
                }
            }
        }

        info!("Store unmounted, matched-order listener exiting");
    }

    async fn connect_and_process(&mut self) -> Result<()> {
        self.client.connect().await?;
        self.last_successful_connection = Some(Instant::now());
        self.reconnect_attempts = 0;

        let recv_timeout = Duration::from_secs(45);

        while self.store.is_mounted() {
            match timeout(recv_timeout, self.client.recv()).await {
                Ok(Ok(Some(text))) => self.process_message(&text).await,
                Ok(Ok(None)) => continue,
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    warn!("No event within timeout, sending keepalive");
                    if let Err(e) = self.client.ping().await {
                        warn!(error = %e, "Failed to send keepalive ping, reconnecting");
                        return Err(OmeError::WebSocketConnection("keepalive failed".to_string()));
                    }
                }
            }
        }

        Ok(())
    }

    async fn process_message(&self, raw: &str) {
        match EventMessage::parse(raw) {
            Ok(EventMessage::MatchedOrders(event)) => {
                self.store.handle_matched_orders(&event).await;
            }
            Ok(EventMessage::Unknown(msg)) => trace!(msg = %msg, "Unknown event"),
            Err(e) => error!(error = %e, "Failed to handle matched-order event"),
        }
    }
}

/// Exponential backoff from `base_ms`, capped at [`MAX_BACKOFF_MS`]
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let delay = base_ms.saturating_mul(2u64.pow(attempt.min(6)));
    Duration::from_millis(delay.min(MAX_BACKOFF_MS))
}
