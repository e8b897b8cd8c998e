//! Configuration module for the OME book daemon

use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::OmeError;

/// Default order book polling period
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Default HTTP request timeout
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address of the perpetual swap market to follow
    pub market_address: Option<String>,

    /// Connected account, if any
    pub account: Option<String>,

    /// OME REST endpoint
    pub ome_endpoint: String,

    /// Indexer GraphQL endpoint for filled orders
    pub graph_endpoint: String,

    /// WebSocket endpoint delivering matched-order events
    pub events_endpoint: String,

    /// IPC socket path for publishing store snapshots
    pub ipc_socket_path: String,

    /// Order book refetch period
    pub poll_interval_ms: u64,

    /// Upper bound on any single OME or indexer request
    pub request_timeout_ms: u64,

    /// Port of the health/state HTTP server
    pub http_port: u16,

    /// Reconnection settings for the event stream
    pub reconnect_delay_ms: u64,

    /// Market leverage cap used when the market does not report one
    pub max_leverage: Decimal,

    /// Gas cost (in quote) added to the minimum margin of an open position
    pub liquidation_gas_cost: Decimal,

    /// Smallest total margin a deposit must bring the account to
    pub minimum_deposit: Decimal,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Ok(Self {
            market_address: optional_var("MARKET_ADDRESS"),
            account: optional_var("ACCOUNT"),
            ome_endpoint: env::var("OME_ENDPOINT").unwrap_or(defaults.ome_endpoint),
            graph_endpoint: env::var("GRAPH_ENDPOINT").unwrap_or(defaults.graph_endpoint),
            events_endpoint: env::var("EVENTS_ENDPOINT").unwrap_or(defaults.events_endpoint),
            ipc_socket_path: env::var("IPC_SOCKET_PATH").unwrap_or(defaults.ipc_socket_path),
            poll_interval_ms: millis_var("POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?,
            request_timeout_ms: millis_var("REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?,
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "9090".to_string())
                .parse()
                .unwrap_or(9090),
            reconnect_delay_ms: env::var("RECONNECT_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            max_leverage: decimal_var("MAX_LEVERAGE", defaults.max_leverage)?,
            liquidation_gas_cost: decimal_var(
                "LIQUIDATION_GAS_COST",
                defaults.liquidation_gas_cost,
            )?,
            minimum_deposit: decimal_var("MINIMUM_DEPOSIT", defaults.minimum_deposit)?,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            market_address: None,
            account: None,
            ome_endpoint: "http://localhost:8989".to_string(),
            graph_endpoint: "http://localhost:8000/subgraphs/name/tracer-protocol/tracer"
                .to_string(),
            events_endpoint: "ws://localhost:8546".to_string(),
            ipc_socket_path: "/tmp/ome-book.sock".to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            http_port: 9090,
            reconnect_delay_ms: 1000,
            max_leverage: Decimal::ONE,
            liquidation_gas_cost: Decimal::ZERO,
            minimum_deposit: Decimal::from(150),
        }
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A positive millisecond count. Zero is rejected.
fn millis_var(key: &str, default: u64) -> Result<u64, OmeError> {
    let Ok(raw) = env::var(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(OmeError::ConfigError(format!("{key} must be positive"))),
        Ok(ms) => Ok(ms),
        Err(e) => Err(OmeError::ConfigError(format!("{key}={raw}: {e}"))),
    }
}

fn decimal_var(key: &str, default: Decimal) -> Result<Decimal, OmeError> {
    match env::var(key) {
        Ok(raw) => Decimal::from_str(raw.trim())
            .map_err(|e| OmeError::ConfigError(format!("{key}={raw}: {e}"))),
        Err(_) => Ok(default),
    }
}
