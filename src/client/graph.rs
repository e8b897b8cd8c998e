//! Trade indexer (GraphQL) client for filled orders

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::time::Duration;

use super::FilledOrdersSource;
use crate::error::{OmeError, Result};
use crate::parser::deserialize_fixed_point;

const FILLED_ORDERS_QUERY: &str = r#"
query FilledOrders($account: String!, $market: String!) {
  trades(where: { trader: $account, tracer: $market }, orderBy: timestamp, orderDirection: desc) {
    id
    position
    amount
    price
    timestamp
  }
}
"#;

/// Direction of a fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Position {
    Long,
    Short,
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // The indexer stores `true` for long fills
        let raw = serde_json::Value::deserialize(deserializer)?;
        match raw {
            serde_json::Value::Bool(true) => Ok(Position::Long),
            serde_json::Value::Bool(false) => Ok(Position::Short),
            serde_json::Value::String(s) if s.eq_ignore_ascii_case("long") => Ok(Position::Long),
            serde_json::Value::String(s) if s.eq_ignore_ascii_case("short") => Ok(Position::Short),
            other => Err(de::Error::custom(format!("invalid position {other}"))),
        }
    }
}

/// A matched trade of the connected account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilledOrder {
    pub id: String,
    pub position: Position,

    #[serde(deserialize_with = "deserialize_fixed_point")]
    pub amount: Decimal,

    #[serde(deserialize_with = "deserialize_fixed_point")]
    pub price: Decimal,

    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<TradesData>,
    #[serde(default)]
    errors: Vec<GraphErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct TradesData {
    trades: Vec<FilledOrder>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorMessage {
    message: String,
}

impl GraphResponse {
    fn into_trades(self) -> Result<Vec<FilledOrder>> {
        if let Some(first) = self.errors.first() {
            return Err(OmeError::GraphError(first.message.clone()));
        }
        Ok(self.data.map(|d| d.trades).unwrap_or_default())
    }
}

/// Indexer-backed filled order source
#[derive(Debug, Clone)]
pub struct GraphFilledOrders {
    http: reqwest::Client,
    endpoint: String,
}

impl GraphFilledOrders {
    /// Every query is abandoned after `timeout`
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OmeError::GraphError(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl FilledOrdersSource for GraphFilledOrders {
    async fn filled_orders(&self, market: &str, account: &str) -> Result<Vec<FilledOrder>> {
        // The indexer keys entities by lowercase address
        let body = json!({
            "query": FILLED_ORDERS_QUERY,
            "variables": {
                "account": account.to_lowercase(),
                "market": market.to_lowercase(),
            }
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| OmeError::GraphError(e.to_string()))?
            .error_for_status()
            .map_err(|e| OmeError::GraphError(e.to_string()))?
            .json::<GraphResponse>()
            .await
            .map_err(|e| OmeError::GraphError(e.to_string()))?;

        response.into_trades()
    }
}

/// Unix seconds, as a number or a numeric string
fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    let secs = match &raw {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| de::Error::custom(format!("invalid timestamp {raw}")))?;

    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| de::Error::custom(format!("timestamp out of range {secs}")))
}
