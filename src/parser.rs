//! Parser module for OME wire messages
//!
//! Handles deserialization of order book responses, user orders and
//! matched-order events. All on-chain amounts arrive as 18-decimal
//! fixed-point integers, either as JSON strings or JSON numbers.

use rust_decimal::Decimal;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{OmeError, Result};
use crate::orderbook::Side;

/// Number of decimals of on-chain fixed-point amounts
pub const FIXED_POINT_DECIMALS: u32 = 18;

/// Unsigned on-chain integer scaled by 10^18
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedPoint(pub u128);

impl FixedPoint {
    pub const ZERO: FixedPoint = FixedPoint(0);

    /// Convert to a decimal by dividing by 10^18.
    ///
    /// The result is approximate display data, never settlement data.
    pub fn to_decimal(self) -> Result<Decimal> {
        let raw = i128::try_from(self.0)
            .map_err(|_| OmeError::FixedPointOverflow(self.0.to_string()))?;
        Decimal::try_from_i128_with_scale(raw, FIXED_POINT_DECIMALS)
            .map(|d| d.normalize())
            .map_err(|_| OmeError::FixedPointOverflow(self.0.to_string()))
    }
}

impl From<u128> for FixedPoint {
    fn from(raw: u128) -> Self {
        FixedPoint(raw)
    }
}

impl<'de> Deserialize<'de> for FixedPoint {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FixedPointVisitor;

        impl<'de> Visitor<'de> for FixedPointVisitor {
            type Value = FixedPoint;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a non-negative integer or integer string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<FixedPoint, E> {
                Ok(FixedPoint(v as u128))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> std::result::Result<FixedPoint, E> {
                Ok(FixedPoint(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<FixedPoint, E> {
                u128::try_from(v)
                    .map(FixedPoint)
                    .map_err(|_| E::custom(format!("negative fixed-point value {v}")))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<FixedPoint, E> {
                // Large wei amounts lose integer precision once they pass through f64
                if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u128::MAX as f64 {
                    Ok(FixedPoint(v as u128))
                } else {
                    Err(E::custom(format!("invalid fixed-point value {v}")))
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<FixedPoint, E> {
                u128::from_str(v.trim())
                    .map(FixedPoint)
                    .map_err(|e| E::custom(format!("invalid fixed-point value {v:?}: {e}")))
            }
        }

        deserializer.deserialize_any(FixedPointVisitor)
    }
}

/// A resting OME order as it appears inside an order book bucket
#[derive(Debug, Clone, Deserialize)]
pub struct RawOrder {
    pub price: FixedPoint,

    #[serde(alias = "amountLeft")]
    pub amount_left: FixedPoint,
}

/// One price bucket of a book side
#[derive(Debug, Clone)]
pub struct PriceBucket {
    pub key: String,
    pub orders: Vec<RawOrder>,
}

/// A book side keyed by price bucket, in wire order
#[derive(Debug, Clone, Default)]
pub struct PriceBuckets(pub Vec<PriceBucket>);

impl PriceBuckets {
    pub fn iter(&self) -> impl Iterator<Item = &PriceBucket> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<PriceBucket> for PriceBuckets {
    fn from_iter<I: IntoIterator<Item = PriceBucket>>(iter: I) -> Self {
        PriceBuckets(iter.into_iter().collect())
    }
}

impl<'de> Deserialize<'de> for PriceBuckets {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct BucketsVisitor;

        impl<'de> Visitor<'de> for BucketsVisitor {
            type Value = PriceBuckets;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map or list of order buckets")
            }

            // Map entries are visited in document order, which is the order the
            // OME serialized its price levels in.
            fn visit_map<A>(self, mut map: A) -> std::result::Result<PriceBuckets, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut buckets = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, orders)) = map.next_entry::<String, Vec<RawOrder>>()? {
                    buckets.push(PriceBucket { key, orders });
                }
                Ok(PriceBuckets(buckets))
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<PriceBuckets, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut buckets = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(orders) = seq.next_element::<Vec<RawOrder>>()? {
                    buckets.push(PriceBucket {
                        key: buckets.len().to_string(),
                        orders,
                    });
                }
                Ok(PriceBuckets(buckets))
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<PriceBuckets, E> {
                Ok(PriceBuckets::default())
            }
        }

        deserializer.deserialize_any(BucketsVisitor)
    }
}

/// Order book response of `GET /book/{market}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OmeBook {
    #[serde(default)]
    pub asks: Option<PriceBuckets>,

    #[serde(default)]
    pub bids: Option<PriceBuckets>,

    /// Last trade price
    #[serde(default)]
    pub ltp: Option<FixedPoint>,
}

impl OmeBook {
    /// Parse a raw book body, accepting an optional `data` envelope.
    ///
    /// Decodes straight from the text so bucket order is preserved.
    pub fn parse(raw: &str) -> Result<Self> {
        match serde_json::from_str::<BookBody>(raw)? {
            BookBody::Wrapped { data } => Ok(data),
            BookBody::Bare(book) => Ok(book),
        }
    }

    /// Last trade price as a decimal, zero when the OME reports none
    pub fn last_trade_price(&self) -> Result<Decimal> {
        self.ltp.unwrap_or(FixedPoint::ZERO).to_decimal()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BookBody {
    Wrapped { data: OmeBook },
    Bare(OmeBook),
}

/// An OME order owned by the connected account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserOrder {
    pub id: String,

    #[serde(default, alias = "target_tracer")]
    pub market: String,

    #[serde(alias = "address", alias = "trader")]
    pub user: String,

    pub side: Side,

    #[serde(deserialize_with = "deserialize_fixed_point")]
    pub price: Decimal,

    #[serde(deserialize_with = "deserialize_fixed_point")]
    pub amount: Decimal,

    #[serde(alias = "amountLeft", deserialize_with = "deserialize_fixed_point")]
    pub amount_left: Decimal,
}

impl UserOrder {
    /// Parse a user-orders body: either a bare list or a `data` envelope
    pub fn parse_list(raw: &str) -> Result<Vec<UserOrder>> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let inner = match value {
            serde_json::Value::Object(mut obj) => obj
                .remove("data")
                .ok_or_else(|| OmeError::ParseError("user orders body has no data field".into()))?,
            other => other,
        };
        if inner.is_null() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_value(inner)?)
    }

    /// Amount already matched
    pub fn filled(&self) -> Decimal {
        self.amount - self.amount_left
    }
}

/// Matched-order notification: the two accounts on either side of a fill
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MatchedOrdersEvent {
    pub long: String,
    pub short: String,
}

impl MatchedOrdersEvent {
    /// True when `account` is the long or the short side, ignoring case
    pub fn involves(&self, account: &str) -> bool {
        self.long.eq_ignore_ascii_case(account) || self.short.eq_ignore_ascii_case(account)
    }
}

/// Parsed event-stream message
#[derive(Debug, Clone)]
pub enum EventMessage {
    MatchedOrders(MatchedOrdersEvent),
    Unknown(String),
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "returnValues")]
    return_values: MatchedOrdersEvent,
}

impl EventMessage {
    /// Parse a raw event message
    pub fn parse(raw: &str) -> std::result::Result<Self, serde_json::Error> {
        // Contract events wrap their arguments in `returnValues`
        if let Ok(envelope) = serde_json::from_str::<EventEnvelope>(raw) {
            return Ok(EventMessage::MatchedOrders(envelope.return_values));
        }

        if let Ok(event) = serde_json::from_str::<MatchedOrdersEvent>(raw) {
            return Ok(EventMessage::MatchedOrders(event));
        }

        // Still reject malformed JSON outright
        let _: serde_json::Value = serde_json::from_str(raw)?;
        Ok(EventMessage::Unknown(raw.to_string()))
    }
}

/// Custom deserializer for an 18-decimal fixed-point amount into a Decimal
pub(crate) fn deserialize_fixed_point<'de, D>(
    deserializer: D,
) -> std::result::Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = FixedPoint::deserialize(deserializer)?;
    raw.to_decimal().map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ONE: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn test_fixed_point_to_decimal() {
        assert_eq!(FixedPoint(ONE).to_decimal().unwrap(), dec!(1));
        assert_eq!(FixedPoint(ONE / 2).to_decimal().unwrap(), dec!(0.5));
        assert_eq!(FixedPoint(50_000 * ONE).to_decimal().unwrap(), dec!(50000));
        assert_eq!(FixedPoint(1).to_decimal().unwrap(), dec!(0.000000000000000001));
    }

    #[test]
    fn test_fixed_point_overflow() {
        let err = FixedPoint(u128::MAX).to_decimal().unwrap_err();
        assert!(matches!(err, OmeError::FixedPointOverflow(_)));
    }

    #[test]
    fn test_fixed_point_accepts_strings_and_numbers() {
        let from_str: FixedPoint = serde_json::from_str("\"2000000000000000000\"").unwrap();
        let from_num: FixedPoint = serde_json::from_str("2000000000000000000").unwrap();
        assert_eq!(from_str, FixedPoint(2 * ONE));
        assert_eq!(from_num, FixedPoint(2 * ONE));
        assert!(serde_json::from_str::<FixedPoint>("-5").is_err());
        assert!(serde_json::from_str::<FixedPoint>("\"abc\"").is_err());
    }

    #[test]
    fn test_parse_book_keeps_bucket_order() {
        let raw = r#"{
            "asks": {
                "52000000000000000000": [{"price": "52000000000000000000", "amount_left": "1000000000000000000"}],
                "51000000000000000000": [{"price": "51000000000000000000", "amount_left": "2000000000000000000"}]
            },
            "ltp": "51500000000000000000"
        }"#;

        let book = OmeBook::parse(raw).unwrap();
        let asks = book.asks.as_ref().unwrap();
        assert_eq!(asks.len(), 2);
        let keys: Vec<&str> = asks.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["52000000000000000000", "51000000000000000000"]);
        assert!(book.bids.is_none());
        assert_eq!(book.last_trade_price().unwrap(), dec!(51.5));
    }

    #[test]
    fn test_parse_book_data_envelope_and_missing_ltp() {
        let raw = r#"{"data": {"bids": {}, "asks": null}}"#;
        let book = OmeBook::parse(raw).unwrap();
        assert!(book.bids.as_ref().unwrap().is_empty());
        assert!(book.asks.is_none());
        assert_eq!(book.last_trade_price().unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_parse_user_orders() {
        let raw = r#"{"data": [{
            "id": "abc",
            "target_tracer": "0xmarket",
            "address": "0xUser",
            "side": "Bid",
            "price": "45000000000000000000000",
            "amount": "3000000000000000000",
            "amount_left": "1000000000000000000"
        }]}"#;

        let orders = UserOrder::parse_list(raw).unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, Side::Bid);
        assert_eq!(orders[0].price, dec!(45000));
        assert_eq!(orders[0].filled(), dec!(2));
        assert_eq!(orders[0].user, "0xUser");
    }

    #[test]
    fn test_parse_user_orders_null_data() {
        assert!(UserOrder::parse_list(r#"{"data": null}"#).unwrap().is_empty());
        assert!(UserOrder::parse_list("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_matched_event() {
        let raw =
            r#"{"event": "MatchedOrders", "returnValues": {"long": "0xAbC", "short": "0xdef"}}"#;
        match EventMessage::parse(raw).unwrap() {
            EventMessage::MatchedOrders(event) => {
                assert!(event.involves("0xabc"));
                assert!(event.involves("0xDEF"));
                assert!(!event.involves("0x123"));
            }
            other => panic!("Expected MatchedOrders, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_unknown_event() {
        let msg = EventMessage::parse(r#"{"jsonrpc": "2.0", "result": "0x1"}"#).unwrap();
        assert!(matches!(msg, EventMessage::Unknown(_)));
        assert!(EventMessage::parse("not json").is_err());
    }
}
