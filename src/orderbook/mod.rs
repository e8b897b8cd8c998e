//! Order book module
//!
//! Normalizes fixed-point OME buckets into decimal price levels and derives
//! the best prices of each side.

mod book;
mod prices;

pub use book::{normalize_side, parse_orders};
pub use prices::BestPrices;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(alias = "bid", alias = "BID")]
    Bid,
    #[serde(alias = "ask", alias = "ASK")]
    Ask,
}

/// A single aggregated price level; quantity is always positive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Both aggregated sides of a market
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Orders {
    /// Asks in the order the OME listed them
    pub ask_orders: Vec<Level>,
    /// Bids sorted by price descending (highest first)
    pub bid_orders: Vec<Level>,
}

impl Orders {
    pub fn is_empty(&self) -> bool {
        self.ask_orders.is_empty() && self.bid_orders.is_empty()
    }

    /// Gap between the lowest ask and the highest bid
    pub fn spread(&self) -> Option<Decimal> {
        match (self.ask_orders.first(), self.bid_orders.first()) {
            (Some(ask), Some(bid)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Total resting quantity on one side
    pub fn depth(&self, side: Side) -> Decimal {
        let levels = match side {
            Side::Bid => &self.bid_orders,
            Side::Ask => &self.ask_orders,
        };
        levels.iter().map(|l| l.quantity).sum()
    }
}
