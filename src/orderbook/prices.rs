//! Best/worst prices of each book side

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Orders;

/// Extreme prices per side, zero when a side is empty
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestPrices {
    pub min_bid: Decimal,
    pub max_bid: Decimal,
    pub min_ask: Decimal,
    pub max_ask: Decimal,
}

impl BestPrices {
    /// Read extremes off the already-sorted sides.
    ///
    /// Bids are descending, so the lowest bid is the last one.
    pub fn from_orders(orders: &Orders) -> Self {
        let price_or_zero =
            |level: Option<&super::Level>| level.map(|l| l.price).unwrap_or_default();

        Self {
            min_ask: price_or_zero(orders.ask_orders.first()),
            max_ask: price_or_zero(orders.ask_orders.last()),
            min_bid: price_or_zero(orders.bid_orders.last()),
            max_bid: price_or_zero(orders.bid_orders.first()),
        }
    }

    /// Best bid/ask midpoint when both sides are quoted
    pub fn mid_price(&self) -> Option<Decimal> {
        if self.max_bid > Decimal::ZERO && self.min_ask > Decimal::ZERO {
            Some((self.max_bid + self.min_ask) / Decimal::from(2))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::Level;
    use rust_decimal_macros::dec;

    fn level(price: Decimal) -> Level {
        Level { price, quantity: dec!(1) }
    }

    #[test]
    fn test_empty_book_is_all_zero() {
        let prices = BestPrices::from_orders(&Orders::default());
        assert_eq!(prices, BestPrices::default());
        assert_eq!(prices.min_bid, Decimal::ZERO);
        assert_eq!(prices.max_ask, Decimal::ZERO);
        assert_eq!(prices.mid_price(), None);
    }

    #[test]
    fn test_extremes() {
        let orders = Orders {
            ask_orders: vec![level(dec!(101)), level(dec!(102)), level(dec!(110))],
            bid_orders: vec![level(dec!(100)), level(dec!(95)), level(dec!(90))],
        };
        let prices = BestPrices::from_orders(&orders);
        assert_eq!(prices.min_ask, dec!(101));
        assert_eq!(prices.max_ask, dec!(110));
        assert_eq!(prices.min_bid, dec!(90));
        assert_eq!(prices.max_bid, dec!(100));
        assert_eq!(prices.mid_price(), Some(dec!(100.5)));
    }

    #[test]
    fn test_one_sided_book() {
        let orders = Orders {
            ask_orders: vec![],
            bid_orders: vec![level(dec!(42))],
        };
        let prices = BestPrices::from_orders(&orders);
        assert_eq!(prices.min_bid, dec!(42));
        assert_eq!(prices.max_bid, dec!(42));
        assert_eq!(prices.min_ask, Decimal::ZERO);
        assert_eq!(prices.max_ask, Decimal::ZERO);
    }
}
