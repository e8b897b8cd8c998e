//! Order book aggregation
//!
//! Books are rebuilt wholesale from every OME response; there is no
//! incremental patching between polls.

use rust_decimal::Decimal;

use super::{Level, Orders};
use crate::error::Result;
use crate::parser::{OmeBook, PriceBuckets};

/// Collapse each price bucket into one level.
///
/// Quantity is the sum of the bucket's remaining amounts, price is the
/// bucket's order price. Empty buckets and buckets whose remaining amounts
/// sum to zero are dropped.
pub fn normalize_side(buckets: &PriceBuckets) -> Result<Vec<Level>> {
    let mut levels = Vec::with_capacity(buckets.len());

    for bucket in buckets.iter() {
        let mut price = None;
        let mut quantity = Decimal::ZERO;

        for order in &bucket.orders {
            // Every order of a bucket carries the same price
            price = Some(order.price.to_decimal()?);
            quantity += order.amount_left.to_decimal()?;
        }

        if let Some(price) = price {
            if !quantity.is_zero() {
                levels.push(Level { price, quantity });
            }
        }
    }

    Ok(levels)
}

/// Build both sides of the book from an OME response.
///
/// Asks keep their listed order, bids are sorted highest first. A missing
/// side is treated as empty.
pub fn parse_orders(book: &OmeBook) -> Result<Orders> {
    let empty = PriceBuckets::default();

    let ask_orders = normalize_side(book.asks.as_ref().unwrap_or(&empty))?;
    let mut bid_orders = normalize_side(book.bids.as_ref().unwrap_or(&empty))?;
    sort_desc(&mut bid_orders);

    Ok(Orders {
        ask_orders,
        bid_orders,
    })
}

/// Stable: equal prices keep their listed order
fn sort_desc(levels: &mut [Level]) {
    levels.sort_by(|a, b| b.price.cmp(&a.price));
}
