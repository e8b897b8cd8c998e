//! Margin and risk metrics
//!
//! `total_margin` is plain arithmetic. Minimum margin, buying power and
//! liquidation price are protocol formulas and come from a [`MarginMath`]
//! implementation supplied by the caller. Every operation is checked and
//! reports overflow as [`OmeError::MarginOverflow`].

mod format;
mod tracer;
mod transfer;

pub use format::{to_approx_currency, to_precision};
pub use tracer::TracerMargin;
pub use transfer::{check_transfer, TransferCheck, TransferKind};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{OmeError, Result};

/// Margin account balances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    /// Quote collateral
    pub quote: Decimal,
    /// Signed base exposure: long > 0, short < 0
    pub base: Decimal,
}

impl Balances {
    pub fn new(quote: Decimal, base: Decimal) -> Self {
        Self { quote, base }
    }
}

/// Unwrap a `checked_*` result, naming the operation on overflow
pub(crate) fn checked(value: Option<Decimal>, op: &str) -> Result<Decimal> {
    value.ok_or_else(|| OmeError::MarginOverflow(op.to_string()))
}

/// Quote collateral plus base exposure valued at `price`
pub fn total_margin(quote: Decimal, base: Decimal, price: Decimal) -> Result<Decimal> {
    let exposure = checked(base.checked_mul(price), "base * price")?;
    checked(quote.checked_add(exposure), "quote + base * price")
}

/// Protocol margin formulas
pub trait MarginMath: Send + Sync {
    /// Collateral required to stay clear of liquidation
    fn minimum_margin(
        &self,
        quote: Decimal,
        base: Decimal,
        price: Decimal,
        max_leverage: Decimal,
    ) -> Result<Decimal>;

    /// Notional the account can still open
    fn buying_power(
        &self,
        quote: Decimal,
        base: Decimal,
        price: Decimal,
        max_leverage: Decimal,
    ) -> Result<Decimal>;

    /// Price at which total margin meets minimum margin
    fn liquidation_price(
        &self,
        quote: Decimal,
        base: Decimal,
        price: Decimal,
        max_leverage: Decimal,
    ) -> Result<Decimal>;

    fn total_margin(&self, quote: Decimal, base: Decimal, price: Decimal) -> Result<Decimal> {
        total_margin(quote, base, price)
    }

    /// Share of total margin above the minimum, in percent. Zero when the
    /// account has no margin at all.
    fn available_margin_percent(
        &self,
        quote: Decimal,
        base: Decimal,
        price: Decimal,
        max_leverage: Decimal,
    ) -> Result<Decimal> {
        let total = self.total_margin(quote, base, price)?;
        if total.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let available = self.available_margin(quote, base, price, max_leverage)?;
        let share = checked(available.checked_div(total), "available / total")?;
        checked(share.checked_mul(Decimal::ONE_HUNDRED), "available share * 100")
    }

    /// Total margin minus minimum margin
    fn available_margin(
        &self,
        quote: Decimal,
        base: Decimal,
        price: Decimal,
        max_leverage: Decimal,
    ) -> Result<Decimal> {
        let total = self.total_margin(quote, base, price)?;
        let minimum = self.minimum_margin(quote, base, price, max_leverage)?;
        checked(total.checked_sub(minimum), "total - minimum")
    }
}

/// Every margin metric of one position at one price
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginSnapshot {
    pub total_margin: Decimal,
    pub minimum_margin: Decimal,
    pub buying_power: Decimal,
    pub available_margin_percent: Decimal,
    pub liquidation_price: Decimal,
}

impl MarginSnapshot {
    pub fn compute(
        balances: &Balances,
        price: Decimal,
        max_leverage: Decimal,
        math: &dyn MarginMath,
    ) -> Result<Self> {
        let Balances { quote, base } = *balances;
        Ok(Self {
            total_margin: math.total_margin(quote, base, price)?,
            minimum_margin: math.minimum_margin(quote, base, price, max_leverage)?,
            buying_power: math.buying_power(quote, base, price, max_leverage)?,
            available_margin_percent: math.available_margin_percent(
                quote,
                base,
                price,
                max_leverage,
            )?,
            liquidation_price: math.liquidation_price(quote, base, price, max_leverage)?,
        })
    }
}

/// An order being composed: signed exposure at a price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub exposure: Decimal,
    pub price: Decimal,
}

impl PendingOrder {
    pub fn is_empty(&self) -> bool {
        self.exposure.is_zero() || self.price.is_zero()
    }

    pub fn notional(&self) -> Result<Decimal> {
        checked(self.exposure.checked_mul(self.price), "exposure * price")
    }
}

/// Current position metrics next to the metrics after a pending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionPreview {
    pub previous: MarginSnapshot,
    pub next: Option<MarginSnapshot>,
}

impl PositionPreview {
    /// Account panel view at the oracle price.
    ///
    /// Without a non-empty pending order only the current metrics are
    /// reported. Otherwise the next buying power is the current buying power
    /// less the order notional, and the remaining metrics are evaluated on the
    /// next position.
    pub fn account(
        balances: &Balances,
        next_position: &Balances,
        order: Option<&PendingOrder>,
        oracle_price: Decimal,
        max_leverage: Decimal,
        math: &dyn MarginMath,
    ) -> Result<Self> {
        let previous = MarginSnapshot::compute(balances, oracle_price, max_leverage, math)?;

        let next = match order.filter(|o| !o.is_empty()) {
            Some(order) => {
                let mut next =
                    MarginSnapshot::compute(next_position, oracle_price, max_leverage, math)?;
                next.buying_power = checked(
                    previous.buying_power.checked_sub(order.notional()?),
                    "buying power - notional",
                )?;
                Some(next)
            }
            None => None,
        };

        Ok(Self { previous, next })
    }

    /// Liquidation price before and after a market order, both at the fair price
    pub fn market_liquidation(
        balances: &Balances,
        next_position: &Balances,
        fair_price: Decimal,
        max_leverage: Decimal,
        math: &dyn MarginMath,
    ) -> Result<(Decimal, Decimal)> {
        Ok((
            math.liquidation_price(balances.quote, balances.base, fair_price, max_leverage)?,
            math.liquidation_price(
                next_position.quote,
                next_position.base,
                fair_price,
                max_leverage,
            )?,
        ))
    }

    /// Liquidation price before (at the fair price) and after (at the limit
    /// price) a limit order
    pub fn limit_liquidation(
        balances: &Balances,
        next_position: &Balances,
        fair_price: Decimal,
        order_price: Decimal,
        max_leverage: Decimal,
        math: &dyn MarginMath,
    ) -> Result<(Decimal, Decimal)> {
        Ok((
            math.liquidation_price(balances.quote, balances.base, fair_price, max_leverage)?,
            math.liquidation_price(
                next_position.quote,
                next_position.base,
                order_price,
                max_leverage,
            )?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    /// Fixed reference values so sequencing can be checked independently
    /// of any protocol formula
    struct FixedMath {
        minimum: Decimal,
        buying_power: Decimal,
        liquidation: Decimal,
    }

    impl MarginMath for FixedMath {
        fn minimum_margin(
            &self,
            _: Decimal,
            _: Decimal,
            _: Decimal,
            _: Decimal,
        ) -> Result<Decimal> {
            Ok(self.minimum)
        }
        fn buying_power(
            &self,
            _: Decimal,
            _: Decimal,
            _: Decimal,
            _: Decimal,
        ) -> Result<Decimal> {
            Ok(self.buying_power)
        }
        fn liquidation_price(
            &self,
            _: Decimal,
            _: Decimal,
            _: Decimal,
            _: Decimal,
        ) -> Result<Decimal> {
            Ok(self.liquidation)
        }
    }

    fn fixed(minimum: Decimal) -> FixedMath {
        FixedMath {
            minimum,
            buying_power: dec!(9000),
            liquidation: dec!(42000),
        }
    }

    #[test]
    fn test_total_margin() {
        assert_eq!(total_margin(dec!(1000), dec!(0), dec!(50000)).unwrap(), dec!(1000));
        assert_eq!(total_margin(dec!(1000), dec!(0.5), dec!(50000)).unwrap(), dec!(26000));
        assert_eq!(total_margin(dec!(30000), dec!(-0.5), dec!(50000)).unwrap(), dec!(5000));
    }

    #[test]
    fn test_total_margin_overflow_is_an_error() {
        let err = total_margin(Decimal::ZERO, Decimal::MAX, dec!(2)).unwrap_err();
        assert!(matches!(err, OmeError::MarginOverflow(_)));
    }

    #[test]
    fn test_available_margin_zero_total() {
        let math = fixed(dec!(10));
        assert_eq!(
            math.available_margin_percent(dec!(0), dec!(0), dec!(50000), dec!(10))
                .unwrap(),
            Decimal::ZERO
        );
        // Negative quote exactly offset by exposure
        assert_eq!(
            math.available_margin_percent(dec!(-100), dec!(2), dec!(50), dec!(10))
                .unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_available_margin_when_minimum_equals_total() {
        let math = fixed(dec!(1000));
        assert_eq!(
            math.available_margin_percent(dec!(1000), dec!(0), dec!(50000), dec!(10))
                .unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_available_margin_percent() {
        let math = fixed(dec!(250));
        assert_eq!(
            math.available_margin_percent(dec!(1000), dec!(0), dec!(50000), dec!(10))
                .unwrap(),
            dec!(75)
        );
        assert_eq!(
            math.available_margin(dec!(1000), dec!(0), dec!(50000), dec!(10))
                .unwrap(),
            dec!(750)
        );
    }

    #[test]
    fn test_available_margin_percent_on_dust_total_overflows() {
        // Total of 1e-28 against a minimum of 0.1
        let math = TracerMargin::default();
        let err = math
            .available_margin_percent(
                dec!(-0.9999999999999999999999999999),
                dec!(1),
                dec!(1),
                dec!(10),
            )
            .unwrap_err();
        assert!(matches!(err, OmeError::MarginOverflow(_)));
    }

    #[test]
    fn test_snapshot_uses_injected_math() {
        let math = fixed(dec!(100));
        let balances = Balances::new(dec!(1000), dec!(0));
        let snapshot = MarginSnapshot::compute(&balances, dec!(50000), dec!(10), &math).unwrap();
        assert_eq!(snapshot.total_margin, dec!(1000));
        assert_eq!(snapshot.minimum_margin, dec!(100));
        assert_eq!(snapshot.buying_power, dec!(9000));
        assert_eq!(snapshot.available_margin_percent, dec!(90));
        assert_eq!(snapshot.liquidation_price, dec!(42000));
    }

    #[test]
    fn test_account_preview_without_order() {
        let math = fixed(dec!(100));
        let balances = Balances::new(dec!(1000), dec!(0));
        let empty = PendingOrder {
            exposure: dec!(0),
            price: dec!(50000),
        };

        let preview = PositionPreview::account(
            &balances,
            &balances,
            Some(&empty),
            dec!(50000),
            dec!(10),
            &math,
        )
        .unwrap();
        assert!(preview.next.is_none());

        let preview =
            PositionPreview::account(&balances, &balances, None, dec!(50000), dec!(10), &math)
                .unwrap();
        assert!(preview.next.is_none());
    }

    #[test]
    fn test_account_preview_with_order() {
        let math = TracerMargin::default();
        let balances = Balances::new(dec!(1000), dec!(0));
        let next_position = Balances::new(dec!(-4000), dec!(0.1));
        let order = PendingOrder {
            exposure: dec!(0.1),
            price: dec!(50000),
        };

        let preview = PositionPreview::account(
            &balances,
            &next_position,
            Some(&order),
            dec!(50000),
            dec!(10),
            &math,
        )
        .unwrap();
        assert_eq!(preview.previous.buying_power, dec!(10000));
        let next = preview.next.unwrap();
        assert_eq!(next.buying_power, dec!(5000));
        assert_eq!(next.total_margin, dec!(1000));
        // minimum margin is 5000 / 10 = 500
        assert_eq!(next.available_margin_percent, dec!(50));
    }

    #[test]
    fn test_limit_liquidation_uses_order_price() {
        let math = TracerMargin::default();
        let balances = Balances::new(dec!(1000), dec!(0));
        let next_position = Balances::new(dec!(-3500), dec!(0.1));

        let (before, after) = PositionPreview::limit_liquidation(
            &balances,
            &next_position,
            dec!(50000),
            dec!(45000),
            dec!(10),
            &math,
        )
        .unwrap();
        assert_eq!(before, Decimal::ZERO);
        // 3500 / (0.1 * 0.9)
        assert_eq!(after.round_dp(2), dec!(38888.89));

        let (_, market_after) = PositionPreview::market_liquidation(
            &balances,
            &next_position,
            dec!(50000),
            dec!(10),
            &math,
        )
        .unwrap();
        assert_eq!(market_after, after);
    }
}
