//! Reference perpetual-swap margin formulas

use rust_decimal::Decimal;

use super::{checked, MarginMath};
use crate::error::Result;

/// Leverage-capped isolated margin.
///
/// Minimum margin is the position notional over the leverage cap plus a
/// flat liquidation gas cost for any open position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TracerMargin {
    pub liquidation_gas_cost: Decimal,
}

impl TracerMargin {
    pub fn new(liquidation_gas_cost: Decimal) -> Self {
        Self {
            liquidation_gas_cost,
        }
    }

    /// Absolute base exposure valued at `price`
    pub fn notional(base: Decimal, price: Decimal) -> Result<Decimal> {
        checked(base.abs().checked_mul(price), "|base| * price")
    }
}

/// A non-positive cap means no leverage
fn leverage_or_one(max_leverage: Decimal) -> Decimal {
    if max_leverage > Decimal::ZERO {
        max_leverage
    } else {
        Decimal::ONE
    }
}

impl MarginMath for TracerMargin {
    fn minimum_margin(
        &self,
        _quote: Decimal,
        base: Decimal,
        price: Decimal,
        max_leverage: Decimal,
    ) -> Result<Decimal> {
        let notional = Self::notional(base, price)?;
        if notional.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let margin = checked(
            notional.checked_div(leverage_or_one(max_leverage)),
            "notional / leverage",
        )?;
        checked(
            margin.checked_add(self.liquidation_gas_cost),
            "margin + gas cost",
        )
    }

    fn buying_power(
        &self,
        quote: Decimal,
        base: Decimal,
        price: Decimal,
        max_leverage: Decimal,
    ) -> Result<Decimal> {
        let total = self.total_margin(quote, base, price)?;
        let capacity = checked(
            leverage_or_one(max_leverage).checked_mul(total),
            "leverage * total margin",
        )?;
        let remaining = checked(
            capacity.checked_sub(Self::notional(base, price)?),
            "capacity - notional",
        )?;
        Ok(remaining.max(Decimal::ZERO))
    }

    fn liquidation_price(
        &self,
        quote: Decimal,
        base: Decimal,
        _price: Decimal,
        max_leverage: Decimal,
    ) -> Result<Decimal> {
        if base.is_zero() {
            return Ok(Decimal::ZERO);
        }
        // quote + base * p == |base| * p / L + gas, solved for p
        let scaled = checked(
            base.abs().checked_div(leverage_or_one(max_leverage)),
            "|base| / leverage",
        )?;
        let denominator = checked(base.checked_sub(scaled), "base - |base| / leverage")?;
        if denominator.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let numerator = checked(
            self.liquidation_gas_cost.checked_sub(quote),
            "gas cost - quote",
        )?;
        let price = checked(numerator.checked_div(denominator), "liquidation price")?;
        Ok(price.max(Decimal::ZERO))
    }
}
