//! Deposit and withdrawal validation

use rust_decimal::Decimal;
use serde::Serialize;

use super::{checked, Balances, MarginMath};
use crate::error::Result;

/// Direction of a margin transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Deposit from a wallet holding `wallet_balance` quote tokens
    Deposit { wallet_balance: Decimal },
    Withdraw,
}

/// Outcome of validating a transfer amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferCheck {
    NoError,
    InsufficientFunds,
    DepositMore,
    WithdrawInvalid,
}

impl TransferCheck {
    pub fn is_ok(&self) -> bool {
        matches!(self, TransferCheck::NoError)
    }
}

/// Validate moving `amount` quote into or out of the margin account.
///
/// Checks run in order: the amount must be covered (wallet balance for a
/// deposit, available margin for a withdrawal); a deposit must cover the
/// current minimum margin and top the account up to `minimum_deposit`; the
/// resulting account must stay at or above its minimum margin.
pub fn check_transfer(
    kind: TransferKind,
    amount: Decimal,
    balances: &Balances,
    price: Decimal,
    max_leverage: Decimal,
    minimum_deposit: Decimal,
    math: &dyn MarginMath,
) -> Result<TransferCheck> {
    let Balances { quote, base } = *balances;
    let total = math.total_margin(quote, base, price)?;
    let minimum = math.minimum_margin(quote, base, price, max_leverage)?;

    let (available, new_quote) = match kind {
        TransferKind::Deposit { wallet_balance } => (
            wallet_balance,
            checked(quote.checked_add(amount), "quote + deposit")?,
        ),
        TransferKind::Withdraw => (
            checked(total.checked_sub(minimum), "total - minimum")?,
            checked(quote.checked_sub(amount), "quote - withdrawal")?,
        ),
    };

    if amount > available {
        return Ok(TransferCheck::InsufficientFunds);
    }

    if let TransferKind::Deposit { .. } = kind {
        let shortfall = checked(
            minimum_deposit.checked_sub(total),
            "minimum deposit - total",
        )?;
        if amount < minimum || amount < shortfall {
            return Ok(TransferCheck::DepositMore);
        }
    }

    let new_total = math.total_margin(new_quote, base, price)?;
    let new_minimum = math.minimum_margin(new_quote, base, price, max_leverage)?;
    if new_total < new_minimum {
        return Ok(TransferCheck::WithdrawInvalid);
    }

    Ok(TransferCheck::NoError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::margin::TracerMargin;
    use rust_decimal_macros::dec;

    fn deposit(wallet_balance: Decimal) -> TransferKind {
        TransferKind::Deposit { wallet_balance }
    }

    fn check(kind: TransferKind, amount: Decimal, balances: &Balances) -> TransferCheck {
        check_transfer(
            kind,
            amount,
            balances,
            dec!(50000),
            dec!(10),
            dec!(150),
            &TracerMargin::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_deposit_exceeding_wallet() {
        let result = check(deposit(dec!(100)), dec!(200), &Balances::default());
        assert_eq!(result, TransferCheck::InsufficientFunds);
    }

    #[test]
    fn test_first_deposit_must_reach_minimum() {
        let empty = Balances::default();

        let small = check(deposit(dec!(1000)), dec!(100), &empty);
        assert_eq!(small, TransferCheck::DepositMore);

        let enough = check(deposit(dec!(1000)), dec!(150), &empty);
        assert!(enough.is_ok());
    }

    #[test]
    fn test_funded_account_can_top_up_small_amounts() {
        let balances = Balances::new(dec!(1000), dec!(0));
        let result = check(deposit(dec!(1000)), dec!(10), &balances);
        assert_eq!(result, TransferCheck::NoError);
    }

    #[test]
    fn test_withdraw_limited_to_available_margin() {
        // total 1000, minimum 500
        let balances = Balances::new(dec!(-4000), dec!(0.1));

        let too_much = check(TransferKind::Withdraw, dec!(600), &balances);
        assert_eq!(too_much, TransferCheck::InsufficientFunds);

        let fine = check(TransferKind::Withdraw, dec!(500), &balances);
        assert_eq!(fine, TransferCheck::NoError);
    }

    #[test]
    fn test_withdraw_breaching_minimum_with_gas_cost() {
        // Minimum jumps once quote drops below 500
        struct StepMath;
        impl MarginMath for StepMath {
            fn minimum_margin(
                &self,
                quote: Decimal,
                _: Decimal,
                _: Decimal,
                _: Decimal,
            ) -> Result<Decimal> {
                if quote < dec!(500) {
                    Ok(dec!(600))
                } else {
                    Ok(Decimal::ZERO)
                }
            }
            fn buying_power(
                &self,
                _: Decimal,
                _: Decimal,
                _: Decimal,
                _: Decimal,
            ) -> Result<Decimal> {
                Ok(Decimal::ZERO)
            }
            fn liquidation_price(
                &self,
                _: Decimal,
                _: Decimal,
                _: Decimal,
                _: Decimal,
            ) -> Result<Decimal> {
                Ok(Decimal::ZERO)
            }
        }

        let balances = Balances::new(dec!(1000), dec!(0));
        let result = check_transfer(
            TransferKind::Withdraw,
            dec!(600),
            &balances,
            dec!(1),
            dec!(10),
            dec!(150),
            &StepMath,
        )
        .unwrap();
        assert_eq!(result, TransferCheck::WithdrawInvalid);
    }

    #[test]
    fn test_overflowing_deposit_is_an_error() {
        let balances = Balances::new(Decimal::MAX, dec!(0));
        let result = check_transfer(
            deposit(Decimal::MAX),
            dec!(1),
            &balances,
            dec!(50000),
            dec!(10),
            dec!(150),
            &TracerMargin::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_serializes_like_status_codes() {
        let json = serde_json::to_string(&TransferCheck::WithdrawInvalid).unwrap();
        assert_eq!(json, "\"WITHDRAW_INVALID\"");
    }
}
