//! Trading store state and reducer

use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

use crate::error::OmeError;
use crate::orderbook::{BestPrices, Orders};
use crate::parser::UserOrder;

/// Everything consumers render from
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OmeState {
    pub user_orders: Vec<UserOrder>,
    pub orders: Orders,
    pub best_prices: BestPrices,
    pub last_trade_price: Decimal,
    /// Last refetch moved the trade price strictly up
    pub market_up: bool,
}

/// State transitions accepted by the reducer
#[derive(Debug, Clone, PartialEq)]
pub enum OmeAction {
    SetUserOrders(Vec<UserOrder>),
    SetOrders(Orders),
    SetBestPrices(BestPrices),
    SetMarketUp(bool),
    SetLastTradePrice(Decimal),
    RefetchUserOrders,
    RefetchOrders,
}

/// Follow-up work requested by a refetch action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    FetchUserOrders,
    FetchOrders,
}

impl OmeState {
    /// Apply one action. Refetch actions leave the state as is and hand the
    /// fetch back to the caller.
    pub fn reduce(&mut self, action: OmeAction) -> Option<Effect> {
        match action {
            OmeAction::SetUserOrders(orders) => self.user_orders = orders,
            OmeAction::SetOrders(orders) => self.orders = orders,
            OmeAction::SetBestPrices(prices) => self.best_prices = prices,
            OmeAction::SetMarketUp(value) => self.market_up = value,
            OmeAction::SetLastTradePrice(ltp) => self.last_trade_price = ltp,
            OmeAction::RefetchUserOrders => return Some(Effect::FetchUserOrders),
            OmeAction::RefetchOrders => return Some(Effect::FetchOrders),
        }
        None
    }
}

impl FromStr for OmeAction {
    type Err = OmeError;

    /// Decode a payload-free action by name
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "refetchOrders" => Ok(OmeAction::RefetchOrders),
            "refetchUserOrders" => Ok(OmeAction::RefetchUserOrders),
            other => Err(OmeError::UnexpectedAction(other.to_string())),
        }
    }
}
