//! Clients for the OME and the trade indexer
//!
//! The store only sees the traits; the HTTP implementations are wired in by
//! the daemon.

mod graph;
mod ome;

pub use graph::{FilledOrder, GraphFilledOrders, Position};
pub use ome::HttpOmeClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::parser::{OmeBook, UserOrder};

/// Order book and user order queries of one OME
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OmeClient: Send + Sync {
    /// Full book of a market, including the last trade price
    async fn get_orders(&self, market: &str) -> Result<OmeBook>;

    /// Resting orders of `account` on a market
    async fn get_users_orders(&self, market: &str, account: &str) -> Result<Vec<UserOrder>>;
}

/// Historical fills of an account
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FilledOrdersSource: Send + Sync {
    async fn filled_orders(&self, market: &str, account: &str) -> Result<Vec<FilledOrder>>;
}
