//! OME Book - order book and margin core
//!
//! This crate keeps a client-side view of one OME-backed perpetual swap
//! market: fixed-point order buckets are normalized into decimal price
//! levels, margin metrics are derived from account balances, and a polling
//! store exposes the result to views.

pub mod client;
pub mod config;
pub mod error;
pub mod margin;
pub mod metrics;
pub mod orderbook;
pub mod parser;
pub mod publisher;
pub mod store;
pub mod websocket;

pub use client::{FilledOrder, FilledOrdersSource, GraphFilledOrders, HttpOmeClient, OmeClient};
pub use config::Config;
pub use error::{OmeError, Result};
pub use margin::{Balances, MarginMath, MarginSnapshot, PositionPreview, TracerMargin};
pub use orderbook::{parse_orders, BestPrices, Level, Orders, Side};
pub use parser::{FixedPoint, MatchedOrdersEvent, OmeBook, RawOrder, UserOrder};
pub use publisher::Publisher;
pub use store::{OmeAction, OmeContext, OmeState, OmeStore};
pub use websocket::MatchedOrdersListener;
