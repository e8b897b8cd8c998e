//! WebSocket module for the matched-order event stream

mod client;
mod manager;

pub use client::MatchedOrdersClient;
pub use manager::MatchedOrdersListener;
