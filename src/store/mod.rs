//! Trading store
//!
//! Holds order book state, user orders, last trade price and market
//! direction for the selected market, and hands consumers an [`OmeContext`].

mod context;
mod ome_store;
mod state;

pub use context::OmeContext;
pub use ome_store::{OmeStore, Selection};
pub use state::{Effect, OmeAction, OmeState};
