//! Consumer view of the trading store

use tokio::sync::watch;

use super::{OmeAction, OmeState, OmeStore};
use crate::client::FilledOrder;

/// What views get from the store: state, dispatch and the account's fills
#[derive(Clone)]
pub struct OmeContext {
    store: OmeStore,
}

impl OmeContext {
    pub(crate) fn new(store: OmeStore) -> Self {
        Self { store }
    }

    pub fn state(&self) -> OmeState {
        self.store.state()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<OmeState> {
        self.store.subscribe()
    }

    pub fn dispatch(&self, action: OmeAction) {
        self.store.dispatch(action)
    }

    pub fn filled_orders(&self) -> Vec<FilledOrder> {
        self.store.filled_orders()
    }

    pub async fn refetch_filled_orders(&self) {
        self.store.refetch_filled_orders().await
    }
}
