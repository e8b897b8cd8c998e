//! Trading store runtime
//!
//! Polls the selected market's book, refetches user orders on account and
//! market changes, and applies every result through the reducer. Results
//! that arrive after teardown, after the market changed, or after a newer
//! book was applied are dropped. No fetch may outlive one polling period.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{Effect, OmeAction, OmeContext, OmeState};
use crate::client::{FilledOrder, FilledOrdersSource, OmeClient};
use crate::error::{OmeError, Result};
use crate::metrics::StoreMetrics;
use crate::orderbook::{parse_orders, BestPrices, Side};
use crate::parser::{MatchedOrdersEvent, OmeBook};

/// Shortest accepted polling period
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Market and account the store is following
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub market: Option<String>,
    pub account: Option<String>,
}

struct Inner {
    client: Arc<dyn OmeClient>,
    filled_source: Arc<dyn FilledOrdersSource>,
    poll_interval: Duration,
    metrics: Option<StoreMetrics>,
    state: watch::Sender<OmeState>,
    filled_orders: watch::Sender<Vec<FilledOrder>>,
    selection: watch::Sender<Selection>,
    mounted: AtomicBool,
    issued_generation: AtomicU64,
    applied_generation: AtomicU64,
    poller: Mutex<Option<JoinHandle<()>>>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

/// Shared handle to the trading store
#[derive(Clone)]
pub struct OmeStore {
    inner: Arc<Inner>,
}

impl OmeStore {
    /// Create a mounted store with no market or account selected.
    ///
    /// `poll_interval` is clamped to at least one millisecond.
    pub fn new(
        client: Arc<dyn OmeClient>,
        filled_source: Arc<dyn FilledOrdersSource>,
        poll_interval: Duration,
        metrics: Option<StoreMetrics>,
    ) -> Self {
        let (state, _) = watch::channel(OmeState::default());
        let (filled_orders, _) = watch::channel(Vec::new());
        let (selection, _) = watch::channel(Selection::default());

        Self {
            inner: Arc::new(Inner {
                client,
                filled_source,
                poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
                metrics,
                state,
                filled_orders,
                selection,
                mounted: AtomicBool::new(true),
                issued_generation: AtomicU64::new(0),
                applied_generation: AtomicU64::new(0),
                poller: Mutex::new(None),
                subscription: Mutex::new(None),
            }),
        }
    }

    /// Consumer-facing view of this store
    pub fn context(&self) -> OmeContext {
        OmeContext::new(self.clone())
    }

    pub fn state(&self) -> OmeState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OmeState> {
        self.inner.state.subscribe()
    }

    pub fn filled_orders(&self) -> Vec<FilledOrder> {
        self.inner.filled_orders.borrow().clone()
    }

    pub fn selection(&self) -> Selection {
        self.inner.selection.borrow().clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }

    /// Run an action through the reducer.
    ///
    /// Refetch actions start their fetch on the current Tokio runtime.
    /// Actions dispatched after teardown are ignored.
    pub fn dispatch(&self, action: OmeAction) {
        if !self.is_mounted() {
            debug!(?action, "Store unmounted, dropping action");
            return;
        }

        let mut effect = None;
        self.inner.state.send_if_modified(|state| {
            effect = state.reduce(action);
            effect.is_none()
        });

        match effect {
            Some(Effect::FetchOrders) => {
                let store = self.clone();
                tokio::spawn(async move { store.fetch_orders().await });
            }
            Some(Effect::FetchUserOrders) => {
                let store = self.clone();
                tokio::spawn(async move { store.fetch_user_data().await });
            }
            None => {}
        }
    }

    /// Switch accounts: user orders and fills are refetched for the new one
    pub async fn set_account(&self, account: Option<String>) {
        info!(account = ?account, "Account changed");
        self.inner.selection.send_modify(|s| s.account = account);
        tokio::join!(self.fetch_user_data(), self.refetch_filled_orders());
    }

    /// Switch markets.
    ///
    /// Drops the current event subscription and poller, restarts book
    /// polling for the new market, then refetches user orders and fills.
    pub async fn select_market(&self, market: Option<String>) {
        info!(market = ?market, "Market selected");
        self.inner.selection.send_modify(|s| s.market = market.clone());

        if let Some(old) = self.inner.subscription.lock().await.take() {
            old.abort();
        }
        self.stop_polling().await;

        if market.is_some() && self.is_mounted() {
            self.start_polling().await;
        }

        tokio::join!(self.fetch_user_data(), self.refetch_filled_orders());
    }

    /// Hand over the task feeding matched-order events for the selected
    /// market. A previously attached task is aborted.
    pub async fn attach_subscription(&self, handle: JoinHandle<()>) {
        if !self.is_mounted() {
            handle.abort();
            return;
        }
        if let Some(old) = self.inner.subscription.lock().await.replace(handle) {
            old.abort();
        }
    }

    /// True while an event subscription is attached and running
    pub async fn has_subscription(&self) -> bool {
        self.inner
            .subscription
            .lock()
            .await
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Teardown: stop polling and the event subscription; fetches still in
    /// flight complete but their results are discarded.
    pub async fn unmount(&self) {
        self.inner.mounted.store(false, Ordering::SeqCst);
        self.stop_polling().await;
        if let Some(handle) = self.inner.subscription.lock().await.take() {
            handle.abort();
        }
        info!("Store unmounted");
    }

    async fn start_polling(&self) {
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.poll_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                OmeStore { inner }.fetch_orders().await;
            }
        });

        if let Some(old) = self.inner.poller.lock().await.replace(handle) {
            old.abort();
        }
    }

    async fn stop_polling(&self) {
        if let Some(handle) = self.inner.poller.lock().await.take() {
            handle.abort();
        }
    }

    /// Fetch and apply the selected market's book. Failures are logged and
    /// the last good book stays in place.
    pub async fn fetch_orders(&self) {
        let Some(market) = self.inner.selection.borrow().market.clone() else {
            return;
        };
        let generation = self.inner.issued_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.count_fetch("book");

        match self.bounded("book", self.inner.client.get_orders(&market)).await {
            Ok(book) => {
                if let Err(e) = self.apply_book(&market, generation, &book) {
                    warn!(market = %market, error = %e, "Failed to normalize order book");
                    self.count_failure("book");
                }
            }
            Err(e) => {
                warn!(market = %market, error = %e, "Order book fetch failed, keeping last book");
                self.count_failure("book");
            }
        }
    }

    /// Apply a fetched book as orders, best prices, market direction and
    /// last trade price. Returns whether the result was applied.
    pub(crate) fn apply_book(&self, market: &str, generation: u64, book: &OmeBook) -> Result<bool> {
        if !self.is_mounted() || self.inner.selection.borrow().market.as_deref() != Some(market) {
            self.count_discard();
            return Ok(false);
        }

        let orders = parse_orders(book)?;
        let best_prices = BestPrices::from_orders(&orders);
        let ltp = book.last_trade_price()?;
        let (ask_levels, bid_levels) = (orders.ask_orders.len(), orders.bid_orders.len());
        let spread = orders.spread();
        let (ask_depth, bid_depth) = (orders.depth(Side::Ask), orders.depth(Side::Bid));

        let applied_generation = &self.inner.applied_generation;
        let applied = self.inner.state.send_if_modified(|state| {
            if generation <= applied_generation.load(Ordering::SeqCst) {
                return false;
            }
            applied_generation.store(generation, Ordering::SeqCst);

            let market_up = ltp > state.last_trade_price;
            state.reduce(OmeAction::SetOrders(orders));
            state.reduce(OmeAction::SetBestPrices(best_prices));
            state.reduce(OmeAction::SetMarketUp(market_up));
            state.reduce(OmeAction::SetLastTradePrice(ltp));
            true
        });

        if applied {
            if let Some(metrics) = &self.inner.metrics {
                metrics.book_levels.with_label_values(&["ask"]).set(ask_levels as i64);
                metrics.book_levels.with_label_values(&["bid"]).set(bid_levels as i64);
            }
            debug!(
                market = %market,
                generation,
                ask_levels,
                bid_levels,
                spread = ?spread,
                ask_depth = %ask_depth,
                bid_depth = %bid_depth,
                ltp = %ltp,
                "Order book applied"
            );
        } else {
            debug!(market = %market, generation, "Superseded order book dropped");
            self.count_discard();
        }

        Ok(applied)
    }

    /// Refetch the account's resting orders; with no account they are cleared
    pub async fn fetch_user_data(&self) {
        let selection = self.selection();

        match (selection.market.as_deref(), selection.account.as_deref()) {
            (_, None) => {
                if self.is_mounted() {
                    self.dispatch(OmeAction::SetUserOrders(Vec::new()));
                }
            }
            (Some(market), Some(account)) => {
                self.count_fetch("user_orders");
                let fetch = self.inner.client.get_users_orders(market, account);
                match self.bounded("user_orders", fetch).await {
                    Ok(orders) => {
                        if self.is_mounted() && self.selection() == selection {
                            debug!(market = %market, count = orders.len(), "User orders applied");
                            self.dispatch(OmeAction::SetUserOrders(orders));
                        } else {
                            self.count_discard();
                        }
                    }
                    Err(e) => {
                        warn!(
                            market = %market,
                            account = %account,
                            error = %e,
                            "User orders fetch failed"
                        );
                        self.count_failure("user_orders");
                    }
                }
            }
            (None, Some(_)) => {}
        }
    }

    /// Refetch the account's fills from the indexer
    pub async fn refetch_filled_orders(&self) {
        let selection = self.selection();

        let (Some(market), Some(account)) =
            (selection.market.as_deref(), selection.account.as_deref())
        else {
            if self.is_mounted() {
                self.inner.filled_orders.send_replace(Vec::new());
            }
            return;
        };

        self.count_fetch("filled_orders");
        let fetch = self.inner.filled_source.filled_orders(market, account);
        match self.bounded("filled_orders", fetch).await {
            Ok(fills) => {
                if self.is_mounted() && self.selection() == selection {
                    self.inner.filled_orders.send_replace(fills);
                } else {
                    self.count_discard();
                }
            }
            Err(e) => {
                warn!(
                    market = %market,
                    account = %account,
                    error = %e,
                    "Filled orders fetch failed"
                );
                self.count_failure("filled_orders");
            }
        }
    }

    /// React to a matched-order notification. Fills are refetched only when
    /// the connected account took part; returns whether that happened.
    pub async fn handle_matched_orders(&self, event: &MatchedOrdersEvent) -> bool {
        let involved = self
            .inner
            .selection
            .borrow()
            .account
            .as_deref()
            .map(|account| event.involves(account))
            .unwrap_or(false);

        if involved {
            debug!(long = %event.long, short = %event.short, "Matched order for account");
            self.refetch_filled_orders().await;
        }
        involved
    }

    /// Cut a fetch off after one polling period
    async fn bounded<T>(&self, kind: &str, fetch: impl Future<Output = Result<T>>) -> Result<T> {
        match timeout(self.inner.poll_interval, fetch).await {
            Ok(result) => result,
            Err(_) => Err(OmeError::Timeout(format!(
                "{kind} fetch exceeded {:?}",
                self.inner.poll_interval
            ))),
        }
    }

    fn count_fetch(&self, kind: &str) {
        if let Some(metrics) = &self.inner.metrics {
            metrics.fetches.with_label_values(&[kind]).inc();
        }
    }

    fn count_failure(&self, kind: &str) {
        if let Some(metrics) = &self.inner.metrics {
            metrics.fetch_failures.with_label_values(&[kind]).inc();
        }
    }

    fn count_discard(&self) {
        if let Some(metrics) = &self.inner.metrics {
            metrics.discarded_results.inc();
        }
    }
}
