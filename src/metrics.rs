//! Prometheus metrics for the trading store

use prometheus::{IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry};

use crate::error::Result;

/// Store counters, registered on the daemon's registry
#[derive(Debug, Clone)]
pub struct StoreMetrics {
    pub fetches: IntCounterVec,
    pub fetch_failures: IntCounterVec,
    pub discarded_results: IntCounter,
    pub book_levels: IntGaugeVec,
}

impl StoreMetrics {
    pub fn register(registry: &Registry) -> Result<Self> {
        let fetches = IntCounterVec::new(
            Opts::new("ome_fetches_total", "OME and indexer fetches issued"),
            &["kind"],
        )?;
        let fetch_failures = IntCounterVec::new(
            Opts::new("ome_fetch_failures_total", "Fetches that failed and left state untouched"),
            &["kind"],
        )?;
        let discarded_results = IntCounter::new(
            "ome_discarded_results_total",
            "Fetch results dropped because the store moved on",
        )?;
        let book_levels = IntGaugeVec::new(
            Opts::new("ome_book_levels", "Aggregated price levels per side"),
            &["side"],
        )?;

        registry.register(Box::new(fetches.clone()))?;
        registry.register(Box::new(fetch_failures.clone()))?;
        registry.register(Box::new(discarded_results.clone()))?;
        registry.register(Box::new(book_levels.clone()))?;

        Ok(Self {
            fetches,
            fetch_failures,
            discarded_results,
            book_levels,
        })
    }
}
