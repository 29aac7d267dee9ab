//! Order-book cache and stream multiplexer (C4).
//!
//! One `BookCache` per venue supervisor, exclusively owned by that
//! supervisor's task — no locking. The multiplexer fans subscriptions for
//! many symbols into a single `mpsc` channel the same way the teacher's
//! `PoolMonitor` fans many per-pool subscription tasks into one queue: each
//! symbol gets its own spawned task that loops on its own socket and
//! restarts its own wait independently, so a silent symbol can never starve
//! delivery of an active one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::debug;

use crate::adapter::{BookUpdate, ExchangeAdapter};
use crate::errors::ArbitResult;
use crate::models::{BookEntry, OrderBook};

/// `symbol -> (OrderBook, monotonic timestamp)`, owned by one venue
/// supervisor task.
#[derive(Debug, Default)]
pub struct BookCache {
    entries: HashMap<String, BookEntry>,
}

impl BookCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached book for `symbol` with a fresh timestamp.
    pub fn update(&mut self, symbol: &str, book: OrderBook) {
        self.entries.insert(
            symbol.to_string(),
            BookEntry {
                book,
                received_at: Instant::now(),
            },
        );
    }

    /// The cached book for `symbol`, regardless of freshness.
    pub fn get(&self, symbol: &str) -> Option<&OrderBook> {
        self.entries.get(symbol).map(|e| &e.book)
    }

    /// A symbol is fresh iff present and last updated within
    /// `staleness_horizon`.
    pub fn is_fresh(&self, symbol: &str, staleness_horizon: Duration) -> bool {
        self.entries
            .get(symbol)
            .map(|e| e.received_at.elapsed() <= staleness_horizon)
            .unwrap_or(false)
    }

    /// True iff every symbol in `symbols` is fresh.
    pub fn all_fresh(&self, symbols: &[&str], staleness_horizon: Duration) -> bool {
        symbols.iter().all(|s| self.is_fresh(s, staleness_horizon))
    }
}

/// Start one multiplexed subscription covering `symbols` on `adapter`,
/// returning the receiving half of the fan-in channel. The adapter itself
/// spawns one task per symbol (see `RestAdapter::orderbook_stream` and
/// `SimulationAdapter::orderbook_stream`); this function only owns the
/// shared channel both ends rendezvous on.
pub async fn subscribe(
    adapter: Arc<dyn ExchangeAdapter>,
    symbols: Vec<String>,
    depth: usize,
) -> ArbitResult<mpsc::UnboundedReceiver<BookUpdate>> {
    let (tx, rx) = mpsc::unbounded_channel();
    debug!(count = symbols.len(), "subscribing to order-book stream");
    adapter.orderbook_stream(symbols, depth, tx).await?;
    Ok(rx)
}
