//! Exchange adapter contract (C3): the venue-agnostic capability surface the
//! engine requires, plus two concrete implementations.

pub mod alias;
pub mod rest;
pub mod simulation;

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::errors::ArbitResult;
use crate::models::{Balances, FeeRates, MarketMeta, OrderBook, OrderSpec, Fill};

/// A single `(symbol, OrderBook)` update from a venue's stream.
#[derive(Debug, Clone)]
pub struct BookUpdate {
    pub symbol: String,
    pub book: OrderBook,
}

/// Venue-agnostic capability set every adapter must expose (§4.3).
///
/// Dry-run is a mode flag on the adapter (see [`ExchangeAdapter::dry_run`]),
/// not a separate type, so calling code is identical in both modes.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Venue identifier, e.g. `"kraken"`.
    fn name(&self) -> &str;

    /// Whether this adapter synthesizes fills instead of submitting live
    /// orders.
    fn dry_run(&self) -> bool;

    /// Fetch the full market map, including min-cost and precision.
    async fn load_markets(&self) -> ArbitResult<HashMap<String, MarketMeta>>;

    /// Fetch the top `depth` levels of `symbol`'s order book.
    async fn fetch_orderbook(&self, symbol: &str, depth: usize) -> ArbitResult<OrderBook>;

    /// Fetch `(maker, taker)` fee rates for `symbol`, caching internally.
    async fn fetch_fees(&self, symbol: &str) -> ArbitResult<FeeRates>;

    /// Minimum notional (in quote currency) accepted for `symbol`.
    async fn min_notional(&self, symbol: &str) -> ArbitResult<Decimal>;

    /// Submit an IOC market order. In dry-run mode this synthesizes a fill
    /// at current top-of-book without touching the network (balances and
    /// order-book reads remain live).
    async fn create_order(&self, spec: OrderSpec) -> ArbitResult<Fill>;

    /// Free balance per asset, `> 0` entries only.
    async fn balances(&self) -> ArbitResult<Balances>;

    /// Subscribe to a lazy stream of book updates for `symbols`, feeding
    /// `sink`. Implementations auto-reconnect on transient errors without
    /// losing the subscription set; this call returns once the subscription
    /// loop is established (the stream itself runs until the adapter is
    /// closed or the task is cancelled).
    async fn orderbook_stream(
        &self,
        symbols: Vec<String>,
        depth: usize,
        sink: tokio::sync::mpsc::UnboundedSender<BookUpdate>,
    ) -> ArbitResult<()>;

    /// Release any held connections.
    async fn close(&self);
}
