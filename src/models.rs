//! Shared data model for the arbitrage engine (§3).

use std::collections::HashMap;
use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Which leg of a triangle a fill or attempt snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Leg {
    Ab,
    Bc,
    Ac,
}

impl std::fmt::Display for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Leg::Ab => write!(f, "AB"),
            Leg::Bc => write!(f, "BC"),
            Leg::Ac => write!(f, "AC"),
        }
    }
}

/// `(price, size)`. `price > 0`, `size >= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub price: f64,
    pub size: f64,
}

/// A full order book snapshot: bids descending, asks ascending, each
/// monotone in price. Replaced wholesale on each stream update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
}

impl OrderBook {
    pub fn top_bid(&self) -> Option<OrderBookLevel> {
        self.bids.first().copied()
    }

    pub fn top_ask(&self) -> Option<OrderBookLevel> {
        self.asks.first().copied()
    }

    pub fn bids_as_pairs(&self) -> Vec<(f64, f64)> {
        self.bids.iter().map(|l| (l.price, l.size)).collect()
    }

    pub fn asks_as_pairs(&self) -> Vec<(f64, f64)> {
        self.asks.iter().map(|l| (l.price, l.size)).collect()
    }
}

/// One `(OrderBook, monotonic_timestamp)` entry, owned exclusively by its
/// venue supervisor task. See [`crate::stream::BookCache`] for the mapping
/// that holds these keyed by symbol.
#[derive(Debug, Clone)]
pub struct BookEntry {
    pub book: OrderBook,
    pub received_at: Instant,
}

/// Order specification for a single leg submission. Always time-in-force
/// IOC, always a market order.
#[derive(Debug, Clone)]
pub struct OrderSpec {
    pub symbol: String,
    pub side: Side,
    pub qty: f64,
    pub tif: &'static str,
    pub order_type: &'static str,
}

impl OrderSpec {
    pub fn new(symbol: impl Into<String>, side: Side, qty: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            qty,
            tif: "IOC",
            order_type: "market",
        }
    }
}

/// Result of one submitted order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub qty: Decimal,
    pub fee: Decimal,
    pub leg: Leg,
    pub venue: String,
    pub tif: String,
    pub order_type: String,
    pub fee_rate: Decimal,
    pub notional: Decimal,
    pub dry_run: bool,
    pub attempt_id: Option<i64>,
    pub timestamp_ms: i64,
}

/// Stable, closed set of skip-classification strings persisted verbatim.
pub mod skip_reason {
    pub const EMPTY_BOOK: &str = "empty_book";
    pub const STALE_BOOK: &str = "stale_book";
    pub const BELOW_THRESHOLD: &str = "below_threshold";
    pub const BELOW_MIN_NOTIONAL: &str = "below_min_notional";
    pub const SLIPPAGE: &str = "slippage";
    pub const INSUFFICIENT_BALANCE: &str = "insufficient_balance";
    pub const ADAPTER_ERROR: &str = "adapter_error";
    pub const UNPROFITABLE: &str = "unprofitable";
}

/// Per-leg top-of-book snapshot recorded on every attempt.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LegSnapshot {
    pub bid: Option<f64>,
    pub ask: Option<f64>,
}

/// One evaluation outcome of one triangle on one update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriangleAttempt {
    pub venue: String,
    pub leg_ab: String,
    pub leg_bc: String,
    pub leg_ac: String,
    pub ts_ms: i64,
    pub ok: bool,
    pub net_est: Option<f64>,
    pub realized_usdt: Option<Decimal>,
    pub threshold_bps: f64,
    pub notional_usd: f64,
    pub slippage_bps: f64,
    pub dry_run: bool,
    pub latency_ms: f64,
    pub skip_reasons: Vec<&'static str>,
    pub ab: LegSnapshot,
    pub bc: LegSnapshot,
    pub ac: LegSnapshot,
    pub qty_base: Option<f64>,
}

impl TriangleAttempt {
    pub fn skip_reasons_csv(&self) -> Option<String> {
        if self.skip_reasons.is_empty() {
            None
        } else {
            Some(self.skip_reasons.join(","))
        }
    }
}

/// Maker/taker fee rates for one symbol, cached per adapter after first
/// resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeRates {
    pub maker: f64,
    pub taker: f64,
}

/// Market metadata returned by `load_markets()`.
#[derive(Debug, Clone)]
pub struct MarketMeta {
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub min_cost: Decimal,
    pub base_precision: u32,
    pub quote_precision: u32,
}

/// Per-venue tunables read once at startup (§3 "VenueConfig", §6).
#[derive(Debug, Clone)]
pub struct VenueConfig {
    pub net_threshold_bps: f64,
    pub notional_per_trade_usd: f64,
    pub max_slippage_bps: f64,
    pub staleness_horizon_ms: u64,
    pub min_notional_usd_override: Option<f64>,
    pub usdt_to_usd_alias: bool,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            net_threshold_bps: 10.0,
            notional_per_trade_usd: 200.0,
            max_slippage_bps: 8.0,
            staleness_horizon_ms: 5_000,
            min_notional_usd_override: None,
            usdt_to_usd_alias: false,
        }
    }
}

/// Free balance per asset (`> 0` entries only).
pub type Balances = HashMap<String, Decimal>;
