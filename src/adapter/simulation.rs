//! Self-contained simulation adapter: replays an injected or synthetic
//! order-book feed instead of talking to a real venue. Used by the
//! `fitness --simulate` CLI path and by tests that need a deterministic
//! `ExchangeAdapter` without a network.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::adapter::{BookUpdate, ExchangeAdapter};
use crate::errors::{ArbitError, ArbitResult};
use crate::models::{Balances, FeeRates, MarketMeta, OrderBook, OrderSpec, Fill, Side};

/// One scripted update: after `delay_ms` from subscription start, publish
/// `book` for `symbol`.
#[derive(Debug, Clone)]
pub struct ScriptedUpdate {
    pub symbol: String,
    pub book: OrderBook,
    pub delay_ms: u64,
}

/// In-memory venue double. Holds a fixed market map, a fee table, and a
/// script of order-book updates to replay on `orderbook_stream`.
///
/// `create_order` always synthesizes a fill against the most recently
/// published book for the order's symbol, mirroring the dry-run synthesis
/// path real adapters use, since a simulation never has a live order book
/// to cross against.
pub struct SimulationAdapter {
    venue: String,
    markets: HashMap<String, MarketMeta>,
    fees: HashMap<String, FeeRates>,
    script: Vec<ScriptedUpdate>,
    latest_books: Arc<DashMap<String, OrderBook>>,
    balances: Balances,
}

impl SimulationAdapter {
    pub fn new(
        venue: impl Into<String>,
        markets: HashMap<String, MarketMeta>,
        fees: HashMap<String, FeeRates>,
        script: Vec<ScriptedUpdate>,
    ) -> Self {
        Self {
            venue: venue.into(),
            markets,
            fees,
            script,
            latest_books: Arc::new(DashMap::new()),
            balances: Balances::new(),
        }
    }

    pub fn with_balances(mut self, balances: Balances) -> Self {
        self.balances = balances;
        self
    }

    /// Seed the "current" book for a symbol without going through the
    /// scripted stream, for tests that only need synchronous state.
    pub fn seed_book(&self, symbol: &str, book: OrderBook) {
        self.latest_books.insert(symbol.to_string(), book);
    }
}

#[async_trait]
impl ExchangeAdapter for SimulationAdapter {
    fn name(&self) -> &str {
        &self.venue
    }

    fn dry_run(&self) -> bool {
        true
    }

    async fn load_markets(&self) -> ArbitResult<HashMap<String, MarketMeta>> {
        Ok(self.markets.clone())
    }

    async fn fetch_orderbook(&self, symbol: &str, _depth: usize) -> ArbitResult<OrderBook> {
        self.latest_books
            .get(symbol)
            .map(|r| r.clone())
            .ok_or_else(|| ArbitError::InvalidQuote(format!("no simulated book for {symbol}")))
    }

    async fn fetch_fees(&self, symbol: &str) -> ArbitResult<FeeRates> {
        self.fees
            .get(symbol)
            .copied()
            .ok_or_else(|| ArbitError::UnknownSymbol(symbol.to_string()))
    }

    async fn min_notional(&self, symbol: &str) -> ArbitResult<Decimal> {
        self.markets
            .get(symbol)
            .map(|m| m.min_cost)
            .ok_or_else(|| ArbitError::UnknownSymbol(symbol.to_string()))
    }

    async fn create_order(&self, spec: OrderSpec) -> ArbitResult<Fill> {
        let book = self.fetch_orderbook(&spec.symbol, 1).await?;
        let top = match spec.side {
            Side::Buy => book.top_ask(),
            Side::Sell => book.top_bid(),
        }
        .ok_or_else(|| ArbitError::InvalidQuote(format!("empty simulated book for {}", spec.symbol)))?;
        let fees = self.fetch_fees(&spec.symbol).await?;
        let price = Decimal::from_f64(top.price).unwrap_or_default();
        let qty = Decimal::from_f64(spec.qty).unwrap_or_default();
        let notional = price * qty;
        let fee = notional * Decimal::from_f64(fees.taker).unwrap_or_default();
        Ok(Fill {
            id: format!("sim-{}", uuid::Uuid::new_v4()),
            symbol: spec.symbol.clone(),
            side: spec.side,
            price,
            qty,
            fee,
            leg: crate::models::Leg::Ab,
            venue: self.venue.clone(),
            tif: spec.tif.to_string(),
            order_type: spec.order_type.to_string(),
            fee_rate: Decimal::from_f64(fees.taker).unwrap_or_default(),
            notional,
            dry_run: true,
            attempt_id: None,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        })
    }

    async fn balances(&self) -> ArbitResult<Balances> {
        Ok(self.balances.clone())
    }

    async fn orderbook_stream(
        &self,
        symbols: Vec<String>,
        _depth: usize,
        sink: UnboundedSender<BookUpdate>,
    ) -> ArbitResult<()> {
        let script: Vec<ScriptedUpdate> = self
            .script
            .iter()
            .filter(|u| symbols.contains(&u.symbol))
            .cloned()
            .collect();
        let latest_books = Arc::clone(&self.latest_books);

        tokio::spawn(async move {
            let mut queue = script;
            queue.sort_by_key(|u| u.delay_ms);
            let mut elapsed = 0u64;
            for update in queue {
                if update.delay_ms > elapsed {
                    tokio::time::sleep(Duration::from_millis(update.delay_ms - elapsed)).await;
                    elapsed = update.delay_ms;
                }
                latest_books.insert(update.symbol.clone(), update.book.clone());
                if sink
                    .send(BookUpdate {
                        symbol: update.symbol,
                        book: update.book,
                    })
                    .is_err()
                {
                    break;
                }
            }
            debug!("simulation script exhausted");
        });

        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderBookLevel;
    use std::time::Duration as StdDuration;

    fn meta(symbol: &str) -> MarketMeta {
        let (base, quote) = symbol.split_once('/').unwrap();
        MarketMeta {
            symbol: symbol.to_string(),
            base: base.to_string(),
            quote: quote.to_string(),
            min_cost: Decimal::new(10, 0),
            base_precision: 8,
            quote_precision: 8,
        }
    }

    fn book(bid: f64, ask: f64) -> OrderBook {
        OrderBook {
            bids: vec![OrderBookLevel { price: bid, size: 10.0 }],
            asks: vec![OrderBookLevel { price: ask, size: 10.0 }],
        }
    }

    #[tokio::test]
    async fn load_markets_returns_seeded_map() {
        let mut markets = HashMap::new();
        markets.insert("ETH/USDT".to_string(), meta("ETH/USDT"));
        let adapter = SimulationAdapter::new("sim", markets.clone(), HashMap::new(), vec![]);
        let loaded = adapter.load_markets().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("ETH/USDT"));
    }

    #[tokio::test]
    async fn create_order_synthesizes_fill_from_seeded_book() {
        let mut markets = HashMap::new();
        markets.insert("ETH/USDT".to_string(), meta("ETH/USDT"));
        let mut fees = HashMap::new();
        fees.insert("ETH/USDT".to_string(), FeeRates { maker: 0.001, taker: 0.001 });
        let adapter = SimulationAdapter::new("sim", markets, fees, vec![]);
        adapter.seed_book("ETH/USDT", book(2000.0, 2001.0));

        let fill = adapter
            .create_order(OrderSpec::new("ETH/USDT", Side::Buy, 1.0))
            .await
            .unwrap();
        assert_eq!(fill.price, Decimal::new(2001, 0));
        assert!(fill.dry_run);
    }

    #[tokio::test]
    async fn orderbook_stream_replays_script_in_delay_order() {
        let mut markets = HashMap::new();
        markets.insert("ETH/USDT".to_string(), meta("ETH/USDT"));
        let script = vec![
            ScriptedUpdate { symbol: "ETH/USDT".to_string(), book: book(2000.0, 2001.0), delay_ms: 10 },
            ScriptedUpdate { symbol: "ETH/USDT".to_string(), book: book(2002.0, 2003.0), delay_ms: 20 },
        ];
        let adapter = SimulationAdapter::new("sim", markets, HashMap::new(), script);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        adapter
            .orderbook_stream(vec!["ETH/USDT".to_string()], 10, tx)
            .await
            .unwrap();

        let first = tokio::time::timeout(StdDuration::from_millis(500), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.book.top_bid().unwrap().price, 2000.0);
        let second = tokio::time::timeout(StdDuration::from_millis(500), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.book.top_bid().unwrap().price, 2002.0);
    }

    #[tokio::test]
    async fn fetch_fees_rejects_unknown_symbol() {
        let adapter = SimulationAdapter::new("sim", HashMap::new(), HashMap::new(), vec![]);
        let err = adapter.fetch_fees("BTC/USDT").await.unwrap_err();
        assert!(matches!(err, ArbitError::UnknownSymbol(_)));
    }
}
