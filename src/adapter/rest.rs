//! Generic multi-venue REST/WS adapter.
//!
//! Wraps a venue's plain REST API for order/account endpoints and its
//! websocket feed for order books, falling back to REST polling when a
//! symbol has no websocket channel. HMAC-SHA256 request signing follows the
//! pattern used by other Bybit/Binance-style triangular arbitrage bots in
//! this space (query string + secret -> hex digest, sent as a header).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use sha2::Sha256;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::adapter::alias::{IdentityAliaser, SymbolAliaser};
use crate::adapter::{BookUpdate, ExchangeAdapter};
use crate::errors::{ArbitError, ArbitResult};
use crate::models::{Balances, FeeRates, MarketMeta, OrderBook, OrderBookLevel, OrderSpec, Fill, Leg, Side};

type HmacSha256 = Hmac<Sha256>;

/// Static connection info for one venue's REST/WS endpoints.
#[derive(Debug, Clone)]
pub struct RestAdapterConfig {
    pub venue: String,
    pub rest_base_url: String,
    pub ws_url: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub dry_run: bool,
    pub default_taker_bps: f64,
    pub default_maker_bps: f64,
}

/// Generic REST+WS adapter usable against any venue exposing a
/// Binance/Bybit-shaped spot API.
pub struct RestAdapter {
    config: RestAdapterConfig,
    http: reqwest::Client,
    aliaser: Arc<dyn SymbolAliaser>,
    fee_cache: DashMap<String, FeeRates>,
}

impl RestAdapter {
    pub fn new(config: RestAdapterConfig) -> Self {
        Self::with_aliaser(config, Arc::new(IdentityAliaser))
    }

    pub fn with_aliaser(config: RestAdapterConfig, aliaser: Arc<dyn SymbolAliaser>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            config,
            http,
            aliaser,
            fee_cache: DashMap::new(),
        }
    }

    fn sign(&self, query: &str) -> ArbitResult<String> {
        let secret = self
            .config
            .api_secret
            .as_deref()
            .ok_or_else(|| ArbitError::Fatal("missing api secret for signed request".into()))?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| ArbitError::Fatal(format!("bad hmac key: {e}")))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn get_json(&self, path: &str) -> ArbitResult<serde_json::Value> {
        let url = format!("{}{}", self.config.rest_base_url, path);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ArbitError::TransientNetwork(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ArbitError::TransientNetwork(format!(
                "GET {url} -> {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| ArbitError::TransientNetwork(e.to_string()))
    }

    fn parse_book(value: &serde_json::Value) -> ArbitResult<OrderBook> {
        let parse_side = |levels: &serde_json::Value| -> Vec<OrderBookLevel> {
            levels
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .filter_map(|lvl| {
                            let lvl = lvl.as_array()?;
                            let price = lvl.first()?.as_str()?.parse().ok()?;
                            let size = lvl.get(1)?.as_str()?.parse().ok()?;
                            Some(OrderBookLevel { price, size })
                        })
                        .collect()
                })
                .unwrap_or_default()
        };
        Ok(OrderBook {
            bids: parse_side(&value["bids"]),
            asks: parse_side(&value["asks"]),
        })
    }
}

#[async_trait]
impl ExchangeAdapter for RestAdapter {
    fn name(&self) -> &str {
        &self.config.venue
    }

    fn dry_run(&self) -> bool {
        self.config.dry_run
    }

    async fn load_markets(&self) -> ArbitResult<HashMap<String, MarketMeta>> {
        let value = self.get_json("/markets").await?;
        let mut out = HashMap::new();
        if let Some(arr) = value.as_array() {
            for m in arr {
                let symbol = m["symbol"].as_str().unwrap_or_default().to_string();
                if symbol.is_empty() {
                    continue;
                }
                let caller_symbol = self.aliaser.from_venue(&symbol);
                let (base, quote) = match caller_symbol.split_once('/') {
                    Some(pair) => pair,
                    None => continue,
                };
                out.insert(
                    caller_symbol.clone(),
                    MarketMeta {
                        symbol: caller_symbol,
                        base: base.to_string(),
                        quote: quote.to_string(),
                        min_cost: m["min_cost"]
                            .as_str()
                            .and_then(|s| Decimal::from_str(s).ok())
                            .unwrap_or_else(|| Decimal::new(1, 0)),
                        base_precision: m["base_precision"].as_u64().unwrap_or(8) as u32,
                        quote_precision: m["quote_precision"].as_u64().unwrap_or(8) as u32,
                    },
                );
            }
        }
        Ok(out)
    }

    async fn fetch_orderbook(&self, symbol: &str, depth: usize) -> ArbitResult<OrderBook> {
        let venue_symbol = self.aliaser.to_venue(symbol);
        let path = format!("/orderbook?symbol={venue_symbol}&depth={depth}");
        let value = self.get_json(&path).await?;
        Self::parse_book(&value)
    }

    async fn fetch_fees(&self, symbol: &str) -> ArbitResult<FeeRates> {
        if let Some(cached) = self.fee_cache.get(symbol) {
            return Ok(*cached);
        }
        let venue_symbol = self.aliaser.to_venue(symbol);
        let path = format!("/fees?symbol={venue_symbol}");
        let rates = match self.get_json(&path).await {
            Ok(value) => FeeRates {
                maker: value["maker"].as_f64().unwrap_or(self.config.default_maker_bps / 10_000.0),
                taker: value["taker"].as_f64().unwrap_or(self.config.default_taker_bps / 10_000.0),
            },
            Err(_) => FeeRates {
                maker: self.config.default_maker_bps / 10_000.0,
                taker: self.config.default_taker_bps / 10_000.0,
            },
        };
        self.fee_cache.insert(symbol.to_string(), rates);
        Ok(rates)
    }

    async fn min_notional(&self, symbol: &str) -> ArbitResult<Decimal> {
        let venue_symbol = self.aliaser.to_venue(symbol);
        let path = format!("/markets/{venue_symbol}/limits");
        match self.get_json(&path).await {
            Ok(value) => Ok(value["min_cost"]
                .as_str()
                .and_then(|s| Decimal::from_str(s).ok())
                .unwrap_or_else(|| Decimal::new(1, 0))),
            Err(_) => Ok(Decimal::new(1, 0)),
        }
    }

    async fn create_order(&self, spec: OrderSpec) -> ArbitResult<Fill> {
        if self.config.dry_run {
            let book = self.fetch_orderbook(&spec.symbol, 1).await?;
            let top = match spec.side {
                Side::Buy => book.top_ask(),
                Side::Sell => book.top_bid(),
            }
            .ok_or_else(|| ArbitError::TransientNetwork("empty book for dry-run fill".into()))?;
            let fees = self.fetch_fees(&spec.symbol).await?;
            let price = Decimal::from_f64(top.price).unwrap_or_default();
            let qty = Decimal::from_f64(spec.qty).unwrap_or_default();
            let notional = price * qty;
            let fee = notional * Decimal::from_f64(fees.taker).unwrap_or_default();
            return Ok(Fill {
                id: format!("dryrun-{}", uuid::Uuid::new_v4()),
                symbol: spec.symbol.clone(),
                side: spec.side,
                price,
                qty,
                fee,
                leg: Leg::Ab, // overwritten by the execution protocol caller
                venue: self.config.venue.clone(),
                tif: spec.tif.to_string(),
                order_type: spec.order_type.to_string(),
                fee_rate: Decimal::from_f64(fees.taker).unwrap_or_default(),
                notional,
                dry_run: true,
                attempt_id: None,
                timestamp_ms: chrono::Utc::now().timestamp_millis(),
            });
        }

        let venue_symbol = self.aliaser.to_venue(&spec.symbol);
        let ts = chrono::Utc::now().timestamp_millis();
        let query = format!(
            "symbol={venue_symbol}&side={}&qty={}&tif={}&type={}&ts={ts}",
            spec.side, spec.qty, spec.tif, spec.order_type
        );
        let signature = self.sign(&query)?;
        let url = format!("{}/order?{query}&signature={signature}", self.config.rest_base_url);
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ArbitError::Fatal("missing api key".into()))?;

        let resp = self
            .http
            .post(&url)
            .header("X-API-KEY", api_key)
            .send()
            .await
            .map_err(|e| ArbitError::TransientNetwork(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::INSUFFICIENT_STORAGE {
            // Venue-specific convention for balance rejection; real adapters
            // map this from the venue's documented error code.
            return Err(ArbitError::InsufficientBalance(spec.symbol));
        }
        if !resp.status().is_success() {
            return Err(ArbitError::Rejected(format!("order rejected: {}", resp.status())));
        }

        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ArbitError::TransientNetwork(e.to_string()))?;

        let price = value["price"].as_str().and_then(|s| Decimal::from_str(s).ok()).unwrap_or_default();
        let qty = value["filled_qty"].as_str().and_then(|s| Decimal::from_str(s).ok()).unwrap_or_default();
        let fee = value["fee"].as_str().and_then(|s| Decimal::from_str(s).ok()).unwrap_or_default();
        let fees = self.fetch_fees(&spec.symbol).await?;

        Ok(Fill {
            id: value["order_id"].as_str().unwrap_or_default().to_string(),
            symbol: spec.symbol.clone(),
            side: spec.side,
            price,
            qty,
            fee,
            leg: Leg::Ab,
            venue: self.config.venue.clone(),
            tif: spec.tif.to_string(),
            order_type: spec.order_type.to_string(),
            fee_rate: Decimal::from_f64(fees.taker).unwrap_or_default(),
            notional: price * qty,
            dry_run: false,
            attempt_id: None,
            timestamp_ms: ts,
        })
    }

    async fn balances(&self) -> ArbitResult<Balances> {
        if self.config.api_key.is_none() {
            return Ok(Balances::new());
        }
        let ts = chrono::Utc::now().timestamp_millis();
        let query = format!("ts={ts}");
        let signature = self.sign(&query)?;
        let url = format!("{}/balances?{query}&signature={signature}", self.config.rest_base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ArbitError::TransientNetwork(e.to_string()))?;
        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ArbitError::TransientNetwork(e.to_string()))?;
        let mut out = Balances::new();
        if let Some(map) = value.as_object() {
            for (asset, amount) in map {
                if let Some(s) = amount.as_str() {
                    if let Ok(d) = Decimal::from_str(s) {
                        if d > Decimal::ZERO {
                            out.insert(asset.clone(), d);
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    async fn orderbook_stream(
        &self,
        symbols: Vec<String>,
        depth: usize,
        sink: UnboundedSender<BookUpdate>,
    ) -> ArbitResult<()> {
        let ws_url = self.config.ws_url.clone();
        let venue = self.config.venue.clone();
        let aliaser = Arc::clone(&self.aliaser);
        let http = self.http.clone();
        let rest_base_url = self.config.rest_base_url.clone();

        for symbol in symbols {
            let ws_url = ws_url.clone();
            let venue = venue.clone();
            let aliaser = Arc::clone(&aliaser);
            let sink = sink.clone();
            let http = http.clone();
            let rest_base_url = rest_base_url.clone();
            let symbol = symbol.clone();

            tokio::spawn(async move {
                let mut reconnect_backoff = backoff::ExponentialBackoffBuilder::new()
                    .with_initial_interval(Duration::from_millis(500))
                    .with_max_interval(Duration::from_secs(30))
                    .with_max_elapsed_time(None)
                    .build();
                loop {
                    match Self::stream_one_symbol(&ws_url, &venue, &symbol, depth, &aliaser, &sink).await
                    {
                        Ok(()) => {
                            // Stream ended cleanly (e.g. venue closed); fall
                            // through to REST polling so the symbol keeps
                            // producing updates.
                            warn!(symbol = %symbol, venue = %venue, "ws stream ended, falling back to REST polling");
                            Self::poll_one_symbol(&http, &rest_base_url, &symbol, depth, &sink).await;
                        }
                        Err(e) => {
                            let delay = backoff::backoff::Backoff::next_backoff(&mut reconnect_backoff)
                                .unwrap_or(Duration::from_secs(30));
                            let jitter_ms = rand::random::<u64>() % 250;
                            error!(symbol = %symbol, venue = %venue, error = %e, delay_ms = delay.as_millis() as u64 + jitter_ms, "ws stream failed, reconnecting");
                            tokio::time::sleep(delay + Duration::from_millis(jitter_ms)).await;
                            continue;
                        }
                    }
                    break;
                }
            });
        }

        Ok(())
    }

    async fn close(&self) {
        debug!(venue = %self.config.venue, "closing rest adapter");
    }
}

impl RestAdapter {
    async fn stream_one_symbol(
        ws_url: &str,
        venue: &str,
        symbol: &str,
        depth: usize,
        aliaser: &Arc<dyn SymbolAliaser>,
        sink: &UnboundedSender<BookUpdate>,
    ) -> ArbitResult<()> {
        let venue_symbol = aliaser.to_venue(symbol);
        let url = format!("{ws_url}/{}@depth{depth}", venue_symbol.to_lowercase());
        let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| ArbitError::TransientNetwork(e.to_string()))?;
        info!(symbol = %symbol, venue = %venue, "ws connected");
        let (mut write, mut read) = ws_stream.split();
        let _ = write.send(Message::Ping(vec![])).await;

        while let Some(msg) = read.next().await {
            let msg = msg.map_err(|e| ArbitError::TransientNetwork(e.to_string()))?;
            if let Message::Text(text) = msg {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
                    if let Ok(book) = Self::parse_book(&value) {
                        if sink
                            .send(BookUpdate {
                                symbol: symbol.to_string(),
                                book,
                            })
                            .is_err()
                        {
                            return Ok(()); // receiver gone, stop the task
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn poll_one_symbol(
        http: &reqwest::Client,
        rest_base_url: &str,
        symbol: &str,
        depth: usize,
        sink: &UnboundedSender<BookUpdate>,
    ) {
        let mut interval = tokio::time::interval(Duration::from_millis(500));
        loop {
            interval.tick().await;
            let url = format!("{rest_base_url}/orderbook?symbol={symbol}&depth={depth}");
            let Ok(resp) = http.get(&url).send().await else {
                continue;
            };
            let Ok(value) = resp.json::<serde_json::Value>().await else {
                continue;
            };
            if let Ok(book) = Self::parse_book(&value) {
                if sink
                    .send(BookUpdate {
                        symbol: symbol.to_string(),
                        book,
                    })
                    .is_err()
                {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(rest_base_url: String) -> RestAdapterConfig {
        RestAdapterConfig {
            venue: "mockvenue".to_string(),
            rest_base_url,
            ws_url: "wss://unused.example".to_string(),
            api_key: None,
            api_secret: None,
            dry_run: true,
            default_taker_bps: 10.0,
            default_maker_bps: 8.0,
        }
    }

    #[tokio::test]
    async fn load_markets_parses_symbol_and_aliases_from_venue() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/markets")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"symbol":"ETH/USD","min_cost":"10","base_precision":8,"quote_precision":8}]"#,
            )
            .create_async()
            .await;

        let adapter = RestAdapter::with_aliaser(config(server.url()), Arc::new(crate::adapter::alias::UsdtUsdAliaser));
        let markets = adapter.load_markets().await.unwrap();

        assert!(markets.contains_key("ETH/USDT"));
        let meta = &markets["ETH/USDT"];
        assert_eq!(meta.base, "ETH");
        assert_eq!(meta.quote, "USDT");
        assert_eq!(meta.min_cost, Decimal::new(10, 0));
    }

    #[tokio::test]
    async fn fetch_orderbook_parses_bids_and_asks() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/orderbook.*".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"bids":[["2000.0","1.5"]],"asks":[["2001.0","2.0"]]}"#)
            .create_async()
            .await;

        let adapter = RestAdapter::new(config(server.url()));
        let book = adapter.fetch_orderbook("ETH/USDT", 10).await.unwrap();

        assert_eq!(book.top_bid().unwrap().price, 2000.0);
        assert_eq!(book.top_ask().unwrap().price, 2001.0);
    }

    #[tokio::test]
    async fn fetch_fees_falls_back_to_defaults_on_error_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/fees.*".to_string()))
            .with_status(500)
            .create_async()
            .await;

        let adapter = RestAdapter::new(config(server.url()));
        let fees = adapter.fetch_fees("ETH/USDT").await.unwrap();

        assert_eq!(fees.taker, 10.0 / 10_000.0);
        assert_eq!(fees.maker, 8.0 / 10_000.0);
    }

    #[tokio::test]
    async fn create_order_dry_run_synthesizes_fill_without_credentials() {
        let mut server = mockito::Server::new_async().await;
        let _book_mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/orderbook.*".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"bids":[["100.0","5"]],"asks":[["101.0","5"]]}"#)
            .create_async()
            .await;
        let _fees_mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/fees.*".to_string()))
            .with_status(500)
            .create_async()
            .await;

        let adapter = RestAdapter::new(config(server.url()));
        let fill = adapter
            .create_order(OrderSpec::new("ETH/USDT", Side::Buy, 1.0))
            .await
            .unwrap();

        assert!(fill.dry_run);
        assert_eq!(fill.price, Decimal::new(101, 0));
    }
}
