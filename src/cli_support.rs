//! Thin library-side support for the `arbit` binary's five subcommands.
//! Keeps `src/bin/arbit.rs` a pure argument-parsing shim.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::prelude::*;
use tracing::info;

use crate::adapter::alias::{IdentityAliaser, UsdtUsdAliaser};
use crate::adapter::rest::{RestAdapter, RestAdapterConfig};
use crate::adapter::simulation::{ScriptedUpdate, SimulationAdapter};
use crate::adapter::ExchangeAdapter;
use crate::config::Settings;
use crate::errors::ArbitResult;
use crate::models::{FeeRates, MarketMeta, OrderBookLevel, OrderBook};
use crate::triangle;

/// Build a live `RestAdapter` for `venue`, reading its REST/WS endpoints and
/// optional credentials from the environment.
pub fn build_rest_adapter(venue: &str, settings: &Settings) -> Arc<dyn ExchangeAdapter> {
    let prefix = venue.to_uppercase();
    let rest_base_url = std::env::var(format!("ARBIT_{prefix}_REST_URL"))
        .unwrap_or_else(|_| format!("https://api.{venue}.example/v1"));
    let ws_url = std::env::var(format!("ARBIT_{prefix}_WS_URL"))
        .unwrap_or_else(|_| format!("wss://ws.{venue}.example"));
    let creds = settings.api_keys.get(venue);

    let config = RestAdapterConfig {
        venue: venue.to_string(),
        rest_base_url,
        ws_url,
        api_key: creds.map(|c| c.api_key.clone()),
        api_secret: creds.map(|c| c.api_secret.clone()),
        dry_run: settings.dry_run,
        default_taker_bps: 10.0,
        default_maker_bps: 8.0,
    };

    if settings.venue_config.usdt_to_usd_alias {
        Arc::new(RestAdapter::with_aliaser(config, Arc::new(UsdtUsdAliaser)))
    } else {
        Arc::new(RestAdapter::with_aliaser(config, Arc::new(IdentityAliaser)))
    }
}

/// Build a deterministic simulation adapter seeded with a small synthetic
/// three-symbol triangle, for `fitness --simulate`.
pub fn build_simulation_adapter(venue: &str) -> Arc<dyn ExchangeAdapter> {
    let mut markets = HashMap::new();
    let mut fees = HashMap::new();
    for (symbol, base, quote) in [
        ("ETH/USDT", "ETH", "USDT"),
        ("BTC/ETH", "BTC", "ETH"),
        ("BTC/USDT", "BTC", "USDT"),
    ] {
        markets.insert(
            symbol.to_string(),
            MarketMeta {
                symbol: symbol.to_string(),
                base: base.to_string(),
                quote: quote.to_string(),
                min_cost: Decimal::new(1, 0),
                base_precision: 8,
                quote_precision: 8,
            },
        );
        fees.insert(symbol.to_string(), FeeRates { maker: 0.001, taker: 0.001 });
    }

    let script = vec![
        ScriptedUpdate {
            symbol: "ETH/USDT".to_string(),
            book: OrderBook {
                bids: vec![OrderBookLevel { price: 2000.0, size: 10.0 }],
                asks: vec![OrderBookLevel { price: 2000.0, size: 10.0 }],
            },
            delay_ms: 0,
        },
        ScriptedUpdate {
            symbol: "BTC/ETH".to_string(),
            book: OrderBook {
                bids: vec![OrderBookLevel { price: 0.05, size: 100.0 }],
                asks: vec![OrderBookLevel { price: 0.05, size: 100.0 }],
            },
            delay_ms: 10,
        },
        ScriptedUpdate {
            symbol: "BTC/USDT".to_string(),
            book: OrderBook {
                bids: vec![OrderBookLevel { price: 101.0, size: 100.0 }],
                asks: vec![OrderBookLevel { price: 101.0, size: 100.0 }],
            },
            delay_ms: 20,
        },
    ];

    Arc::new(SimulationAdapter::new(venue, markets, fees, script))
}

/// `keys-check`: probe credentials by loading markets and fetching one book.
pub async fn keys_check(adapter: Arc<dyn ExchangeAdapter>) -> ArbitResult<()> {
    let markets = adapter.load_markets().await?;
    info!(venue = adapter.name(), market_count = markets.len(), "loaded markets");
    if let Some((symbol, _)) = markets.iter().next() {
        let book = adapter.fetch_orderbook(symbol, 5).await?;
        info!(venue = adapter.name(), symbol, bids = book.bids.len(), asks = book.asks.len(), "fetched sample book");
    }
    let balances = adapter.balances().await?;
    info!(venue = adapter.name(), asset_count = balances.len(), "fetched balances");
    Ok(())
}

/// `markets-limits`: print `(symbol, min-notional, maker-bps, taker-bps)`.
pub async fn markets_limits(
    adapter: Arc<dyn ExchangeAdapter>,
    symbols: Option<Vec<String>>,
) -> ArbitResult<Vec<(String, Decimal, f64, f64)>> {
    let markets = adapter.load_markets().await?;
    let wanted: Vec<String> = symbols.unwrap_or_else(|| markets.keys().cloned().collect());
    let mut rows = Vec::new();
    for symbol in wanted {
        if !markets.contains_key(&symbol) {
            continue;
        }
        let min_notional = adapter.min_notional(&symbol).await?;
        let fees = adapter.fetch_fees(&symbol).await?;
        rows.push((symbol, min_notional, fees.maker * 10_000.0, fees.taker * 10_000.0));
    }
    Ok(rows)
}

/// `config-discover`: enumerate triangles for a venue's market map.
pub async fn config_discover(adapter: Arc<dyn ExchangeAdapter>) -> ArbitResult<Vec<triangle::Triangle>> {
    let markets = adapter.load_markets().await?;
    Ok(triangle::discover_triangles(&markets))
}
