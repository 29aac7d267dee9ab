//! Attempt engine (C5): evaluates one triangle against the current
//! `BookCache` state and classifies the outcome.

use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use rust_decimal::prelude::*;

use crate::kernel;
use crate::models::{skip_reason, LegSnapshot, TriangleAttempt, VenueConfig};
use crate::stream::BookCache;
use crate::triangle::Triangle;

/// Result of evaluating one triangle on one update.
pub enum EvaluationOutcome {
    /// A gate failed; `attempt` is a complete, persistable skip record.
    Skip(TriangleAttempt),
    /// All gates passed; `qty_base` is the sized base-asset quantity for leg
    /// AB, `attempt_template` carries everything the evaluation already knows
    /// (snapshots, `net_est`) with `ok`/`realized_usdt` left for the
    /// execution protocol to fill in.
    Proceed {
        qty_base: f64,
        attempt_template: TriangleAttempt,
    },
}

/// How many book levels the slippage guard walks when estimating the VWAP
/// fill price for the sized quantity.
const SLIPPAGE_DEPTH_LEVELS: usize = 10;

#[allow(clippy::too_many_arguments)]
pub fn evaluate(
    venue: &str,
    tri: &Triangle,
    cache: &BookCache,
    config: &VenueConfig,
    taker_fee_ab: f64,
    min_notional_ab: Decimal,
) -> EvaluationOutcome {
    let started = Instant::now();
    let [ab, bc, ac] = tri.legs();
    let staleness_horizon = Duration::from_millis(config.staleness_horizon_ms);
    let ts_ms = chrono::Utc::now().timestamp_millis();

    let snapshot = |symbol: &str| -> LegSnapshot {
        cache
            .get(symbol)
            .map(|book| LegSnapshot {
                bid: book.top_bid().map(|l| l.price),
                ask: book.top_ask().map(|l| l.price),
            })
            .unwrap_or_default()
    };

    let base_attempt = |skip: &'static str, net_est: Option<f64>| TriangleAttempt {
        venue: venue.to_string(),
        leg_ab: ab.to_string(),
        leg_bc: bc.to_string(),
        leg_ac: ac.to_string(),
        ts_ms,
        ok: false,
        net_est,
        realized_usdt: None,
        threshold_bps: config.net_threshold_bps,
        notional_usd: config.notional_per_trade_usd,
        slippage_bps: config.max_slippage_bps,
        dry_run: false,
        latency_ms: started.elapsed().as_secs_f64() * 1000.0,
        skip_reasons: vec![skip],
        ab: snapshot(ab),
        bc: snapshot(bc),
        ac: snapshot(ac),
        qty_base: None,
    };

    if !cache.all_fresh(&[ab, bc, ac], staleness_horizon) {
        return EvaluationOutcome::Skip(base_attempt(skip_reason::STALE_BOOK, None));
    }

    let (Some(book_ab), Some(book_bc), Some(book_ac)) = (cache.get(ab), cache.get(bc), cache.get(ac)) else {
        return EvaluationOutcome::Skip(base_attempt(skip_reason::EMPTY_BOOK, None));
    };

    let (Some(top_ask_ab), Some(top_bid_bc), Some(top_bid_ac)) =
        (book_ab.top_ask(), book_bc.top_bid(), book_ac.top_bid())
    else {
        return EvaluationOutcome::Skip(base_attempt(skip_reason::EMPTY_BOOK, None));
    };

    let net = match kernel::net_edge(top_ask_ab.price, top_bid_bc.price, top_bid_ac.price, taker_fee_ab) {
        Ok(net) => net,
        Err(_) => return EvaluationOutcome::Skip(base_attempt(skip_reason::EMPTY_BOOK, None)),
    };

    let threshold = config.net_threshold_bps / 10_000.0;
    if net < threshold {
        return EvaluationOutcome::Skip(base_attempt(skip_reason::BELOW_THRESHOLD, Some(net)));
    }

    let qty_base = kernel::size_from_depth(config.notional_per_trade_usd, top_ask_ab.price, top_ask_ab.size);
    let notional_ab = Decimal::from_f64(qty_base * top_ask_ab.price).unwrap_or_default();
    if notional_ab < min_notional_ab {
        return EvaluationOutcome::Skip(base_attempt(skip_reason::BELOW_MIN_NOTIONAL, Some(net)));
    }

    let vwap_ab = kernel::vwap_fill_price(
        &book_ab.asks_as_pairs()[..book_ab.asks_as_pairs().len().min(SLIPPAGE_DEPTH_LEVELS)],
        qty_base,
    )
    .unwrap_or(top_ask_ab.price);
    let net_vwap = kernel::net_edge(vwap_ab, top_bid_bc.price, top_bid_ac.price, taker_fee_ab).unwrap_or(net);
    let slippage_floor = threshold - config.max_slippage_bps / 10_000.0;
    if net_vwap < slippage_floor {
        return EvaluationOutcome::Skip(base_attempt(skip_reason::SLIPPAGE, Some(net_vwap)));
    }

    let mut attempt = base_attempt(skip_reason::UNPROFITABLE, Some(net_vwap));
    attempt.skip_reasons = Vec::new();
    attempt.qty_base = Some(qty_base);

    EvaluationOutcome::Proceed {
        qty_base,
        attempt_template: attempt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MarketMeta, OrderBook, OrderBookLevel};

    fn config() -> VenueConfig {
        VenueConfig {
            net_threshold_bps: 5.0,
            notional_per_trade_usd: 100.0,
            max_slippage_bps: 5.0,
            staleness_horizon_ms: 5_000,
            min_notional_usd_override: None,
            usdt_to_usd_alias: false,
        }
    }

    // ask_ab=2000, bid_bc=0.05, bid_ac=40200 -> gross = 0.05*40200/2000 = 1.005,
    // i.e. ~199bps of edge before fees: comfortably above every threshold used
    // by the tests below even after the cubic fee discount.
    fn profitable_cache() -> BookCache {
        let mut cache = BookCache::new();
        cache.update(
            "ETH/USDT",
            OrderBook {
                bids: vec![OrderBookLevel { price: 2000.0, size: 10.0 }],
                asks: vec![OrderBookLevel { price: 2000.0, size: 10.0 }],
            },
        );
        cache.update(
            "ETH/BTC",
            OrderBook {
                bids: vec![OrderBookLevel { price: 0.05, size: 100.0 }],
                asks: vec![OrderBookLevel { price: 0.0501, size: 100.0 }],
            },
        );
        cache.update(
            "BTC/USDT",
            OrderBook {
                bids: vec![OrderBookLevel { price: 40200.0, size: 100.0 }],
                asks: vec![OrderBookLevel { price: 40210.0, size: 100.0 }],
            },
        );
        cache
    }

    #[allow(dead_code)]
    fn meta(symbol: &str) -> MarketMeta {
        let (base, quote) = symbol.split_once('/').unwrap();
        MarketMeta {
            symbol: symbol.to_string(),
            base: base.to_string(),
            quote: quote.to_string(),
            min_cost: Decimal::new(1, 0),
            base_precision: 8,
            quote_precision: 8,
        }
    }

    #[test]
    fn stale_book_is_skipped_before_any_other_gate() {
        let cache = BookCache::new();
        let tri = Triangle::new("ETH/USDT", "ETH/BTC", "BTC/USDT");
        let outcome = evaluate("sim", &tri, &cache, &config(), 0.001, Decimal::new(1, 0));
        match outcome {
            EvaluationOutcome::Skip(attempt) => {
                assert_eq!(attempt.skip_reasons, vec![skip_reason::STALE_BOOK]);
            }
            _ => panic!("expected skip"),
        }
    }

    #[test]
    fn profitable_cycle_proceeds_with_sized_quantity() {
        let cache = profitable_cache();
        let tri = Triangle::new("ETH/USDT", "ETH/BTC", "BTC/USDT");
        let outcome = evaluate("sim", &tri, &cache, &config(), 0.0005, Decimal::new(1, 0));
        match outcome {
            EvaluationOutcome::Proceed { qty_base, .. } => assert!(qty_base > 0.0),
            EvaluationOutcome::Skip(attempt) => panic!("expected proceed, got skip: {:?}", attempt.skip_reasons),
        }
    }

    #[test]
    fn below_min_notional_is_skipped_after_threshold_gate() {
        let cache = profitable_cache();
        let tri = Triangle::new("ETH/USDT", "ETH/BTC", "BTC/USDT");
        let outcome = evaluate("sim", &tri, &cache, &config(), 0.0005, Decimal::new(1_000_000, 0));
        match outcome {
            EvaluationOutcome::Skip(attempt) => {
                assert_eq!(attempt.skip_reasons, vec![skip_reason::BELOW_MIN_NOTIONAL]);
            }
            _ => panic!("expected skip"),
        }
    }
}
