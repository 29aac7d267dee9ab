//! Execution protocol (C6): the three-leg IOC sequence and its failure
//! model. There is no retry of failed legs — IOC semantics plus the bounded
//! per-attempt notional are the entire risk control.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use tracing::{error, warn};

use crate::adapter::ExchangeAdapter;
use crate::models::{skip_reason, Fill, Leg, OrderSpec, Side, TriangleAttempt};
use crate::triangle::Triangle;

/// Outcome of attempting to execute a sized, gate-passed triangle.
pub struct ExecutionOutcome {
    pub attempt: TriangleAttempt,
    pub fills: Vec<Fill>,
}

/// Execute the three legs of `tri` sequentially. `qty_base` is the sized
/// quantity of AB's base asset (the intermediary asset B); `bid_bc` is used
/// to derive leg 3's quantity from leg 2's expected proceeds.
pub async fn execute(
    adapter: &Arc<dyn ExchangeAdapter>,
    tri: &Triangle,
    qty_base: f64,
    bid_bc: f64,
    mut attempt: TriangleAttempt,
) -> ExecutionOutcome {
    let [ab, bc, ac] = tri.legs();
    attempt.dry_run = adapter.dry_run();

    let leg1 = match adapter.create_order(OrderSpec::new(ab, Side::Buy, qty_base)).await {
        Ok(mut fill) => {
            fill.leg = Leg::Ab;
            fill
        }
        Err(e) => {
            error!(leg = "AB", error = %e, "leg 1 failed, aborting attempt");
            attempt.ok = false;
            attempt.skip_reasons = vec![skip_reason::ADAPTER_ERROR];
            return ExecutionOutcome { attempt, fills: vec![] };
        }
    };

    let leg2 = match adapter.create_order(OrderSpec::new(bc, Side::Sell, qty_base)).await {
        Ok(mut fill) => {
            fill.leg = Leg::Bc;
            fill
        }
        Err(e) => {
            warn!(
                leg = "BC",
                error = %e,
                "leg 2 failed after leg 1 succeeded; holding intermediary asset exposure"
            );
            attempt.ok = false;
            attempt.skip_reasons = vec![skip_reason::ADAPTER_ERROR];
            return ExecutionOutcome {
                attempt,
                fills: vec![leg1],
            };
        }
    };

    let qty_base_c = qty_base * bid_bc;
    let leg3 = match adapter.create_order(OrderSpec::new(ac, Side::Sell, qty_base_c)).await {
        Ok(mut fill) => {
            fill.leg = Leg::Ac;
            fill
        }
        Err(e) => {
            warn!(
                leg = "AC",
                error = %e,
                "leg 3 failed after legs 1-2 succeeded; holding settlement-asset exposure"
            );
            attempt.ok = false;
            attempt.skip_reasons = vec![skip_reason::ADAPTER_ERROR];
            return ExecutionOutcome {
                attempt,
                fills: vec![leg1, leg2],
            };
        }
    };

    let usdt_out = leg1.price * leg1.qty + leg1.fee;
    let usdt_in = leg3.price * leg3.qty - leg3.fee;
    let realized: Decimal = usdt_in - usdt_out;

    attempt.ok = true;
    attempt.realized_usdt = Some(realized);
    attempt.skip_reasons = Vec::new();

    ExecutionOutcome {
        attempt,
        fills: vec![leg1, leg2, leg3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::simulation::SimulationAdapter;
    use crate::models::{LegSnapshot, MarketMeta, OrderBook, OrderBookLevel, VenueConfig};
    use std::collections::HashMap;

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

    fn template_attempt(tri: &Triangle) -> TriangleAttempt {
        TriangleAttempt {
            venue: "sim".to_string(),
            leg_ab: tri.leg_ab.clone(),
            leg_bc: tri.leg_bc.clone(),
            leg_ac: tri.leg_ac.clone(),
            ts_ms: 0,
            ok: false,
            net_est: Some(0.001),
            realized_usdt: None,
            threshold_bps: VenueConfig::default().net_threshold_bps,
            notional_usd: 100.0,
            slippage_bps: 5.0,
            dry_run: true,
            latency_ms: 0.0,
            skip_reasons: Vec::new(),
            ab: LegSnapshot::default(),
            bc: LegSnapshot::default(),
            ac: LegSnapshot::default(),
            qty_base: Some(1.0),
        }
    }

    fn book(bid: f64, ask: f64) -> OrderBook {
        OrderBook {
            bids: vec![OrderBookLevel { price: bid, size: 100.0 }],
            asks: vec![OrderBookLevel { price: ask, size: 100.0 }],
        }
    }

    #[tokio::test]
    async fn successful_three_leg_sequence_computes_realized_excluding_leg2_fee() {
        let mut markets = HashMap::new();
        markets.insert("ETH/USDT".to_string(), meta("ETH/USDT"));
        markets.insert("ETH/BTC".to_string(), meta("ETH/BTC"));
        markets.insert("BTC/USDT".to_string(), meta("BTC/USDT"));
        let mut fees = HashMap::new();
        for sym in ["ETH/USDT", "ETH/BTC", "BTC/USDT"] {
            fees.insert(sym.to_string(), crate::models::FeeRates { maker: 0.001, taker: 0.001 });
        }
        let adapter = SimulationAdapter::new("sim", markets, fees, vec![]);
        adapter.seed_book("ETH/USDT", book(2000.0, 2000.0));
        adapter.seed_book("ETH/BTC", book(0.05, 0.05));
        adapter.seed_book("BTC/USDT", book(101.0, 101.0));
        let adapter: Arc<dyn ExchangeAdapter> = Arc::new(adapter);

        let tri = Triangle::new("ETH/USDT", "ETH/BTC", "BTC/USDT");
        let attempt = template_attempt(&tri);
        let outcome = execute(&adapter, &tri, 1.0, 0.05, attempt).await;

        assert!(outcome.attempt.ok);
        assert_eq!(outcome.fills.len(), 3);
        let leg2_fee = outcome.fills[1].fee;
        let usdt_out = outcome.fills[0].price * outcome.fills[0].qty + outcome.fills[0].fee;
        let usdt_in = outcome.fills[2].price * outcome.fills[2].qty - outcome.fills[2].fee;
        assert_eq!(outcome.attempt.realized_usdt, Some(usdt_in - usdt_out));
        assert!(leg2_fee > Decimal::ZERO); // recorded, but not part of realized above
    }

    #[tokio::test]
    async fn leg1_failure_aborts_with_no_fills() {
        let markets = HashMap::new();
        let adapter = SimulationAdapter::new("sim", markets, HashMap::new(), vec![]);
        // no fees/books seeded -> fetch_fees in create_order will error with UnknownSymbol
        let adapter: Arc<dyn ExchangeAdapter> = Arc::new(adapter);
        let tri = Triangle::new("ETH/USDT", "ETH/BTC", "BTC/USDT");
        let attempt = template_attempt(&tri);
        let outcome = execute(&adapter, &tri, 1.0, 0.05, attempt).await;
        assert!(!outcome.attempt.ok);
        assert!(outcome.fills.is_empty());
        assert_eq!(outcome.attempt.skip_reasons, vec![skip_reason::ADAPTER_ERROR]);
    }
}
