//! Numeric kernel (C1): edge formula, depth sizing, fee composition.
//!
//! All arithmetic is plain `f64`; callers at the adapter boundary convert
//! from `rust_decimal::Decimal` first. The formulas are deliberately free of
//! I/O so they can be proptested in isolation.

use crate::errors::ArbitError;

/// Top-of-book `(price, size)` for a monotone level list, or `(None, None)`
/// when the list is empty.
pub fn top(levels: &[(f64, f64)]) -> (Option<f64>, Option<f64>) {
    match levels.first() {
        Some(&(price, size)) => (Some(price), Some(size)),
        None => (None, None),
    }
}

/// Net fractional return of completing one triangle at top-of-book, paying
/// the venue's taker fee three times.
///
/// `net_edge = (1/ask_ab) * bid_bc * bid_ac * (1-fee)^3 - 1`
pub fn net_edge(ask_ab: f64, bid_bc: f64, bid_ac: f64, fee: f64) -> Result<f64, ArbitError> {
    if ask_ab <= 0.0 || bid_bc <= 0.0 || bid_ac <= 0.0 {
        return Err(ArbitError::InvalidQuote(format!(
            "net_edge requires strictly positive inputs, got ask_ab={ask_ab}, bid_bc={bid_bc}, bid_ac={bid_ac}"
        )));
    }
    let gross = (1.0 / ask_ab) * bid_bc * bid_ac;
    let fee_multiplier = (1.0 - fee).powi(3);
    Ok(gross * fee_multiplier - 1.0)
}

/// Generalized product-of-edges form used by the read-only cross-venue
/// estimator: `net_edge_cycle(edges) = product(edges) - 1`.
pub fn net_edge_cycle(edges: &[f64]) -> Result<f64, ArbitError> {
    if edges.is_empty() {
        return Err(ArbitError::InvalidQuote("empty edge cycle".into()));
    }
    if edges.iter().any(|&e| e <= 0.0) {
        return Err(ArbitError::InvalidQuote(
            "net_edge_cycle requires strictly positive edges".into(),
        ));
    }
    Ok(edges.iter().product::<f64>() - 1.0)
}

/// Depth-safety-margin sizing: `min(notional_quote/best_ask_price, best_ask_qty * 0.9)`.
///
/// Zero if either input is zero or negative. The 0.9 factor is part of the
/// contract, not a tunable.
pub fn size_from_depth(notional_quote: f64, best_ask_price: f64, best_ask_qty: f64) -> f64 {
    const DEPTH_SAFETY_MARGIN: f64 = 0.9;
    if best_ask_price <= 0.0 || best_ask_qty <= 0.0 {
        return 0.0;
    }
    (notional_quote / best_ask_price).min(best_ask_qty * DEPTH_SAFETY_MARGIN)
}

/// Volume-weighted average fill price walking a book's levels for `qty`
/// units, used by the slippage guard (§4.5 step 5). Returns `None` if the
/// book does not have enough depth to fill `qty`.
pub fn vwap_fill_price(levels: &[(f64, f64)], qty: f64) -> Option<f64> {
    if qty <= 0.0 {
        return None;
    }
    let mut remaining = qty;
    let mut cost = 0.0;
    for &(price, size) in levels {
        if remaining <= 0.0 {
            break;
        }
        let filled = remaining.min(size);
        cost += filled * price;
        remaining -= filled;
    }
    if remaining > 1e-12 {
        return None;
    }
    Some(cost / qty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn top_of_empty_is_none() {
        assert_eq!(top(&[]), (None, None));
    }

    #[test]
    fn top_of_nonempty_is_first() {
        assert_eq!(top(&[(100.0, 5.0), (99.0, 3.0)]), (Some(100.0), Some(5.0)));
    }

    #[test]
    fn net_edge_rejects_nonpositive_inputs() {
        assert!(net_edge(0.0, 1.0, 1.0, 0.001).is_err());
        assert!(net_edge(1.0, -1.0, 1.0, 0.001).is_err());
    }

    #[test]
    fn net_edge_matches_closed_form() {
        let (ask, bid_bc, bid_ac, fee) = (2000.0_f64, 0.051_f64, 102.5_f64, 0.001_f64);
        let got = net_edge(ask, bid_bc, bid_ac, fee).unwrap();
        let want = (bid_bc * bid_ac / ask) * (1.0 - fee).powi(3) - 1.0;
        assert!((got - want).abs() < 1e-12);
    }

    #[test]
    fn size_from_depth_is_bounded() {
        assert_eq!(size_from_depth(1000.0, 100.0, 1.0), 0.9);
        assert_eq!(size_from_depth(10.0, 100.0, 1.0), 0.1);
        assert_eq!(size_from_depth(1000.0, 0.0, 1.0), 0.0);
        assert_eq!(size_from_depth(1000.0, 100.0, 0.0), 0.0);
    }

    #[test]
    fn vwap_walks_multiple_levels() {
        let levels = [(100.0, 2.0), (101.0, 2.0)];
        let price = vwap_fill_price(&levels, 3.0).unwrap();
        let want = (2.0 * 100.0 + 1.0 * 101.0) / 3.0;
        assert!((price - want).abs() < 1e-9);
    }

    #[test]
    fn vwap_none_when_insufficient_depth() {
        let levels = [(100.0, 1.0)];
        assert!(vwap_fill_price(&levels, 5.0).is_none());
    }

    proptest! {
        // Property 1: edge formula exactness for all positive inputs.
        #[test]
        fn prop_net_edge_exactness(
            ask in 0.0001f64..1e6,
            bid_bc in 0.0001f64..1e6,
            bid_ac in 0.0001f64..1e6,
            fee in 0.0f64..0.01,
        ) {
            let got = net_edge(ask, bid_bc, bid_ac, fee).unwrap();
            let want = (bid_bc * bid_ac / ask) * (1.0 - fee).powi(3) - 1.0;
            prop_assert!((got - want).abs() < 1e-9 * want.abs().max(1.0));
        }

        // Property 2: sizing bound.
        #[test]
        fn prop_size_from_depth_bound(
            notional in 1.0f64..1e6,
            price in 0.0001f64..1e6,
            qty in 0.0001f64..1e6,
        ) {
            let sized = size_from_depth(notional, price, qty);
            prop_assert!(sized <= notional / price + 1e-9);
            prop_assert!(sized <= qty * 0.9 + 1e-9);
        }
    }
}
