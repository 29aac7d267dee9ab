//! Triangle model and discovery (C2).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::MarketMeta;

/// Ordered triple of market symbols closing a currency cycle on one venue.
///
/// Immutable once constructed: buying `leg_ab` at ask, selling `leg_bc` at
/// bid, and selling `leg_ac` at bid returns the starting quote currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triangle {
    pub leg_ab: String,
    pub leg_bc: String,
    pub leg_ac: String,
}

impl Triangle {
    pub fn new(leg_ab: impl Into<String>, leg_bc: impl Into<String>, leg_ac: impl Into<String>) -> Self {
        Self {
            leg_ab: leg_ab.into(),
            leg_bc: leg_bc.into(),
            leg_ac: leg_ac.into(),
        }
    }

    /// The three leg symbols, in execution order.
    pub fn legs(&self) -> [&str; 3] {
        [&self.leg_ab, &self.leg_bc, &self.leg_ac]
    }
}

/// Split `BASE/QUOTE` into its two components. Returns `None` for malformed
/// symbols (missing separator).
fn split_symbol(symbol: &str) -> Option<(&str, &str)> {
    symbol.split_once('/')
}

/// Enumerate every valid triangle in a venue's market map.
///
/// A triangle `(AB, BC, AC)` is valid iff `AB = X/Q1`, `BC = X/Y`,
/// `AC = Y/Q1` — i.e. `BC`'s base matches `AB`'s base, and `BC`'s quote
/// matches `AC`'s base, and `AC`'s quote matches `AB`'s quote. The result is
/// deterministically ordered by lexicographic `(AB, BC, AC)`.
pub fn discover_triangles(markets: &HashMap<String, MarketMeta>) -> Vec<Triangle> {
    let mut out = Vec::new();

    let mut symbols: Vec<&String> = markets.keys().collect();
    symbols.sort();

    for ab in &symbols {
        let Some((base_x, quote_q1)) = split_symbol(ab) else {
            continue;
        };
        for bc in &symbols {
            if bc == ab {
                continue;
            }
            let Some((bc_base, bc_quote)) = split_symbol(bc) else {
                continue;
            };
            if bc_base != base_x {
                continue;
            }
            let asset_y = bc_quote;
            for ac in &symbols {
                if ac == ab || ac == bc {
                    continue;
                }
                let Some((ac_base, ac_quote)) = split_symbol(ac) else {
                    continue;
                };
                if ac_base == asset_y && ac_quote == quote_q1 {
                    out.push(Triangle::new((*ab).clone(), (*bc).clone(), (*ac).clone()));
                }
            }
        }
    }

    out.sort_by(|a, b| (a.leg_ab.as_str(), a.leg_bc.as_str(), a.leg_ac.as_str())
        .cmp(&(b.leg_ab.as_str(), b.leg_bc.as_str(), b.leg_ac.as_str())));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MarketMeta;
    use rust_decimal::Decimal;

    fn meta() -> MarketMeta {
        MarketMeta {
            symbol: String::new(),
            base: String::new(),
            quote: String::new(),
            min_cost: Decimal::new(1, 0),
            base_precision: 8,
            quote_precision: 8,
        }
    }

    fn markets(symbols: &[&str]) -> HashMap<String, MarketMeta> {
        symbols
            .iter()
            .map(|s| {
                let (base, quote) = s.split_once('/').unwrap();
                let mut m = meta();
                m.symbol = s.to_string();
                m.base = base.to_string();
                m.quote = quote.to_string();
                (s.to_string(), m)
            })
            .collect()
    }

    #[test]
    fn discovers_canonical_triangle() {
        let m = markets(&["ETH/USDT", "ETH/BTC", "BTC/USDT"]);
        let tris = discover_triangles(&m);
        assert_eq!(tris, vec![Triangle::new("ETH/USDT", "ETH/BTC", "BTC/USDT")]);
    }

    #[test]
    fn ignores_unrelated_markets() {
        let m = markets(&["ETH/USDT", "ETH/BTC", "BTC/USDT", "SOL/USDT"]);
        let tris = discover_triangles(&m);
        assert_eq!(tris.len(), 1);
    }

    #[test]
    fn no_triangles_when_cycle_does_not_close() {
        let m = markets(&["ETH/USDT", "BTC/USDT"]);
        let tris = discover_triangles(&m);
        assert!(tris.is_empty());
    }

    // Property 3: closure — every discovered triple satisfies the structural
    // relation regardless of which market set it came from.
    #[test]
    fn discovery_closure_property() {
        let m = markets(&[
            "ETH/USDT", "BTC/ETH", "BTC/USDT", "SOL/USDT", "SOL/BTC", "ETH/BTC",
        ]);
        let tris = discover_triangles(&m);
        for tri in &tris {
            assert!(m.contains_key(&tri.leg_ab));
            assert!(m.contains_key(&tri.leg_bc));
            assert!(m.contains_key(&tri.leg_ac));
            let (base_ab, quote_ab) = split_symbol(&tri.leg_ab).unwrap();
            let (base_bc, quote_bc) = split_symbol(&tri.leg_bc).unwrap();
            let (base_ac, quote_ac) = split_symbol(&tri.leg_ac).unwrap();
            assert_eq!(base_ab, base_bc);
            assert_eq!(quote_ab, quote_ac);
            assert_eq!(quote_bc, base_ac);
        }
    }

    #[test]
    fn discovery_is_deterministically_ordered() {
        let m = markets(&["ETH/USDT", "BTC/ETH", "BTC/USDT", "SOL/USDT", "SOL/BTC", "ETH/BTC"]);
        let a = discover_triangles(&m);
        let b = discover_triangles(&m);
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort_by(|x, y| (x.leg_ab.as_str(), x.leg_bc.as_str(), x.leg_ac.as_str())
            .cmp(&(y.leg_ab.as_str(), y.leg_bc.as_str(), y.leg_ac.as_str())));
        assert_eq!(a, sorted);
    }
}
