//! Diagnostic-only cross-venue estimator. Never submits orders; exposed for
//! the `fitness` CLI path to report a read-only edge across two or three
//! venues' cached books.

use crate::errors::ArbitResult;
use crate::kernel;

/// Edges are `rate * (1 - fee)` per leg, already net of fee, in cycle order.
/// This is the same closed-form `net_edge_cycle` used for single-venue
/// triangles, applied here to legs sourced from distinct venues' BookCaches.
pub fn cross_venue_net_edge(edges: &[f64]) -> ArbitResult<f64> {
    kernel::net_edge_cycle(edges)
}
