//! Metrics registry (C10, ambient stack). Wraps `prometheus` counters,
//! gauges and a histogram, all labelled by venue. Exposing these over HTTP
//! is out of scope; `render()` returns the exposition text for whatever
//! embeds this crate to serve.

use prometheus::{
    Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder,
};

use crate::errors::{ArbitError, ArbitResult};

pub struct Metrics {
    registry: Registry,
    pub cycle_latency_seconds: HistogramVec,
    pub orders_total: IntCounterVec,
    pub fills_total: IntCounterVec,
    pub errors_total: IntCounterVec,
    pub skips_total: IntCounterVec,
    pub profit_total_usdt: prometheus::GaugeVec,
}

impl Metrics {
    pub fn new() -> ArbitResult<Self> {
        let registry = Registry::new();

        let cycle_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "arbit_cycle_latency_seconds",
                "Wall-clock time from book update to attempt conclusion",
            ),
            &["venue"],
        )
        .map_err(|e| ArbitError::Fatal(format!("metrics: {e}")))?;

        let orders_total = IntCounterVec::new(
            prometheus::Opts::new("arbit_orders_total", "Orders submitted per venue"),
            &["venue"],
        )
        .map_err(|e| ArbitError::Fatal(format!("metrics: {e}")))?;

        let fills_total = IntCounterVec::new(
            prometheus::Opts::new("arbit_fills_total", "Fills received per venue"),
            &["venue"],
        )
        .map_err(|e| ArbitError::Fatal(format!("metrics: {e}")))?;

        let errors_total = IntCounterVec::new(
            prometheus::Opts::new("arbit_errors_total", "Adapter errors per venue"),
            &["venue"],
        )
        .map_err(|e| ArbitError::Fatal(format!("metrics: {e}")))?;

        let skips_total = IntCounterVec::new(
            prometheus::Opts::new("arbit_skips_total", "Skipped attempts per venue and reason"),
            &["venue", "reason"],
        )
        .map_err(|e| ArbitError::Fatal(format!("metrics: {e}")))?;

        let profit_total_usdt = prometheus::GaugeVec::new(
            prometheus::Opts::new("arbit_profit_total_usdt", "Cumulative realized PnL per venue"),
            &["venue"],
        )
        .map_err(|e| ArbitError::Fatal(format!("metrics: {e}")))?;

        registry
            .register(Box::new(cycle_latency_seconds.clone()))
            .map_err(|e| ArbitError::Fatal(format!("metrics register: {e}")))?;
        registry
            .register(Box::new(orders_total.clone()))
            .map_err(|e| ArbitError::Fatal(format!("metrics register: {e}")))?;
        registry
            .register(Box::new(fills_total.clone()))
            .map_err(|e| ArbitError::Fatal(format!("metrics register: {e}")))?;
        registry
            .register(Box::new(errors_total.clone()))
            .map_err(|e| ArbitError::Fatal(format!("metrics register: {e}")))?;
        registry
            .register(Box::new(skips_total.clone()))
            .map_err(|e| ArbitError::Fatal(format!("metrics register: {e}")))?;
        registry
            .register(Box::new(profit_total_usdt.clone()))
            .map_err(|e| ArbitError::Fatal(format!("metrics register: {e}")))?;

        Ok(Self {
            registry,
            cycle_latency_seconds,
            orders_total,
            fills_total,
            errors_total,
            skips_total,
            profit_total_usdt,
        })
    }

    /// Render the current state in Prometheus text exposition format.
    pub fn render(&self) -> ArbitResult<String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|e| ArbitError::Fatal(format!("metrics encode: {e}")))?;
        String::from_utf8(buffer).map_err(|e| ArbitError::Fatal(format!("metrics utf8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registers_without_name_collisions() {
        Metrics::new().unwrap();
    }

    #[test]
    fn render_includes_registered_families() {
        let metrics = Metrics::new().unwrap();
        metrics.orders_total.with_label_values(&["sim"]).inc();
        let text = metrics.render().unwrap();
        assert!(text.contains("arbit_orders_total"));
    }
}
