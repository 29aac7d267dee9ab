//! Per-venue supervisor (C8): owns one adapter, one BookCache, one
//! persistence connection and drives the attempt engine off the stream
//! multiplexer until cancelled.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::prelude::*;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapter::ExchangeAdapter;
use crate::config::Settings;
use crate::engine::{attempt, execution};
use crate::metrics::Metrics;
use crate::models::VenueConfig;
use crate::notify::{Notifier, RateGate};
use crate::persistence::Store;
use crate::stream::{self, BookCache};
use crate::triangle::{self, Triangle};
use crate::errors::ArbitResult;

/// Aggregated counters emitted on each heartbeat tick.
#[derive(Debug, Clone, Default)]
pub struct HeartbeatSummary {
    pub attempts: u64,
    pub successes: u64,
    pub hit_rate: f64,
    pub avg_latency_ms: f64,
    pub last_net: Option<f64>,
    pub last_pnl: Option<Decimal>,
}

pub struct VenueSupervisor {
    venue: String,
    adapter: Arc<dyn ExchangeAdapter>,
    config: VenueConfig,
    triangles: Vec<Triangle>,
    store: Store,
    metrics: Arc<Metrics>,
    notifier: Arc<dyn Notifier>,
    attempt_gate: RateGate,
    success_gate: RateGate,
    heartbeat_interval: Duration,
}

impl VenueSupervisor {
    /// Construct the supervisor: loads markets, filters/discovers triangles,
    /// opens persistence and inserts triangle rows.
    pub async fn new(
        venue: impl Into<String>,
        adapter: Arc<dyn ExchangeAdapter>,
        settings: &Settings,
        configured_triangles: Vec<Triangle>,
        metrics: Arc<Metrics>,
        notifier: Arc<dyn Notifier>,
    ) -> ArbitResult<Self> {
        let venue = venue.into();
        let balances = adapter.balances().await?;
        info!(venue = %venue, balances = ?balances, "starting balances");

        let markets = adapter.load_markets().await?;
        let triangles = if configured_triangles.is_empty() {
            triangle::discover_triangles(&markets)
        } else {
            configured_triangles
                .into_iter()
                .filter(|t| t.legs().iter().all(|leg| markets.contains_key(*leg)))
                .collect()
        };

        let mut store = Store::open(&settings.persistence_path)?;
        for tri in &triangles {
            store.insert_triangle(tri)?;
        }

        Ok(Self {
            venue,
            adapter,
            config: settings.venue_config.clone(),
            triangles,
            store,
            metrics,
            notifier,
            attempt_gate: RateGate::new(Duration::from_secs(5)),
            success_gate: RateGate::new(Duration::from_secs(1)),
            heartbeat_interval: Duration::from_secs(settings.heartbeat_secs),
        })
    }

    fn leg_universe(&self) -> Vec<String> {
        let mut set = HashSet::new();
        for tri in &self.triangles {
            for leg in tri.legs() {
                set.insert(leg.to_string());
            }
        }
        set.into_iter().collect()
    }

    /// Run until `cancel` fires. Closes the stream and persistence, and
    /// emits a stop notification on the way out.
    pub async fn run(mut self, cancel: CancellationToken) -> ArbitResult<()> {
        let symbols = self.leg_universe();
        let mut rx = stream::subscribe(Arc::clone(&self.adapter), symbols, 10).await?;
        let mut cache = BookCache::new();

        let mut heartbeat = tokio::time::interval(self.heartbeat_interval);
        let mut attempts = 0u64;
        let mut successes = 0u64;
        let mut latency_acc_ms = 0.0f64;
        let mut last_net = None;
        let mut last_pnl = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break;
                }
                _ = heartbeat.tick() => {
                    let hit_rate = if attempts > 0 { successes as f64 / attempts as f64 } else { 0.0 };
                    let avg_latency_ms = if attempts > 0 { latency_acc_ms / attempts as f64 } else { 0.0 };
                    info!(
                        venue = %self.venue,
                        attempts,
                        successes,
                        hit_rate,
                        avg_latency_ms,
                        ?last_net,
                        ?last_pnl,
                        "heartbeat"
                    );
                }
                update = rx.recv() => {
                    let Some(update) = update else { break; };
                    cache.update(&update.symbol, update.book);

                    let affected: Vec<Triangle> = self
                        .triangles
                        .iter()
                        .filter(|t| t.legs().contains(&update.symbol.as_str()))
                        .cloned()
                        .collect();

                    for tri in affected {
                        let started = Instant::now();
                        let taker_fee = match self.adapter.fetch_fees(&tri.leg_ab).await {
                            Ok(rates) => rates.taker,
                            Err(e) => {
                                warn!(venue = %self.venue, error = %e, "fee lookup failed");
                                self.metrics.errors_total.with_label_values(&[&self.venue]).inc();
                                continue;
                            }
                        };
                        let min_notional = self
                            .adapter
                            .min_notional(&tri.leg_ab)
                            .await
                            .unwrap_or_else(|_| Decimal::new(1, 0));

                        let outcome = attempt::evaluate(&self.venue, &tri, &cache, &self.config, taker_fee, min_notional);

                        attempts += 1;
                        self.metrics
                            .cycle_latency_seconds
                            .with_label_values(&[&self.venue])
                            .observe(started.elapsed().as_secs_f64());

                        match outcome {
                            attempt::EvaluationOutcome::Skip(a) => {
                                latency_acc_ms += a.latency_ms;
                                last_net = a.net_est;
                                for reason in &a.skip_reasons {
                                    self.metrics
                                        .skips_total
                                        .with_label_values(&[&self.venue, reason])
                                        .inc();
                                }
                                let _ = self.store.record_attempt(&a, &[]);
                                if self.attempt_gate.allow() {
                                    let _ = self.notifier.notify_attempt(&a).await;
                                }
                            }
                            attempt::EvaluationOutcome::Proceed { qty_base, attempt_template } => {
                                let bid_bc = cache
                                    .get(&tri.leg_bc)
                                    .and_then(|b| b.top_bid())
                                    .map(|l| l.price)
                                    .unwrap_or(0.0);
                                let result = execution::execute(&self.adapter, &tri, qty_base, bid_bc, attempt_template).await;

                                latency_acc_ms += result.attempt.latency_ms;
                                last_net = result.attempt.net_est;
                                if result.attempt.ok {
                                    successes += 1;
                                    last_pnl = result.attempt.realized_usdt;
                                    self.metrics.orders_total.with_label_values(&[&self.venue]).inc_by(3);
                                    self.metrics.fills_total.with_label_values(&[&self.venue]).inc_by(result.fills.len() as u64);
                                    if let Some(pnl) = result.attempt.realized_usdt.and_then(|d| d.to_f64()) {
                                        self.metrics.profit_total_usdt.with_label_values(&[&self.venue]).add(pnl);
                                    }
                                } else {
                                    self.metrics.errors_total.with_label_values(&[&self.venue]).inc();
                                }

                                let _ = self.store.record_attempt(&result.attempt, &result.fills);

                                if result.attempt.ok && self.success_gate.allow() {
                                    let _ = self.notifier.notify_success(&result.attempt).await;
                                } else if !result.attempt.ok && self.attempt_gate.allow() {
                                    let _ = self.notifier.notify_attempt(&result.attempt).await;
                                }
                            }
                        }
                    }
                }
            }
        }

        self.adapter.close().await;
        info!(venue = %self.venue, attempts, successes, "supervisor stopped");
        Ok(())
    }
}
