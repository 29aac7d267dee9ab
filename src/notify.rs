//! Notification port (C11, ambient stack): a small trait plus a webhook
//! implementation and a per-class rate gate, so a busy venue does not spam
//! an operator's webhook on every skip.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::ArbitResult;
use crate::models::TriangleAttempt;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_attempt(&self, attempt: &TriangleAttempt) -> ArbitResult<()>;
    async fn notify_success(&self, attempt: &TriangleAttempt) -> ArbitResult<()>;
}

/// Discards every notification. Used when no webhook is configured.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify_attempt(&self, _attempt: &TriangleAttempt) -> ArbitResult<()> {
        Ok(())
    }

    async fn notify_success(&self, _attempt: &TriangleAttempt) -> ArbitResult<()> {
        Ok(())
    }
}

/// Posts a short JSON payload to a Discord-style incoming webhook.
pub struct WebhookNotifier {
    http: reqwest::Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
        }
    }

    async fn post(&self, content: String) -> ArbitResult<()> {
        let resp = self
            .http
            .post(&self.webhook_url)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await;
        if let Err(e) = resp {
            warn!(error = %e, "webhook delivery failed");
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_attempt(&self, attempt: &TriangleAttempt) -> ArbitResult<()> {
        self.post(format!(
            "[{}] {}/{}/{} skipped: {}",
            attempt.venue,
            attempt.leg_ab,
            attempt.leg_bc,
            attempt.leg_ac,
            attempt.skip_reasons_csv().unwrap_or_default()
        ))
        .await
    }

    async fn notify_success(&self, attempt: &TriangleAttempt) -> ArbitResult<()> {
        self.post(format!(
            "[{}] {}/{}/{} filled, realized={:?} USDT",
            attempt.venue, attempt.leg_ab, attempt.leg_bc, attempt.leg_ac, attempt.realized_usdt
        ))
        .await
    }
}

/// Per-notification-class rate limiter: suppresses a notification call if
/// one of the same class fired within `min_interval`.
pub struct RateGate {
    min_interval: Duration,
    last: Option<Instant>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Returns `true` if a notification should fire now, recording that it
    /// did.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.min_interval => {
                debug!("notification suppressed by rate gate");
                false
            }
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
