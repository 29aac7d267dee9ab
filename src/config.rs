//! Configuration loading (ambient stack): environment-variable driven
//! settings, read once at startup, following the teacher's
//! `get_env_or_default`/`get_*_env` helper style.

use anyhow::{Context, Result};

use crate::models::VenueConfig;

/// Top-level settings shared across all venues, plus a per-venue override
/// table (§6).
#[derive(Debug, Clone)]
pub struct Settings {
    pub venues: Vec<String>,
    pub triangles_by_venue: std::collections::HashMap<String, Vec<(String, String, String)>>,
    pub dry_run: bool,
    pub metrics_port: u16,
    pub persistence_path: String,
    pub notification_webhook: Option<String>,
    pub attempt_notify: bool,
    pub heartbeat_secs: u64,
    pub venue_config: VenueConfig,
    pub api_keys: std::collections::HashMap<String, VenueCredentials>,
}

/// Per-venue API credentials, absent entries mean public-data-only access.
#[derive(Debug, Clone)]
pub struct VenueCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Settings {
    /// Load configuration from environment variables, loading a `.env`
    /// file first if present.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let venues = parse_string_list(&get_env_or_default("ARBIT_VENUES", "kraken"));

        let venue_config = VenueConfig {
            net_threshold_bps: get_f64_env("ARBIT_NET_THRESHOLD_BPS", 10.0)?,
            notional_per_trade_usd: get_f64_env("ARBIT_NOTIONAL_PER_TRADE_USD", 200.0)?,
            max_slippage_bps: get_f64_env("ARBIT_MAX_SLIPPAGE_BPS", 8.0)?,
            staleness_horizon_ms: get_u64_env("ARBIT_STALENESS_HORIZON_MS", 5_000)?,
            min_notional_usd_override: std::env::var("ARBIT_MIN_NOTIONAL_USD_OVERRIDE")
                .ok()
                .and_then(|s| s.parse().ok()),
            usdt_to_usd_alias: get_bool_env("ARBIT_USDT_TO_USD_ALIAS", false),
        };

        let mut api_keys = std::collections::HashMap::new();
        for venue in &venues {
            let prefix = venue.to_uppercase();
            if let (Ok(api_key), Ok(api_secret)) = (
                std::env::var(format!("ARBIT_{prefix}_API_KEY")),
                std::env::var(format!("ARBIT_{prefix}_API_SECRET")),
            ) {
                api_keys.insert(venue.clone(), VenueCredentials { api_key, api_secret });
            }
        }

        Ok(Self {
            venues,
            triangles_by_venue: std::collections::HashMap::new(),
            dry_run: get_bool_env("ARBIT_DRY_RUN", true),
            metrics_port: get_u32_env("ARBIT_METRICS_PORT", 9100)? as u16,
            persistence_path: get_env_or_default("ARBIT_PERSISTENCE_PATH", "arbit.db"),
            notification_webhook: std::env::var("ARBIT_NOTIFICATION_WEBHOOK").ok(),
            attempt_notify: get_bool_env("ARBIT_ATTEMPT_NOTIFY", false),
            heartbeat_secs: get_u64_env("ARBIT_HEARTBEAT_SECS", 60)?,
            venue_config,
            api_keys,
        })
    }
}

// ============================================================================
// Helper functions for environment variable parsing
// ============================================================================

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_bool_env(key: &str, default: bool) -> bool {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or(default)
}

fn get_u32_env(key: &str, default: u32) -> Result<u32> {
    Ok(std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .context(format!("failed to parse {key} as u32"))?)
}

fn get_u64_env(key: &str, default: u64) -> Result<u64> {
    Ok(std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .context(format!("failed to parse {key} as u64"))?)
}

fn get_f64_env(key: &str, default: f64) -> Result<f64> {
    Ok(std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .context(format!("failed to parse {key} as f64"))?)
}

fn parse_string_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_string_list_trims_and_drops_empties() {
        assert_eq!(parse_string_list("kraken, binance,,coinbase"), vec!["kraken", "binance", "coinbase"]);
    }

    #[test]
    fn get_bool_env_falls_back_on_missing_var() {
        std::env::remove_var("ARBIT_TEST_BOOL_MISSING");
        assert!(get_bool_env("ARBIT_TEST_BOOL_MISSING", true));
    }

    #[test]
    fn get_f64_env_parses_set_value() {
        std::env::set_var("ARBIT_TEST_F64", "12.5");
        assert_eq!(get_f64_env("ARBIT_TEST_F64", 0.0).unwrap(), 12.5);
        std::env::remove_var("ARBIT_TEST_F64");
    }
}
