use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use arb_core::Decimal;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;

use crate::enricher::EnrichConfig;
use crate::normalizer::NormalizerConfig;
use strategy::SearchConfig;

/// Raw configuration as loaded from file + environment. Decimal-valued
/// fields are strings so no binary float ever sits between the operator and
/// the math; [`BotConfig::search_config`] parses and validates them.
#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    pub pool_cache_path: String,
    #[serde(default)]
    pub report_json_path: Option<String>,
    #[serde(default)]
    pub metrics_port: Option<u16>,

    #[serde(default)]
    pub start_token: Option<String>,
    #[serde(default)]
    pub pivot_token: Option<String>,
    #[serde(default)]
    pub input_atomic: Option<u64>,
    #[serde(default)]
    pub threshold_pct: Option<String>,
    #[serde(default)]
    pub max_profit_pct: Option<String>,
    #[serde(default)]
    pub max_loss_pct: Option<String>,
    #[serde(default)]
    pub max_pools_per_leg: Option<usize>,
    #[serde(default)]
    pub max_routes: Option<usize>,
    #[serde(default)]
    pub median_outlier_factor: Option<String>,
    #[serde(default)]
    pub min_tvl_usd: Option<String>,
    #[serde(default)]
    pub min_volume_24h_usd: Option<String>,

    #[serde(default)]
    pub oracle_concurrency: Option<usize>,
    #[serde(default)]
    pub oracle_timeout_ms: Option<u64>,
}

impl BotConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            // Start with default values or a local config file if it exists
            .add_source(File::with_name("config/default").required(false))
            // Override with environment variables
            .add_source(Environment::default().separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn search_config(&self) -> anyhow::Result<SearchConfig> {
        let mut cfg = SearchConfig::default();
        if let Some(s) = &self.start_token {
            cfg.start_token = Pubkey::from_str(s).context("start_token is not base58")?;
        }
        if let Some(s) = &self.pivot_token {
            cfg.pivot_token = Pubkey::from_str(s).context("pivot_token is not base58")?;
        }
        if let Some(v) = self.input_atomic {
            cfg.input_atomic = v as u128;
        }
        if let Some(s) = &self.threshold_pct {
            cfg.threshold_pct = parse_decimal("threshold_pct", s)?;
        }
        if let Some(s) = &self.max_profit_pct {
            cfg.max_profit_pct = parse_decimal("max_profit_pct", s)?;
        }
        if let Some(s) = &self.max_loss_pct {
            cfg.max_loss_pct = parse_decimal("max_loss_pct", s)?;
        }
        if let Some(v) = self.max_pools_per_leg {
            cfg.max_pools_per_leg = v;
        }
        if let Some(v) = self.max_routes {
            cfg.max_routes = v;
        }
        if let Some(s) = &self.median_outlier_factor {
            cfg.median_outlier_factor = parse_decimal("median_outlier_factor", s)?;
        }
        Ok(cfg.validated()?)
    }

    pub fn normalizer_config(&self) -> anyhow::Result<NormalizerConfig> {
        let mut cfg = NormalizerConfig::default();
        if let Some(s) = &self.min_tvl_usd {
            cfg.min_tvl_usd = parse_decimal("min_tvl_usd", s)?;
        }
        if let Some(s) = &self.min_volume_24h_usd {
            cfg.min_volume_24h_usd = parse_decimal("min_volume_24h_usd", s)?;
        }
        Ok(cfg)
    }

    pub fn enrich_config(&self) -> EnrichConfig {
        let mut cfg = EnrichConfig::default();
        if let Some(v) = self.oracle_concurrency {
            cfg.oracle_concurrency = v;
        }
        if let Some(ms) = self.oracle_timeout_ms {
            cfg.oracle_timeout = Duration::from_millis(ms);
        }
        cfg
    }
}

fn parse_decimal(name: &str, s: &str) -> anyhow::Result<Decimal> {
    s.parse::<Decimal>()
        .map_err(|e| anyhow::anyhow!("{name} is not a decimal ({e}): {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_core::constants::USDC_MINT;

    fn base_config() -> BotConfig {
        BotConfig {
            pool_cache_path: "pools.json".to_string(),
            report_json_path: None,
            metrics_port: None,
            start_token: None,
            pivot_token: None,
            input_atomic: None,
            threshold_pct: None,
            max_profit_pct: None,
            max_loss_pct: None,
            max_pools_per_leg: None,
            max_routes: None,
            median_outlier_factor: None,
            min_tvl_usd: None,
            min_volume_24h_usd: None,
            oracle_concurrency: None,
            oracle_timeout_ms: None,
        }
    }

    #[test]
    fn test_defaults_fill_search_config() {
        let cfg = base_config().search_config().unwrap();
        assert_eq!(cfg.input_atomic, 1_000_000_000);
        assert_eq!(cfg.pivot_token, USDC_MINT);
        assert_eq!(cfg.max_routes, 200);
    }

    #[test]
    fn test_overrides_applied_and_validated() {
        let mut raw = base_config();
        raw.threshold_pct = Some("0.5".to_string());
        raw.input_atomic = Some(25_000_000);
        let cfg = raw.search_config().unwrap();
        assert_eq!(cfg.threshold_pct, "0.5".parse().unwrap());
        assert_eq!(cfg.input_atomic, 25_000_000);

        let mut raw = base_config();
        raw.threshold_pct = Some("-4".to_string());
        assert!(raw.search_config().is_err());

        let mut raw = base_config();
        raw.threshold_pct = Some("not-a-number".to_string());
        assert!(raw.search_config().is_err());
    }

    #[test]
    fn test_bad_pubkey_rejected() {
        let mut raw = base_config();
        raw.start_token = Some("xyz".to_string());
        assert!(raw.search_config().is_err());
    }
}
