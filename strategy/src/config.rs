use arb_core::constants::{USDC_MINT, WSOL_MINT};
use arb_core::{Atomic, Decimal};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid threshold: {0}")]
    InvalidThreshold(String),
    #[error("invalid bounds: {0}")]
    InvalidBounds(String),
}

/// Validated search parameters. Construct with [`SearchConfig::validated`];
/// a config that passes is safe for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Start token `A`.
    pub start_token: Pubkey,
    /// Pivot token `C`.
    pub pivot_token: Pubkey,
    /// Starting notional in `A`'s atomic units.
    pub input_atomic: Atomic,
    /// `passes` threshold on the net-after-costs percentage.
    pub threshold_pct: Decimal,
    /// Triples above this raw profit are discarded as data artifacts.
    pub max_profit_pct: Decimal,
    /// Triples below `-max_loss_pct` are discarded.
    pub max_loss_pct: Decimal,
    /// Pool cap per cycle edge.
    pub max_pools_per_leg: usize,
    /// Result list cap.
    pub max_routes: usize,
    /// Anchor-pair pools outside `[median/F, median×F]` are dropped.
    pub median_outlier_factor: Decimal,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            start_token: WSOL_MINT,
            pivot_token: USDC_MINT,
            input_atomic: 1_000_000_000,
            threshold_pct: "0.1".parse().expect("literal"),
            max_profit_pct: "50".parse().expect("literal"),
            max_loss_pct: "90".parse().expect("literal"),
            max_pools_per_leg: 6,
            max_routes: 200,
            median_outlier_factor: "2.0".parse().expect("literal"),
        }
    }
}

impl SearchConfig {
    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.start_token == self.pivot_token {
            return Err(ConfigError::InvalidBounds(
                "start and pivot tokens are identical".to_string(),
            ));
        }
        if self.input_atomic == 0 {
            return Err(ConfigError::InvalidBounds("input_atomic is zero".to_string()));
        }
        if self.threshold_pct.is_negative() {
            return Err(ConfigError::InvalidThreshold(self.threshold_pct.to_string()));
        }
        if !self.max_profit_pct.is_positive() || !self.max_loss_pct.is_positive() {
            return Err(ConfigError::InvalidBounds(
                "profit/loss bounds must be positive".to_string(),
            ));
        }
        if self.median_outlier_factor <= Decimal::one() {
            return Err(ConfigError::InvalidBounds(format!(
                "median_outlier_factor must exceed 1: {}",
                self.median_outlier_factor
            )));
        }
        if self.max_pools_per_leg == 0 || self.max_routes == 0 {
            return Err(ConfigError::InvalidBounds(
                "per-leg and route caps must be nonzero".to_string(),
            ));
        }
        Ok(self)
    }
}
