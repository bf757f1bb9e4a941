// Port definitions for the hexagonal boundary.
// Everything that touches the chain (pool caches, vault balances, SDK
// quotes) arrives through these traits; the engine itself never does I/O.

use std::collections::HashMap;

use anyhow::Result;
use arb_core::{Atomic, Decimal};
use solana_sdk::pubkey::Pubkey;

/// Free-form attribute bag as delivered by a pool cache. The normalizer is
/// the only component that looks inside.
pub type RawPoolRecord = serde_json::Value;

/// Supplier of raw pool descriptions (file cache, HTTP snapshot, fixture).
#[async_trait::async_trait]
pub trait PoolSource: Send + Sync {
    async fn load(&self) -> Result<Vec<RawPoolRecord>>;
}

/// Live vault-balance reader. Implementations may batch and retry
/// internally; an address that cannot be decoded maps to `None` rather than
/// failing the batch. Must be safe for concurrent use by a bounded number of
/// callers.
#[async_trait::async_trait]
pub trait ReserveOracle: Send + Sync {
    async fn fetch_vault_balances(&self, addresses: &[Pubkey]) -> HashMap<Pubkey, Option<Atomic>>;
}

/// External quote for a CLMM/Whirlpool leg. Optional fields fall back to
/// values derived from the pool's own state.
#[derive(Debug, Clone)]
pub struct QuoterQuote {
    pub dy_atomic: Atomic,
    pub out_decimals: u8,
    pub fee_paid_human: Option<Decimal>,
    pub mid_price: Option<Decimal>,
    pub exec_price: Option<Decimal>,
    pub price_impact_pct: Option<Decimal>,
}

/// Partial pool state fetched from an SDK adapter, used by the enricher as
/// the last reserve source for concentrated pools.
#[derive(Debug, Clone, Default)]
pub struct PoolStateDelta {
    pub x_reserve: Option<Atomic>,
    pub y_reserve: Option<Atomic>,
    pub sqrt_price_x64: Option<u128>,
    pub liquidity: Option<u128>,
    pub tick_current: Option<i32>,
}

/// SDK-backed swap quoter for pools whose math needs live tick or bin
/// arrays. Bound optionally; without it, concentrated legs whose quote would
/// cross a tick boundary are refused rather than approximated.
#[async_trait::async_trait]
pub trait SwapQuoter: Send + Sync {
    async fn quote(
        &self,
        pool_id: &str,
        in_mint: &Pubkey,
        out_mint: &Pubkey,
        dx_atomic: Atomic,
    ) -> Result<QuoterQuote>;

    async fn fetch_pool_state(&self, pool_id: &str) -> Result<Option<PoolStateDelta>>;
}
