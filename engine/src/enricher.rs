//! Reserve enrichment.
//!
//! Fills canonical pools with math-ready reserves, first source wins:
//! live vault balances from the oracle, then amounts cached in the raw
//! record, then pool state from an SDK quoter (concentrated pools only).
//! Vault reads are batched and bounded; a timed-out batch degrades to
//! missing balances rather than failing the run.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use arb_core::pool::{CanonicalPool, PoolKind, ReserveSource};
use arb_core::Atomic;
use futures_util::stream::{self, StreamExt};
use solana_sdk::pubkey::Pubkey;
use strategy::ports::{ReserveOracle, SwapQuoter};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichError {
    #[error("oracle batch timed out")]
    OracleTimeout,
    #[error("oracle returned no decodable balance")]
    OracleDecodeFailure,
    #[error("no reserve source available")]
    NoReserveSource,
}

impl EnrichError {
    pub fn kind(&self) -> &'static str {
        match self {
            EnrichError::OracleTimeout => "oracle_timeout",
            EnrichError::OracleDecodeFailure => "oracle_decode_failure",
            EnrichError::NoReserveSource => "no_reserve_source",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// Concurrent oracle batches in flight; the shared-resource cap.
    pub oracle_concurrency: usize,
    pub oracle_timeout: Duration,
    pub oracle_batch_size: usize,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            oracle_concurrency: 16,
            oracle_timeout: Duration::from_secs(2),
            oracle_batch_size: 100,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct EnrichStats {
    pub pools_in: u64,
    pub from_vault: u64,
    pub from_cache: u64,
    pub from_quoter: u64,
    pub no_source: u64,
    pub errors: BTreeMap<&'static str, u64>,
}

pub struct ReserveEnricher {
    oracle: Option<Arc<dyn ReserveOracle>>,
    quoter: Option<Arc<dyn SwapQuoter>>,
    cfg: EnrichConfig,
}

impl ReserveEnricher {
    pub fn new(
        oracle: Option<Arc<dyn ReserveOracle>>,
        quoter: Option<Arc<dyn SwapQuoter>>,
        cfg: EnrichConfig,
    ) -> Self {
        Self { oracle, quoter, cfg }
    }

    /// Enrich every pool; never mutates the inputs' identity fields, only
    /// produces new records with reserves and provenance stamped.
    pub async fn enrich(&self, pools: Vec<CanonicalPool>) -> (Vec<CanonicalPool>, EnrichStats) {
        let mut stats = EnrichStats {
            pools_in: pools.len() as u64,
            ..EnrichStats::default()
        };

        let balances = self.fetch_all_vault_balances(&pools, &mut stats).await;
        let now = chrono::Utc::now().timestamp();

        let mut out = Vec::with_capacity(pools.len());
        for mut pool in pools {
            if self.apply_vault_balances(&mut pool, &balances) {
                pool.reserve_source = ReserveSource::Vault;
                pool.reserve_timestamp = Some(now);
                stats.from_vault += 1;
            } else if pool.has_math_reserves()
                || (pool.kind.is_concentrated()
                    && pool.sqrt_price_x64.is_some()
                    && pool.liquidity.is_some())
            {
                pool.reserve_source = ReserveSource::Cache;
                pool.reserve_timestamp = Some(now);
                stats.from_cache += 1;
            } else if pool.kind.is_concentrated() && self.quoter.is_some() {
                if self.apply_quoter_state(&mut pool).await {
                    pool.reserve_source = ReserveSource::Quoter;
                    pool.reserve_timestamp = Some(now);
                    stats.from_quoter += 1;
                } else {
                    self.mark_no_source(&mut pool, &mut stats);
                }
            } else {
                self.mark_no_source(&mut pool, &mut stats);
            }
            out.push(pool);
        }

        info!(
            vault = stats.from_vault,
            cache = stats.from_cache,
            quoter = stats.from_quoter,
            none = stats.no_source,
            "enrichment complete"
        );
        (out, stats)
    }

    fn mark_no_source(&self, pool: &mut CanonicalPool, stats: &mut EnrichStats) {
        debug!(pool_id = %pool.pool_id, "no reserve source");
        pool.reserve_source = ReserveSource::None;
        stats.no_source += 1;
        *stats.errors.entry(EnrichError::NoReserveSource.kind()).or_insert(0) += 1;
    }

    async fn fetch_all_vault_balances(
        &self,
        pools: &[CanonicalPool],
        stats: &mut EnrichStats,
    ) -> HashMap<Pubkey, Atomic> {
        let Some(oracle) = &self.oracle else {
            return HashMap::new();
        };

        let mut wanted: HashSet<Pubkey> = HashSet::new();
        for pool in pools {
            if let (Some(x), Some(y)) = (pool.vault_x_addr, pool.vault_y_addr) {
                wanted.insert(x);
                wanted.insert(y);
            }
        }
        if wanted.is_empty() {
            return HashMap::new();
        }
        let mut addresses: Vec<Pubkey> = wanted.into_iter().collect();
        addresses.sort();

        let timeout = self.cfg.oracle_timeout;
        let batches: Vec<Vec<Pubkey>> = addresses
            .chunks(self.cfg.oracle_batch_size.max(1))
            .map(|c| c.to_vec())
            .collect();
        let results: Vec<Option<HashMap<Pubkey, Option<Atomic>>>> = stream::iter(batches)
            .map(|batch| {
                let oracle = Arc::clone(oracle);
                async move {
                    match tokio::time::timeout(timeout, oracle.fetch_vault_balances(&batch)).await
                    {
                        Ok(map) => Some(map),
                        Err(_) => None,
                    }
                }
            })
            .buffer_unordered(self.cfg.oracle_concurrency.max(1))
            .collect()
            .await;

        let mut balances = HashMap::new();
        for result in results {
            match result {
                Some(map) => {
                    for (addr, balance) in map {
                        match balance {
                            Some(b) => {
                                balances.insert(addr, b);
                            }
                            None => {
                                *stats
                                    .errors
                                    .entry(EnrichError::OracleDecodeFailure.kind())
                                    .or_insert(0) += 1;
                            }
                        }
                    }
                }
                None => {
                    warn!("vault balance batch timed out");
                    *stats.errors.entry(EnrichError::OracleTimeout.kind()).or_insert(0) += 1;
                }
            }
        }
        balances
    }

    /// True when both sides resolved from live vault balances.
    fn apply_vault_balances(
        &self,
        pool: &mut CanonicalPool,
        balances: &HashMap<Pubkey, Atomic>,
    ) -> bool {
        let (Some(vx), Some(vy)) = (pool.vault_x_addr, pool.vault_y_addr) else {
            return false;
        };
        let (Some(x), Some(y)) = (balances.get(&vx), balances.get(&vy)) else {
            return false;
        };
        if *x == 0 || *y == 0 {
            return false;
        }
        pool.x_reserve = Some(*x);
        pool.y_reserve = Some(*y);
        true
    }

    async fn apply_quoter_state(&self, pool: &mut CanonicalPool) -> bool {
        let Some(quoter) = &self.quoter else {
            return false;
        };
        match quoter.fetch_pool_state(&pool.pool_id).await {
            Ok(Some(delta)) => {
                if delta.x_reserve.is_some() {
                    pool.x_reserve = delta.x_reserve;
                }
                if delta.y_reserve.is_some() {
                    pool.y_reserve = delta.y_reserve;
                }
                if delta.sqrt_price_x64.is_some() {
                    pool.sqrt_price_x64 = delta.sqrt_price_x64;
                }
                if delta.liquidity.is_some() {
                    pool.liquidity = delta.liquidity;
                }
                if delta.tick_current.is_some() {
                    pool.tick_current = delta.tick_current;
                }
                pool.sqrt_price_x64.is_some() || pool.has_math_reserves()
            }
            Ok(None) => false,
            Err(e) => {
                warn!(pool_id = %pool.pool_id, "quoter state fetch failed: {e:#}");
                false
            }
        }
    }
}

/// Pools the search may use: everything except reserve-based pools that
/// ended enrichment with no source. Concentrated pools stay in even without
/// a source; a bound quoter can still serve their legs.
pub fn math_ready(pools: Vec<CanonicalPool>, has_quoter: bool) -> Vec<CanonicalPool> {
    pools
        .into_iter()
        .filter(|pool| {
            if pool.reserve_source != ReserveSource::None {
                return true;
            }
            match pool.kind {
                PoolKind::Cpmm | PoolKind::Dlmm => false,
                PoolKind::Clmm | PoolKind::Whirlpool => has_quoter,
            }
        })
        .collect()
}
