//! Triangular cycle engine.
//!
//! Drives the whole search: drops anchor-pair pools whose cached reserves
//! disagree with the crowd (the classic mislabelled-vault artifact), builds
//! the pair index, enumerates `A → B → C → A` triples, chains the three leg
//! simulations, applies safety bounds, attributes analytical costs back into
//! the start token, and ranks deterministically.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arb_core::pool::CanonicalPool;
use arb_core::units::atomic_to_human;
use arb_core::{Atomic, Decimal};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, SearchConfig};
use crate::pair_index::PairIndex;
use crate::ports::SwapQuoter;
use crate::swap::{breakdown_from_leg, SwapContext, SwapLegResult};

/// Cooperative cancellation, checked between candidates and between triples.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleResult {
    pub legs: Vec<SwapLegResult>,
    pub input_atomic: Atomic,
    pub output_atomic: Atomic,
    pub raw_profit_pct: Decimal,
    pub net_after_costs_pct: Decimal,
    pub passes: bool,
}

impl CycleResult {
    /// Deterministic tie-break key: the three pool ids concatenated.
    pub fn route_key(&self) -> String {
        let mut key = String::new();
        for leg in &self.legs {
            key.push_str(&leg.pool_id);
        }
        key
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SearchStats {
    pub pools_in: u64,
    pub anchor_outliers_dropped: u64,
    pub candidate_intermediates: u64,
    pub triples_evaluated: u64,
    pub triples_discarded_bounds: u64,
    pub cycles_emitted: u64,
    pub cycles_passing: u64,
    /// Per-kind counts of legs that failed and discarded their triple.
    pub swap_errors: BTreeMap<&'static str, u64>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub cycles: Vec<CycleResult>,
    pub stats: SearchStats,
}

pub struct CycleEngine {
    cfg: SearchConfig,
    swap: SwapContext,
}

impl CycleEngine {
    /// Construction validates the config; a bad threshold or bound never
    /// reaches the search loop.
    pub fn new(
        cfg: SearchConfig,
        quoter: Option<Arc<dyn SwapQuoter>>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            cfg: cfg.validated()?,
            swap: SwapContext::new(quoter),
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.cfg
    }

    pub async fn search(&self, pools: Vec<CanonicalPool>, cancel: &CancelToken) -> SearchOutcome {
        let mut stats = SearchStats {
            pools_in: pools.len() as u64,
            ..SearchStats::default()
        };

        let pools = self.drop_anchor_outliers(pools, &mut stats);
        let index = PairIndex::build(pools);

        let a = self.cfg.start_token;
        let c = self.cfg.pivot_token;
        let k = self.cfg.max_pools_per_leg;

        let ca_edge = index.pools_for(&c, &a);
        if ca_edge.is_empty() {
            info!("no pivot↔start pools; nothing to search");
            return SearchOutcome { cycles: Vec::new(), stats };
        }
        let ca_edge: Vec<String> = ca_edge.iter().take(k).cloned().collect();

        // B ∈ (neighbors(A) ∩ neighbors(C)) \ {A, C}, in key order.
        let near_c: Vec<Pubkey> = index.neighbors_of(&c);
        let candidates: Vec<Pubkey> = index
            .neighbors_of(&a)
            .into_iter()
            .filter(|b| *b != a && *b != c && near_c.binary_search(b).is_ok())
            .collect();
        stats.candidate_intermediates = candidates.len() as u64;
        debug!(
            candidates = candidates.len(),
            pools = index.pool_count(),
            "search space prepared"
        );

        let mut cycles: Vec<CycleResult> = Vec::new();
        'outer: for b in candidates {
            if cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            let ab_edge = index.pools_for(&a, &b);
            let bc_edge = index.pools_for(&b, &c);
            for ab_id in ab_edge.iter().take(k) {
                for bc_id in bc_edge.iter().take(k) {
                    for ca_id in &ca_edge {
                        if cancel.is_cancelled() {
                            stats.cancelled = true;
                            break 'outer;
                        }
                        stats.triples_evaluated += 1;
                        let (p_ab, p_bc, p_ca) = match (
                            index.pool(ab_id),
                            index.pool(bc_id),
                            index.pool(ca_id),
                        ) {
                            (Some(x), Some(y), Some(z)) => (x, y, z),
                            _ => continue,
                        };
                        match self.simulate_triple(p_ab, p_bc, p_ca, &a, &b, &c).await {
                            Ok(Some(cycle)) => {
                                if cycle.passes {
                                    stats.cycles_passing += 1;
                                }
                                stats.cycles_emitted += 1;
                                cycles.push(cycle);
                            }
                            Ok(None) => stats.triples_discarded_bounds += 1,
                            Err(e) => {
                                debug!(%ab_id, %bc_id, %ca_id, "triple discarded: {e}");
                                *stats.swap_errors.entry(e.kind()).or_insert(0) += 1;
                            }
                        }
                    }
                }
            }
        }

        // Net descending, route key ascending: byte-identical across runs.
        cycles.sort_by(|l, r| {
            r.net_after_costs_pct
                .cmp(&l.net_after_costs_pct)
                .then_with(|| l.route_key().cmp(&r.route_key()))
        });
        cycles.truncate(self.cfg.max_routes);

        info!(
            emitted = stats.cycles_emitted,
            passing = stats.cycles_passing,
            evaluated = stats.triples_evaluated,
            "search complete"
        );
        SearchOutcome { cycles, stats }
    }

    /// One `A → B → C → A` simulation. `Ok(None)` means the safety bounds
    /// rejected the triple.
    async fn simulate_triple(
        &self,
        p_ab: &CanonicalPool,
        p_bc: &CanonicalPool,
        p_ca: &CanonicalPool,
        a: &Pubkey,
        b: &Pubkey,
        c: &Pubkey,
    ) -> Result<Option<CycleResult>, crate::swap::SwapError> {
        let input = self.cfg.input_atomic;
        let leg1 = self.swap.process_swap(p_ab, input, a, b).await?;
        let leg2 = self.swap.process_swap(p_bc, leg1.dy_atomic, b, c).await?;
        let leg3 = self.swap.process_swap(p_ca, leg2.dy_atomic, c, a).await?;

        let hundred = Decimal::from_i64(100);
        let input_dec = Decimal::from_u128(input);
        let output_dec = Decimal::from_u128(leg3.dy_atomic);
        let raw_profit_pct = (&(&output_dec - &input_dec) * &hundred)
            .checked_div(&input_dec)?;

        if raw_profit_pct > self.cfg.max_profit_pct {
            warn!(
                route = %format!("{}/{}/{}", p_ab.pool_id, p_bc.pool_id, p_ca.pool_id),
                profit = %raw_profit_pct,
                "discarding implausible profit"
            );
            return Ok(None);
        }
        let loss_floor = -&self.cfg.max_loss_pct;
        if raw_profit_pct < loss_floor {
            return Ok(None);
        }

        // Leg costs land in B, C and A respectively; later mid-prices pull
        // them all back into A. dy_atomic is never touched by any of this.
        let cost1 = breakdown_from_leg(&leg1);
        let cost2 = breakdown_from_leg(&leg2);
        let cost3 = breakdown_from_leg(&leg3);

        let cost2_in_a = &cost2.total_cost_out_human * &leg3.mid_price;
        let cost1_in_a = &(&cost1.total_cost_out_human * &leg2.mid_price) * &leg3.mid_price;
        let total_cost_a = &(&cost3.total_cost_out_human + &cost2_in_a) + &cost1_in_a;

        let in_decimals = p_ab
            .decimals_for(a)
            .unwrap_or(arb_core::constants::WSOL_DECIMALS);
        let input_human = atomic_to_human(input, in_decimals);
        let cost_pct = (&total_cost_a * &hundred).checked_div(&input_human)?;
        let net_after_costs_pct = &raw_profit_pct - &cost_pct;
        let passes = net_after_costs_pct >= self.cfg.threshold_pct;

        Ok(Some(CycleResult {
            output_atomic: leg3.dy_atomic,
            legs: vec![leg1, leg2, leg3],
            input_atomic: input,
            raw_profit_pct,
            net_after_costs_pct,
            passes,
        }))
    }

    /// Median filter on the start/pivot anchor pair. Pools of that pair whose
    /// implied price sits outside `[median/F, median×F]` are removed before
    /// indexing; their reserves are almost always mislabelled, and one such
    /// pool floods the ranking with four-digit phantom profits.
    fn drop_anchor_outliers(
        &self,
        pools: Vec<CanonicalPool>,
        stats: &mut SearchStats,
    ) -> Vec<CanonicalPool> {
        let a = self.cfg.start_token;
        let c = self.cfg.pivot_token;

        let anchor_price = |pool: &CanonicalPool| -> Option<Decimal> {
            if pool.mint_x == a && pool.mint_y == c {
                pool.implied_price_y_per_x()
            } else if pool.mint_x == c && pool.mint_y == a {
                let p = pool.implied_price_y_per_x()?;
                Decimal::one().checked_div(&p).ok()
            } else {
                None
            }
        };

        let mut prices: Vec<Decimal> = pools.iter().filter_map(anchor_price).collect();
        let Some(median) = median_of(&mut prices) else {
            return pools;
        };
        let low = match median.checked_div(&self.cfg.median_outlier_factor) {
            Ok(v) => v,
            Err(_) => return pools,
        };
        let high = &median * &self.cfg.median_outlier_factor;
        debug!(%median, %low, %high, "anchor price band");

        pools
            .into_iter()
            .filter(|pool| match anchor_price(pool) {
                Some(price) if price < low || price > high => {
                    warn!(
                        pool_id = %pool.pool_id,
                        %price,
                        %median,
                        "dropping anchor-pair outlier"
                    );
                    stats.anchor_outliers_dropped += 1;
                    false
                }
                _ => true,
            })
            .collect()
    }
}

fn median_of(prices: &mut [Decimal]) -> Option<Decimal> {
    if prices.is_empty() {
        return None;
    }
    prices.sort();
    let mid = prices.len() / 2;
    if prices.len() % 2 == 1 {
        Some(prices[mid].clone())
    } else {
        let sum = &prices[mid - 1] + &prices[mid];
        sum.checked_div(&Decimal::from_i64(2)).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::tests::cpmm_pool;
    use arb_core::constants::{USDC_MINT, WSOL_MINT};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn eth_mint() -> Pubkey {
        // Any stable key distinct from the well-known mints works here.
        Pubkey::new_from_array([7u8; 32])
    }

    /// SOL→USDC→ETH→SOL with prices 50, 2500 and 51: roughly 2% gross edge,
    /// fees and slippage leave a net just above the default threshold.
    fn profitable_triangle() -> Vec<CanonicalPool> {
        vec![
            // 10_000 SOL / 500_000 USDC
            cpmm_pool(
                "So1Usdc1111111111111111111111111111111111111",
                WSOL_MINT,
                USDC_MINT,
                9,
                6,
                10_000_000_000_000,
                500_000_000_000,
                "0.0025",
            ),
            // 1_000_000 USDC / 400 ETH (8 decimals)
            cpmm_pool(
                "UsdcEth1111111111111111111111111111111111111",
                USDC_MINT,
                eth_mint(),
                6,
                8,
                1_000_000_000_000,
                40_000_000_000,
                "0.0025",
            ),
            // 1_000 ETH / 51_000 SOL
            cpmm_pool(
                "EthSo111111111111111111111111111111111111111",
                eth_mint(),
                WSOL_MINT,
                8,
                9,
                100_000_000_000,
                51_000_000_000_000,
                "0.0025",
            ),
        ]
    }

    fn triangle_config() -> SearchConfig {
        SearchConfig {
            pivot_token: eth_mint(),
            input_atomic: 10_000_000_000, // 10 SOL
            ..SearchConfig::default()
        }
    }

    #[tokio::test]
    async fn test_profitable_triangle_found() {
        let engine = CycleEngine::new(triangle_config(), None).unwrap();
        let outcome = engine.search(profitable_triangle(), &CancelToken::new()).await;

        assert_eq!(outcome.stats.candidate_intermediates, 1);
        assert_eq!(outcome.cycles.len(), 1);
        let cycle = &outcome.cycles[0];
        assert_eq!(cycle.legs.len(), 3);
        assert_eq!(cycle.legs[0].out_mint, USDC_MINT);
        assert_eq!(cycle.legs[2].out_mint, WSOL_MINT);

        assert!(cycle.raw_profit_pct > dec("1.0") && cycle.raw_profit_pct < dec("1.2"));
        assert!(cycle.net_after_costs_pct > dec("0.1"));
        assert!(cycle.net_after_costs_pct < dec("0.2"));
        assert!(cycle.passes);
        assert!(cycle.output_atomic > cycle.input_atomic);
    }

    #[tokio::test]
    async fn test_losing_direction_not_mistaken_for_profit() {
        // Same pools, but pivoting through USDC forces the reverse triangle,
        // which the fee stack turns into a loss.
        let cfg = SearchConfig {
            input_atomic: 10_000_000_000,
            ..SearchConfig::default()
        };
        let engine = CycleEngine::new(cfg, None).unwrap();
        let outcome = engine.search(profitable_triangle(), &CancelToken::new()).await;
        assert_eq!(outcome.cycles.len(), 1);
        let cycle = &outcome.cycles[0];
        assert!(cycle.raw_profit_pct.is_negative());
        assert!(!cycle.passes);
    }

    #[tokio::test]
    async fn test_median_filter_drops_mislabelled_pool() {
        let mut pools = profitable_triangle();
        // Five healthy anchor pools around 50 USDC per SOL.
        for (i, usdc) in [49_000u128, 50_000, 50_500, 49_500, 50_250].iter().enumerate() {
            pools.push(cpmm_pool(
                &format!("Anchor{i}111111111111111111111111111111111111"),
                WSOL_MINT,
                USDC_MINT,
                9,
                6,
                1_000_000_000_000,
                usdc * 1_000_000,
                "0.0025",
            ));
        }
        // One pool whose reserves were mislabelled: implied price 20×.
        let outlier_id = "Out1ier1111111111111111111111111111111111111";
        pools.push(cpmm_pool(
            outlier_id,
            WSOL_MINT,
            USDC_MINT,
            9,
            6,
            1_000_000_000_000,
            1_000_000_000_000,
            "0.0025",
        ));

        let cfg = SearchConfig {
            input_atomic: 1_000_000_000,
            ..SearchConfig::default()
        };
        let engine = CycleEngine::new(cfg, None).unwrap();
        let outcome = engine.search(pools, &CancelToken::new()).await;

        assert_eq!(outcome.stats.anchor_outliers_dropped, 1);
        for cycle in &outcome.cycles {
            for leg in &cycle.legs {
                assert_ne!(leg.pool_id, outlier_id);
            }
        }
    }

    #[tokio::test]
    async fn test_cancellation_returns_partial() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let engine = CycleEngine::new(triangle_config(), None).unwrap();
        let outcome = engine.search(profitable_triangle(), &cancel).await;
        assert!(outcome.stats.cancelled);
        assert!(outcome.cycles.is_empty());
    }

    #[tokio::test]
    async fn test_ranking_is_deterministic() {
        let engine = CycleEngine::new(triangle_config(), None).unwrap();
        let first = engine.search(profitable_triangle(), &CancelToken::new()).await;
        let second = engine.search(profitable_triangle(), &CancelToken::new()).await;
        let keys = |o: &SearchOutcome| -> Vec<String> {
            o.cycles.iter().map(|c| c.route_key()).collect()
        };
        assert_eq!(keys(&first), keys(&second));
        assert_eq!(
            first.cycles[0].net_after_costs_pct,
            second.cycles[0].net_after_costs_pct
        );
    }

    #[tokio::test]
    async fn test_bounds_discard_phantom_profit() {
        // Absurd price gap between the two anchor legs: gross profit far
        // beyond max_profit_pct must be discarded, not ranked first.
        let b = Pubkey::new_from_array([9u8; 32]);
        let pools = vec![
            cpmm_pool(
                "Cheap1111111111111111111111111111111111111111",
                WSOL_MINT,
                b,
                9,
                9,
                1_000_000_000_000,
                1_000_000_000_000_000,
                "0",
            ),
            cpmm_pool(
                "Mid111111111111111111111111111111111111111111",
                b,
                USDC_MINT,
                9,
                6,
                1_000_000_000_000_000,
                1_000_000_000_000,
                "0",
            ),
            cpmm_pool(
                "Rich11111111111111111111111111111111111111111",
                USDC_MINT,
                WSOL_MINT,
                6,
                9,
                1_000_000_000_000,
                1_000_000_000_000_000,
                "0",
            ),
        ];
        let cfg = SearchConfig {
            input_atomic: 1_000_000_000,
            ..SearchConfig::default()
        };
        let engine = CycleEngine::new(cfg, None).unwrap();
        let outcome = engine.search(pools, &CancelToken::new()).await;
        assert!(outcome.cycles.is_empty());
        assert!(outcome.stats.triples_discarded_bounds >= 1);
    }
}
