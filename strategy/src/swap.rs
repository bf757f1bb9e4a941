//! Swap contract layer.
//!
//! Two entry points with strictly separated jobs:
//!
//! - [`SwapContext::process_swap`] propagates an amount through one leg. The
//!   `dy_atomic` it returns is already net of fee and slippage; it is the
//!   ground truth the next leg consumes, and nothing may be subtracted from
//!   it afterwards.
//! - [`SwapContext::analytical_cost`] attributes what the trader gave up
//!   versus an infinitesimal mid-price execution, split into fee and
//!   slippage. It exists for ranking and filtering only; its numbers never
//!   touch propagated amounts. Re-applying it to `dy_atomic` double-counts.
//!
//! The two return distinct types on purpose.

use std::sync::Arc;

use arb_core::pool::{CanonicalPool, PoolKind, ReserveSource};
use arb_core::units::{atomic_to_human, human_to_atomic, Atomic};
use arb_core::{clmm, cpmm, dlmm};
use arb_core::{ArithmeticError, Decimal, UnitError};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;
use tracing::warn;

use crate::ports::SwapQuoter;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwapError {
    #[error("mint {0} is not traded by pool {1}")]
    MintMismatch(Pubkey, String),
    #[error("pool {0} has no math-ready reserves")]
    MissingReserves(String),
    #[error("pool {0} needs an external quoter for this leg")]
    NeedsQuoter(String),
    #[error("swap produced zero output")]
    ZeroOutput,
    #[error("quoter failed for pool {0}: {1}")]
    QuoterFailure(String, String),
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
    #[error(transparent)]
    Unit(#[from] UnitError),
}

impl SwapError {
    /// Stable label for stats and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SwapError::MintMismatch(..) => "mint_mismatch",
            SwapError::MissingReserves(..) => "missing_reserves",
            SwapError::NeedsQuoter(..) => "needs_quoter",
            SwapError::ZeroOutput => "zero_output",
            SwapError::QuoterFailure(..) => "quoter_failure",
            SwapError::Arithmetic(..) => "arithmetic",
            SwapError::Unit(..) => "unit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LegSource {
    Math,
    Oracle,
    Quoter,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwapLegResult {
    pub pool_id: String,
    pub in_mint: Pubkey,
    pub out_mint: Pubkey,
    pub dx_atomic: Atomic,
    pub dy_atomic: Atomic,
    pub dx_human: Decimal,
    pub dy_human: Decimal,
    pub fee_paid_in_human: Decimal,
    pub mid_price: Decimal,
    pub exec_price: Decimal,
    pub price_impact_pct: Decimal,
    pub source: LegSource,
}

/// Cost of one leg versus mid-price execution, denominated in the leg's
/// output token. Carries no amounts; it cannot be fed back into propagation.
#[derive(Debug, Clone, Serialize)]
pub struct CostBreakdown {
    pub fee_cost_out_human: Decimal,
    pub slippage_cost_out_human: Decimal,
    pub total_cost_out_human: Decimal,
}

pub struct SwapContext {
    quoter: Option<Arc<dyn SwapQuoter>>,
    boundary_sqrt_ratio: Decimal,
}

impl SwapContext {
    pub fn new(quoter: Option<Arc<dyn SwapQuoter>>) -> Self {
        Self {
            quoter,
            boundary_sqrt_ratio: clmm::default_half_tick_sqrt_ratio(),
        }
    }

    /// Override the sqrt-price ratio at which a concentrated quote counts as
    /// having crossed a tick boundary.
    pub fn with_boundary_sqrt_ratio(mut self, ratio: Decimal) -> Self {
        self.boundary_sqrt_ratio = ratio;
        self
    }

    pub fn has_quoter(&self) -> bool {
        self.quoter.is_some()
    }

    /// Simulate one swap leg. The returned `dy_atomic` is net of everything;
    /// later legs must consume it as-is.
    pub async fn process_swap(
        &self,
        pool: &CanonicalPool,
        dx_atomic: Atomic,
        in_mint: &Pubkey,
        out_mint: &Pubkey,
    ) -> Result<SwapLegResult, SwapError> {
        let forward = self.resolve_direction(pool, in_mint, out_mint)?;
        let (in_decimals, out_decimals) = if forward {
            (pool.decimals_x, pool.decimals_y)
        } else {
            (pool.decimals_y, pool.decimals_x)
        };
        let dx_human = atomic_to_human(dx_atomic, in_decimals);

        let (dy_human, fee_paid, mid, exec, impact, source) = match pool.kind {
            PoolKind::Cpmm => {
                let (x, y) = self.oriented_reserves(pool, forward)?;
                if !dx_human.is_positive() {
                    return Err(SwapError::ZeroOutput);
                }
                let q = cpmm::quote(&x, &y, &dx_human, &pool.fee_fraction)?;
                (
                    q.dy_human,
                    q.fee_paid_human,
                    q.mid_price,
                    q.exec_price,
                    q.price_impact_pct,
                    self.reserve_leg_source(pool),
                )
            }
            PoolKind::Dlmm => {
                let (_, out_reserve) = self.oriented_reserves(pool, forward)?;
                let (active_bin_id, bin_step_bps) =
                    match (pool.active_bin_id, pool.bin_step_bps) {
                        (Some(id), Some(step)) => (id, step),
                        _ => return Err(SwapError::MissingReserves(pool.pool_id.clone())),
                    };
                if !dx_human.is_positive() {
                    return Err(SwapError::ZeroOutput);
                }
                let price = dlmm::bin_price(active_bin_id, bin_step_bps)?;
                let q = dlmm::quote_single_bin(
                    &price,
                    &out_reserve,
                    &dx_human,
                    &pool.fee_fraction,
                    forward,
                )?;
                (
                    q.dy_human,
                    q.fee_paid_human,
                    q.mid_price,
                    q.exec_price,
                    q.price_impact_pct,
                    self.reserve_leg_source(pool),
                )
            }
            PoolKind::Clmm | PoolKind::Whirlpool => {
                if let Some(quoter) = &self.quoter {
                    return self
                        .quoter_leg(
                            quoter.as_ref(),
                            pool,
                            dx_atomic,
                            in_mint,
                            out_mint,
                            &dx_human,
                            forward,
                        )
                        .await;
                }
                let (sqrt_price, liquidity) = match (pool.sqrt_price_x64, pool.liquidity) {
                    (Some(s), Some(l)) if s > 0 && l > 0 => (s, l),
                    _ => return Err(SwapError::MissingReserves(pool.pool_id.clone())),
                };
                if !dx_human.is_positive() {
                    return Err(SwapError::ZeroOutput);
                }
                let q = clmm::quote_single_tick(
                    sqrt_price,
                    liquidity,
                    &dx_human,
                    &pool.fee_fraction,
                    forward,
                    in_decimals,
                    out_decimals,
                    &self.boundary_sqrt_ratio,
                )?;
                if q.crossed_tick_boundary {
                    return Err(SwapError::NeedsQuoter(pool.pool_id.clone()));
                }
                (
                    q.dy_human,
                    q.fee_paid_human,
                    q.mid_price,
                    q.exec_price,
                    q.price_impact_pct,
                    LegSource::Math,
                )
            }
        };

        let dy_atomic = human_to_atomic(&dy_human, out_decimals)?;
        if dy_atomic == 0 {
            return Err(SwapError::ZeroOutput);
        }

        Ok(SwapLegResult {
            pool_id: pool.pool_id.clone(),
            in_mint: *in_mint,
            out_mint: *out_mint,
            dx_atomic,
            dy_atomic,
            dx_human,
            dy_human,
            fee_paid_in_human: fee_paid,
            mid_price: mid,
            exec_price: exec,
            price_impact_pct: impact,
            source,
        })
    }

    /// Cost of this leg versus mid-price execution, in the output token.
    /// Ranking input only; never subtract it from a propagated amount.
    pub async fn analytical_cost(
        &self,
        pool: &CanonicalPool,
        dx_atomic: Atomic,
        in_mint: &Pubkey,
        out_mint: &Pubkey,
    ) -> Result<CostBreakdown, SwapError> {
        let leg = self.process_swap(pool, dx_atomic, in_mint, out_mint).await?;
        Ok(breakdown_from_leg(&leg))
    }

    fn resolve_direction(
        &self,
        pool: &CanonicalPool,
        in_mint: &Pubkey,
        out_mint: &Pubkey,
    ) -> Result<bool, SwapError> {
        if pool.mint_x == *in_mint && pool.mint_y == *out_mint {
            Ok(true)
        } else if pool.mint_y == *in_mint && pool.mint_x == *out_mint {
            Ok(false)
        } else {
            Err(SwapError::MintMismatch(*in_mint, pool.pool_id.clone()))
        }
    }

    /// Reserves as `(in_side, out_side)` human amounts.
    fn oriented_reserves(
        &self,
        pool: &CanonicalPool,
        forward: bool,
    ) -> Result<(Decimal, Decimal), SwapError> {
        if !pool.has_math_reserves() {
            return Err(SwapError::MissingReserves(pool.pool_id.clone()));
        }
        let x = atomic_to_human(pool.x_reserve.unwrap_or(0), pool.decimals_x);
        let y = atomic_to_human(pool.y_reserve.unwrap_or(0), pool.decimals_y);
        if forward {
            Ok((x, y))
        } else {
            Ok((y, x))
        }
    }

    fn reserve_leg_source(&self, pool: &CanonicalPool) -> LegSource {
        match pool.reserve_source {
            ReserveSource::Vault => LegSource::Oracle,
            _ => LegSource::Math,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn quoter_leg(
        &self,
        quoter: &dyn SwapQuoter,
        pool: &CanonicalPool,
        dx_atomic: Atomic,
        in_mint: &Pubkey,
        out_mint: &Pubkey,
        dx_human: &Decimal,
        forward: bool,
    ) -> Result<SwapLegResult, SwapError> {
        let q = quoter
            .quote(&pool.pool_id, in_mint, out_mint, dx_atomic)
            .await
            .map_err(|e| {
                warn!(pool_id = %pool.pool_id, "quoter error: {e:#}");
                SwapError::QuoterFailure(pool.pool_id.clone(), e.to_string())
            })?;
        if q.dy_atomic == 0 {
            return Err(SwapError::ZeroOutput);
        }

        let dy_human = atomic_to_human(q.dy_atomic, q.out_decimals);
        let fee_paid = match q.fee_paid_human {
            Some(f) => f,
            None => dx_human * &pool.fee_fraction,
        };
        let mid = match q.mid_price {
            Some(m) => m,
            None => self.spot_price_fallback(pool, forward, &dy_human, dx_human)?,
        };
        let exec = match q.exec_price {
            Some(e) => e,
            None => dy_human.checked_div(dx_human)?,
        };
        let impact = match q.price_impact_pct {
            Some(i) => i,
            None => {
                let dx_after_fee = dx_human - &fee_paid;
                if dx_after_fee.is_positive() && mid.is_positive() {
                    let realized = dy_human.checked_div(&dx_after_fee)?;
                    let deviation = (&mid - &realized).abs();
                    &deviation.checked_div(&mid)? * &Decimal::from_i64(100)
                } else {
                    Decimal::zero()
                }
            }
        };

        Ok(SwapLegResult {
            pool_id: pool.pool_id.clone(),
            in_mint: *in_mint,
            out_mint: *out_mint,
            dx_atomic,
            dy_atomic: q.dy_atomic,
            dx_human: dx_human.clone(),
            dy_human,
            fee_paid_in_human: fee_paid,
            mid_price: mid,
            exec_price: exec,
            price_impact_pct: impact,
            source: LegSource::Quoter,
        })
    }

    /// Mid price from the pool's own sqrt-price when the quoter omits one;
    /// execution price as the last resort.
    fn spot_price_fallback(
        &self,
        pool: &CanonicalPool,
        forward: bool,
        dy_human: &Decimal,
        dx_human: &Decimal,
    ) -> Result<Decimal, SwapError> {
        if let Some(s) = pool.sqrt_price_x64 {
            if s > 0 {
                let price_atomic = clmm::sqrt_price_x64_to_price(s)?;
                let (in_d, out_d) = if forward {
                    (pool.decimals_x, pool.decimals_y)
                } else {
                    (pool.decimals_y, pool.decimals_x)
                };
                let oriented = if forward {
                    price_atomic
                } else {
                    Decimal::one().checked_div(&price_atomic)?
                };
                let scale = arb_core::units::pow10(in_d)
                    .checked_div(&arb_core::units::pow10(out_d))?;
                return Ok(&oriented * &scale);
            }
        }
        Ok(dy_human.checked_div(dx_human)?)
    }
}

/// Derive the analytical breakdown from an already-simulated leg:
///
/// ```text
/// ideal_out  = dx_human × mid_price
/// fee_cost   = fee_paid_in × mid_price
/// slippage   = max(0, ideal_out − fee_cost − dy_human)
/// ```
pub fn breakdown_from_leg(leg: &SwapLegResult) -> CostBreakdown {
    let ideal_out = &leg.dx_human * &leg.mid_price;
    let fee_cost = &leg.fee_paid_in_human * &leg.mid_price;
    let residual = &(&ideal_out - &fee_cost) - &leg.dy_human;
    let slippage = residual.max(Decimal::zero());
    let total = &fee_cost + &slippage;
    CostBreakdown {
        fee_cost_out_human: fee_cost,
        slippage_cost_out_human: slippage,
        total_cost_out_human: total,
    }
}
