//! Canonical pool record.
//!
//! Every raw pool description, whatever its source shape, is normalized into
//! this one immutable form before any math runs against it. The x/y
//! convention is strict: the `x` reserve always holds `mint_x`.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::decimal::Decimal;
use crate::units::{atomic_to_human, pow10, Atomic};

pub const MAX_TOKEN_DECIMALS: u8 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolKind {
    Cpmm,
    Clmm,
    Dlmm,
    /// Orca's CLMM dialect; same math, different account vocabulary.
    Whirlpool,
}

impl PoolKind {
    pub fn is_concentrated(&self) -> bool {
        matches!(self, PoolKind::Clmm | PoolKind::Whirlpool)
    }
}

/// Where a pool's math-ready reserves came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReserveSource {
    Vault,
    Cache,
    Quoter,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPool {
    /// Base58 pool address; the key in every index.
    pub pool_id: String,
    /// Lower-case venue tag ("raydium", "orca", "meteora", "unknown").
    pub dex: String,
    pub kind: PoolKind,

    pub mint_x: Pubkey,
    pub mint_y: Pubkey,
    pub decimals_x: u8,
    pub decimals_y: u8,
    pub symbol_x: Option<String>,
    pub symbol_y: Option<String>,

    /// Additive per-swap fee on input, in `[0, 1)`.
    pub fee_fraction: Decimal,

    pub x_reserve: Option<Atomic>,
    pub y_reserve: Option<Atomic>,

    // Concentrated-liquidity state.
    pub sqrt_price_x64: Option<u128>,
    pub liquidity: Option<u128>,
    pub tick_current: Option<i32>,
    pub tick_spacing: Option<u16>,

    // Discrete-bin state.
    pub active_bin_id: Option<i32>,
    pub bin_step_bps: Option<u16>,

    /// Token accounts a `ReserveOracle` can read live balances from.
    pub vault_x_addr: Option<Pubkey>,
    pub vault_y_addr: Option<Pubkey>,

    pub reserve_source: ReserveSource,
    pub reserve_timestamp: Option<i64>,

    pub tvl_usd: Option<Decimal>,
    pub volume_24h_usd: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("mint_x equals mint_y")]
    IdenticalMints,
    #[error("decimals out of range: x={0} y={1}")]
    DecimalsOutOfRange(u8, u8),
    #[error("fee_fraction outside [0, 1): {0}")]
    FeeOutOfRange(String),
    #[error("zero reserve on a reserve-based pool")]
    ZeroReserve,
}

impl CanonicalPool {
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        if self.mint_x == self.mint_y {
            return Err(InvariantViolation::IdenticalMints);
        }
        if self.decimals_x > MAX_TOKEN_DECIMALS || self.decimals_y > MAX_TOKEN_DECIMALS {
            return Err(InvariantViolation::DecimalsOutOfRange(
                self.decimals_x,
                self.decimals_y,
            ));
        }
        if self.fee_fraction.is_negative() || self.fee_fraction >= Decimal::one() {
            return Err(InvariantViolation::FeeOutOfRange(
                self.fee_fraction.to_string(),
            ));
        }
        if !self.kind.is_concentrated() {
            match (self.x_reserve, self.y_reserve) {
                (Some(0), _) | (_, Some(0)) => return Err(InvariantViolation::ZeroReserve),
                _ => {}
            }
        }
        Ok(())
    }

    pub fn contains_mint(&self, mint: &Pubkey) -> bool {
        self.mint_x == *mint || self.mint_y == *mint
    }

    pub fn other_mint(&self, mint: &Pubkey) -> Option<Pubkey> {
        if self.mint_x == *mint {
            Some(self.mint_y)
        } else if self.mint_y == *mint {
            Some(self.mint_x)
        } else {
            None
        }
    }

    pub fn decimals_for(&self, mint: &Pubkey) -> Option<u8> {
        if self.mint_x == *mint {
            Some(self.decimals_x)
        } else if self.mint_y == *mint {
            Some(self.decimals_y)
        } else {
            None
        }
    }

    /// Both reserves present and positive: the pool can be quoted from
    /// reserves alone.
    pub fn has_math_reserves(&self) -> bool {
        matches!((self.x_reserve, self.y_reserve), (Some(x), Some(y)) if x > 0 && y > 0)
    }

    /// Price of one human unit of `mint_x` in human units of `mint_y`,
    /// from cached reserves. `None` when either reserve is missing or zero.
    ///
    /// `y_atomic × 10^dx / (x_atomic × 10^dy)` is the same quantity as
    /// `y_human / x_human`, kept in the atomic form the anchor filter uses.
    pub fn implied_price_y_per_x(&self) -> Option<Decimal> {
        let (x, y) = (self.x_reserve?, self.y_reserve?);
        if x == 0 || y == 0 {
            return None;
        }
        let num = &Decimal::from_u128(y) * &pow10(self.decimals_x);
        let den = &Decimal::from_u128(x) * &pow10(self.decimals_y);
        num.checked_div(&den).ok()
    }

    /// Human-unit view of the reserve sitting on `mint`'s side.
    pub fn reserve_human_for(&self, mint: &Pubkey) -> Option<Decimal> {
        if self.mint_x == *mint {
            Some(atomic_to_human(self.x_reserve?, self.decimals_x))
        } else if self.mint_y == *mint {
            Some(atomic_to_human(self.y_reserve?, self.decimals_y))
        } else {
            None
        }
    }
}
