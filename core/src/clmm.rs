//! Concentrated-liquidity swap math (CLMM / Whirlpool).
//!
//! Single-tick evaluation only: the quote assumes the swap stays inside the
//! current tick's liquidity. Within one tick the response is exact,
//!
//! ```text
//!   x → y:  √P' = L·√P / (L + Δx·√P),   Δy = L·(√P − √P')
//!   y → x:  √P' = √P + Δy / L,          Δx = L·(√P' − √P) / (√P·√P')
//! ```
//!
//! in atomic units, with `√P = sqrt_price_x64 / 2^64`. When the implied
//! sqrt-price move reaches the half-tick threshold the quote flags
//! `crossed_tick_boundary`; callers needing accuracy route those legs to an
//! external quoter instead of trusting this number.

use crate::decimal::{ArithmeticError, Decimal};
use crate::units::pow10;

/// `2^64`, the Q64.64 scale factor.
pub const Q64: u128 = 1u128 << 64;

#[derive(Debug, Clone)]
pub struct ClmmQuote {
    pub dy_human: Decimal,
    pub fee_paid_human: Decimal,
    pub mid_price: Decimal,
    pub exec_price: Decimal,
    pub price_impact_pct: Decimal,
    /// True when the implied price move is at least half a tick; the value is
    /// then advisory at best.
    pub crossed_tick_boundary: bool,
}

fn q64_dec() -> Decimal {
    Decimal::from_u128(Q64)
}

/// `(sqrt_price_x64 / 2^64)^2`: spot price in atomic y per atomic x.
pub fn sqrt_price_x64_to_price(sqrt_price_x64: u128) -> Result<Decimal, ArithmeticError> {
    let s = Decimal::from_u128(sqrt_price_x64).checked_div(&q64_dec())?;
    Ok(&s * &s)
}

/// `sqrt(price) × 2^64`, floored to the integer Q64.64 representation.
pub fn price_to_sqrt_price_x64(price: &Decimal) -> Result<u128, ArithmeticError> {
    let scaled = &price.sqrt()? * &q64_dec();
    scaled.to_u128_floor().ok_or(ArithmeticError::Overflow)
}

/// `1.0001^tick`.
pub fn tick_to_price(tick: i32) -> Result<Decimal, ArithmeticError> {
    tick_base().powi(tick as i64)
}

/// `floor(ln(price) / ln(1.0001))`.
///
/// An f64 logarithm seeds the search; the returned index is then fixed up
/// against exact powers until `tick_to_price(t) ≤ price < tick_to_price(t+1)`
/// holds, so the float never decides the result.
pub fn price_to_tick(price: &Decimal) -> Result<i32, ArithmeticError> {
    if !price.is_positive() {
        return Err(ArithmeticError::NegativeRoot);
    }
    let seed = (price.to_f64_lossy().ln() / 1.0001f64.ln()).floor() as i64;
    let mut tick = seed;
    while tick_base().powi(tick)? > *price {
        tick -= 1;
    }
    while tick_base().powi(tick + 1)? <= *price {
        tick += 1;
    }
    i32::try_from(tick).map_err(|_| ArithmeticError::Overflow)
}

fn tick_base() -> Decimal {
    "1.0001".parse().expect("literal")
}

/// Sqrt-price ratio corresponding to a half-tick price move, `1.0001^(1/4)`.
pub fn default_half_tick_sqrt_ratio() -> Decimal {
    tick_base()
        .sqrt()
        .and_then(|r| r.sqrt())
        .expect("sqrt of a positive literal")
}

/// Single-tick quote. `x_to_y` selects the direction; `in_decimals` /
/// `out_decimals` describe the input and output mints respectively.
///
/// Preconditions (enforced by the contract layer): `sqrt_price_x64 > 0`,
/// `liquidity > 0`, `dx_human > 0`.
#[allow(clippy::too_many_arguments)]
pub fn quote_single_tick(
    sqrt_price_x64: u128,
    liquidity: u128,
    dx_human: &Decimal,
    fee_fraction: &Decimal,
    x_to_y: bool,
    in_decimals: u8,
    out_decimals: u8,
    boundary_sqrt_ratio: &Decimal,
) -> Result<ClmmQuote, ArithmeticError> {
    let sqrt_p = Decimal::from_u128(sqrt_price_x64).checked_div(&q64_dec())?;
    let liq = Decimal::from_u128(liquidity);

    let fee_paid_human = dx_human * fee_fraction;
    let dx_after_fee_human = dx_human - &fee_paid_human;
    let dx_after_fee_atomic = &dx_after_fee_human * &pow10(in_decimals);

    let (new_sqrt, out_atomic) = if x_to_y {
        let new_sqrt =
            (&liq * &sqrt_p).checked_div(&(&liq + &(&dx_after_fee_atomic * &sqrt_p)))?;
        let out = &liq * &(&sqrt_p - &new_sqrt);
        (new_sqrt, out)
    } else {
        let new_sqrt = &sqrt_p + &dx_after_fee_atomic.checked_div(&liq)?;
        let out = (&liq * &(&new_sqrt - &sqrt_p)).checked_div(&(&sqrt_p * &new_sqrt))?;
        (new_sqrt, out)
    };

    let dy_human = out_atomic.checked_div(&pow10(out_decimals))?;

    // Spot price in atomic out-per-in, rescaled to human units.
    let price_atomic = if x_to_y {
        &sqrt_p * &sqrt_p
    } else {
        Decimal::one().checked_div(&(&sqrt_p * &sqrt_p))?
    };
    let scale = pow10(in_decimals).checked_div(&pow10(out_decimals))?;
    let mid_price = &price_atomic * &scale;

    let exec_price = dy_human.checked_div(dx_human)?;
    let realized = dy_human.checked_div(&dx_after_fee_human)?;
    let deviation = (&mid_price - &realized).abs();
    let price_impact_pct = &deviation.checked_div(&mid_price)? * &Decimal::from_i64(100);

    let ratio = if new_sqrt >= sqrt_p {
        new_sqrt.checked_div(&sqrt_p)?
    } else {
        sqrt_p.checked_div(&new_sqrt)?
    };
    let crossed_tick_boundary = ratio >= *boundary_sqrt_ratio;

    Ok(ClmmQuote {
        dy_human,
        fee_paid_human,
        mid_price,
        exec_price,
        price_impact_pct,
        crossed_tick_boundary,
    })
}
