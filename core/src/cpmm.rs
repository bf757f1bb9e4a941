//! Constant-product swap math, `x · y = k`.
//!
//! The closed form works entirely in human units. Fee and slippage are kept
//! separable on purpose: `exec_price` carries both, `price_impact_pct` is
//! fee-stripped (it divides by the post-fee input), so downstream cost
//! attribution can split the two without double counting.

use crate::decimal::{ArithmeticError, Decimal};

#[derive(Debug, Clone)]
pub struct CpmmQuote {
    pub dy_human: Decimal,
    pub fee_paid_human: Decimal,
    /// Out-per-in at the pre-trade state, `y / x`.
    pub mid_price: Decimal,
    /// Out-per-in observed for the full trade, fee included.
    pub exec_price: Decimal,
    pub price_impact_pct: Decimal,
}

/// Quote `dx_human` of the x side against reserves `(x_human, y_human)`.
/// Callers wanting the reverse direction pass the reserves swapped.
///
/// Preconditions (enforced by the contract layer): all inputs strictly
/// positive, `fee_fraction` in `[0, 1)`.
pub fn quote(
    x_human: &Decimal,
    y_human: &Decimal,
    dx_human: &Decimal,
    fee_fraction: &Decimal,
) -> Result<CpmmQuote, ArithmeticError> {
    let fee_paid = dx_human * fee_fraction;
    let dx_after_fee = dx_human - &fee_paid;

    let dy_human = (y_human * &dx_after_fee).checked_div(&(x_human + &dx_after_fee))?;

    let mid_price = y_human.checked_div(x_human)?;
    let exec_price = dy_human.checked_div(dx_human)?;

    let realized = dy_human.checked_div(&dx_after_fee)?;
    let deviation = (&mid_price - &realized).abs();
    let price_impact_pct = &deviation.checked_div(&mid_price)? * &Decimal::from_i64(100);

    Ok(CpmmQuote {
        dy_human,
        fee_paid_human: fee_paid,
        mid_price,
        exec_price,
        price_impact_pct,
    })
}
