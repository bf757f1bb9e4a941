//! Discrete-bin swap math (DLMM).
//!
//! Each bin trades at one constant price, `(1 + bin_step)^bin_id` in human
//! y per human x. The single-bin quote converts the whole input at the
//! active-bin price, capped by the out-side reserve; the multi-bin walk
//! spills the residual into successive bins. The fee is taken on the input
//! once, up front, for both operations.

use crate::decimal::{ArithmeticError, Decimal};

#[derive(Debug, Clone)]
pub struct DlmmQuote {
    pub dy_human: Decimal,
    pub fee_paid_human: Decimal,
    /// Active-bin rate (out per in) at entry.
    pub mid_price: Decimal,
    pub exec_price: Decimal,
    pub price_impact_pct: Decimal,
    /// Bins the walk touched; 1 for the single-bin quote.
    pub bins_used: usize,
}

/// Per-bin liquidity snapshot, human units.
#[derive(Debug, Clone)]
pub struct BinLiquidity {
    pub bin_id: i32,
    pub x_human: Decimal,
    pub y_human: Decimal,
}

/// `bin_step` as a fraction: `basis_points / 10_000`.
pub fn bin_step_fraction(bin_step_bps: u16) -> Decimal {
    Decimal::from_scaled(bin_step_bps.into(), 4)
}

/// `(1 + bin_step)^bin_id`, human y per human x.
pub fn bin_price(bin_id: i32, bin_step_bps: u16) -> Result<Decimal, ArithmeticError> {
    let base = &Decimal::one() + &bin_step_fraction(bin_step_bps);
    base.powi(bin_id as i64)
}

/// `floor(ln(price) / ln(1 + bin_step))`, fixed up against exact powers the
/// same way tick lookup is.
pub fn price_to_bin_id(price: &Decimal, bin_step_bps: u16) -> Result<i32, ArithmeticError> {
    if !price.is_positive() || bin_step_bps == 0 {
        return Err(ArithmeticError::NegativeRoot);
    }
    let base = &Decimal::one() + &bin_step_fraction(bin_step_bps);
    let base_f = 1.0 + bin_step_bps as f64 / 10_000.0;
    let seed = (price.to_f64_lossy().ln() / base_f.ln()).floor() as i64;
    let mut id = seed;
    while base.powi(id)? > *price {
        id -= 1;
    }
    while base.powi(id + 1)? <= *price {
        id += 1;
    }
    i32::try_from(id).map_err(|_| ArithmeticError::Overflow)
}

/// Quote the whole input at one bin's price, capped at the out-side reserve.
pub fn quote_single_bin(
    bin_price_y_per_x: &Decimal,
    out_reserve_human: &Decimal,
    dx_human: &Decimal,
    fee_fraction: &Decimal,
    x_to_y: bool,
) -> Result<DlmmQuote, ArithmeticError> {
    let rate = direction_rate(bin_price_y_per_x, x_to_y)?;
    let fee_paid_human = dx_human * fee_fraction;
    let dx_after_fee = dx_human - &fee_paid_human;

    let theoretical = &dx_after_fee * &rate;
    let dy_human = theoretical.min(out_reserve_human.clone());

    finish_quote(dy_human, fee_paid_human, rate, dx_human, &dx_after_fee, 1)
}

/// Walk bins best-price-first until the input is consumed or liquidity runs
/// out. Bins are reordered internally: descending price for x→y, ascending
/// for y→x. The mid price for impact attribution is the active bin's rate at
/// entry, not an average over the walked bins.
pub fn quote_multi_bin(
    bins: &[BinLiquidity],
    bin_step_bps: u16,
    active_bin_id: i32,
    dx_human: &Decimal,
    fee_fraction: &Decimal,
    x_to_y: bool,
) -> Result<DlmmQuote, ArithmeticError> {
    let active_rate = direction_rate(&bin_price(active_bin_id, bin_step_bps)?, x_to_y)?;

    let mut ordered: Vec<&BinLiquidity> = bins.iter().collect();
    ordered.sort_by_key(|b| b.bin_id);
    if x_to_y {
        ordered.reverse();
    }

    let fee_paid_human = dx_human * fee_fraction;
    let dx_after_fee = dx_human - &fee_paid_human;

    let mut remaining = dx_after_fee.clone();
    let mut out_total = Decimal::zero();
    let mut bins_used = 0usize;

    for bin in ordered {
        if !remaining.is_positive() {
            break;
        }
        let out_avail = if x_to_y { &bin.y_human } else { &bin.x_human };
        if !out_avail.is_positive() {
            continue;
        }
        let rate = direction_rate(&bin_price(bin.bin_id, bin_step_bps)?, x_to_y)?;
        bins_used += 1;

        let theoretical = &remaining * &rate;
        if theoretical <= *out_avail {
            out_total = &out_total + &theoretical;
            remaining = Decimal::zero();
        } else {
            out_total = &out_total + out_avail;
            let consumed_in = out_avail.checked_div(&rate)?;
            remaining = &remaining - &consumed_in;
        }
    }

    finish_quote(
        out_total,
        fee_paid_human,
        active_rate,
        dx_human,
        &dx_after_fee,
        bins_used,
    )
}

fn direction_rate(price_y_per_x: &Decimal, x_to_y: bool) -> Result<Decimal, ArithmeticError> {
    if x_to_y {
        Ok(price_y_per_x.clone())
    } else {
        Decimal::one().checked_div(price_y_per_x)
    }
}

fn finish_quote(
    dy_human: Decimal,
    fee_paid_human: Decimal,
    mid_price: Decimal,
    dx_human: &Decimal,
    dx_after_fee: &Decimal,
    bins_used: usize,
) -> Result<DlmmQuote, ArithmeticError> {
    let exec_price = dy_human.checked_div(dx_human)?;
    let realized = dy_human.checked_div(dx_after_fee)?;
    let deviation = (&mid_price - &realized).abs();
    let price_impact_pct = &deviation.checked_div(&mid_price)? * &Decimal::from_i64(100);
    Ok(DlmmQuote {
        dy_human,
        fee_paid_human,
        mid_price,
        exec_price,
        price_impact_pct,
        bins_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_bin_price_and_id_laws() {
        assert_eq!(bin_price(0, 25).unwrap(), Decimal::one());
        assert_eq!(bin_price(1, 25).unwrap(), dec("1.0025"));
        for s in ["1", "1.3", "150", "0.004"] {
            let p = dec(s);
            let id = price_to_bin_id(&p, 25).unwrap();
            assert!(bin_price(id, 25).unwrap() <= p);
            assert!(p < bin_price(id + 1, 25).unwrap());
        }
    }

    #[test]
    fn test_single_bin_uncapped() {
        let q = quote_single_bin(&dec("2"), &dec("100"), &dec("10"), &dec("0.0025"), true).unwrap();
        // dy = 10 × 0.9975 × 2
        assert_eq!(q.dy_human, dec("19.95"));
        assert_eq!(q.fee_paid_human, dec("0.025"));
        assert_eq!(q.mid_price, dec("2"));
        // Constant price inside the bin: no slippage component at all.
        assert!(q.price_impact_pct.is_zero());
    }

    #[test]
    fn test_single_bin_capped_by_reserve() {
        let q = quote_single_bin(&dec("2"), &dec("10"), &dec("10"), &dec("0.0025"), true).unwrap();
        assert_eq!(q.dy_human, dec("10"));
        assert!(q.price_impact_pct.is_positive());
    }

    #[test]
    fn test_single_bin_reverse_direction() {
        // y → x at bin price 2 converts at rate 0.5.
        let q = quote_single_bin(&dec("2"), &dec("100"), &dec("10"), &dec("0"), false).unwrap();
        assert_eq!(q.dy_human, dec("5"));
        assert_eq!(q.mid_price, dec("0.5"));
    }

    #[test]
    fn test_multi_bin_walk_spills_downward() {
        // Active bin holds 5 y; the rest fills one bin lower.
        let bins = vec![
            BinLiquidity { bin_id: 0, x_human: dec("0"), y_human: dec("5") },
            BinLiquidity { bin_id: -1, x_human: dec("0"), y_human: dec("100") },
        ];
        let q = quote_multi_bin(&bins, 25, 0, &dec("10"), &dec("0"), true).unwrap();
        assert_eq!(q.bins_used, 2);

        // 5 y at price 1, then 5 x at price 1.0025^-1.
        let low = Decimal::one().checked_div(&dec("1.0025")).unwrap();
        let expected = &dec("5") + &(&dec("5") * &low);
        assert_eq!(q.dy_human, expected);
        assert_eq!(q.mid_price, Decimal::one());
        assert!(q.exec_price < q.mid_price);
        assert!(q.price_impact_pct.is_positive());
    }

    #[test]
    fn test_multi_bin_walk_ascending_for_reverse() {
        // y → x walks up in price: bin 1 converts better than bin 2.
        let bins = vec![
            BinLiquidity { bin_id: 2, x_human: dec("100"), y_human: dec("0") },
            BinLiquidity { bin_id: 1, x_human: dec("0.5"), y_human: dec("0") },
        ];
        let q = quote_multi_bin(&bins, 25, 1, &dec("1"), &dec("0"), false).unwrap();
        assert_eq!(q.bins_used, 2);
        // First 0.5 x from bin 1, the residual from bin 2 at a worse rate.
        assert!(q.dy_human < Decimal::one().checked_div(&bin_price(1, 25).unwrap()).unwrap());
        assert!(q.dy_human.is_positive());
    }

    #[test]
    fn test_walk_partial_fill_when_liquidity_exhausted() {
        let bins = vec![BinLiquidity { bin_id: 0, x_human: dec("0"), y_human: dec("3") }];
        let q = quote_multi_bin(&bins, 25, 0, &dec("10"), &dec("0"), true).unwrap();
        assert_eq!(q.dy_human, dec("3"));
    }
}
