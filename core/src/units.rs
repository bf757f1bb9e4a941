//! Conversion between atomic (integer, smallest-unit) and human amounts.
//!
//! The propagation rule for the whole pipeline lives here: whenever an amount
//! crosses a swap-leg boundary it is floored into atomic units. Kernels do
//! their math in human units; value is never created by rounding.

use bigdecimal::num_bigint::BigInt;
use thiserror::Error;

use crate::decimal::Decimal;

/// Non-negative integer amount in a token's smallest unit.
pub type Atomic = u128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("negative amount cannot be represented in atomic units")]
    NegativeAtomic,
    #[error("amount exceeds the atomic representation")]
    PrecisionLoss,
}

/// Exact `a / 10^decimals`, as a pure scale shift.
pub fn atomic_to_human(a: Atomic, decimals: u8) -> Decimal {
    Decimal::from_scaled(BigInt::from(a), decimals as i64)
}

/// `floor(h × 10^decimals)`, clamped at zero for the zero value itself.
/// A strictly negative `h` is rejected rather than clamped: it signals an
/// upstream sign bug, not a rounding artifact.
pub fn human_to_atomic(h: &Decimal, decimals: u8) -> Result<Atomic, UnitError> {
    if h.is_negative() {
        return Err(UnitError::NegativeAtomic);
    }
    let scaled = h * &pow10(decimals);
    scaled.to_u128_floor().ok_or(UnitError::PrecisionLoss)
}

/// `10^decimals` as an exact Decimal.
pub fn pow10(decimals: u8) -> Decimal {
    Decimal::from_scaled(BigInt::from(1), -(decimals as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_atomic_to_human_exact() {
        assert_eq!(atomic_to_human(1_000_000_000, 9), dec("1"));
        assert_eq!(atomic_to_human(1_234_567, 6), dec("1.234567"));
        assert_eq!(atomic_to_human(1, 0), dec("1"));
    }

    #[test]
    fn test_human_to_atomic_floors() {
        assert_eq!(human_to_atomic(&dec("1.9999999999"), 9).unwrap(), 1_999_999_999);
        assert_eq!(human_to_atomic(&dec("0.0000000001"), 9).unwrap(), 0);
        assert_eq!(human_to_atomic(&dec("0"), 6).unwrap(), 0);
    }

    #[test]
    fn test_negative_rejected() {
        assert_eq!(
            human_to_atomic(&dec("-0.1"), 6),
            Err(UnitError::NegativeAtomic)
        );
    }

    #[test]
    fn test_roundtrip_never_gains() {
        for s in ["1.23456789", "0.000001", "42", "19.752964"] {
            let h = dec(s);
            for d in [0u8, 6, 9, 18] {
                let back = atomic_to_human(human_to_atomic(&h, d).unwrap(), d);
                assert!(back <= h, "roundtrip gained value at {s}/{d}");
            }
        }
        // Equality when h × 10^d is integral.
        let h = dec("1.234567");
        assert_eq!(atomic_to_human(human_to_atomic(&h, 6).unwrap(), 6), h);
    }

    #[test]
    fn test_overflow_detected() {
        let huge = dec("400000000000000000000000000000000000000");
        assert_eq!(human_to_atomic(&huge, 18), Err(UnitError::PrecisionLoss));
    }
}
