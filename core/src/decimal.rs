//! Exact decimal arithmetic for swap math.
//!
//! All amounts and prices in the simulator are carried as `Decimal`, a thin
//! wrapper over `bigdecimal::BigDecimal` that pins the precision and rounding
//! policy in one place: at least [`PRECISION`] significant digits, and every
//! inexact operation (division, square root, negative powers) rounds toward
//! zero. Addition, subtraction and multiplication are exact.

use std::cmp::Ordering;
use std::fmt;
use std::num::NonZeroU64;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use bigdecimal::num_bigint::BigInt;
use bigdecimal::{BigDecimal, RoundingMode};
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Significant digits kept by inexact operations.
pub const PRECISION: u64 = 40;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("square root of a negative number")]
    NegativeRoot,
    #[error("value does not fit the target representation")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Decimal(BigDecimal);

impl Decimal {
    pub fn zero() -> Self {
        Decimal(BigDecimal::zero())
    }

    pub fn one() -> Self {
        Decimal(BigDecimal::from(1))
    }

    pub fn from_u128(v: u128) -> Self {
        Decimal(BigDecimal::from(v))
    }

    pub fn from_i64(v: i64) -> Self {
        Decimal(BigDecimal::from(v))
    }

    /// Exact value `mantissa × 10^(-scale)`.
    pub fn from_scaled(mantissa: BigInt, scale: i64) -> Self {
        Decimal(BigDecimal::new(mantissa, scale))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > BigDecimal::zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < BigDecimal::zero()
    }

    pub fn abs(&self) -> Self {
        Decimal(self.0.abs())
    }

    /// Rounds toward zero at [`PRECISION`] significant digits.
    fn trim(inner: BigDecimal) -> Self {
        let prec = NonZeroU64::new(PRECISION).unwrap();
        Decimal(inner.with_precision_round(prec, RoundingMode::Down))
    }

    pub fn checked_div(&self, rhs: &Decimal) -> Result<Decimal, ArithmeticError> {
        if rhs.is_zero() {
            return Err(ArithmeticError::DivisionByZero);
        }
        Ok(Self::trim(&self.0 / &rhs.0))
    }

    pub fn sqrt(&self) -> Result<Decimal, ArithmeticError> {
        match self.0.sqrt() {
            Some(root) => Ok(Self::trim(root)),
            None => Err(ArithmeticError::NegativeRoot),
        }
    }

    /// Integer power by squaring. Intermediate products are trimmed so large
    /// exponents (tick and bin indices) stay bounded in width; negative
    /// exponents divide, which rounds toward zero like any division.
    pub fn powi(&self, exp: i64) -> Result<Decimal, ArithmeticError> {
        if exp == 0 {
            return Ok(Decimal::one());
        }
        let mut base = if exp < 0 {
            Decimal::one().checked_div(self)?
        } else {
            self.clone()
        };
        let mut remaining = exp.unsigned_abs();
        let mut acc = Decimal::one();
        while remaining > 0 {
            if remaining & 1 == 1 {
                acc = Self::trim(&acc.0 * &base.0);
            }
            base = Self::trim(&base.0 * &base.0);
            remaining >>= 1;
        }
        Ok(acc)
    }

    /// Largest integer ≤ self.
    pub fn floor(&self) -> Decimal {
        Decimal(self.0.with_scale_round(0, RoundingMode::Floor))
    }

    /// Smallest integer ≥ self.
    pub fn ceil(&self) -> Decimal {
        Decimal(self.0.with_scale_round(0, RoundingMode::Ceiling))
    }

    pub fn min(self, other: Decimal) -> Decimal {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    pub fn max(self, other: Decimal) -> Decimal {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    /// Truncation toward zero into `u128`. `None` when negative or too wide.
    pub fn to_u128_floor(&self) -> Option<u128> {
        if self.is_negative() {
            return None;
        }
        self.0.with_scale_round(0, RoundingMode::Down).to_u128()
    }

    /// Lossy view for log seeding and display; never fed back into amounts.
    pub fn to_f64_lossy(&self) -> f64 {
        self.0.to_f64().unwrap_or(f64::NAN)
    }
}

impl FromStr for Decimal {
    type Err = bigdecimal::ParseBigDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigDecimal::from_str(s).map(Decimal)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Add for &Decimal {
    type Output = Decimal;
    fn add(self, rhs: &Decimal) -> Decimal {
        Decimal(&self.0 + &rhs.0)
    }
}

impl Sub for &Decimal {
    type Output = Decimal;
    fn sub(self, rhs: &Decimal) -> Decimal {
        Decimal(&self.0 - &rhs.0)
    }
}

impl Mul for &Decimal {
    type Output = Decimal;
    fn mul(self, rhs: &Decimal) -> Decimal {
        Decimal(&self.0 * &rhs.0)
    }
}

impl Neg for &Decimal {
    type Output = Decimal;
    fn neg(self) -> Decimal {
        Decimal(-&self.0)
    }
}
