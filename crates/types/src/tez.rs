//! Tez amounts with checked arithmetic.
//!
//! All balances, fees and rewards in Stele are [`Tez`] values: unsigned
//! micro-tez (mutez) counts. Arithmetic is checked everywhere the protocol
//! moves money; overflow and underflow are first-class errors, never panics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use thiserror::Error;

/// Number of mutez in one tez.
pub const MUTEZ_PER_TEZ: u64 = 1_000_000;

/// Errors from checked tez arithmetic.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TezError {
    /// Addition overflowed the 64-bit mutez range.
    #[error("tez addition overflow")]
    AdditionOverflow,

    /// Subtraction went below zero.
    #[error("tez subtraction underflow")]
    SubtractionUnderflow,

    /// Multiplication overflowed the 64-bit mutez range.
    #[error("tez multiplication overflow")]
    MultiplicationOverflow,
}

/// An amount of tez, counted in mutez.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Tez(u64);

impl Tez {
    /// Zero mutez.
    pub const ZERO: Self = Self(0);

    /// One tez.
    pub const ONE: Self = Self(MUTEZ_PER_TEZ);

    /// Creates an amount from a mutez count.
    pub const fn from_mutez(mutez: u64) -> Self {
        Self(mutez)
    }

    /// Creates an amount from a whole-tez count.
    ///
    /// Returns `None` when the amount does not fit in 64-bit mutez.
    pub fn from_tez(tez: u64) -> Option<Self> {
        tez.checked_mul(MUTEZ_PER_TEZ).map(Self)
    }

    /// The raw mutez count.
    pub const fn mutez(self) -> u64 {
        self.0
    }

    /// Whether the amount is zero.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    pub fn checked_add(self, other: Self) -> Result<Self, TezError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(TezError::AdditionOverflow)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, other: Self) -> Result<Self, TezError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(TezError::SubtractionUnderflow)
    }

    /// Checked multiplication by a scalar.
    pub fn checked_mul(self, factor: u64) -> Result<Self, TezError> {
        self.0
            .checked_mul(factor)
            .map(Self)
            .ok_or(TezError::MultiplicationOverflow)
    }

    /// Integer division by a scalar; zero divisor yields zero.
    pub fn div_floor(self, divisor: u64) -> Self {
        if divisor == 0 {
            Self::ZERO
        } else {
            Self(self.0 / divisor)
        }
    }

    /// Saturating subtraction, for accounting displays only.
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl Sum for Tez {
    /// Sums mutez with saturation; protocol code uses `checked_add`.
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.map(|t| t.0).fold(0u64, u64::saturating_add))
    }
}

impl fmt::Display for Tez {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / MUTEZ_PER_TEZ;
        let frac = self.0 % MUTEZ_PER_TEZ;
        if frac == 0 {
            write!(f, "{whole} tez")
        } else {
            write!(f, "{whole}.{frac:06} tez")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_add_overflow() {
        let max = Tez::from_mutez(u64::MAX);
        assert_eq!(
            max.checked_add(Tez::from_mutez(1)),
            Err(TezError::AdditionOverflow)
        );
    }

    #[test]
    fn test_checked_sub_underflow() {
        assert_eq!(
            Tez::ZERO.checked_sub(Tez::from_mutez(1)),
            Err(TezError::SubtractionUnderflow)
        );
    }

    #[test]
    fn test_checked_mul() {
        let amount = Tez::from_tez(3).unwrap();
        assert_eq!(amount.checked_mul(2).unwrap(), Tez::from_tez(6).unwrap());
        assert!(Tez::from_mutez(u64::MAX).checked_mul(2).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Tez::from_tez(5).unwrap().to_string(), "5 tez");
        assert_eq!(Tez::from_mutez(1_500_000).to_string(), "1.500000 tez");
        assert_eq!(Tez::from_mutez(42).to_string(), "0.000042 tez");
    }
}
