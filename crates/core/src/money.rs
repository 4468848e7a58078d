//! Fixed-point money with an externally supplied rounding rule.
//!
//! The core never resolves currencies or exchange rates; callers inject a
//! [`Rounding`] (minor-unit decimal places + rounding mode) and every monetary
//! computation is deterministic under it.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Rounding mode for monetary computations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Round half away from zero ("commercial" rounding). Default.
    HalfUp,
    /// Round half to even (banker's rounding).
    HalfEven,
    /// Truncate toward zero.
    Down,
}

impl RoundingMode {
    fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
            RoundingMode::Down => RoundingStrategy::ToZero,
        }
    }
}

/// Currency rounding configuration, supplied by the caller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rounding {
    /// Number of minor-unit decimal places (2 for EUR cents).
    pub decimal_places: u32,
    pub mode: RoundingMode,
}

impl Default for Rounding {
    fn default() -> Self {
        Self {
            decimal_places: 2,
            mode: RoundingMode::HalfUp,
        }
    }
}

/// Fixed-point monetary amount.
///
/// Value object: compared by value, immutable, no currency identity (the
/// calling layer tracks which currency a ledger is denominated in).
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Build from minor units (e.g. cents): `from_minor_units(100_000, 2)` is 1000.00.
    pub fn from_minor_units(minor: i64, decimal_places: u32) -> Self {
        Self(Decimal::new(minor, decimal_places))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("money addition overflow"))
    }

    pub fn checked_sub(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_sub(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("money subtraction overflow"))
    }

    /// Round to the configured minor unit.
    pub fn rounded(self, rounding: Rounding) -> Money {
        Money(
            self.0
                .round_dp_with_strategy(rounding.decimal_places, rounding.mode.strategy()),
        )
    }

    /// Convert to minor units after rounding; errors if the value does not
    /// fit an i64 (unrealistic for ledger amounts, but never silently wraps).
    pub fn to_minor_units(self, rounding: Rounding) -> DomainResult<i64> {
        let scale = 10i64.checked_pow(rounding.decimal_places).ok_or_else(|| {
            DomainError::validation(format!(
                "{} decimal places exceed the representable minor-unit scale",
                rounding.decimal_places
            ))
        })?;
        let scaled = self
            .rounded(rounding)
            .0
            .checked_mul(Decimal::from(scale))
            .ok_or_else(|| DomainError::validation("money scale overflow"))?;
        scaled
            .to_i64()
            .ok_or_else(|| DomainError::validation("money does not fit minor units"))
    }

    /// Multiply by a rate (e.g. a discount rate of 0.02) and round to the
    /// minor unit under the supplied rounding rule.
    pub fn apply_rate(self, rate: Decimal, rounding: Rounding) -> DomainResult<Money> {
        let raw = self
            .0
            .checked_mul(rate)
            .ok_or_else(|| DomainError::validation("rate multiplication overflow"))?;
        Ok(Money(raw).rounded(rounding))
    }

    /// Split into `parts` equal minor-unit shares; the division remainder is
    /// folded into the last share so the shares sum exactly to `self`.
    pub fn split_even(self, parts: u32, rounding: Rounding) -> DomainResult<Vec<Money>> {
        if parts == 0 {
            return Err(DomainError::validation("cannot split into zero parts"));
        }
        let minor = self.to_minor_units(rounding)?;
        let n = i64::from(parts);
        let share = minor / n;
        let remainder = minor - share * n;

        let mut shares = vec![Money::from_minor_units(share, rounding.decimal_places); parts as usize];
        if let Some(last) = shares.last_mut() {
            *last = Money::from_minor_units(share + remainder, rounding.decimal_places);
        }
        Ok(shares)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
