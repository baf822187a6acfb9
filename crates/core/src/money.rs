//! Fixed-point money amounts.
//!
//! All amounts carry exactly two fractional digits and lie in
//! `0..=Money::MAX`. Arithmetic stays in `Decimal` so sums and products never
//! drift the way binary floats do, and every operation that can grow an
//! amount is checked against the ceiling.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

const SCALE: u32 = 2;

/// Non-negative currency amount with two decimal places.
///
/// Serialized as a decimal string (`"600.00"`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Largest storable amount, `99999999.99` (a `NUMERIC(10, 2)` column).
    pub const MAX: Money = Money(Decimal::from_parts(1_410_065_407, 2, 0, false, SCALE));

    /// Build an amount, rounding to cents (midpoint away from zero).
    pub fn new(amount: Decimal) -> DomainResult<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::validation(format!(
                "amount must not be negative (got {amount})"
            )));
        }
        Self::bounded(normalize(amount))
    }

    /// Whole currency units, e.g. `Money::from_units(500)` is `500.00`.
    pub fn from_units(units: u16) -> Self {
        Self(normalize(Decimal::from(units)))
    }

    fn bounded(amount: Decimal) -> DomainResult<Self> {
        if amount > Self::MAX.0 {
            return Err(DomainError::validation(format!(
                "amount {amount} exceeds the maximum of {}",
                Self::MAX
            )));
        }
        Ok(Self(amount))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// `self × quantity`, or a validation error past [`Money::MAX`].
    pub fn times(self, quantity: u32) -> DomainResult<Self> {
        let product = self
            .0
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(|| overflow(format!("{self} * {quantity}")))?;
        Self::bounded(normalize(product))
    }

    /// `self + other`, or a validation error past [`Money::MAX`].
    pub fn try_add(self, other: Money) -> DomainResult<Self> {
        let sum = self
            .0
            .checked_add(other.0)
            .ok_or_else(|| overflow(format!("{self} + {other}")))?;
        Self::bounded(normalize(sum))
    }

    /// Sum of `amounts`, failing as soon as the running total leaves range.
    pub fn try_sum<I>(amounts: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts.into_iter().try_fold(Money::ZERO, Money::try_add)
    }

    /// `self × rate`, rounded to cents. A rate never exceeds 1, so the
    /// result stays within range.
    pub fn apply_rate(self, rate: Rate) -> Self {
        Self(normalize(self.0 * rate.value()))
    }

    /// `self - other`, or `None` when the result would be negative.
    pub fn checked_sub(self, other: Money) -> Option<Self> {
        let diff = self.0 - other.0;
        if diff.is_sign_negative() && !diff.is_zero() {
            None
        } else {
            Some(Self(normalize(diff)))
        }
    }
}

fn normalize(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(SCALE);
    rounded
}

fn overflow(expr: String) -> DomainError {
    DomainError::validation(format!("amount {expr} is out of range"))
}

impl TryFrom<Decimal> for Money {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A fraction in `0..=1`, e.g. a tax rate of `0.10`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Rate(Decimal);

impl ValueObject for Rate {}

impl Rate {
    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(DomainError::validation(format!(
                "rate must be between 0 and 1 (got {value})"
            )));
        }
        Ok(Self(value))
    }

    /// `1_000` basis points is 10%. Values above 100% are clamped.
    pub fn from_basis_points(bp: u16) -> Self {
        Self(Decimal::new(i64::from(bp.min(10_000)), 4))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Rate {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Rate::new(value)
    }
}

impl From<Rate> for Decimal {
    fn from(value: Rate) -> Self {
        value.0
    }
}
