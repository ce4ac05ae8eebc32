//! Currency amounts held as integer minor units (pence).
//!
//! Clients send and receive plain decimal numbers; everything inside the
//! ledger works on whole minor units so sums never pick up float error.

use std::ops::{Add, Sub};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places in the currency's minor unit.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Largest amount a single expense may carry, in minor units.
pub const MAX_EXPENSE_MINOR: i64 = 100_000_000_000;

/// An amount in minor units. Stored as a plain integer.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Rounds `value` half-up to the minor unit. Returns `None` when the
    /// rounded value does not fit in an `i64` count of pence.
    pub fn from_decimal(value: Decimal) -> Option<Self> {
        let rounded =
            value.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero);
        let minor = rounded.checked_mul(Decimal::ONE_HUNDRED)?;
        minor.to_i64().map(Money)
    }

    pub fn minor(self) -> i64 {
        self.0
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, MINOR_UNIT_SCALE)
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Half of the amount, rounded half-up to the minor unit.
    ///
    /// `self - self.half_up()` is the other half, so both halves always add
    /// back up to the full amount.
    pub fn half_up(self) -> Self {
        let half = self.0 / 2;
        if self.0 % 2 == 0 {
            Money(half)
        } else {
            Money(half + self.0.signum())
        }
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}
