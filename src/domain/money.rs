//! Monetary amounts in integer minor units.
//!
//! Clients send tips as decimal major units (`5.00` euros). Everything past
//! the API boundary works in [`MinorUnits`] (cents) so that comparisons and
//! sums are exact.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Number of minor units in one major unit for every supported currency.
const MINOR_PER_MAJOR: i64 = 100;

/// Error raised when a client-supplied amount cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    /// The amount was NaN or infinite.
    #[error("amount is not a finite number")]
    NotFinite,
    /// The amount was below zero.
    #[error("amount must not be negative")]
    Negative,
    /// The amount does not fit in the minor-unit range.
    #[error("amount is too large")]
    Overflow,
}

/// Monetary amount in minor currency units (e.g. cents).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct MinorUnits(i64);

impl MinorUnits {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Wraps a raw minor-unit count.
    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// Converts a decimal major-unit amount, rounding to the nearest minor unit.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError`] for NaN, infinite, negative or out-of-range values.
    pub fn from_major(major: f64) -> Result<Self, MoneyError> {
        if !major.is_finite() {
            return Err(MoneyError::NotFinite);
        }
        if major < 0.0 {
            return Err(MoneyError::Negative);
        }
        let minor = (major * MINOR_PER_MAJOR as f64).round();
        if minor > i64::MAX as f64 {
            return Err(MoneyError::Overflow);
        }
        #[allow(clippy::cast_possible_truncation)]
        let minor = minor as i64;
        Ok(Self(minor))
    }

    /// Returns the raw minor-unit count.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Returns `true` for a strictly positive amount.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns the amount in major units, for display only.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_major(self) -> f64 {
        self.0 as f64 / MINOR_PER_MAJOR as f64
    }

    /// Adds two amounts, saturating at the numeric bounds.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for MinorUnits {
    /// Formats as a fixed two-decimal major amount (`"5.00"`), the wire
    /// format payment providers expect.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = MINOR_PER_MAJOR.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / per, abs % per)
    }
}
