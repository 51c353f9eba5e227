//! Validated probability and percentage types.
//!
//! Every value flowing into or out of a combinator is a [`Probability`]:
//! a finite `f64` in `[0.0, 1.0]`. CPT entries are authored as
//! percentages and converted exactly once, by dividing by 100, at the
//! combinator boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Probability that a boolean node is true.
///
/// # Examples
///
/// ```
/// use beliefgraph::Probability;
///
/// let p = Probability::new(0.7).unwrap();
/// assert_eq!(p.value(), 0.7);
/// assert!(Probability::new(1.2).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Probability(f64);

impl Probability {
    /// Certainly false.
    pub const ZERO: Self = Self(0.0);

    /// Certainly true.
    pub const ONE: Self = Self(1.0);

    /// Creates a probability with validation.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::ProbabilityOutOfRange` if the value is NaN,
    /// infinite or not in [0.0, 1.0].
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if value.is_nan() || !(0.0..=1.0).contains(&value) {
            return Err(ValidationError::ProbabilityOutOfRange { value });
        }
        Ok(Self(value))
    }

    /// Clamps an intermediate result into [0.0, 1.0]. NaN maps to 0.0.
    ///
    /// Only used for the normalized multi-parent term; inputs are never
    /// clamped.
    pub(crate) fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Wraps a value the caller has already proven to be in range.
    pub(crate) const fn from_unchecked(value: f64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Returns `1 - p`.
    #[must_use]
    pub fn complement(self) -> Self {
        Self(1.0 - self.0)
    }

    /// Returns the probability seen through an edge: `1 - p` when inverted.
    #[must_use]
    pub fn effective(self, inverted: bool) -> Self {
        if inverted {
            self.complement()
        } else {
            self
        }
    }
}

impl TryFrom<f64> for Probability {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Probability> for f64 {
    fn from(p: Probability) -> Self {
        p.0
    }
}

impl fmt::Display for Probability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

/// Converts a percentage in [0, 100] to a fraction, validating the range.
///
/// `field` names the offending value in the error.
pub(crate) fn percent_to_fraction(field: &'static str, pct: f64) -> Result<f64, ValidationError> {
    validate_percentage(field, pct)?;
    Ok(pct / 100.0)
}

/// Validates that a percentage is finite and in [0, 100].
pub(crate) fn validate_percentage(field: &'static str, pct: f64) -> Result<(), ValidationError> {
    if pct.is_nan() || !(0.0..=100.0).contains(&pct) {
        return Err(ValidationError::PercentageOutOfRange { field, value: pct });
    }
    Ok(())
}
