//! Conditional probability tables.
//!
//! A [`Cpt`] lives on an edge and describes how the edge's source (the
//! parent) drives the edge's target (the child):
//!
//! - `cond_true`: P(child = true | parent = true), in percent
//! - `cond_false`: P(child = true | parent = false), in percent
//! - `baseline`: the parent's reference rate, used only to normalize the
//!   multi-parent likelihood product
//!
//! A CPT may be marked `inverse`, in which case the two conditional rows
//! swap roles. All three percentages are validated on construction and on
//! deserialization.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::probability::validate_percentage;

/// Per-parent conditional likelihoods plus a normalization baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cpt {
    cond_true: f64,
    cond_false: f64,
    baseline: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    inverse: bool,
}

impl Cpt {
    /// Creates a validated CPT from percentages.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::PercentageOutOfRange` if any value is NaN or
    /// outside [0, 100].
    pub fn new(cond_true: f64, cond_false: f64, baseline: f64) -> Result<Self, ValidationError> {
        validate_percentage("cond_true", cond_true)?;
        validate_percentage("cond_false", cond_false)?;
        validate_percentage("baseline", baseline)?;
        Ok(Self {
            cond_true,
            cond_false,
            baseline,
            inverse: false,
        })
    }

    /// Marks this CPT as inverse: the parent's true row reads `cond_false`.
    #[must_use]
    pub const fn inverted(mut self, inverse: bool) -> Self {
        self.inverse = inverse;
        self
    }

    /// Returns true if the conditional rows are swapped.
    #[must_use]
    pub const fn is_inverse(&self) -> bool {
        self.inverse
    }

    /// P(child | parent = true) in percent, after applying `inverse`.
    #[must_use]
    pub const fn cond_true(&self) -> f64 {
        if self.inverse {
            self.cond_false
        } else {
            self.cond_true
        }
    }

    /// P(child | parent = false) in percent, after applying `inverse`.
    #[must_use]
    pub const fn cond_false(&self) -> f64 {
        if self.inverse {
            self.cond_true
        } else {
            self.cond_false
        }
    }

    /// Baseline in percent.
    #[must_use]
    pub const fn baseline(&self) -> f64 {
        self.baseline
    }

    /// The likelihood row for the given parent state, as a fraction.
    #[must_use]
    pub fn likelihood(&self, parent_true: bool) -> f64 {
        if parent_true {
            self.cond_true() / 100.0
        } else {
            self.cond_false() / 100.0
        }
    }

    /// Returns true if `cond_false <= baseline <= cond_true`.
    ///
    /// A supporting parent should raise the child above its baseline when
    /// true and leave it at or below the baseline when false.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.cond_false() <= self.baseline && self.baseline <= self.cond_true()
    }
}

/// Returns true if every CPT carries the same baseline as the first.
#[must_use]
pub fn baselines_consistent(cpts: &[Cpt]) -> bool {
    match cpts.split_first() {
        Some((first, rest)) => rest.iter().all(|c| c.baseline.to_bits() == first.baseline.to_bits()),
        None => true,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCpt {
    cond_true: f64,
    cond_false: f64,
    baseline: f64,
    #[serde(default)]
    inverse: bool,
}

impl<'de> Deserialize<'de> for Cpt {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawCpt::deserialize(deserializer)?;
        Cpt::new(raw.cond_true, raw.cond_false, raw.baseline)
            .map(|cpt| cpt.inverted(raw.inverse))
            .map_err(serde::de::Error::custom)
    }
}
