//! Multi-parent Naive-Bayes combinator by exact enumeration.
//!
//! Every one of the `2^n` joint parent assignments is visited. For each
//! assignment the joint probability (parents independent), the likelihood
//! product and the baseline normalization are computed; the normalized
//! likelihood is clamped to `[0, 1]` and weighted by the joint
//! probability. The weights partition the assignment space, so the sum is
//! a probability.
//!
//! The baseline of parent 0 anchors the normalization:
//!
//! ```text
//! normalization = prod_i(baseline_i / 100) / (baseline_0 / 100)
//! ```
//!
//! Reordering parents can therefore change the result when baselines
//! differ. Differing baselines are reported, never rejected.
//!
//! [`Enumeration`] exposes the individual terms for auditing; the sum in
//! [`combine_multi`] is taken over the same iterator, in ascending
//! assignment order.

use serde::Serialize;
use tracing::{trace, warn};

use crate::cpt::{baselines_consistent, Cpt};
use crate::error::ValidationError;
use crate::probability::Probability;

/// Largest parent count whose assignments fit in the `u64` bit mask.
pub const MAX_ENUMERATED_PARENTS: usize = 63;

/// One joint parent assignment and its share of the child probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnumerationTerm {
    /// Bit `i` set means parent `i` is true.
    pub assignment: u64,
    /// Number of parents in the assignment.
    pub parents: usize,
    /// Probability of this exact assignment.
    pub joint_probability: f64,
    /// Product of the per-parent likelihood rows.
    pub likelihood_product: f64,
    /// Baseline product divided by the anchor baseline.
    pub baseline_normalization: f64,
    /// `likelihood_product / baseline_normalization`, clamped to [0, 1].
    pub conditional: f64,
    /// `joint_probability * conditional`.
    pub contribution: f64,
}

impl EnumerationTerm {
    /// Returns the truth value of parent `index` in this assignment.
    #[must_use]
    pub const fn is_true(&self, index: usize) -> bool {
        self.assignment & (1 << index) != 0
    }

    /// Renders the assignment as `T`/`F` characters, parent 0 first.
    #[must_use]
    pub fn label(&self) -> String {
        (0..self.parents)
            .map(|i| if self.is_true(i) { 'T' } else { 'F' })
            .collect()
    }
}

/// Iterator over all `2^n` enumeration terms.
#[derive(Debug, Clone)]
pub struct Enumeration<'a> {
    parent_probs: &'a [Probability],
    cpts: &'a [Cpt],
    normalization: f64,
    next: u64,
    end: u64,
}

impl<'a> Enumeration<'a> {
    /// Validates the inputs and prepares the enumeration.
    ///
    /// # Errors
    ///
    /// - `EmptyParents` if there are no parents
    /// - `LengthMismatch` if `cpts` and `parent_probs` differ in length
    /// - `TooManyParents` above [`MAX_ENUMERATED_PARENTS`]
    /// - `ZeroBaseline` if any baseline is 0%; the anchor divides the
    ///   product directly and any other zero empties the normalization
    /// - `DegenerateBaselines` if the normalization underflows to zero or
    ///   is otherwise not a positive finite number
    pub fn new(parent_probs: &'a [Probability], cpts: &'a [Cpt]) -> Result<Self, ValidationError> {
        let n = parent_probs.len();
        if n == 0 {
            return Err(ValidationError::EmptyParents);
        }
        if cpts.len() != n {
            return Err(ValidationError::LengthMismatch {
                field: "cpts",
                expected: n,
                actual: cpts.len(),
            });
        }
        if n > MAX_ENUMERATED_PARENTS {
            return Err(ValidationError::TooManyParents {
                parents: n,
                max: MAX_ENUMERATED_PARENTS,
            });
        }
        if let Some(index) = cpts.iter().position(|c| c.baseline() == 0.0) {
            return Err(ValidationError::ZeroBaseline { index });
        }

        let anchor = cpts[0].baseline() / 100.0;
        let mut baseline_product = 1.0;
        for cpt in cpts {
            baseline_product *= cpt.baseline() / 100.0;
        }
        let normalization = baseline_product / anchor;
        if !(normalization.is_finite() && normalization > 0.0) {
            return Err(ValidationError::DegenerateBaselines { normalization });
        }

        Ok(Self {
            parent_probs,
            cpts,
            normalization,
            next: 0,
            end: 1u64 << n,
        })
    }

    /// Total number of terms (`2^n`).
    #[must_use]
    pub const fn term_count(&self) -> u64 {
        self.end
    }

    fn term(&self, assignment: u64) -> EnumerationTerm {
        let mut joint_probability = 1.0;
        let mut likelihood_product = 1.0;

        for (i, (p, cpt)) in self.parent_probs.iter().zip(self.cpts).enumerate() {
            let parent_true = assignment & (1 << i) != 0;
            joint_probability *= if parent_true { p.value() } else { 1.0 - p.value() };
            likelihood_product *= cpt.likelihood(parent_true);
        }

        // Same for every assignment; computed once in `new`.
        let baseline_normalization = self.normalization;
        let conditional = Probability::clamped(likelihood_product / baseline_normalization).value();

        EnumerationTerm {
            assignment,
            parents: self.parent_probs.len(),
            joint_probability,
            likelihood_product,
            baseline_normalization,
            conditional,
            contribution: joint_probability * conditional,
        }
    }
}

impl Iterator for Enumeration<'_> {
    type Item = EnumerationTerm;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let term = self.term(self.next);
        self.next += 1;
        Some(term)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.end - self.next).ok();
        (remaining.unwrap_or(usize::MAX), remaining)
    }
}

/// Result of a multi-parent combination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiBayesOutcome {
    /// P(child = true).
    pub probability: Probability,
    /// True when the parents' baselines differ.
    pub baseline_inconsistent: bool,
}

/// Combines independent parents through their CPTs by exact enumeration.
///
/// # Errors
///
/// See [`Enumeration::new`].
///
/// # Examples
///
/// ```
/// use beliefgraph::{combine_multi, Cpt, Probability};
///
/// let parents = [Probability::new(0.6).unwrap(), Probability::new(0.4).unwrap()];
/// let cpts = [Cpt::new(80.0, 20.0, 50.0).unwrap(), Cpt::new(70.0, 30.0, 50.0).unwrap()];
/// let outcome = combine_multi(&parents, &cpts).unwrap();
/// assert!((outcome.probability.value() - 0.4864).abs() < 1e-12);
/// assert!(!outcome.baseline_inconsistent);
/// ```
pub fn combine_multi(parent_probs: &[Probability], cpts: &[Cpt]) -> Result<MultiBayesOutcome, ValidationError> {
    let enumeration = Enumeration::new(parent_probs, cpts)?;

    let baseline_inconsistent = !baselines_consistent(cpts);
    if baseline_inconsistent {
        let baselines: Vec<f64> = cpts.iter().map(Cpt::baseline).collect();
        warn!(?baselines, "inconsistent baselines across parents; normalized terms are clamped");
    }

    let mut total = 0.0;
    for term in enumeration {
        trace!(
            combo = %term.label(),
            p = term.joint_probability,
            l = term.likelihood_product,
            b = term.baseline_normalization,
            p_child = term.conditional,
            contrib = term.contribution,
            "enumeration term"
        );
        total += term.contribution;
    }

    Ok(MultiBayesOutcome {
        probability: Probability::clamped(total),
        baseline_inconsistent,
    })
}
