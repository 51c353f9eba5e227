//! Probability combinators.
//!
//! Four pure functions map parent probabilities to a child probability:
//! [`combine_single`], [`combine_multi`], [`combine_and`] and
//! [`combine_or`]. [`Combinator`] is the closed set of rules the node
//! evaluator dispatches over.

mod logic;
mod multi;
mod single;

pub use logic::{combine_and, combine_or};
pub use multi::{combine_multi, Enumeration, EnumerationTerm, MultiBayesOutcome, MAX_ENUMERATED_PARENTS};
pub use single::combine_single;

use crate::cpt::Cpt;
use crate::error::ValidationError;
use crate::probability::Probability;

/// A combination rule bound to its per-parent parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Combinator {
    /// Exact update from one parent through its CPT.
    SingleBayes(Cpt),

    /// Naive-Bayes enumeration over any number of parents.
    MultiBayes(Vec<Cpt>),

    /// Joint occurrence; one inversion flag per parent.
    And(Vec<bool>),

    /// At least one occurrence; one inversion flag per parent.
    Or(Vec<bool>),
}

/// Output of a combinator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Combination {
    /// P(child = true).
    pub probability: Probability,
    /// Set by `MultiBayes` when the parents' baselines differ.
    pub baseline_inconsistent: bool,
}

impl From<Probability> for Combination {
    fn from(probability: Probability) -> Self {
        Self {
            probability,
            baseline_inconsistent: false,
        }
    }
}

impl Combinator {
    /// Applies the rule to parent probabilities given in edge order.
    ///
    /// # Errors
    ///
    /// Returns the underlying combinator's `ValidationError`. A
    /// `SingleBayes` rule given anything other than one parent reports
    /// `LengthMismatch`.
    pub fn apply(&self, parent_probs: &[Probability]) -> Result<Combination, ValidationError> {
        match self {
            Self::SingleBayes(cpt) => {
                let [parent] = parent_probs else {
                    return Err(ValidationError::LengthMismatch {
                        field: "cpts",
                        expected: parent_probs.len(),
                        actual: 1,
                    });
                };
                combine_single(*parent, cpt.cond_true(), cpt.cond_false()).map(Combination::from)
            }
            Self::MultiBayes(cpts) => {
                let outcome = combine_multi(parent_probs, cpts)?;
                Ok(Combination {
                    probability: outcome.probability,
                    baseline_inconsistent: outcome.baseline_inconsistent,
                })
            }
            Self::And(inverses) => combine_and(parent_probs, inverses).map(Combination::from),
            Self::Or(inverses) => combine_or(parent_probs, inverses).map(Combination::from),
        }
    }

    /// Short stable name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SingleBayes(_) => "single_bayes",
            Self::MultiBayes(_) => "multi_bayes",
            Self::And(_) => "and",
            Self::Or(_) => "or",
        }
    }
}
