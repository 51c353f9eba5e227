//! Single-parent Bayes combinator.

use crate::error::ValidationError;
use crate::probability::{percent_to_fraction, Probability};

/// Law of total probability for one boolean parent.
///
/// `P(child) = pT * P(parent) + pF * (1 - P(parent))` where `pT` and `pF`
/// are the conditional percentages divided by 100.
///
/// # Errors
///
/// Returns `ValidationError::PercentageOutOfRange` if either percentage is
/// NaN or outside [0, 100].
///
/// # Examples
///
/// ```
/// use beliefgraph::{combine_single, Probability};
///
/// let p = combine_single(Probability::new(0.7).unwrap(), 80.0, 20.0).unwrap();
/// assert!((p.value() - 0.62).abs() < 1e-12);
/// ```
pub fn combine_single(
    parent_prob: Probability,
    cond_true_pct: f64,
    cond_false_pct: f64,
) -> Result<Probability, ValidationError> {
    let p_true = percent_to_fraction("cond_true", cond_true_pct)?;
    let p_false = percent_to_fraction("cond_false", cond_false_pct)?;
    let parent = parent_prob.value();

    let result = p_true * parent + p_false * (1.0 - parent);
    // Rounding can push the convex combination one ulp past the bounds.
    Ok(Probability::from_unchecked(result.clamp(0.0, 1.0)))
}
