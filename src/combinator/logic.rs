//! AND / OR combinators over independent parents.

use crate::error::ValidationError;
use crate::probability::Probability;

/// Checks the shared preconditions and yields effective parent probabilities.
///
/// An empty `inverses` slice means no parent is inverted.
fn effective_probs<'a>(
    parent_probs: &'a [Probability],
    inverses: &'a [bool],
) -> Result<impl Iterator<Item = f64> + 'a, ValidationError> {
    if parent_probs.is_empty() {
        return Err(ValidationError::EmptyParents);
    }
    if !inverses.is_empty() && inverses.len() != parent_probs.len() {
        return Err(ValidationError::LengthMismatch {
            field: "inverses",
            expected: parent_probs.len(),
            actual: inverses.len(),
        });
    }
    Ok(parent_probs
        .iter()
        .enumerate()
        .map(move |(i, p)| p.effective(inverses.get(i).copied().unwrap_or(false)).value()))
}

/// Joint occurrence of independent parents: the product of their
/// effective probabilities.
///
/// # Errors
///
/// `EmptyParents` for an empty parent set; `LengthMismatch` if `inverses`
/// is non-empty and differs in length from `parent_probs`.
///
/// # Examples
///
/// ```
/// use beliefgraph::{combine_and, Probability};
///
/// let parents: Vec<_> = [0.8, 0.6, 0.9].iter().map(|p| Probability::new(*p).unwrap()).collect();
/// let p = combine_and(&parents, &[false, true, false]).unwrap();
/// assert!((p.value() - 0.288).abs() < 1e-12);
/// ```
pub fn combine_and(parent_probs: &[Probability], inverses: &[bool]) -> Result<Probability, ValidationError> {
    let product = effective_probs(parent_probs, inverses)?.fold(1.0, |acc, p| acc * p);
    Ok(Probability::from_unchecked(product))
}

/// At least one of several independent parents: `1 - prod(1 - p)`.
///
/// # Errors
///
/// Same as [`combine_and`].
pub fn combine_or(parent_probs: &[Probability], inverses: &[bool]) -> Result<Probability, ValidationError> {
    let none = effective_probs(parent_probs, inverses)?.fold(1.0, |acc, p| acc * (1.0 - p));
    Ok(Probability::from_unchecked(1.0 - none))
}
