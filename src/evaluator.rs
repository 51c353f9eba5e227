//! Node evaluator.
//!
//! Turns one node plus the probabilities of its already-resolved parents
//! into an [`Evaluation`]. The evaluator never recurses: ordering is the
//! [`GraphFolder`](crate::folder::GraphFolder)'s job, and a missing parent
//! value is reported as `UnresolvedParent`.

use serde::Serialize;
use tracing::{debug, warn};

use crate::combinator::Combinator;
use crate::cpt::Cpt;
use crate::error::{BeliefError, BeliefResult, EvaluationError, ValidationError};
use crate::graph::{Edge, Node, NodeId, Rule};
use crate::probability::Probability;

/// Parent count above which enumeration cost dominates.
pub const DEFAULT_PARENT_GUIDELINE: usize = 20;

/// Non-fatal observations attached to an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Multi-parent CPTs carry different baselines; the result is clamped
    /// and depends on which parent comes first.
    BaselineInconsistency {
        /// Baselines in parent order, in percent.
        baselines: Vec<f64>,
    },

    /// More parents than the configured enumeration guideline.
    ParentGuidelineExceeded {
        /// Parent count.
        parents: usize,
        /// Configured guideline.
        guideline: usize,
    },

    /// A CPT whose true row is below its baseline, or whose false row is
    /// above it.
    LikelihoodOrdering {
        /// Parent whose edge carries the CPT.
        parent: NodeId,
    },
}

/// Result of evaluating one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    /// Evaluated node.
    pub node: NodeId,
    /// Rule that produced the value.
    pub rule: Rule,
    /// P(node = true).
    pub probability: Probability,
    /// Non-fatal observations.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl Evaluation {
    /// Builds the evaluation of a fact.
    #[must_use]
    pub fn fact(node: NodeId, probability: Probability) -> Self {
        Self {
            node,
            rule: Rule::Fact,
            probability,
            diagnostics: Vec::new(),
        }
    }

    /// Returns true if the parents' baselines were inconsistent.
    #[must_use]
    pub fn baselines_inconsistent(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::BaselineInconsistency { .. }))
    }
}

/// Dispatches a node to its combinator.
#[derive(Debug, Clone, Copy)]
pub struct NodeEvaluator {
    parent_guideline: usize,
}

impl Default for NodeEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_PARENT_GUIDELINE)
    }
}

impl NodeEvaluator {
    /// Creates an evaluator with the given parent-count guideline.
    #[must_use]
    pub const fn new(parent_guideline: usize) -> Self {
        Self { parent_guideline }
    }

    /// Evaluates `node` from its incoming edges and the resolved
    /// probabilities of their sources, both in parent order.
    ///
    /// A `None` entry in `parents` means the parent has not been evaluated.
    ///
    /// # Errors
    ///
    /// - `RuleArityMismatch` if the rule does not accept the parent count
    /// - `UnresolvedParent` if any parent value is `None`
    /// - `InvalidInput` for a fact without a probability, a missing CPT on
    ///   an edge into a Bayes node, or any combinator precondition
    pub fn evaluate(
        &self,
        node: &Node,
        incoming: &[&Edge],
        parents: &[Option<Probability>],
    ) -> BeliefResult<Evaluation> {
        if incoming.len() != parents.len() {
            return Err(BeliefError::internal(format!(
                "node {} has {} incoming edges but {} parent values",
                node.id,
                incoming.len(),
                parents.len()
            )));
        }
        if !node.rule.accepts_parents(incoming.len()) {
            return Err(EvaluationError::RuleArityMismatch {
                node: node.id.clone(),
                rule: node.rule,
                parents: incoming.len(),
            }
            .into());
        }

        let resolved = incoming
            .iter()
            .zip(parents)
            .map(|(edge, p)| {
                p.ok_or_else(|| EvaluationError::UnresolvedParent {
                    node: node.id.clone(),
                    parent: edge.source.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut diagnostics = Vec::new();
        let (combinator, inputs) = match node.rule {
            Rule::Fact => {
                let probability = node.probability.ok_or_else(|| ValidationError::MissingField {
                    field: format!("{}.probability", node.id),
                })?;
                return Ok(Evaluation::fact(node.id.clone(), probability));
            }
            Rule::And | Rule::Or => {
                let inverses = incoming.iter().map(|e| e.inverted).collect();
                let combinator = if node.rule == Rule::And {
                    Combinator::And(inverses)
                } else {
                    Combinator::Or(inverses)
                };
                (combinator, resolved)
            }
            Rule::SingleBayes | Rule::MultiBayes => {
                let cpts = edge_cpts(node, incoming)?;
                diagnostics.extend(
                    incoming
                        .iter()
                        .zip(&cpts)
                        .filter(|(_, cpt)| !cpt.is_ordered())
                        .map(|(edge, _)| Diagnostic::LikelihoodOrdering {
                            parent: edge.source.clone(),
                        }),
                );
                let inputs = incoming
                    .iter()
                    .zip(resolved)
                    .map(|(edge, p)| p.effective(edge.inverted))
                    .collect();
                let combinator = if node.rule == Rule::SingleBayes {
                    Combinator::SingleBayes(cpts[0])
                } else {
                    Combinator::MultiBayes(cpts)
                };
                (combinator, inputs)
            }
        };

        if incoming.len() > self.parent_guideline {
            warn!(
                node = %node.id,
                parents = incoming.len(),
                guideline = self.parent_guideline,
                "parent count exceeds enumeration guideline"
            );
            diagnostics.push(Diagnostic::ParentGuidelineExceeded {
                parents: incoming.len(),
                guideline: self.parent_guideline,
            });
        }

        let combination = combinator.apply(&inputs)?;
        if combination.baseline_inconsistent {
            if let Combinator::MultiBayes(cpts) = &combinator {
                diagnostics.push(Diagnostic::BaselineInconsistency {
                    baselines: cpts.iter().map(Cpt::baseline).collect(),
                });
            }
        }

        debug!(
            node = %node.id,
            rule = combinator.name(),
            parents = incoming.len(),
            probability = combination.probability.value(),
            "evaluated node"
        );

        Ok(Evaluation {
            node: node.id.clone(),
            rule: node.rule,
            probability: combination.probability,
            diagnostics,
        })
    }
}

fn edge_cpts(node: &Node, incoming: &[&Edge]) -> Result<Vec<Cpt>, ValidationError> {
    incoming
        .iter()
        .map(|edge| {
            edge.cpt.ok_or_else(|| ValidationError::MissingCpt {
                source_id: edge.source.clone(),
                target: node.id.clone(),
            })
        })
        .collect()
}
