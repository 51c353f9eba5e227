//! Error types for beliefgraph.
//!
//! All errors are strongly typed using thiserror so callers can pattern
//! match on the exact failure. Input problems (`ValidationError`) and
//! evaluation-order problems (`EvaluationError`) abort evaluation of the
//! affected node. Baseline inconsistency is not an error; it is reported
//! as a [`Diagnostic`](crate::evaluator::Diagnostic).

use thiserror::Error;

use crate::graph::{NodeId, Rule};

/// Invalid input: values outside their domain or malformed graph structure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Probability {value} is out of range [0.0, 1.0]")]
    ProbabilityOutOfRange {
        value: f64,
    },

    #[error("Percentage '{field}' = {value} is out of range [0, 100]")]
    PercentageOutOfRange {
        field: &'static str,
        value: f64,
    },

    #[error("Baseline of parent {index} is 0%; the baseline normalization divides by it")]
    ZeroBaseline {
        index: usize,
    },

    #[error("Baseline normalization {normalization} is not a positive finite number")]
    DegenerateBaselines {
        normalization: f64,
    },

    #[error("Combination requires at least one parent")]
    EmptyParents,

    #[error("Length mismatch: {expected} parents but {actual} {field}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Cannot enumerate {parents} parents (max {max})")]
    TooManyParents {
        parents: usize,
        max: usize,
    },

    #[error("Edge {source_id} -> {target} has no CPT but its target uses a Bayes rule")]
    MissingCpt {
        source_id: NodeId,
        target: NodeId,
    },

    #[error("Duplicate node id: {id}")]
    DuplicateNode {
        id: NodeId,
    },

    #[error("Edge references unknown node: {id}")]
    UnknownNode {
        id: NodeId,
    },

    #[error("Self loop on node {id}")]
    SelfLoop {
        id: NodeId,
    },

    #[error("Edge {source_id} -> {target} would create a cycle")]
    Cycle {
        source_id: NodeId,
        target: NodeId,
    },

    #[error("Fact node {id} cannot have parent edges")]
    FactWithParents {
        id: NodeId,
    },

    #[error("Edge weight {value} is out of range [0.0, 1.0]")]
    WeightOutOfRange {
        value: f64,
    },

    #[error("Unsupported document version '{version}'")]
    UnsupportedVersion {
        version: String,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },
}

/// Errors raised while evaluating nodes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("Rule {rule} on node {node} cannot take {parents} parent(s)")]
    RuleArityMismatch {
        node: NodeId,
        rule: Rule,
        parents: usize,
    },

    #[error("Parent {parent} of node {node} has not been resolved")]
    UnresolvedParent {
        node: NodeId,
        parent: NodeId,
    },

    #[error("Node not found: {id}")]
    NodeNotFound {
        id: NodeId,
    },

    #[error("Node {id} is not a fact")]
    NotAFact {
        id: NodeId,
    },

    #[error("Evaluation worker pool disconnected")]
    WorkerDisconnected,
}

/// Errors reading or writing interchange documents.
#[derive(Debug, Error)]
pub enum InterchangeError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level error type for beliefgraph.
#[derive(Debug, Error)]
pub enum BeliefError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Interchange error: {0}")]
    Interchange(#[from] InterchangeError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl BeliefError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is an invalid-input error.
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Returns true if a node's rule did not match its parent count.
    #[must_use]
    pub const fn is_arity_mismatch(&self) -> bool {
        matches!(self, Self::Evaluation(EvaluationError::RuleArityMismatch { .. }))
    }

    /// Returns true if a parent was evaluated after its child.
    #[must_use]
    pub const fn is_unresolved_parent(&self) -> bool {
        matches!(self, Self::Evaluation(EvaluationError::UnresolvedParent { .. }))
    }

    /// Returns true if this is an interchange error.
    #[must_use]
    pub const fn is_interchange(&self) -> bool {
        matches!(self, Self::Interchange(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for beliefgraph operations.
pub type BeliefResult<T> = Result<T, BeliefError>;
