//! Evaluation reports.
//!
//! A report is a serializable snapshot of a folder's cache: one entry per
//! node in topological order, unresolved nodes included.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BeliefResult, InterchangeError};
use crate::evaluator::Diagnostic;
use crate::graph::{NodeId, Rule};
use crate::probability::Probability;

/// Unique identifier for an evaluation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a new random run ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One node in a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeReport {
    /// Node id.
    pub id: NodeId,
    /// Display label, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Combination rule.
    pub rule: Rule,
    /// Resolved probability; `None` if the node was not evaluated.
    pub probability: Option<Probability>,
    /// Diagnostics of the evaluation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Snapshot of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    /// Run that produced the values.
    pub run_id: RunId,
    /// When the snapshot was taken.
    pub evaluated_at: DateTime<Utc>,
    /// Nodes in topological order.
    pub nodes: Vec<NodeReport>,
}

impl EvaluationReport {
    /// Creates a report stamped with the current time.
    #[must_use]
    pub fn new(run_id: RunId, nodes: Vec<NodeReport>) -> Self {
        Self {
            run_id,
            evaluated_at: Utc::now(),
            nodes,
        }
    }

    /// Looks up a node entry.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Nodes that were not evaluated.
    pub fn unresolved(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.iter().filter(|n| n.probability.is_none()).map(|n| &n.id)
    }

    /// Nodes flagged with inconsistent parent baselines.
    pub fn baseline_inconsistencies(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes
            .iter()
            .filter(|n| {
                n.diagnostics
                    .iter()
                    .any(|d| matches!(d, Diagnostic::BaselineInconsistency { .. }))
            })
            .map(|n| &n.id)
    }

    /// Renders the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an interchange error if serialization fails.
    pub fn to_json_pretty(&self) -> BeliefResult<String> {
        Ok(serde_json::to_string_pretty(self).map_err(InterchangeError::from)?)
    }
}
