//! Graph interchange documents.
//!
//! The boundary format is a JSON object with `version`, `nodes` and `edges`.
//! Version "2" is current. A document with no version, or version "1", is
//! structurally identical and is migrated in place; any other version is
//! rejected.
//!
//! Node `type` is one of `fact`, `assertion`, `and`, `or`, `note`; unknown
//! or missing types read as `assertion`. Notes are annotations and are
//! dropped together with their edges when a graph is built.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::EngineConfig;
use crate::cpt::Cpt;
use crate::error::{BeliefResult, InterchangeError, ValidationError};
use crate::graph::{BeliefGraph, Edge, EdgeKind, Node, NodeId, Rule};
use crate::probability::Probability;

/// Current document version.
pub const CURRENT_VERSION: &str = "2";

/// Editor-level node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Externally supplied input.
    Fact,
    /// Derived node combined with a Bayes rule.
    #[default]
    Assertion,
    /// Derived node combined with AND.
    And,
    /// Derived node combined with OR.
    Or,
    /// Annotation; not part of the computation.
    Note,
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "fact" => Self::Fact,
            "and" => Self::And,
            "or" => Self::Or,
            "note" => Self::Note,
            _ => Self::Assertion,
        })
    }
}

/// A node as written in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Unique id.
    pub id: String,

    /// Editor-level type.
    #[serde(rename = "type", default)]
    pub kind: NodeKind,

    /// Explicit rule for assertions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<Rule>,

    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Probability of a fact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prob: Option<Probability>,
}

/// An edge as written in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    /// Optional edge id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Parent node id.
    pub source: String,

    /// Child node id.
    pub target: String,

    /// Relationship kind.
    #[serde(rename = "type", default)]
    pub kind: EdgeKind,

    /// Provenance weight in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    /// Reasons for the relationship.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contributing_factors: Vec<String>,

    /// Use `1 - p` for the parent.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inverted: bool,

    /// Conditional table for Bayes targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpt: Option<Cpt>,
}

/// A whole interchange document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Format version; `None` for legacy documents.
    #[serde(default, deserialize_with = "version_string", skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Nodes in document order.
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,

    /// Edges in document order.
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

/// Accepts `"2"` as well as a bare number `2`.
fn version_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }))
}

fn records<'a>(doc: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    doc.get(key).and_then(Value::as_array).into_iter().flatten()
}

/// Range-checks fact probabilities and CPT percentages before the typed
/// decode, which would otherwise report them as malformed JSON.
fn check_ranges(doc: &Value) -> Result<(), ValidationError> {
    for node in records(doc, "nodes") {
        if let Some(prob) = node.get("prob").and_then(Value::as_f64) {
            Probability::new(prob)?;
        }
    }
    for edge in records(doc, "edges") {
        let Some(cpt) = edge.get("cpt") else {
            continue;
        };
        let percent = |field: &str| cpt.get(field).and_then(Value::as_f64);
        if let (Some(t), Some(f), Some(b)) = (percent("condTrue"), percent("condFalse"), percent("baseline")) {
            Cpt::new(t, f, b)?;
        }
    }
    Ok(())
}

impl GraphDocument {
    /// Parses a document and migrates it to the current version.
    ///
    /// # Errors
    ///
    /// Returns an interchange error for malformed JSON or a malformed record
    /// shape. Out-of-range `prob` or CPT values are `ProbabilityOutOfRange`
    /// or `PercentageOutOfRange`, and versions other than "1" and "2" are
    /// `UnsupportedVersion`.
    pub fn from_json_str(json: &str) -> BeliefResult<Self> {
        let value: Value = serde_json::from_str(json).map_err(InterchangeError::from)?;
        Self::from_value(value)
    }

    /// Reads a document from any reader.
    ///
    /// # Errors
    ///
    /// Same as [`from_json_str`](Self::from_json_str).
    pub fn from_reader(reader: impl Read) -> BeliefResult<Self> {
        let value: Value = serde_json::from_reader(reader).map_err(InterchangeError::from)?;
        Self::from_value(value)
    }

    fn from_value(value: Value) -> BeliefResult<Self> {
        check_ranges(&value)?;
        let doc: Self = serde_json::from_value(value).map_err(InterchangeError::from)?;
        doc.migrated()
    }

    /// Loads a document file.
    ///
    /// # Errors
    ///
    /// Returns an interchange error if the file cannot be read, otherwise
    /// the same errors as [`from_json_str`](Self::from_json_str).
    pub fn from_path(path: impl AsRef<Path>) -> BeliefResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| InterchangeError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Returns the record for `id`, if present.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&NodeRecord> {
        self.nodes.iter().find(|n| n.id == id.as_str())
    }

    /// Serializes a built graph back into a current-version document.
    #[must_use]
    pub fn from_graph(graph: &BeliefGraph) -> Self {
        let nodes = graph
            .nodes()
            .map(|node| {
                let (kind, rule) = match node.rule {
                    Rule::Fact => (NodeKind::Fact, None),
                    Rule::And => (NodeKind::And, None),
                    Rule::Or => (NodeKind::Or, None),
                    bayes @ (Rule::SingleBayes | Rule::MultiBayes) => (NodeKind::Assertion, Some(bayes)),
                };
                NodeRecord {
                    id: node.id.as_str().to_string(),
                    kind,
                    rule,
                    label: node.label.clone(),
                    description: node.description.clone(),
                    prob: node.probability,
                }
            })
            .collect();
        let edges = graph
            .edges()
            .map(|edge| EdgeRecord {
                id: None,
                source: edge.source.as_str().to_string(),
                target: edge.target.as_str().to_string(),
                kind: edge.kind,
                weight: edge.weight,
                contributing_factors: edge.contributing_factors.clone(),
                inverted: edge.inverted,
                cpt: edge.cpt,
            })
            .collect();
        Self {
            version: Some(CURRENT_VERSION.to_string()),
            nodes,
            edges,
        }
    }

    /// Renders the document as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an interchange error if serialization fails.
    pub fn to_json_pretty(&self) -> BeliefResult<String> {
        Ok(serde_json::to_string_pretty(self).map_err(InterchangeError::from)?)
    }

    /// Builds the belief graph described by this document.
    ///
    /// Facts without `prob` get `config.fact_probability`. Assertions
    /// without `rule` use single-parent Bayes when they have exactly one
    /// incoming edge and multi-parent Bayes otherwise.
    ///
    /// # Errors
    ///
    /// Any structural error from [`GraphBuilder`](crate::graph::GraphBuilder).
    pub fn into_graph(&self, config: &EngineConfig) -> BeliefResult<BeliefGraph> {
        let notes: HashSet<&str> = self
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Note)
            .map(|n| n.id.as_str())
            .collect();
        let edges: Vec<&EdgeRecord> = self
            .edges
            .iter()
            .filter(|e| !notes.contains(e.source.as_str()) && !notes.contains(e.target.as_str()))
            .collect();

        let mut builder = BeliefGraph::builder();
        for record in self.nodes.iter().filter(|n| n.kind != NodeKind::Note) {
            let rule = match record.kind {
                NodeKind::Fact => Rule::Fact,
                NodeKind::And => Rule::And,
                NodeKind::Or => Rule::Or,
                NodeKind::Assertion | NodeKind::Note => record.rule.unwrap_or_else(|| {
                    let parents = edges.iter().filter(|e| e.target == record.id).count();
                    if parents == 1 {
                        Rule::SingleBayes
                    } else {
                        Rule::MultiBayes
                    }
                }),
            };
            let mut node = if rule == Rule::Fact {
                Node::fact(record.id.as_str(), record.prob.unwrap_or(config.fact_probability))
            } else {
                Node::derived(record.id.as_str(), rule)
            };
            if let Some(label) = &record.label {
                node = node.with_label(label.as_str());
            }
            if let Some(description) = &record.description {
                node = node.with_description(description.as_str());
            }
            builder.add_node(node)?;
        }

        for record in edges {
            let mut edge = Edge::new(record.source.as_str(), record.target.as_str())
                .inverted(record.inverted)
                .with_kind(record.kind)
                .with_factors(&record.contributing_factors);
            if let Some(cpt) = record.cpt {
                edge = edge.with_cpt(cpt);
            }
            if let Some(weight) = record.weight {
                edge = edge.with_weight(weight);
            }
            builder.add_edge(edge)?;
        }

        debug!(
            nodes = self.nodes.len() - notes.len(),
            notes = notes.len(),
            "interchange document converted"
        );
        Ok(builder.build()?)
    }

    fn migrated(mut self) -> BeliefResult<Self> {
        match self.version.as_deref() {
            Some(CURRENT_VERSION) => Ok(self),
            None | Some("1") => {
                debug!(from = ?self.version, "migrating interchange document to version 2");
                self.version = Some(CURRENT_VERSION.to_string());
                Ok(self)
            }
            Some(other) => Err(ValidationError::UnsupportedVersion {
                version: other.to_string(),
            }
            .into()),
        }
    }
}
