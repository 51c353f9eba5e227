//! Belief graph structure.
//!
//! A [`BeliefGraph`] is built once by a [`GraphBuilder`] and never changes
//! afterwards: evaluation state lives in the
//! [`GraphFolder`](crate::folder::GraphFolder), not here.
//!
//! Parent order matters. A node's parents are the sources of its incoming
//! edges in the order the edges were added; parent 0 anchors the
//! multi-parent baseline normalization.

pub(crate) mod topology;

use std::collections::HashMap;
use std::fmt;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cpt::Cpt;
use crate::error::ValidationError;
use crate::probability::Probability;

use topology::Dag;

/// Unique node identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a node's probability is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Externally supplied; no parents.
    #[serde(alias = "FACT")]
    Fact,

    /// Exact update from exactly one parent.
    #[serde(alias = "SINGLE_BAYES")]
    SingleBayes,

    /// Naive-Bayes enumeration over one or more parents.
    #[serde(alias = "MULTI_BAYES")]
    MultiBayes,

    /// Product of independent parents.
    #[serde(alias = "AND")]
    And,

    /// Noisy-or of independent parents.
    #[serde(alias = "OR")]
    Or,
}

impl Rule {
    /// Returns true if the rule reads a CPT from each incoming edge.
    #[must_use]
    pub const fn uses_cpt(self) -> bool {
        matches!(self, Self::SingleBayes | Self::MultiBayes)
    }

    /// Returns true if `parents` is an acceptable parent count.
    #[must_use]
    pub const fn accepts_parents(self, parents: usize) -> bool {
        match self {
            Self::Fact => parents == 0,
            Self::SingleBayes => parents == 1,
            Self::MultiBayes | Self::And | Self::Or => parents >= 1,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fact => write!(f, "fact"),
            Self::SingleBayes => write!(f, "single_bayes"),
            Self::MultiBayes => write!(f, "multi_bayes"),
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
        }
    }
}

/// A boolean-valued quantity in the belief graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique id.
    pub id: NodeId,

    /// Combination rule.
    pub rule: Rule,

    /// Supplied probability of a fact node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<Probability>,

    /// Short display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Full statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Node {
    /// Creates a fact node with a supplied probability.
    #[must_use]
    pub fn fact(id: impl Into<NodeId>, probability: Probability) -> Self {
        Self {
            id: id.into(),
            rule: Rule::Fact,
            probability: Some(probability),
            label: None,
            description: None,
        }
    }

    /// Creates a node whose probability is computed by `rule`.
    #[must_use]
    pub fn derived(id: impl Into<NodeId>, rule: Rule) -> Self {
        Self {
            id: id.into(),
            rule,
            probability: None,
            label: None,
            description: None,
        }
    }

    /// Sets the display label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Informational relationship kind carried through from the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// The parent supports the child.
    #[default]
    Supports,

    /// The parent opposes the child.
    Opposes,
}

/// Directed parent -> child edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Parent node.
    pub source: NodeId,

    /// Child node.
    pub target: NodeId,

    /// Use `1 - p` for the parent's probability.
    #[serde(default)]
    pub inverted: bool,

    /// Conditional table for Bayes targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpt: Option<Cpt>,

    /// Provenance weight in [0, 1]; not read by the combinators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    /// Relationship kind; not read by the combinators.
    #[serde(default)]
    pub kind: EdgeKind,

    /// Human-readable reasons for the edge.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contributing_factors: Vec<String>,
}

impl Edge {
    /// Creates a plain supporting edge.
    #[must_use]
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            inverted: false,
            cpt: None,
            weight: None,
            kind: EdgeKind::Supports,
            contributing_factors: Vec::new(),
        }
    }

    /// Attaches a CPT.
    #[must_use]
    pub fn with_cpt(mut self, cpt: Cpt) -> Self {
        self.cpt = Some(cpt);
        self
    }

    /// Sets the inversion flag.
    #[must_use]
    pub fn inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    /// Sets the provenance weight.
    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Sets the relationship kind.
    #[must_use]
    pub fn with_kind(mut self, kind: EdgeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the contributing factors, trimming blanks and duplicates while
    /// preserving order.
    #[must_use]
    pub fn with_factors<I, S>(mut self, factors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for factor in factors {
            let f = factor.as_ref().trim();
            if !f.is_empty() && !out.iter().any(|seen| seen == f) {
                out.push(f.to_string());
            }
        }
        self.contributing_factors = out;
        self
    }
}

/// Incrementally assembles a [`BeliefGraph`].
///
/// Nodes must be added before the edges that reference them. Every edge is
/// checked for cycles as it is added.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    incoming: Vec<Vec<usize>>,
    outgoing: Vec<Vec<usize>>,
    index: HashMap<NodeId, NodeIndex>,
    dag: Dag,
}

impl GraphBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node.
    ///
    /// # Errors
    ///
    /// `DuplicateNode` if the id is taken; `MissingField` for an empty id.
    pub fn add_node(&mut self, node: Node) -> Result<&mut Self, ValidationError> {
        if node.id.as_str().trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "id".to_string(),
            });
        }
        if self.index.contains_key(&node.id) {
            return Err(ValidationError::DuplicateNode { id: node.id });
        }
        let idx = self.dag.add_node(node.id.clone());
        self.index.insert(node.id.clone(), idx);
        self.nodes.push(node);
        self.incoming.push(Vec::new());
        self.outgoing.push(Vec::new());
        Ok(self)
    }

    /// Adds an edge between two existing nodes.
    ///
    /// # Errors
    ///
    /// `UnknownNode`, `SelfLoop`, `Cycle`, `FactWithParents`, or
    /// `WeightOutOfRange`.
    pub fn add_edge(&mut self, edge: Edge) -> Result<&mut Self, ValidationError> {
        let source = self.lookup(&edge.source)?;
        let target = self.lookup(&edge.target)?;
        if source == target {
            return Err(ValidationError::SelfLoop { id: edge.source });
        }
        if topology::would_create_cycle(&self.dag, source, target) {
            return Err(ValidationError::Cycle {
                source_id: edge.source,
                target: edge.target,
            });
        }
        if self.nodes[target.index()].rule == Rule::Fact {
            return Err(ValidationError::FactWithParents { id: edge.target });
        }
        if let Some(w) = edge.weight {
            if w.is_nan() || !(0.0..=1.0).contains(&w) {
                return Err(ValidationError::WeightOutOfRange { value: w });
            }
        }

        let edge_idx = self.edges.len();
        self.dag.add_edge(source, target, edge_idx);
        self.incoming[target.index()].push(edge_idx);
        self.outgoing[source.index()].push(edge_idx);
        self.edges.push(edge);
        Ok(self)
    }

    /// Returns true if adding `source -> target` would create a cycle.
    ///
    /// Unknown ids never create a cycle.
    #[must_use]
    pub fn would_create_cycle(&self, source: &NodeId, target: &NodeId) -> bool {
        match (self.index.get(source), self.index.get(target)) {
            (Some(&s), Some(&t)) => topology::would_create_cycle(&self.dag, s, t),
            _ => false,
        }
    }

    fn lookup(&self, id: &NodeId) -> Result<NodeIndex, ValidationError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| ValidationError::UnknownNode { id: id.clone() })
    }

    /// Freezes the graph and computes its evaluation order.
    ///
    /// # Errors
    ///
    /// `Cycle` if the order cannot be computed; unreachable through
    /// `add_edge`, which rejects cycles up front.
    pub fn build(self) -> Result<BeliefGraph, ValidationError> {
        let order = topology::topological_order(&self.dag)?;
        let levels = topology::levels(&self.dag, &order);
        debug!(
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            levels = levels.len(),
            "built belief graph"
        );
        Ok(BeliefGraph {
            order: order.iter().map(|n| n.index()).collect(),
            levels: levels
                .into_iter()
                .map(|level| level.into_iter().map(NodeIndex::index).collect())
                .collect(),
            nodes: self.nodes,
            edges: self.edges,
            incoming: self.incoming,
            outgoing: self.outgoing,
            index: self.index,
            dag: self.dag,
        })
    }
}

/// Immutable belief graph with a precomputed evaluation order.
#[derive(Debug, Clone)]
pub struct BeliefGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    incoming: Vec<Vec<usize>>,
    outgoing: Vec<Vec<usize>>,
    index: HashMap<NodeId, NodeIndex>,
    dag: Dag,
    order: Vec<usize>,
    levels: Vec<Vec<usize>>,
}

impl BeliefGraph {
    /// Starts building a graph.
    #[must_use]
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Looks up a node.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.position(id).map(|i| &self.nodes[i])
    }

    /// Incoming edges of `id`, in parent order.
    #[must_use]
    pub fn incoming(&self, id: &NodeId) -> Vec<&Edge> {
        self.position(id).map(|i| self.incoming_edges(i)).unwrap_or_default()
    }

    /// Parent ids of `id`, in parent order.
    #[must_use]
    pub fn parents(&self, id: &NodeId) -> Vec<&NodeId> {
        self.incoming(id).into_iter().map(|e| &e.source).collect()
    }

    /// Child ids of `id`, in edge insertion order.
    #[must_use]
    pub fn children(&self, id: &NodeId) -> Vec<&NodeId> {
        self.position(id)
            .map(|i| self.outgoing[i].iter().map(|&e| &self.edges[e].target).collect())
            .unwrap_or_default()
    }

    /// Node ids with every parent before its children.
    #[must_use]
    pub fn topological_ids(&self) -> Vec<&NodeId> {
        self.order.iter().map(|&i| &self.nodes[i].id).collect()
    }

    /// Returns true if adding `source -> target` would create a cycle.
    #[must_use]
    pub fn would_create_cycle(&self, source: &NodeId, target: &NodeId) -> bool {
        match (self.index.get(source), self.index.get(target)) {
            (Some(&s), Some(&t)) => topology::would_create_cycle(&self.dag, s, t),
            _ => false,
        }
    }

    pub(crate) fn position(&self, id: &NodeId) -> Option<usize> {
        self.index.get(id).map(|n| n.index())
    }

    pub(crate) fn node_at(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub(crate) fn incoming_edges(&self, idx: usize) -> Vec<&Edge> {
        self.incoming[idx].iter().map(|&e| &self.edges[e]).collect()
    }

    pub(crate) fn parent_positions(&self, idx: usize) -> Vec<usize> {
        self.incoming[idx]
            .iter()
            .filter_map(|&e| self.position(&self.edges[e].source))
            .collect()
    }

    pub(crate) fn order(&self) -> &[usize] {
        &self.order
    }

    pub(crate) fn levels(&self) -> &[Vec<usize>] {
        &self.levels
    }

    pub(crate) fn descendants_of(&self, idx: usize) -> Vec<usize> {
        topology::descendants(&self.dag, NodeIndex::new(idx))
            .into_iter()
            .map(NodeIndex::index)
            .collect()
    }

    pub(crate) fn ancestors_of(&self, idx: usize) -> Vec<usize> {
        topology::ancestors(&self.dag, NodeIndex::new(idx))
            .into_iter()
            .map(NodeIndex::index)
            .collect()
    }
}
