//! # beliefgraph - Probabilistic Belief Aggregation
//!
//! beliefgraph computes P(node = true) for every node of a directed acyclic
//! belief graph. Facts carry externally supplied probabilities; every other
//! node combines its parents with one of four rules.
//!
//! ## Core Concepts
//!
//! - **Fact**: an input node with a supplied probability
//! - **CPT**: per-edge conditional table (`cond_true`, `cond_false`, `baseline`, in percent)
//! - **Combinator**: single-parent Bayes, multi-parent Naive-Bayes, AND, OR
//! - **Graph Folder**: evaluates nodes in topological order with an explicit per-run cache
//! - **Intervention**: `do(X = x)` pins a node and cuts its incoming edges for one scoped query
//!
//! ## Usage
//!
//! ```rust
//! use beliefgraph::{combine_and, combine_multi, combine_single, Cpt, Probability};
//!
//! let p = |v| Probability::new(v).unwrap();
//!
//! let single = combine_single(p(0.7), 80.0, 20.0).unwrap();
//! assert!((single.value() - 0.62).abs() < 1e-12);
//!
//! let cpts = [
//!     Cpt::new(80.0, 20.0, 50.0).unwrap(),
//!     Cpt::new(70.0, 30.0, 50.0).unwrap(),
//! ];
//! let multi = combine_multi(&[p(0.6), p(0.4)], &cpts).unwrap();
//! assert!((multi.probability.value() - 0.4864).abs() < 1e-12);
//!
//! let and = combine_and(&[p(0.8), p(0.6), p(0.9)], &[false, true, false]).unwrap();
//! assert!((and.value() - 0.288).abs() < 1e-12);
//! ```
//!
//! Whole graphs are folded through [`GraphFolder`]:
//!
//! ```rust
//! use beliefgraph::{BeliefGraph, Edge, GraphFolder, Node, NodeId, Probability, Rule};
//!
//! let mut builder = BeliefGraph::builder();
//! builder.add_node(Node::fact("rain", Probability::new(0.3)?))?;
//! builder.add_node(Node::fact("sprinkler", Probability::new(0.4)?))?;
//! builder.add_node(Node::derived("wet", Rule::Or))?;
//! builder.add_edge(Edge::new("rain", "wet"))?;
//! builder.add_edge(Edge::new("sprinkler", "wet"))?;
//! let graph = builder.build()?;
//!
//! let mut folder = GraphFolder::new(&graph);
//! let wet = folder.probability_of(&NodeId::from("wet"))?;
//! assert!((wet.value() - 0.58).abs() < 1e-12);
//! # Ok::<(), beliefgraph::BeliefError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Numeric core
pub mod combinator;
pub mod cpt;
pub mod error;
pub mod probability;

// Graph evaluation
pub mod config;
pub mod evaluator;
pub mod folder;
pub mod graph;

// Boundary formats
pub mod interchange;
pub mod report;

// Re-export primary types at crate root for convenience
pub use combinator::{
    combine_and, combine_multi, combine_or, combine_single, Combination, Combinator, Enumeration,
    EnumerationTerm, MultiBayesOutcome, MAX_ENUMERATED_PARENTS,
};
pub use config::{EngineConfig, DEFAULT_FACT_PROBABILITY};
pub use cpt::{baselines_consistent, Cpt};
pub use error::{BeliefError, BeliefResult, EvaluationError, InterchangeError, ValidationError};
pub use evaluator::{Diagnostic, Evaluation, NodeEvaluator, DEFAULT_PARENT_GUIDELINE};
pub use folder::{GraphFolder, ProbabilityCache, TreatmentEffect};
pub use graph::{BeliefGraph, Edge, EdgeKind, GraphBuilder, Node, NodeId, Rule};
pub use interchange::{EdgeRecord, GraphDocument, NodeKind, NodeRecord};
pub use probability::Probability;
pub use report::{EvaluationReport, NodeReport, RunId};
