//! Graph folder: topological evaluation with an explicit cache.
//!
//! A [`GraphFolder`] is the working context of one evaluation run over an
//! immutable [`BeliefGraph`]. It owns the [`ProbabilityCache`]; the graph
//! owns structure. Fact inputs can be overridden between queries, which
//! invalidates the fact and everything downstream of it.
//!
//! Interventional queries (`do(X = x)`) run in a scoped folder of their own
//! and never touch this folder's cache; see [`GraphFolder::compute_do`].
//!
//! Evaluation errors abort the failing node. Its descendants stay
//! unresolved.

mod intervention;
mod parallel;

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{BeliefError, BeliefResult, EvaluationError};
use crate::evaluator::{Diagnostic, Evaluation, NodeEvaluator};
use crate::graph::{BeliefGraph, NodeId, Rule};
use crate::probability::Probability;
use crate::report::{EvaluationReport, NodeReport, RunId};

pub use intervention::TreatmentEffect;

/// Resolved evaluations of one run, indexed by node position.
#[derive(Debug, Clone, Default)]
pub struct ProbabilityCache {
    slots: Vec<Option<Evaluation>>,
}

impl ProbabilityCache {
    fn with_size(size: usize) -> Self {
        Self {
            slots: vec![None; size],
        }
    }

    /// Number of resolved nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Returns true if nothing is resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// All resolved evaluations, in node insertion order.
    pub fn evaluations(&self) -> impl Iterator<Item = &Evaluation> {
        self.slots.iter().flatten()
    }

    pub(crate) fn get(&self, idx: usize) -> Option<&Evaluation> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    pub(crate) fn contains(&self, idx: usize) -> bool {
        self.get(idx).is_some()
    }

    pub(crate) fn insert(&mut self, idx: usize, evaluation: Evaluation) {
        self.slots[idx] = Some(evaluation);
    }

    fn remove(&mut self, idx: usize) -> bool {
        self.slots[idx].take().is_some()
    }

    fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }
}

/// Working context of one evaluation run.
#[derive(Debug)]
pub struct GraphFolder<'g> {
    graph: &'g BeliefGraph,
    evaluator: NodeEvaluator,
    config: EngineConfig,
    cache: ProbabilityCache,
    fact_overrides: HashMap<usize, Probability>,
    /// Nodes pinned by `do(X = x)`; only ever non-empty in a scoped folder.
    interventions: HashMap<usize, Probability>,
    run_id: RunId,
}

impl<'g> GraphFolder<'g> {
    /// Creates a folder with the default configuration.
    #[must_use]
    pub fn new(graph: &'g BeliefGraph) -> Self {
        Self::with_config(graph, EngineConfig::default())
    }

    /// Creates a folder with an explicit configuration.
    #[must_use]
    pub fn with_config(graph: &'g BeliefGraph, config: EngineConfig) -> Self {
        Self {
            graph,
            evaluator: NodeEvaluator::new(config.parent_guideline),
            config,
            cache: ProbabilityCache::with_size(graph.len()),
            fact_overrides: HashMap::new(),
            interventions: HashMap::new(),
            run_id: RunId::new(),
        }
    }

    /// The graph being folded.
    #[must_use]
    pub const fn graph(&self) -> &'g BeliefGraph {
        self.graph
    }

    /// The resolved-probability cache.
    #[must_use]
    pub const fn cache(&self) -> &ProbabilityCache {
        &self.cache
    }

    /// Identifier of this run.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Returns P(`id` = true), evaluating uncached ancestors first.
    ///
    /// A cached value is returned unchanged.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` for an unknown id, or the first evaluation error among
    /// the node and its ancestors.
    pub fn probability_of(&mut self, id: &NodeId) -> BeliefResult<Probability> {
        self.evaluate(id).map(|e| e.probability)
    }

    /// Like [`probability_of`](Self::probability_of) but returns the full
    /// evaluation.
    ///
    /// # Errors
    ///
    /// Same as [`probability_of`](Self::probability_of).
    pub fn evaluate(&mut self, id: &NodeId) -> BeliefResult<&Evaluation> {
        let idx = self.position(id)?;
        if !self.cache.contains(idx) {
            let mut needed: HashSet<usize> = self.graph.ancestors_of(idx).into_iter().collect();
            needed.insert(idx);
            let pending: Vec<usize> = self
                .graph
                .order()
                .iter()
                .copied()
                .filter(|i| needed.contains(i) && !self.cache.contains(*i))
                .collect();
            debug!(node = %id, pending = pending.len(), "resolving node lazily");
            for i in pending {
                self.evaluate_at(i)?;
            }
        }
        self.cache
            .get(idx)
            .ok_or_else(|| BeliefError::internal(format!("node {id} missing after evaluation")))
    }

    /// Cached evaluation of `id`, if resolved.
    #[must_use]
    pub fn evaluation(&self, id: &NodeId) -> Option<&Evaluation> {
        self.graph.position(id).and_then(|i| self.cache.get(i))
    }

    /// Diagnostics of `id`; empty when unresolved.
    #[must_use]
    pub fn diagnostics(&self, id: &NodeId) -> &[Diagnostic] {
        self.evaluation(id)
            .map(|e| e.diagnostics.as_slice())
            .unwrap_or_default()
    }

    /// Returns true if `id` was resolved with inconsistent parent baselines.
    #[must_use]
    pub fn baselines_inconsistent(&self, id: &NodeId) -> bool {
        self.evaluation(id).is_some_and(Evaluation::baselines_inconsistent)
    }

    /// Evaluates every unresolved node in topological order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing node in topological order.
    pub fn fold(&mut self) -> BeliefResult<()> {
        let pending: Vec<usize> = self
            .graph
            .order()
            .iter()
            .copied()
            .filter(|i| !self.cache.contains(*i))
            .collect();
        debug!(run = %self.run_id, pending = pending.len(), "sequential fold");
        for idx in pending {
            self.evaluate_at(idx)?;
        }
        Ok(())
    }

    /// Evaluates every unresolved node, one topological level at a time,
    /// on `config.workers` threads.
    ///
    /// Produces the same values as [`fold`](Self::fold).
    ///
    /// # Errors
    ///
    /// Stops after the first level with a failure and returns that level's
    /// first failure in topological order.
    pub fn fold_parallel(&mut self) -> BeliefResult<()> {
        let workers = self.config.workers.max(1);
        let capacity = self.config.queue_capacity.max(1);
        debug!(run = %self.run_id, workers, "parallel fold");
        parallel::fold_levels(self, workers, capacity)
    }

    /// Folds sequentially or in parallel depending on `config.workers`.
    ///
    /// # Errors
    ///
    /// See [`fold`](Self::fold) and [`fold_parallel`](Self::fold_parallel).
    pub fn run(&mut self) -> BeliefResult<()> {
        if self.config.workers > 1 {
            self.fold_parallel()
        } else {
            self.fold()
        }
    }

    /// Replaces the probability of a fact and invalidates it and everything
    /// downstream.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` for an unknown id; `NotAFact` if the node is derived.
    pub fn set_fact_probability(&mut self, id: &NodeId, probability: Probability) -> BeliefResult<usize> {
        let idx = self.position(id)?;
        if self.graph.node_at(idx).rule != Rule::Fact {
            return Err(EvaluationError::NotAFact { id: id.clone() }.into());
        }
        self.fact_overrides.insert(idx, probability);
        Ok(self.invalidate_at(idx))
    }

    /// Drops the cached value of `id` and of all its descendants.
    ///
    /// Returns how many cached entries were dropped.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` for an unknown id.
    pub fn invalidate(&mut self, id: &NodeId) -> BeliefResult<usize> {
        let idx = self.position(id)?;
        Ok(self.invalidate_at(idx))
    }

    /// Drops every cached value. Fact overrides are kept.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Snapshot of every node, resolved or not, in topological order.
    #[must_use]
    pub fn report(&self) -> EvaluationReport {
        let nodes = self
            .graph
            .order()
            .iter()
            .map(|&idx| {
                let node = self.graph.node_at(idx);
                let evaluation = self.cache.get(idx);
                NodeReport {
                    id: node.id.clone(),
                    label: node.label.clone(),
                    rule: node.rule,
                    probability: evaluation.map(|e| e.probability),
                    diagnostics: evaluation.map(|e| e.diagnostics.clone()).unwrap_or_default(),
                }
            })
            .collect();
        EvaluationReport::new(self.run_id, nodes)
    }

    fn position(&self, id: &NodeId) -> BeliefResult<usize> {
        self.graph
            .position(id)
            .ok_or_else(|| EvaluationError::NodeNotFound { id: id.clone() }.into())
    }

    fn invalidate_at(&mut self, idx: usize) -> usize {
        let mut dropped = usize::from(self.cache.remove(idx));
        for d in self.graph.descendants_of(idx) {
            dropped += usize::from(self.cache.remove(d));
        }
        debug!(node = %self.graph.node_at(idx).id, dropped, "invalidated downstream cache");
        dropped
    }

    /// Externally fixed value of `idx`: an intervention, else a fact
    /// override. Intervened nodes ignore their parents entirely.
    fn pinned(&self, idx: usize) -> Option<Evaluation> {
        self.interventions
            .get(&idx)
            .or_else(|| self.fact_overrides.get(&idx))
            .map(|p| Evaluation::fact(self.graph.node_at(idx).id.clone(), *p))
    }

    /// Cached parent values of `idx`, in parent order.
    fn parent_values(&self, idx: usize) -> Vec<Option<Probability>> {
        self.graph
            .parent_positions(idx)
            .into_iter()
            .map(|p| self.cache.get(p).map(|e| e.probability))
            .collect()
    }

    fn evaluate_at(&mut self, idx: usize) -> BeliefResult<()> {
        let evaluation = if let Some(evaluation) = self.pinned(idx) {
            evaluation
        } else {
            let graph = self.graph;
            let incoming = graph.incoming_edges(idx);
            self.evaluator
                .evaluate(graph.node_at(idx), &incoming, &self.parent_values(idx))?
        };
        self.cache.insert(idx, evaluation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpt::Cpt;
    use crate::graph::{Edge, Node};

    fn p(v: f64) -> Probability {
        Probability::new(v).unwrap()
    }

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    /// a, b facts; c = single(a); d = multi(a, b); e = and(c, d)
    fn graph() -> BeliefGraph {
        let mut g = BeliefGraph::builder();
        g.add_node(Node::fact("a", p(0.6))).unwrap();
        g.add_node(Node::fact("b", p(0.4))).unwrap();
        g.add_node(Node::derived("c", Rule::SingleBayes)).unwrap();
        g.add_node(Node::derived("d", Rule::MultiBayes)).unwrap();
        g.add_node(Node::derived("e", Rule::And)).unwrap();
        g.add_edge(Edge::new("a", "c").with_cpt(Cpt::new(80.0, 20.0, 50.0).unwrap())).unwrap();
        g.add_edge(Edge::new("a", "d").with_cpt(Cpt::new(80.0, 20.0, 50.0).unwrap())).unwrap();
        g.add_edge(Edge::new("b", "d").with_cpt(Cpt::new(70.0, 30.0, 50.0).unwrap())).unwrap();
        g.add_edge(Edge::new("c", "e")).unwrap();
        g.add_edge(Edge::new("d", "e")).unwrap();
        g.build().unwrap()
    }

    #[test]
    fn test_lazy_query_resolves_only_ancestors() {
        let g = graph();
        let mut folder = GraphFolder::new(&g);
        let c = folder.probability_of(&id("c")).unwrap();
        assert!((c.value() - (0.8 * 0.6 + 0.2 * 0.4)).abs() < 1e-12);
        assert_eq!(folder.cache().len(), 2);
        assert!(folder.evaluation(&id("d")).is_none());
    }

    #[test]
    fn test_fold_resolves_everything() {
        let g = graph();
        let mut folder = GraphFolder::new(&g);
        folder.fold().unwrap();
        assert_eq!(folder.cache().len(), 5);
        let d = folder.evaluation(&id("d")).unwrap().probability.value();
        assert!((d - 0.4864).abs() < 1e-12);
        let c = folder.evaluation(&id("c")).unwrap().probability.value();
        let e = folder.evaluation(&id("e")).unwrap().probability.value();
        assert_eq!(e.to_bits(), (1.0 * c * d).to_bits());
    }

    #[test]
    fn test_cached_value_is_bit_identical() {
        let g = graph();
        let mut folder = GraphFolder::new(&g);
        let first = folder.probability_of(&id("e")).unwrap();
        let second = folder.probability_of(&id("e")).unwrap();
        assert_eq!(first.value().to_bits(), second.value().to_bits());
    }

    #[test]
    fn test_set_fact_invalidates_downstream() {
        let g = graph();
        let mut folder = GraphFolder::new(&g);
        folder.fold().unwrap();
        let before = folder.probability_of(&id("e")).unwrap();

        let dropped = folder.set_fact_probability(&id("b"), p(0.9)).unwrap();
        // b, d, e
        assert_eq!(dropped, 3);
        assert!(folder.evaluation(&id("c")).is_some());
        assert!(folder.evaluation(&id("e")).is_none());

        let after = folder.probability_of(&id("e")).unwrap();
        assert!(after.value() > before.value());
        assert_eq!(folder.probability_of(&id("b")).unwrap().value(), 0.9);
    }

    #[test]
    fn test_set_fact_rejects_derived_nodes() {
        let g = graph();
        let mut folder = GraphFolder::new(&g);
        let err = folder.set_fact_probability(&id("c"), p(0.1)).unwrap_err();
        assert!(matches!(
            err,
            BeliefError::Evaluation(EvaluationError::NotAFact { .. })
        ));
    }

    #[test]
    fn test_unknown_node() {
        let g = graph();
        let mut folder = GraphFolder::new(&g);
        assert!(folder.probability_of(&id("zzz")).is_err());
        assert!(folder.invalidate(&id("zzz")).is_err());
    }

    #[test]
    fn test_arity_error_aborts_dependents() {
        let mut b = BeliefGraph::builder();
        b.add_node(Node::fact("a", p(0.5))).unwrap();
        b.add_node(Node::fact("b", p(0.5))).unwrap();
        b.add_node(Node::derived("bad", Rule::SingleBayes)).unwrap();
        b.add_node(Node::derived("after", Rule::Or)).unwrap();
        b.add_edge(Edge::new("a", "bad").with_cpt(Cpt::new(80.0, 20.0, 50.0).unwrap())).unwrap();
        b.add_edge(Edge::new("b", "bad").with_cpt(Cpt::new(80.0, 20.0, 50.0).unwrap())).unwrap();
        b.add_edge(Edge::new("bad", "after")).unwrap();
        let g = b.build().unwrap();

        let mut folder = GraphFolder::new(&g);
        let err = folder.fold().unwrap_err();
        assert!(err.is_arity_mismatch());
        assert!(folder.evaluation(&id("after")).is_none());
        assert!(folder.probability_of(&id("a")).is_ok());
    }

    #[test]
    fn test_baseline_flag_queryable() {
        let mut b = BeliefGraph::builder();
        b.add_node(Node::fact("a", p(0.5))).unwrap();
        b.add_node(Node::fact("b", p(0.5))).unwrap();
        b.add_node(Node::derived("x", Rule::MultiBayes)).unwrap();
        b.add_edge(Edge::new("a", "x").with_cpt(Cpt::new(80.0, 20.0, 40.0).unwrap())).unwrap();
        b.add_edge(Edge::new("b", "x").with_cpt(Cpt::new(70.0, 30.0, 60.0).unwrap())).unwrap();
        let g = b.build().unwrap();

        let mut folder = GraphFolder::new(&g);
        assert!(!folder.baselines_inconsistent(&id("x")));
        folder.probability_of(&id("x")).unwrap();
        assert!(folder.baselines_inconsistent(&id("x")));
        assert_eq!(folder.diagnostics(&id("x")).len(), 1);
    }

    #[test]
    fn test_clear_keeps_overrides() {
        let g = graph();
        let mut folder = GraphFolder::new(&g);
        folder.set_fact_probability(&id("a"), p(0.1)).unwrap();
        folder.fold().unwrap();
        folder.clear();
        assert!(folder.cache().is_empty());
        assert_eq!(folder.probability_of(&id("a")).unwrap().value(), 0.1);
    }

    #[test]
    fn test_report_lists_all_nodes() {
        let g = graph();
        let mut folder = GraphFolder::new(&g);
        folder.probability_of(&id("c")).unwrap();
        let report = folder.report();
        assert_eq!(report.nodes.len(), 5);
        assert_eq!(report.run_id, folder.run_id());
        let resolved = report.nodes.iter().filter(|n| n.probability.is_some()).count();
        assert_eq!(resolved, 2);
    }
}
