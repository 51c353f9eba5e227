//! Interventional queries: `P(V | do(X = x))`.
//!
//! An intervention pins a node to a fixed probability and cuts its incoming
//! edges; nodes upstream of it are unaffected, nodes downstream see the
//! pinned value. Each query folds a scoped copy of the folder (same graph,
//! same fact overrides, empty cache) so nothing leaks into the caller's
//! cached run.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use super::{GraphFolder, ProbabilityCache};
use crate::error::{BeliefError, BeliefResult};
use crate::graph::NodeId;
use crate::probability::Probability;
use crate::report::RunId;

/// Effect on an outcome of forcing a treatment node true versus false.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TreatmentEffect {
    /// P(outcome | do(treatment = 1)).
    pub treated: Probability,
    /// P(outcome | do(treatment = 0)).
    pub control: Probability,
    /// `treated - control`, in [-1, 1].
    pub effect: f64,
}

impl GraphFolder<'_> {
    /// Evaluates every node under the given interventions and returns the
    /// interventional probability of each node.
    ///
    /// Intervened nodes take their pinned value regardless of rule or
    /// parents. Fact overrides of this folder still apply to facts that are
    /// not intervened. This folder's cache is left untouched. The scoped
    /// fold runs sequentially or in parallel like [`run`](Self::run).
    ///
    /// # Errors
    ///
    /// `NodeNotFound` if an intervention names an unknown node, or the
    /// first evaluation error of the scoped fold.
    pub fn compute_do(&self, interventions: &HashMap<NodeId, Probability>) -> BeliefResult<HashMap<NodeId, Probability>> {
        let mut pinned = HashMap::with_capacity(interventions.len());
        for (id, probability) in interventions {
            pinned.insert(self.position(id)?, *probability);
        }

        let mut scoped = GraphFolder {
            graph: self.graph,
            evaluator: self.evaluator,
            config: self.config.clone(),
            cache: ProbabilityCache::with_size(self.graph.len()),
            fact_overrides: self.fact_overrides.clone(),
            interventions: pinned,
            run_id: RunId::new(),
        };
        debug!(
            run = %self.run_id,
            scoped_run = %scoped.run_id,
            interventions = interventions.len(),
            "interventional fold"
        );
        scoped.run()?;

        Ok(scoped
            .cache
            .evaluations()
            .map(|e| (e.node.clone(), e.probability))
            .collect())
    }

    /// Average treatment effect of `treatment` on `outcome`:
    /// `P(outcome | do(treatment = 1)) - P(outcome | do(treatment = 0))`.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` for an unknown id, or an evaluation error of either
    /// interventional fold.
    pub fn average_treatment_effect(&self, treatment: &NodeId, outcome: &NodeId) -> BeliefResult<TreatmentEffect> {
        self.position(outcome)?;
        let outcome_under = |value: Probability| -> BeliefResult<Probability> {
            let interventions = HashMap::from([(treatment.clone(), value)]);
            self.compute_do(&interventions)?
                .get(outcome)
                .copied()
                .ok_or_else(|| BeliefError::internal(format!("node {outcome} missing after interventional fold")))
        };

        let treated = outcome_under(Probability::ONE)?;
        let control = outcome_under(Probability::ZERO)?;
        Ok(TreatmentEffect {
            treated,
            control,
            effect: treated.value() - control.value(),
        })
    }
}
