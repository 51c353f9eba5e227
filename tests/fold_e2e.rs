use std::collections::HashMap;

use beliefgraph::{
    BeliefError, BeliefGraph, Cpt, Diagnostic, Edge, EngineConfig, EvaluationError, GraphFolder, Node, NodeId,
    Probability, Rule, ValidationError,
};

fn p(v: f64) -> Probability {
    Probability::new(v).unwrap()
}

fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

fn cpt(t: f64, f: f64, b: f64) -> Cpt {
    Cpt::new(t, f, b).unwrap()
}

/// Diagnosis-style graph:
///
/// ```text
/// smoker, exposure, age         (facts)
/// damage   = multi(smoker, exposure, age)
/// cough    = single(damage)
/// imaging  = single(damage)
/// flagged  = or(cough, imaging)
/// clear    = and(!damage, !cough)
/// ```
fn diagnosis() -> BeliefGraph {
    let mut b = BeliefGraph::builder();
    b.add_node(Node::fact("smoker", p(0.3))).unwrap();
    b.add_node(Node::fact("exposure", p(0.2))).unwrap();
    b.add_node(Node::fact("age", p(0.6))).unwrap();
    b.add_node(Node::derived("damage", Rule::MultiBayes)).unwrap();
    b.add_node(Node::derived("cough", Rule::SingleBayes)).unwrap();
    b.add_node(Node::derived("imaging", Rule::SingleBayes)).unwrap();
    b.add_node(Node::derived("flagged", Rule::Or)).unwrap();
    b.add_node(Node::derived("clear", Rule::And)).unwrap();

    b.add_edge(Edge::new("smoker", "damage").with_cpt(cpt(60.0, 10.0, 20.0))).unwrap();
    b.add_edge(Edge::new("exposure", "damage").with_cpt(cpt(50.0, 15.0, 20.0))).unwrap();
    b.add_edge(Edge::new("age", "damage").with_cpt(cpt(30.0, 12.0, 20.0))).unwrap();
    b.add_edge(Edge::new("damage", "cough").with_cpt(cpt(85.0, 25.0, 40.0))).unwrap();
    b.add_edge(Edge::new("damage", "imaging").with_cpt(cpt(90.0, 5.0, 30.0))).unwrap();
    b.add_edge(Edge::new("cough", "flagged")).unwrap();
    b.add_edge(Edge::new("imaging", "flagged")).unwrap();
    b.add_edge(Edge::new("damage", "clear").inverted(true)).unwrap();
    b.add_edge(Edge::new("cough", "clear").inverted(true)).unwrap();
    b.build().unwrap()
}

#[test]
fn fold_values_follow_the_rules() {
    let g = diagnosis();
    let mut folder = GraphFolder::new(&g);
    folder.fold().unwrap();

    let value = |folder: &GraphFolder<'_>, n: &str| folder.evaluation(&id(n)).unwrap().probability.value();
    let damage = value(&folder, "damage");
    let cough = value(&folder, "cough");
    let imaging = value(&folder, "imaging");

    assert!((cough - (0.85 * damage + 0.25 * (1.0 - damage))).abs() < 1e-12);
    assert!((imaging - (0.90 * damage + 0.05 * (1.0 - damage))).abs() < 1e-12);
    let flagged = 1.0 - (1.0 - cough) * (1.0 - imaging);
    assert!((value(&folder, "flagged") - flagged).abs() < 1e-12);
    let clear = (1.0 - damage) * (1.0 - cough);
    assert!((value(&folder, "clear") - clear).abs() < 1e-12);
    assert!(folder.diagnostics(&id("damage")).is_empty());
}

#[test]
fn parallel_fold_is_bit_identical_to_sequential() {
    let g = diagnosis();
    let mut sequential = GraphFolder::new(&g);
    sequential.fold().unwrap();

    for workers in [1, 2, 8] {
        let config = EngineConfig {
            workers,
            queue_capacity: 1,
            ..EngineConfig::default()
        };
        let mut parallel = GraphFolder::with_config(&g, config);
        parallel.fold_parallel().unwrap();
        for node in g.nodes() {
            let a = sequential.evaluation(&node.id).unwrap().probability.value();
            let b = parallel.evaluation(&node.id).unwrap().probability.value();
            assert_eq!(a.to_bits(), b.to_bits(), "{} with {workers} workers", node.id);
        }
    }
}

#[test]
fn repeated_queries_are_idempotent() {
    let g = diagnosis();
    let mut folder = GraphFolder::new(&g);
    let first = folder.probability_of(&id("flagged")).unwrap();
    folder.fold().unwrap();
    let second = folder.probability_of(&id("flagged")).unwrap();
    assert_eq!(first.value().to_bits(), second.value().to_bits());

    let mut fresh = GraphFolder::new(&g);
    let third = fresh.probability_of(&id("flagged")).unwrap();
    assert_eq!(first.value().to_bits(), third.value().to_bits());
}

#[test]
fn changing_a_fact_recomputes_descendants_only() {
    let g = diagnosis();
    let mut folder = GraphFolder::new(&g);
    folder.fold().unwrap();
    let cough_before = folder.probability_of(&id("cough")).unwrap().value();

    folder.set_fact_probability(&id("smoker"), p(0.9)).unwrap();
    assert!(folder.evaluation(&id("exposure")).is_some());
    assert!(folder.evaluation(&id("damage")).is_none());
    assert!(folder.evaluation(&id("flagged")).is_none());

    let cough_after = folder.probability_of(&id("cough")).unwrap().value();
    assert!(cough_after > cough_before);

    // The same override from scratch gives the same value.
    let mut fresh = GraphFolder::new(&g);
    fresh.set_fact_probability(&id("smoker"), p(0.9)).unwrap();
    let expected = fresh.probability_of(&id("cough")).unwrap().value();
    assert_eq!(cough_after.to_bits(), expected.to_bits());
}

#[test]
fn inconsistent_baselines_surface_as_diagnostics() {
    let mut b = BeliefGraph::builder();
    b.add_node(Node::fact("a", p(0.5))).unwrap();
    b.add_node(Node::fact("b", p(0.5))).unwrap();
    b.add_node(Node::derived("c", Rule::MultiBayes)).unwrap();
    b.add_edge(Edge::new("a", "c").with_cpt(cpt(80.0, 20.0, 40.0))).unwrap();
    b.add_edge(Edge::new("b", "c").with_cpt(cpt(70.0, 30.0, 60.0))).unwrap();
    let g = b.build().unwrap();

    let mut folder = GraphFolder::new(&g);
    let v = folder.probability_of(&id("c")).unwrap().value();
    assert!((0.0..=1.0).contains(&v));
    assert!(folder.baselines_inconsistent(&id("c")));
    assert_eq!(
        folder.diagnostics(&id("c")),
        &[Diagnostic::BaselineInconsistency {
            baselines: vec![40.0, 60.0]
        }]
    );

    let report = folder.report();
    assert_eq!(report.baseline_inconsistencies().count(), 1);
}

#[test]
fn single_bayes_with_two_parents_is_an_arity_error() {
    let mut b = BeliefGraph::builder();
    b.add_node(Node::fact("a", p(0.5))).unwrap();
    b.add_node(Node::fact("b", p(0.5))).unwrap();
    b.add_node(Node::derived("c", Rule::SingleBayes)).unwrap();
    b.add_edge(Edge::new("a", "c").with_cpt(cpt(80.0, 20.0, 50.0))).unwrap();
    b.add_edge(Edge::new("b", "c").with_cpt(cpt(80.0, 20.0, 50.0))).unwrap();
    let g = b.build().unwrap();

    let err = GraphFolder::new(&g).probability_of(&id("c")).unwrap_err();
    assert!(matches!(
        err,
        BeliefError::Evaluation(EvaluationError::RuleArityMismatch { parents: 2, .. })
    ));
}

#[test]
fn missing_cpt_on_bayes_edge_is_invalid_input() {
    let mut b = BeliefGraph::builder();
    b.add_node(Node::fact("a", p(0.5))).unwrap();
    b.add_node(Node::derived("c", Rule::SingleBayes)).unwrap();
    b.add_edge(Edge::new("a", "c")).unwrap();
    let g = b.build().unwrap();

    let err = GraphFolder::new(&g).probability_of(&id("c")).unwrap_err();
    assert!(err.is_invalid_input());
}

#[test]
fn structural_errors_are_rejected_at_build_time() {
    let mut b = BeliefGraph::builder();
    b.add_node(Node::fact("a", p(0.5))).unwrap();
    b.add_node(Node::derived("x", Rule::Or)).unwrap();
    b.add_node(Node::derived("y", Rule::Or)).unwrap();
    b.add_edge(Edge::new("x", "y")).unwrap();

    assert!(matches!(b.add_edge(Edge::new("y", "x")), Err(ValidationError::Cycle { .. })));
    assert!(matches!(b.add_edge(Edge::new("x", "x")), Err(ValidationError::SelfLoop { .. })));
    assert!(matches!(
        b.add_edge(Edge::new("x", "a")),
        Err(ValidationError::FactWithParents { .. })
    ));
    assert!(matches!(
        b.add_node(Node::derived("x", Rule::And)),
        Err(ValidationError::DuplicateNode { .. })
    ));
    assert!(matches!(
        b.add_edge(Edge::new("ghost", "x")),
        Err(ValidationError::UnknownNode { .. })
    ));
}

#[test]
fn interventions_propagate_downstream_only() {
    let g = diagnosis();
    let mut folder = GraphFolder::new(&g);
    folder.fold().unwrap();
    let observed = folder.probability_of(&id("flagged")).unwrap();

    let out = folder.compute_do(&HashMap::from([(id("damage"), Probability::ONE)])).unwrap();
    assert_eq!(out[&id("smoker")].value(), 0.3);
    assert!((out[&id("cough")].value() - 0.85).abs() < 1e-12);
    assert!((out[&id("imaging")].value() - 0.90).abs() < 1e-12);
    assert_eq!(out[&id("clear")].value(), 0.0);

    // the cached observational run is unchanged
    let again = folder.probability_of(&id("flagged")).unwrap();
    assert_eq!(observed.value().to_bits(), again.value().to_bits());
}

#[test]
fn treatment_effect_signs_follow_edge_polarity() {
    let g = diagnosis();
    let config = EngineConfig {
        workers: 2,
        ..EngineConfig::default()
    };
    let folder = GraphFolder::with_config(&g, config);

    let cough = folder.average_treatment_effect(&id("damage"), &id("cough")).unwrap();
    assert!((cough.effect - 0.6).abs() < 1e-12);

    // clear = and(!damage, !cough): 0 under do(damage=1), 0.75 under do(damage=0)
    let clear = folder.average_treatment_effect(&id("damage"), &id("clear")).unwrap();
    assert_eq!(clear.treated.value(), 0.0);
    assert!((clear.control.value() - 0.75).abs() < 1e-12);
    assert!((clear.effect + 0.75).abs() < 1e-12);
    assert!(folder.cache().is_empty());
}
