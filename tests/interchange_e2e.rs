use std::fs;

use beliefgraph::{EngineConfig, GraphDocument, GraphFolder, NodeId, Probability, Rule};

const DOCUMENT: &str = r#"{
    "version": "2",
    "nodes": [
        { "id": "rain", "type": "fact", "label": "Rain", "prob": 0.6 },
        { "id": "sprinkler", "type": "fact", "prob": 0.4 },
        { "id": "forecast", "type": "fact" },
        { "id": "wet", "type": "assertion", "description": "Grass is wet" },
        { "id": "umbrella", "type": "assertion" },
        { "id": "outside", "type": "and" },
        { "id": "todo", "type": "note", "label": "check sensor data" }
    ],
    "edges": [
        { "id": "e1", "source": "rain", "target": "wet", "type": "supports",
          "cpt": { "condTrue": 80, "condFalse": 20, "baseline": 50 } },
        { "id": "e2", "source": "sprinkler", "target": "wet",
          "cpt": { "condTrue": 70, "condFalse": 30, "baseline": 50 } },
        { "id": "e3", "source": "forecast", "target": "umbrella", "weight": 0.7,
          "contributingFactors": ["habit", " habit "],
          "cpt": { "condTrue": 90, "condFalse": 10, "baseline": 50 } },
        { "id": "e4", "source": "wet", "target": "outside", "inverted": true, "type": "opposes" },
        { "id": "e5", "source": "umbrella", "target": "outside" },
        { "id": "e6", "source": "todo", "target": "wet" }
    ]
}"#;

#[test]
fn document_file_evaluates_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.json");
    fs::write(&path, DOCUMENT).unwrap();

    let config = EngineConfig::default();
    let graph = GraphDocument::from_path(&path).unwrap().into_graph(&config).unwrap();
    assert_eq!(graph.len(), 6);
    assert!(graph.node(&NodeId::from("todo")).is_none());
    assert_eq!(graph.node(&NodeId::from("wet")).unwrap().rule, Rule::MultiBayes);
    assert_eq!(graph.node(&NodeId::from("umbrella")).unwrap().rule, Rule::SingleBayes);

    let mut folder = GraphFolder::with_config(&graph, config);
    folder.run().unwrap();

    let wet = folder.probability_of(&NodeId::from("wet")).unwrap().value();
    assert!((wet - 0.4864).abs() < 1e-12);

    // forecast defaults to 0.99
    let umbrella = folder.probability_of(&NodeId::from("umbrella")).unwrap().value();
    assert!((umbrella - (0.9 * 0.99 + 0.1 * 0.01)).abs() < 1e-12);

    let outside = folder.probability_of(&NodeId::from("outside")).unwrap().value();
    assert!((outside - (1.0 - wet) * umbrella).abs() < 1e-12);
}

#[test]
fn configured_fact_probability_applies_to_bare_facts() {
    let config = EngineConfig {
        fact_probability: Probability::new(0.75).unwrap(),
        ..EngineConfig::default()
    };
    let graph = GraphDocument::from_json_str(DOCUMENT)
        .unwrap()
        .into_graph(&config)
        .unwrap();
    let forecast = graph.node(&NodeId::from("forecast")).unwrap();
    assert_eq!(forecast.probability.map(Probability::value), Some(0.75));
}

#[test]
fn legacy_document_from_reader_is_migrated() {
    let legacy = DOCUMENT.replacen("\"version\": \"2\",", "\"version\": \"1\",", 1);
    let doc = GraphDocument::from_reader(legacy.as_bytes()).unwrap();
    assert_eq!(doc.version.as_deref(), Some("2"));
}

#[test]
fn graph_serializes_back_to_an_equivalent_document() {
    let config = EngineConfig::default();
    let graph = GraphDocument::from_json_str(DOCUMENT)
        .unwrap()
        .into_graph(&config)
        .unwrap();
    let json = GraphDocument::from_graph(&graph).to_json_pretty().unwrap();
    let rebuilt = GraphDocument::from_json_str(&json).unwrap().into_graph(&config).unwrap();

    let mut a = GraphFolder::new(&graph);
    let mut b = GraphFolder::new(&rebuilt);
    a.fold().unwrap();
    b.fold().unwrap();
    for node in graph.nodes() {
        let x = a.evaluation(&node.id).unwrap().probability.value();
        let y = b.evaluation(&node.id).unwrap().probability.value();
        assert_eq!(x.to_bits(), y.to_bits(), "{}", node.id);
    }

    let edge = rebuilt.incoming(&NodeId::from("umbrella"))[0];
    assert_eq!(edge.contributing_factors, vec!["habit".to_string()]);
    assert_eq!(edge.weight, Some(0.7));
}

#[test]
fn report_json_lists_every_node() {
    let graph = GraphDocument::from_json_str(DOCUMENT)
        .unwrap()
        .into_graph(&EngineConfig::default())
        .unwrap();
    let mut folder = GraphFolder::new(&graph);
    folder.fold().unwrap();
    let json: serde_json::Value = serde_json::from_str(&folder.report().to_json_pretty().unwrap()).unwrap();
    let nodes = json["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 6);
    assert!(nodes.iter().all(|n| n["probability"].is_number()));
}

#[test]
fn missing_file_is_an_interchange_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = GraphDocument::from_path(dir.path().join("absent.json")).unwrap_err();
    assert!(err.is_interchange());
}

#[test]
fn out_of_range_values_in_files_are_invalid_input() {
    let dir = tempfile::tempdir().unwrap();
    let graph_path = dir.path().join("graph.json");
    fs::write(&graph_path, DOCUMENT.replacen("\"prob\": 0.6", "\"prob\": 1.6", 1)).unwrap();
    assert!(GraphDocument::from_path(&graph_path).unwrap_err().is_invalid_input());

    let config_path = dir.path().join("engine.json");
    fs::write(&config_path, r#"{"fact_probability": -0.1}"#).unwrap();
    assert!(EngineConfig::from_path(&config_path).unwrap_err().is_invalid_input());
}
