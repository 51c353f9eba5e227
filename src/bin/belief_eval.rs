//! belief-eval
//!
//! Evaluates an interchange document and prints every node's probability.

use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use beliefgraph::{
    BeliefError, BeliefGraph, BeliefResult, Cpt, EngineConfig, Enumeration, GraphDocument, GraphFolder, NodeId,
    Probability, Rule,
};

/// Enumeration terms printed before eliding the rest.
const TRACE_TERMS: usize = 8;

/// Command-line options.
struct Options {
    /// Interchange document to evaluate.
    graph: PathBuf,
    /// Optional engine configuration file.
    config: Option<PathBuf>,
    /// Only print this node.
    node: Option<String>,
    /// Print per-rule breakdowns.
    trace: bool,
    /// Print the JSON report instead of text.
    json: bool,
    /// Worker override.
    workers: Option<usize>,
}

fn usage() {
    println!("belief-eval - evaluate a belief graph");
    println!();
    println!("USAGE:");
    println!("    belief-eval <GRAPH.json> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <FILE>       Engine configuration (JSON)");
    println!("    -n, --node <ID>           Only evaluate and print this node");
    println!("    -t, --trace               Print combination breakdowns");
    println!("        --json                Print the evaluation report as JSON");
    println!("    -w, --workers <N>         Fold on N worker threads");
    println!("    -h, --help                Print help information");
}

fn value_of(args: &[String], i: usize, flag: &str) -> String {
    if let Some(value) = args.get(i + 1) {
        value.clone()
    } else {
        eprintln!("error: {flag} requires a value");
        std::process::exit(2);
    }
}

fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let mut graph = None;
    let mut options = Options {
        graph: PathBuf::new(),
        config: None,
        node: None,
        trace: false,
        json: false,
        workers: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                options.config = Some(PathBuf::from(value_of(&args, i, "--config")));
                i += 2;
            }
            "--node" | "-n" => {
                options.node = Some(value_of(&args, i, "--node"));
                i += 2;
            }
            "--workers" | "-w" => {
                let raw = value_of(&args, i, "--workers");
                let workers: usize = raw.parse().unwrap_or_else(|_| {
                    eprintln!("error: invalid worker count: {raw}");
                    std::process::exit(2);
                });
                options.workers = Some(workers.max(1));
                i += 2;
            }
            "--trace" | "-t" => {
                options.trace = true;
                i += 1;
            }
            "--json" => {
                options.json = true;
                i += 1;
            }
            "--help" | "-h" => {
                usage();
                std::process::exit(0);
            }
            arg if arg.starts_with('-') => {
                eprintln!("error: unknown argument: {arg}");
                std::process::exit(2);
            }
            path => {
                if graph.is_some() {
                    eprintln!("error: unexpected argument: {path}");
                    std::process::exit(2);
                }
                graph = Some(PathBuf::from(path));
                i += 1;
            }
        }
    }

    if let Some(graph) = graph {
        options.graph = graph;
    } else {
        usage();
        std::process::exit(2);
    }
    options
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let options = parse_args();
    match run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(options: &Options) -> BeliefResult<()> {
    let mut config = match &options.config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };
    if let Some(workers) = options.workers {
        config.workers = workers;
    }

    let document = GraphDocument::from_path(&options.graph)?;
    let graph = document.into_graph(&config)?;
    tracing::info!(
        graph = %options.graph.display(),
        nodes = graph.len(),
        workers = config.workers,
        "evaluating"
    );

    let mut folder = GraphFolder::with_config(&graph, config);
    let targets: Vec<NodeId> = match &options.node {
        Some(id) => {
            let id = NodeId::from(id.as_str());
            folder.probability_of(&id)?;
            vec![id]
        }
        None => {
            folder.run()?;
            graph.topological_ids().into_iter().cloned().collect()
        }
    };

    if options.json {
        println!("{}", folder.report().to_json_pretty()?);
        return Ok(());
    }

    for id in &targets {
        print_node(&folder, id)?;
        if options.trace {
            print_trace(&graph, &folder, id)?;
        }
    }
    Ok(())
}

fn print_node(folder: &GraphFolder<'_>, id: &NodeId) -> BeliefResult<()> {
    let evaluation = folder
        .evaluation(id)
        .ok_or_else(|| BeliefError::internal(format!("{id} was not evaluated")))?;
    println!("{id:<24} {:<12} {}", evaluation.rule, evaluation.probability);
    for diagnostic in &evaluation.diagnostics {
        let rendered = serde_json::to_string(diagnostic).unwrap_or_else(|_| format!("{diagnostic:?}"));
        println!("    ! {rendered}");
    }
    Ok(())
}

/// Effective parent probabilities and CPTs of a resolved node.
fn parent_inputs(graph: &BeliefGraph, folder: &GraphFolder<'_>, id: &NodeId) -> (Vec<Probability>, Vec<Cpt>, Vec<bool>) {
    let mut probs = Vec::new();
    let mut cpts = Vec::new();
    let mut inverses = Vec::new();
    for edge in graph.incoming(id) {
        if let Some(parent) = folder.evaluation(&edge.source) {
            probs.push(parent.probability);
            inverses.push(edge.inverted);
        }
        if let Some(cpt) = edge.cpt {
            cpts.push(cpt);
        }
    }
    (probs, cpts, inverses)
}

fn print_trace(graph: &BeliefGraph, folder: &GraphFolder<'_>, id: &NodeId) -> BeliefResult<()> {
    let Some(node) = graph.node(id) else {
        return Ok(());
    };
    let (probs, cpts, inverses) = parent_inputs(graph, folder, id);
    match node.rule {
        Rule::Fact => {}
        Rule::SingleBayes => {
            if let (Some(p), Some(cpt)) = (probs.first(), cpts.first()) {
                let p = p.effective(inverses[0]).value();
                let t = cpt.cond_true() / 100.0;
                let f = cpt.cond_false() / 100.0;
                println!("    {t:.4} * {p:.4} + {f:.4} * {:.4} = {:.4}", 1.0 - p, t * p + f * (1.0 - p));
            }
        }
        Rule::MultiBayes => {
            let effective: Vec<Probability> = probs
                .iter()
                .zip(&inverses)
                .map(|(p, inverted)| p.effective(*inverted))
                .collect();
            let enumeration = Enumeration::new(&effective, &cpts)?;
            let total = enumeration.term_count();
            println!(
                "    {:<8} {:>10} {:>10} {:>10} {:>10} {:>12}",
                "combo", "P(combo)", "L", "norm", "P(c|combo)", "contribution"
            );
            for term in enumeration.take(TRACE_TERMS) {
                println!(
                    "    {:<8} {:>10.6} {:>10.6} {:>10.6} {:>10.6} {:>12.6}",
                    term.label(),
                    term.joint_probability,
                    term.likelihood_product,
                    term.baseline_normalization,
                    term.conditional,
                    term.contribution
                );
            }
            if total > TRACE_TERMS as u64 {
                println!("    ... (showing first {TRACE_TERMS} of {total} combinations)");
            }
        }
        Rule::And | Rule::Or => {
            let parts: Vec<String> = probs
                .iter()
                .zip(&inverses)
                .map(|(p, inverted)| {
                    if *inverted {
                        format!("(1 - {p})")
                    } else {
                        p.to_string()
                    }
                })
                .collect();
            let joiner = if node.rule == Rule::And { " * " } else { " | " };
            println!("    {}", parts.join(joiner));
        }
    }
    Ok(())
}
