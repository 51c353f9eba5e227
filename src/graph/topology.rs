//! DAG enforcement and ordering.
//!
//! Edges are checked before insertion: an edge `source -> target` is
//! rejected when `target` already reaches `source`. Ordering and
//! reachability queries run on the petgraph representation.

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};

use crate::error::ValidationError;
use crate::graph::NodeId;

/// Directed graph of node ids; edge weights index the graph's edge list.
pub(crate) type Dag = DiGraph<NodeId, usize>;

/// Returns true if adding `source -> target` would create a cycle.
pub(crate) fn would_create_cycle(dag: &Dag, source: NodeIndex, target: NodeIndex) -> bool {
    source == target || has_path_connecting(dag, target, source, None)
}

/// Topological order of all nodes, parents before children.
pub(crate) fn topological_order(dag: &Dag) -> Result<Vec<NodeIndex>, ValidationError> {
    toposort(dag, None).map_err(|cycle| {
        let id = dag[cycle.node_id()].clone();
        ValidationError::Cycle {
            source_id: id.clone(),
            target: id,
        }
    })
}

/// Groups nodes by depth (longest path from a root).
///
/// Nodes in one level never depend on each other. Each level is sorted by
/// node index so the grouping is deterministic.
pub(crate) fn levels(dag: &Dag, order: &[NodeIndex]) -> Vec<Vec<NodeIndex>> {
    let mut depth = vec![0usize; dag.node_count()];
    for &node in order {
        let d = dag
            .neighbors_directed(node, petgraph::Direction::Incoming)
            .map(|parent| depth[parent.index()] + 1)
            .max()
            .unwrap_or(0);
        depth[node.index()] = d;
    }

    let mut levels: Vec<Vec<NodeIndex>> = Vec::new();
    for &node in order {
        let d = depth[node.index()];
        if levels.len() <= d {
            levels.resize_with(d + 1, Vec::new);
        }
        levels[d].push(node);
    }
    for level in &mut levels {
        level.sort_unstable();
    }
    levels
}

/// All nodes reachable from `start` along edges, excluding `start`.
pub(crate) fn descendants(dag: &Dag, start: NodeIndex) -> Vec<NodeIndex> {
    let mut dfs = Dfs::new(dag, start);
    let mut out = Vec::new();
    while let Some(node) = dfs.next(dag) {
        if node != start {
            out.push(node);
        }
    }
    out
}

/// All nodes that reach `start`, excluding `start`.
pub(crate) fn ancestors(dag: &Dag, start: NodeIndex) -> Vec<NodeIndex> {
    let reversed = Reversed(dag);
    let mut dfs = Dfs::new(reversed, start);
    let mut out = Vec::new();
    while let Some(node) = dfs.next(reversed) {
        if node != start {
            out.push(node);
        }
    }
    out
}
