//! Graph integrity checks.
//!
//! `FlowGraph::connect` already refuses most bad edges, but the graph is
//! public and documents come from the host, so every loaded or edited flow
//! can be re-checked here. Any failure is a `FlowError` and means an earlier
//! mutation was wrong.

use crate::error::{FlowError, Result};
use crate::model::*;
use petgraph::algo::toposort;
use petgraph::visit::{EdgeFiltered, EdgeRef};
use std::collections::HashSet;

/// Check every structural invariant of the flow.
pub fn validate_graph(flow: &FlowGraph) -> Result<()> {
    validate_root(flow)?;
    validate_ports(flow)?;
    validate_structural_tree(flow)?;
    validate_reachability(flow)?;
    validate_ends(flow)
}

fn validate_root(flow: &FlowGraph) -> Result<()> {
    let root = flow.root_guid();
    let start = match flow.target(root, Port::Branch(0)) {
        Some((start, EdgeKind::Structural)) => start,
        _ => return Err(FlowError::InvalidRoot),
    };
    if flow.element(start)?.kind != ElementKind::Start || flow.next(root).is_some() {
        return Err(FlowError::InvalidRoot);
    }
    Ok(())
}

/// Each port holds at most one edge and branch ports stay inside the slots.
fn validate_ports(flow: &FlowGraph) -> Result<()> {
    for idx in flow.graph.node_indices() {
        let element = &flow.graph[idx];
        let mut seen = HashSet::new();
        for edge in flow.graph.edges(idx) {
            let port = edge.weight().port;
            if !seen.insert(port) {
                return Err(FlowError::PortOccupied {
                    guid: element.guid,
                    port,
                });
            }
            if let Port::Branch(index) = port
                && index >= element.slots.len()
            {
                return Err(FlowError::SlotOutOfRange {
                    guid: element.guid,
                    index,
                    slots: element.slots.len(),
                });
            }
        }
    }
    Ok(())
}

/// Structural edges form a tree: one parent each and no cycles.
fn validate_structural_tree(flow: &FlowGraph) -> Result<()> {
    for idx in flow.graph.node_indices() {
        let mut parents = flow
            .graph
            .edges_directed(idx, petgraph::Direction::Incoming)
            .filter(|e| e.weight().kind == EdgeKind::Structural)
            .map(|e| flow.graph[e.source()].guid);
        if let (Some(first), Some(_)) = (parents.next(), parents.next()) {
            return Err(FlowError::DuplicateParent {
                child: flow.graph[idx].guid,
                parent: first,
            });
        }
    }

    let structural = EdgeFiltered::from_fn(&flow.graph, |e| e.weight().kind == EdgeKind::Structural);
    toposort(&structural, None)
        .map(|_| ())
        .map_err(|cycle| FlowError::StructuralCycle(flow.graph[cycle.node_id()].guid))
}

fn validate_reachability(flow: &FlowGraph) -> Result<()> {
    let reached: HashSet<_> = flow.preorder().into_iter().collect();
    let mut missing: Vec<_> = flow
        .id_index
        .keys()
        .filter(|guid| !reached.contains(guid))
        .copied()
        .collect();
    missing.sort();
    match missing.first() {
        Some(guid) => Err(FlowError::Unreachable(*guid)),
        None => Ok(()),
    }
}

fn validate_ends(flow: &FlowGraph) -> Result<()> {
    for element in flow.graph.node_weights() {
        if element.kind.is_end() && (flow.next(element.guid).is_some() || element.is_branching()) {
            return Err(FlowError::InvalidEdit {
                guid: element.guid,
                reason: "end elements cannot continue",
            });
        }
    }
    Ok(())
}
