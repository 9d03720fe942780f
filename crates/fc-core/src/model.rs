//! Flow graph data model.
//!
//! A flow is a tree of structural edges rooted at a synthetic `ROOT` whose
//! single branch slot holds the start element. Each element continues through
//! its `Next` port; branching elements (decisions, waits, loops, elements with
//! a fault path) fan out through `Branch(i)` ports, one per declared slot.
//! A branch whose tail has no `next` falls through to its branching element's
//! `next`, which is how merge points are expressed without shared parents.
//!
//! GoTo edges live on the same adjacency relation, tagged `EdgeKind::GoTo`.
//! They may point anywhere (including upstream) and are the only way the
//! graph can contain a cycle.

use crate::error::{FlowError, Result};
use crate::id::Guid;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::{EdgeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

// ─── Element kinds ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementKind {
    Root,
    Start,
    Assignment,
    Action,
    Decision,
    Wait,
    Loop,
    Screen,
    RecordOperation,
    Subflow,
    End,
}

impl ElementKind {
    /// Stable lowercase name, used as the default metadata key and guid prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Root => "root",
            ElementKind::Start => "start",
            ElementKind::Assignment => "assignment",
            ElementKind::Action => "action",
            ElementKind::Decision => "decision",
            ElementKind::Wait => "wait",
            ElementKind::Loop => "loop",
            ElementKind::Screen => "screen",
            ElementKind::RecordOperation => "recordOperation",
            ElementKind::Subflow => "subflow",
            ElementKind::End => "end",
        }
    }

    /// Kinds whose outcomes are regular branches (plus a default).
    pub fn has_outcomes(&self) -> bool {
        matches!(self, ElementKind::Decision | ElementKind::Wait)
    }

    /// Kinds that may carry a fault connector.
    pub fn supports_fault(&self) -> bool {
        matches!(
            self,
            ElementKind::Action
                | ElementKind::RecordOperation
                | ElementKind::Subflow
                | ElementKind::Wait
        )
    }

    /// Kinds that never continue past themselves.
    pub fn is_end(&self) -> bool {
        matches!(self, ElementKind::End)
    }
}

/// What a branch slot represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BranchKind {
    Outcome,
    Default,
    Fault,
    LoopBody,
}

/// An outgoing connection point on an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Port {
    Next,
    Branch(usize),
}

impl Port {
    pub fn from_child_index(child_index: Option<usize>) -> Self {
        child_index.map_or(Port::Next, Port::Branch)
    }

    pub fn child_index(&self) -> Option<usize> {
        match self {
            Port::Next => None,
            Port::Branch(i) => Some(*i),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Tree edge: the target is laid out below/inside the source.
    Structural,
    /// Back-reference to an element that lives elsewhere in the tree.
    GoTo,
}

/// Label on every edge of the underlying graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowEdge {
    pub port: Port,
    pub kind: EdgeKind,
}

/// Width/height pair in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f32,
    pub height: f32,
}

impl Dimensions {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

// ─── Elements ────────────────────────────────────────────────────────────

/// A single element in the flow.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowElement {
    pub guid: Guid,
    pub kind: ElementKind,
    pub label: Option<String>,
    /// Metadata key used to look up menu and dynamic-node components.
    /// Falls back to the kind name when absent.
    pub element_type: Option<String>,
    /// One entry per branch slot, in connector order.
    pub slots: SmallVec<[BranchKind; 4]>,
    /// Intrinsic size override for elements hosting sized content.
    pub dimensions: Option<Dimensions>,
}

impl FlowElement {
    pub fn new(guid: Guid, kind: ElementKind) -> Self {
        Self {
            guid,
            kind,
            label: None,
            element_type: None,
            slots: SmallVec::new(),
            dimensions: None,
        }
    }

    /// A new element of `kind` under a fresh `{kind}_{n}` guid.
    pub fn generated(kind: ElementKind) -> Self {
        Self::new(Guid::with_prefix(kind.as_str()), kind)
    }

    /// A decision (or wait) with `outcomes` regular branches and a default.
    pub fn with_outcomes(guid: Guid, kind: ElementKind, outcomes: usize) -> Self {
        let mut element = Self::new(guid, kind);
        element.slots = std::iter::repeat_n(BranchKind::Outcome, outcomes).collect();
        element.slots.push(BranchKind::Default);
        element
    }

    /// A loop with a single body branch.
    pub fn looping(guid: Guid) -> Self {
        let mut element = Self::new(guid, ElementKind::Loop);
        element.slots.push(BranchKind::LoopBody);
        element
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn element_type(mut self, element_type: impl Into<String>) -> Self {
        self.element_type = Some(element_type.into());
        self
    }

    pub fn with_fault(mut self) -> Self {
        self.slots.push(BranchKind::Fault);
        self
    }

    pub fn type_key(&self) -> &str {
        self.element_type.as_deref().unwrap_or(self.kind.as_str())
    }

    pub fn is_branching(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn fault_index(&self) -> Option<usize> {
        self.slots.iter().position(|k| *k == BranchKind::Fault)
    }

    /// Slot indices that belong to the regular (non-fault) flow.
    pub fn regular_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, k)| **k != BranchKind::Fault)
            .map(|(i, _)| i)
    }
}

// ─── Connection endpoints ────────────────────────────────────────────────

/// Identifies one outgoing edge: the element's `next` when `child_index` is
/// `None`, otherwise its branch slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSource {
    pub guid: Guid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_index: Option<usize>,
}

impl ConnectionSource {
    pub fn next(guid: Guid) -> Self {
        Self {
            guid,
            child_index: None,
        }
    }

    pub fn branch(guid: Guid, child_index: usize) -> Self {
        Self {
            guid,
            child_index: Some(child_index),
        }
    }

    pub fn port(&self) -> Port {
        Port::from_child_index(self.child_index)
    }

    /// Stable string key (`guid` or `guid:index`), used for menu and focus keys.
    pub fn key(&self) -> String {
        match self.child_index {
            Some(i) => format!("{}:{i}", self.guid),
            None => self.guid.to_string(),
        }
    }
}

// ─── Flow graph ──────────────────────────────────────────────────────────

/// The complete flow: elements plus tagged connections.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    /// The underlying directed graph.
    pub graph: StableDiGraph<FlowElement, FlowEdge>,

    /// The synthetic root.
    pub root: NodeIndex,

    /// Index from Guid → NodeIndex for fast lookup.
    pub id_index: HashMap<Guid, NodeIndex>,
}

impl FlowGraph {
    /// Create an empty flow holding only the root.
    #[must_use]
    pub fn new() -> Self {
        let mut graph = StableDiGraph::new();
        let mut root_element = FlowElement::new(Guid::root(), ElementKind::Root);
        root_element.slots.push(BranchKind::Default);
        let root = graph.add_node(root_element);

        let mut id_index = HashMap::new();
        id_index.insert(Guid::root(), root);

        Self {
            graph,
            root,
            id_index,
        }
    }

    /// Create a flow whose root holds a fresh start element.
    #[must_use]
    pub fn with_start(start: Guid) -> Self {
        let mut flow = Self::new();
        // Root slot 0 is empty and `start` is new, so neither check can fail.
        let _ = flow
            .add_element(FlowElement::new(start, ElementKind::Start))
            .and_then(|_| {
                flow.connect(
                    ConnectionSource::branch(Guid::root(), 0),
                    start,
                    EdgeKind::Structural,
                )
            });
        flow
    }

    pub fn root_guid(&self) -> Guid {
        self.graph[self.root].guid
    }

    /// The start element hanging off the root, if any.
    pub fn start(&self) -> Option<Guid> {
        self.target(self.root_guid(), Port::Branch(0)).map(|(g, _)| g)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() <= 1
    }

    pub fn contains(&self, guid: Guid) -> bool {
        self.id_index.contains_key(&guid)
    }

    /// Get the index for a Guid.
    pub fn index_of(&self, guid: Guid) -> Option<NodeIndex> {
        self.id_index.get(&guid).copied()
    }

    /// Look up an element by guid.
    pub fn get(&self, guid: Guid) -> Option<&FlowElement> {
        self.index_of(guid).map(|idx| &self.graph[idx])
    }

    pub fn get_mut(&mut self, guid: Guid) -> Option<&mut FlowElement> {
        self.index_of(guid).map(|idx| &mut self.graph[idx])
    }

    /// Like `get`, but a missing element is an integrity error.
    pub fn element(&self, guid: Guid) -> Result<&FlowElement> {
        self.get(guid).ok_or(FlowError::NotFound(guid))
    }

    fn require(&self, guid: Guid) -> Result<NodeIndex> {
        self.index_of(guid).ok_or(FlowError::NotFound(guid))
    }

    fn edge_at(&self, idx: NodeIndex, port: Port) -> Option<(EdgeIndex, NodeIndex, EdgeKind)> {
        self.graph
            .edges(idx)
            .find(|e| e.weight().port == port)
            .map(|e| (e.id(), e.target(), e.weight().kind))
    }

    /// Target of `port` on `guid`, with the edge kind.
    pub fn target(&self, guid: Guid, port: Port) -> Option<(Guid, EdgeKind)> {
        let idx = self.index_of(guid)?;
        self.edge_at(idx, port)
            .map(|(_, target, kind)| (self.graph[target].guid, kind))
    }

    /// The element reached on normal fall-through (structural or GoTo).
    pub fn next(&self, guid: Guid) -> Option<Guid> {
        self.target(guid, Port::Next).map(|(g, _)| g)
    }

    /// The structural successor only; GoTo targets are not followed.
    pub fn structural_next(&self, guid: Guid) -> Option<Guid> {
        match self.target(guid, Port::Next) {
            Some((g, EdgeKind::Structural)) => Some(g),
            _ => None,
        }
    }

    /// Branch head at slot `index` (structural or GoTo).
    pub fn child(&self, guid: Guid, index: usize) -> Option<Guid> {
        self.target(guid, Port::Branch(index)).map(|(g, _)| g)
    }

    pub fn structural_child(&self, guid: Guid, index: usize) -> Option<Guid> {
        match self.target(guid, Port::Branch(index)) {
            Some((g, EdgeKind::Structural)) => Some(g),
            _ => None,
        }
    }

    /// Branch heads in slot order; `None` marks an empty branch.
    pub fn children(&self, guid: Guid) -> Vec<Option<Guid>> {
        let slots = self.get(guid).map_or(0, |e| e.slots.len());
        (0..slots).map(|i| self.child(guid, i)).collect()
    }

    /// The element holding the structural edge into `guid`, and through which port.
    pub fn structural_parent(&self, guid: Guid) -> Option<(Guid, Port)> {
        let idx = self.index_of(guid)?;
        self.graph
            .edges_directed(idx, petgraph::Direction::Incoming)
            .find(|e| e.weight().kind == EdgeKind::Structural)
            .map(|e| (self.graph[e.source()].guid, e.weight().port))
    }

    /// Every GoTo edge pointing at `guid`, sorted for stable output.
    pub fn incoming_gotos(&self, guid: Guid) -> Vec<ConnectionSource> {
        let Some(idx) = self.index_of(guid) else {
            return Vec::new();
        };
        let mut sources: Vec<ConnectionSource> = self
            .graph
            .edges_directed(idx, petgraph::Direction::Incoming)
            .filter(|e| e.weight().kind == EdgeKind::GoTo)
            .map(|e| ConnectionSource {
                guid: self.graph[e.source()].guid,
                child_index: e.weight().port.child_index(),
            })
            .collect();
        sources.sort();
        sources
    }

    /// Every GoTo edge in the flow as `(source, target)`, sorted.
    pub fn goto_edges(&self) -> Vec<(ConnectionSource, Guid)> {
        let mut edges: Vec<(ConnectionSource, Guid)> = self
            .graph
            .edge_references()
            .filter(|e| e.weight().kind == EdgeKind::GoTo)
            .map(|e| {
                (
                    ConnectionSource {
                        guid: self.graph[e.source()].guid,
                        child_index: e.weight().port.child_index(),
                    },
                    self.graph[e.target()].guid,
                )
            })
            .collect();
        edges.sort();
        edges
    }

    /// Insert a new, unconnected element.
    pub fn add_element(&mut self, element: FlowElement) -> Result<NodeIndex> {
        let guid = element.guid;
        if self.contains(guid) {
            return Err(FlowError::DuplicateGuid(guid));
        }
        let idx = self.graph.add_node(element);
        self.id_index.insert(guid, idx);
        Ok(idx)
    }

    /// Remove an element and every edge touching it.
    pub fn remove_element(&mut self, guid: Guid) -> Result<FlowElement> {
        let idx = self.require(guid)?;
        if idx == self.root {
            return Err(FlowError::InvalidEdit {
                guid,
                reason: "the root cannot be removed",
            });
        }
        self.id_index.remove(&guid);
        self.graph
            .remove_node(idx)
            .ok_or(FlowError::NotFound(guid))
    }

    /// Connect `source` to `target`. The port must be free and, for
    /// structural edges, `target` must not already have a structural parent.
    pub fn connect(&mut self, source: ConnectionSource, target: Guid, kind: EdgeKind) -> Result<()> {
        let from = self.require(source.guid)?;
        let to = self.index_of(target).ok_or(FlowError::DanglingReference {
            from: source.guid,
            to: target,
        })?;
        let port = source.port();
        if let Port::Branch(index) = port {
            let slots = self.graph[from].slots.len();
            if index >= slots {
                return Err(FlowError::SlotOutOfRange {
                    guid: source.guid,
                    index,
                    slots,
                });
            }
        }
        if self.edge_at(from, port).is_some() {
            return Err(FlowError::PortOccupied {
                guid: source.guid,
                port,
            });
        }
        if kind == EdgeKind::Structural {
            if to == self.root {
                return Err(FlowError::StructuralCycle(target));
            }
            if let Some((parent, _)) = self.structural_parent(target) {
                return Err(FlowError::DuplicateParent {
                    child: target,
                    parent,
                });
            }
        }
        self.graph.add_edge(from, to, FlowEdge { port, kind });
        Ok(())
    }

    /// Remove whatever edge leaves `source`, returning its target and kind.
    pub fn disconnect(&mut self, source: ConnectionSource) -> Option<(Guid, EdgeKind)> {
        let from = self.index_of(source.guid)?;
        let (edge, target, kind) = self.edge_at(from, source.port())?;
        self.graph.remove_edge(edge);
        Some((self.graph[target].guid, kind))
    }

    /// Elements in canonical pre-order: each element, then its branches in
    /// slot order, then its `next`. Only structural edges are followed, so
    /// GoTo cycles are never entered.
    pub fn preorder(&self) -> Vec<Guid> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack = vec![self.root_guid()];
        while let Some(guid) = stack.pop() {
            out.push(guid);
            if let Some(next) = self.structural_next(guid) {
                stack.push(next);
            }
            let slots = self.get(guid).map_or(0, |e| e.slots.len());
            for i in (0..slots).rev() {
                if let Some(child) = self.structural_child(guid, i) {
                    stack.push(child);
                }
            }
        }
        out
    }

    /// The structural chain starting at `head`: `head`, its next, and so on.
    pub fn chain(&self, head: Guid) -> Vec<Guid> {
        let mut out = vec![head];
        let mut current = head;
        while let Some(next) = self.structural_next(current) {
            out.push(next);
            current = next;
        }
        out
    }

    /// Last element of the structural chain starting at `head`.
    pub fn chain_tail(&self, head: Guid) -> Guid {
        let mut current = head;
        while let Some(next) = self.structural_next(current) {
            current = next;
        }
        current
    }
}

impl Default for FlowGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(s: &str) -> Guid {
        Guid::intern(s)
    }

    #[test]
    fn flow_graph_basics() {
        let mut flow = FlowGraph::with_start(g("m_start"));
        flow.add_element(FlowElement::new(g("m_screen"), ElementKind::Screen))
            .unwrap();
        flow.connect(
            ConnectionSource::next(g("m_start")),
            g("m_screen"),
            EdgeKind::Structural,
        )
        .unwrap();

        assert_eq!(flow.start(), Some(g("m_start")));
        assert_eq!(flow.next(g("m_start")), Some(g("m_screen")));
        assert_eq!(
            flow.structural_parent(g("m_screen")),
            Some((g("m_start"), Port::Next))
        );
        assert_eq!(flow.len(), 3);
    }

    #[test]
    fn connect_rejects_occupied_port_and_second_parent() {
        let mut flow = FlowGraph::with_start(g("o_start"));
        flow.add_element(FlowElement::new(g("o_a"), ElementKind::Assignment))
            .unwrap();
        flow.add_element(FlowElement::new(g("o_b"), ElementKind::Assignment))
            .unwrap();
        flow.connect(ConnectionSource::next(g("o_start")), g("o_a"), EdgeKind::Structural)
            .unwrap();

        let occupied = flow.connect(ConnectionSource::next(g("o_start")), g("o_b"), EdgeKind::Structural);
        assert!(matches!(occupied, Err(FlowError::PortOccupied { .. })));

        let second_parent = flow.connect(ConnectionSource::next(g("o_b")), g("o_a"), EdgeKind::Structural);
        assert!(matches!(second_parent, Err(FlowError::DuplicateParent { .. })));

        // A GoTo may target an element that already has a parent.
        flow.connect(ConnectionSource::next(g("o_b")), g("o_a"), EdgeKind::GoTo)
            .unwrap();
        assert_eq!(flow.incoming_gotos(g("o_a")), vec![ConnectionSource::next(g("o_b"))]);
    }

    #[test]
    fn connect_checks_slot_range() {
        let mut flow = FlowGraph::with_start(g("s_start"));
        flow.add_element(FlowElement::with_outcomes(g("s_dec"), ElementKind::Decision, 1))
            .unwrap();
        flow.add_element(FlowElement::new(g("s_end"), ElementKind::End))
            .unwrap();
        let err = flow
            .connect(ConnectionSource::branch(g("s_dec"), 2), g("s_end"), EdgeKind::Structural)
            .unwrap_err();
        assert_eq!(
            err,
            FlowError::SlotOutOfRange {
                guid: g("s_dec"),
                index: 2,
                slots: 2
            }
        );
    }

    #[test]
    fn preorder_visits_branches_before_next() {
        let mut flow = FlowGraph::with_start(g("p_start"));
        flow.add_element(FlowElement::with_outcomes(g("p_dec"), ElementKind::Decision, 1))
            .unwrap();
        for id in ["p_left", "p_right", "p_after"] {
            flow.add_element(FlowElement::new(g(id), ElementKind::Screen))
                .unwrap();
        }
        flow.connect(ConnectionSource::next(g("p_start")), g("p_dec"), EdgeKind::Structural)
            .unwrap();
        flow.connect(ConnectionSource::branch(g("p_dec"), 0), g("p_left"), EdgeKind::Structural)
            .unwrap();
        flow.connect(ConnectionSource::branch(g("p_dec"), 1), g("p_right"), EdgeKind::Structural)
            .unwrap();
        flow.connect(ConnectionSource::next(g("p_dec")), g("p_after"), EdgeKind::Structural)
            .unwrap();
        // A GoTo back to start must not loop the traversal.
        flow.connect(ConnectionSource::next(g("p_after")), g("p_start"), EdgeKind::GoTo)
            .unwrap();

        let preorder = flow.preorder();
        let order: Vec<&str> = preorder.iter().map(|g| g.as_str()).collect();
        assert_eq!(
            order,
            vec!["root", "p_start", "p_dec", "p_left", "p_right", "p_after"]
        );
    }

    #[test]
    fn connection_source_keys() {
        assert_eq!(ConnectionSource::next(g("k_a")).key(), "k_a");
        assert_eq!(ConnectionSource::branch(g("k_a"), 2).key(), "k_a:2");
        assert_eq!(ConnectionSource::branch(g("k_a"), 2).port(), Port::Branch(2));
    }
}
