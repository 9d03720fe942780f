//! Flat, serde-friendly view of a flow.
//!
//! The host hands flows to the canvas as a list of element records with
//! `next`/`children` references by guid. `FlowGraph::from_document` builds the
//! tagged graph and validates it; `to_document` produces the same shape back
//! (records in canonical pre-order) for snapshots and fixtures.

use crate::error::{FlowError, Result};
use crate::id::Guid;
use crate::model::*;
use crate::validate::validate_graph;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A reference to another element, either structural or a GoTo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Link {
    Element(Guid),
    GoTo { goto: Guid },
}

impl Link {
    fn split(self) -> (Guid, EdgeKind) {
        match self {
            Link::Element(guid) => (guid, EdgeKind::Structural),
            Link::GoTo { goto } => (goto, EdgeKind::GoTo),
        }
    }

    fn join(guid: Guid, kind: EdgeKind) -> Self {
        match kind {
            EdgeKind::Structural => Link::Element(guid),
            EdgeKind::GoTo => Link::GoTo { goto: guid },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRecord {
    pub guid: Guid,
    pub kind: ElementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,
    /// Explicit slot kinds. When empty, decisions/waits get one outcome per
    /// child plus a trailing default, and loops get a single body slot.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slots: Vec<BranchKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Link>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Option<Link>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDocument {
    pub start: Guid,
    pub elements: Vec<ElementRecord>,
}

impl FlowDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| FlowError::Document(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| FlowError::Document(e.to_string()))
    }
}

fn infer_slots(record: &ElementRecord) -> Result<SmallVec<[BranchKind; 4]>> {
    if !record.slots.is_empty() {
        return Ok(record.slots.iter().copied().collect());
    }
    let n = record.children.len();
    match record.kind {
        _ if n == 0 => Ok(SmallVec::new()),
        ElementKind::Loop => Ok(std::iter::once(BranchKind::LoopBody).collect()),
        kind if kind.has_outcomes() => {
            let mut slots: SmallVec<[BranchKind; 4]> =
                std::iter::repeat_n(BranchKind::Outcome, n - 1).collect();
            slots.push(BranchKind::Default);
            Ok(slots)
        }
        _ => Err(FlowError::SlotOutOfRange {
            guid: record.guid,
            index: 0,
            slots: 0,
        }),
    }
}

impl FlowGraph {
    /// Build and validate a graph from its flat record form.
    pub fn from_document(doc: &FlowDocument) -> Result<Self> {
        let mut flow = FlowGraph::new();

        for record in &doc.elements {
            let mut element = FlowElement::new(record.guid, record.kind);
            element.label = record.label.clone();
            element.element_type = record.element_type.clone();
            element.slots = infer_slots(record)?;
            element.dimensions = record.dimensions;
            if record.children.len() > element.slots.len() {
                return Err(FlowError::SlotOutOfRange {
                    guid: record.guid,
                    index: record.children.len() - 1,
                    slots: element.slots.len(),
                });
            }
            flow.add_element(element)?;
        }

        if !flow.contains(doc.start) {
            return Err(FlowError::InvalidRoot);
        }
        flow.connect(
            ConnectionSource::branch(flow.root_guid(), 0),
            doc.start,
            EdgeKind::Structural,
        )?;

        for record in &doc.elements {
            if let Some(link) = record.next {
                let (target, kind) = link.split();
                flow.connect(ConnectionSource::next(record.guid), target, kind)?;
            }
            for (i, child) in record.children.iter().enumerate() {
                if let Some(link) = child {
                    let (target, kind) = link.split();
                    flow.connect(ConnectionSource::branch(record.guid, i), target, kind)?;
                }
            }
        }

        validate_graph(&flow)?;
        Ok(flow)
    }

    /// Flatten back to records, in canonical pre-order.
    pub fn to_document(&self) -> Result<FlowDocument> {
        let start = self.start().ok_or(FlowError::InvalidRoot)?;
        let elements = self
            .preorder()
            .into_iter()
            .filter(|guid| !guid.is_root())
            .filter_map(|guid| self.get(guid))
            .map(|element| {
                let guid = element.guid;
                ElementRecord {
                    guid,
                    kind: element.kind,
                    label: element.label.clone(),
                    element_type: element.element_type.clone(),
                    slots: element.slots.to_vec(),
                    next: self
                        .target(guid, Port::Next)
                        .map(|(t, kind)| Link::join(t, kind)),
                    children: (0..element.slots.len())
                        .map(|i| {
                            self.target(guid, Port::Branch(i))
                                .map(|(t, kind)| Link::join(t, kind))
                        })
                        .collect(),
                    dimensions: element.dimensions,
                }
            })
            .collect();
        Ok(FlowDocument { start, elements })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECISION_FLOW: &str = r#"{
        "start": "d_start",
        "elements": [
            { "guid": "d_start", "kind": "start", "next": "d_dec" },
            { "guid": "d_dec", "kind": "decision", "children": ["d_screen", null], "next": "d_after" },
            { "guid": "d_screen", "kind": "screen", "next": { "goto": "d_start" } },
            { "guid": "d_after", "kind": "assignment", "next": "d_end" },
            { "guid": "d_end", "kind": "end" }
        ]
    }"#;

    #[test]
    fn document_builds_tagged_graph() {
        let doc = FlowDocument::from_json(DECISION_FLOW).unwrap();
        let flow = FlowGraph::from_document(&doc).unwrap();

        let dec = Guid::intern("d_dec");
        assert_eq!(
            flow.get(dec).unwrap().slots.as_slice(),
            &[BranchKind::Outcome, BranchKind::Default]
        );
        assert_eq!(flow.children(dec), vec![Some(Guid::intern("d_screen")), None]);
        assert_eq!(
            flow.target(Guid::intern("d_screen"), Port::Next),
            Some((Guid::intern("d_start"), EdgeKind::GoTo))
        );
    }

    #[test]
    fn document_roundtrip_keeps_links() {
        let doc = FlowDocument::from_json(DECISION_FLOW).unwrap();
        let flow = FlowGraph::from_document(&doc).unwrap();
        let back = flow.to_document().unwrap();
        let rebuilt = FlowGraph::from_document(&back).unwrap();
        assert_eq!(rebuilt.preorder(), flow.preorder());
        assert_eq!(rebuilt.goto_edges(), flow.goto_edges());
    }

    #[test]
    fn dangling_reference_is_rejected() {
        let json = r#"{
            "start": "x_start",
            "elements": [ { "guid": "x_start", "kind": "start", "next": "x_missing" } ]
        }"#;
        let doc = FlowDocument::from_json(json).unwrap();
        let err = FlowGraph::from_document(&doc).unwrap_err();
        assert!(matches!(err, FlowError::DanglingReference { .. }));
    }

    #[test]
    fn children_on_plain_element_need_slots() {
        let json = r#"{
            "start": "y_start",
            "elements": [
                { "guid": "y_start", "kind": "start", "next": "y_action" },
                { "guid": "y_action", "kind": "action", "children": ["y_end"] },
                { "guid": "y_end", "kind": "end" }
            ]
        }"#;
        let doc = FlowDocument::from_json(json).unwrap();
        assert!(FlowGraph::from_document(&doc).is_err());

        let json = json.replace(r#""kind": "action","#, r#""kind": "action", "slots": ["fault"],"#);
        let doc = FlowDocument::from_json(&json).unwrap();
        let flow = FlowGraph::from_document(&doc).unwrap();
        assert_eq!(flow.get(Guid::intern("y_action")).unwrap().fault_index(), Some(0));
    }
}
