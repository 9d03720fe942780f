//! Keyboard focus movement across nodes and connectors.
//!
//! Focus walks the structural tree: down follows the flow, up returns to the
//! incoming connector, left and right hop between sibling branches.

use fc_core::resolve::fall_through_target;
use fc_core::{ConnectionSource, EdgeKind, FlowGraph, Guid, Port};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "target")]
pub enum FocusTarget {
    Node(Guid),
    Connector(ConnectionSource),
}

impl FocusTarget {
    pub fn key(&self) -> String {
        match self {
            FocusTarget::Node(guid) => guid.to_string(),
            FocusTarget::Connector(source) => source.key(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Where focus lands when moving `direction` from `from`. `None` when there
/// is nothing in that direction.
pub fn move_focus(flow: &FlowGraph, from: FocusTarget, direction: FocusDirection) -> Option<FocusTarget> {
    match direction {
        FocusDirection::Down => down(flow, from),
        FocusDirection::Up => up(flow, from),
        FocusDirection::Left => sideways(flow, from, -1),
        FocusDirection::Right => sideways(flow, from, 1),
    }
}

fn down(flow: &FlowGraph, from: FocusTarget) -> Option<FocusTarget> {
    match from {
        FocusTarget::Node(guid) => {
            let element = flow.get(guid)?;
            if element.kind.is_end() {
                None
            } else if element.is_branching() {
                Some(FocusTarget::Connector(ConnectionSource::branch(guid, 0)))
            } else {
                Some(FocusTarget::Connector(ConnectionSource::next(guid)))
            }
        }
        FocusTarget::Connector(source) => match flow.target(source.guid, source.port()) {
            Some((target, EdgeKind::Structural)) => Some(FocusTarget::Node(target)),
            // GoTo jumps are not followed by keyboard navigation.
            Some((_, EdgeKind::GoTo)) => None,
            None => match source.port() {
                Port::Branch(_) if flow.get(source.guid)?.is_branching() => {
                    // Leave the branch row through the merge connector.
                    let after = ConnectionSource::next(source.guid);
                    flow.next(source.guid)
                        .map(|_| FocusTarget::Connector(after))
                        .or_else(|| fall_through_target(flow, source).ok().flatten().map(FocusTarget::Node))
                }
                _ => fall_through_target(flow, source)
                    .ok()
                    .flatten()
                    .filter(|target| !target.is_root())
                    .map(FocusTarget::Node),
            },
        },
    }
}

fn up(flow: &FlowGraph, from: FocusTarget) -> Option<FocusTarget> {
    match from {
        FocusTarget::Node(guid) => {
            let (parent, port) = flow.structural_parent(guid)?;
            if parent.is_root() {
                return None;
            }
            Some(FocusTarget::Connector(ConnectionSource {
                guid: parent,
                child_index: port.child_index(),
            }))
        }
        FocusTarget::Connector(source) => Some(FocusTarget::Node(source.guid)),
    }
}

fn sideways(flow: &FlowGraph, from: FocusTarget, step: isize) -> Option<FocusTarget> {
    let (owner, index) = match from {
        FocusTarget::Connector(ConnectionSource {
            guid,
            child_index: Some(index),
        }) => (guid, index),
        FocusTarget::Node(guid) => match flow.structural_parent(guid)? {
            (parent, Port::Branch(index)) => (parent, index),
            _ => return None,
        },
        FocusTarget::Connector(_) => return None,
    };
    let slots = flow.get(owner)?.slots.len();
    let sibling = index.checked_add_signed(step).filter(|i| *i < slots)?;
    Some(match (from, flow.structural_child(owner, sibling)) {
        (FocusTarget::Node(_), Some(head)) => FocusTarget::Node(head),
        _ => FocusTarget::Connector(ConnectionSource::branch(owner, sibling)),
    })
}
