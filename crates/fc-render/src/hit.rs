//! Hit testing: point → node or connector lookup.
//!
//! Walks the render tree and checks connector "+" buttons before node
//! rectangles, since buttons are drawn on top.

use crate::tree::{BranchRenderInfo, FlowRenderInfo};
use fc_core::{ConnectionSource, Guid};
use kurbo::{Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Node(Guid),
    Connector(ConnectionSource),
}

/// Find what sits at canvas position (px, py). `button_radius` is half the
/// connector icon width. Returns `None` for background.
pub fn hit_test(info: &FlowRenderInfo, px: f64, py: f64, button_radius: f64) -> Option<HitTarget> {
    let point = Point::new(px, py);
    let connectors = info.connectors();
    // Later connectors are painted last, so test them first.
    if let Some(hit) = connectors
        .iter()
        .rev()
        .find(|c| c.add_button.distance(point) <= button_radius)
    {
        return Some(HitTarget::Connector(hit.source));
    }
    hit_test_branch(&info.root, point)
}

fn hit_test_branch(branch: &BranchRenderInfo, point: Point) -> Option<HitTarget> {
    for node in branch.nodes.iter().rev() {
        for child in node.branches.iter().rev() {
            if let Some(hit) = hit_test_branch(child, point) {
                return Some(hit);
            }
        }
        if node.geometry.contains(point) {
            return Some(HitTarget::Node(node.guid));
        }
    }
    None
}

/// All nodes whose rectangles intersect `rect`, in tree order.
/// Used for box selection.
pub fn hit_test_rect(info: &FlowRenderInfo, rect: Rect) -> Vec<Guid> {
    info.nodes()
        .into_iter()
        .filter(|n| !n.geometry.intersect(rect).is_zero_area())
        .map(|n| n.guid)
        .collect()
}
