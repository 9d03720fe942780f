//! Auto-layout of a flow.
//!
//! Two passes over the structural tree. The measure pass computes, for each
//! chain, how far it extends left and right of its centerline and how tall
//! it is. The place pass walks the same chains top-down and assigns
//! absolute positions: a chain's elements share one centerline, a branching
//! element's branches sit side by side under it (fault branches rightmost),
//! and the merge point sits under the tallest branch.
//!
//! Branch extents never overlap, so the output is overlap-free for any node
//! sizes, including the provisional size of unmeasured dynamic nodes.

use crate::config::LayoutConfig;
use crate::context::FlowRenderContext;
use crate::id::Guid;
use crate::model::*;
use crate::resolve;
use serde::Serialize;
use std::collections::HashMap;

/// Absolute rectangle of one element (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NodeLayout {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl NodeLayout {
    pub fn center_x(&self) -> f32 {
        self.x + self.w / 2.0
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.w && py >= self.y && py <= self.y + self.h
    }

    pub fn lerp(from: &NodeLayout, to: &NodeLayout, t: f32) -> NodeLayout {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        NodeLayout {
            x: mix(from.x, to.x),
            y: mix(from.y, to.y),
            w: mix(from.w, to.w),
            h: mix(from.h, to.h),
        }
    }
}

/// Placement of one branch of a branching element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchLayout {
    /// Horizontal offset of the branch centerline from its element's.
    pub offset_x: f32,
    /// Absolute centerline.
    pub x: f32,
    /// Top of the branch head.
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub is_terminal: bool,
    pub is_empty: bool,
}

/// Where a branching element's branches rejoin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MergePoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowLayout {
    pub node_layout_map: HashMap<Guid, NodeLayout>,
    /// Keyed by the branch's connection source.
    pub branch_layout_map: HashMap<ConnectionSource, BranchLayout>,
    /// Keyed by the branching element; absent for terminal elements.
    pub merge_points: HashMap<Guid, MergePoint>,
    pub width: f32,
    pub height: f32,
}

impl FlowLayout {
    pub fn is_empty(&self) -> bool {
        self.node_layout_map.is_empty()
    }

    /// Blend node geometry from `from` toward `to`. Nodes new in `to` appear
    /// at their final place; branch and merge data always come from `to`.
    pub fn interpolate(from: &FlowLayout, to: &FlowLayout, t: f32) -> FlowLayout {
        let t = t.clamp(0.0, 1.0);
        let node_layout_map = to
            .node_layout_map
            .iter()
            .map(|(guid, target)| {
                let node = match from.node_layout_map.get(guid) {
                    Some(start) => NodeLayout::lerp(start, target, t),
                    None => *target,
                };
                (*guid, node)
            })
            .collect();
        FlowLayout {
            node_layout_map,
            branch_layout_map: to.branch_layout_map.clone(),
            merge_points: to.merge_points.clone(),
            width: from.width + (to.width - from.width) * t,
            height: from.height + (to.height - from.height) * t,
        }
    }
}

// ─── Sizing ──────────────────────────────────────────────────────────────

/// Size used for `element`: measured size, then explicit override, then the
/// dynamic placeholder, then a square icon.
pub fn node_dimensions(ctx: &FlowRenderContext, element: &FlowElement) -> Dimensions {
    if element.kind == ElementKind::Root {
        return Dimensions::default();
    }
    if let Some(measured) = ctx.dynamic_node_dimension_map.get(&element.guid) {
        return *measured;
    }
    if let Some(dimensions) = element.dimensions {
        return dimensions;
    }
    if ctx.is_dynamic(element) {
        return ctx.layout_config.dynamic_placeholder;
    }
    let w = ctx.layout_config.node.icon.w;
    Dimensions::new(w, w)
}

// ─── Measure pass ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
struct Extent {
    left: f32,
    right: f32,
    height: f32,
}

impl Extent {
    fn width(&self) -> f32 {
        self.left + self.right
    }
}

#[derive(Debug, Clone, Copy)]
struct BranchSlot {
    index: usize,
    offset: f32,
    extent: Extent,
}

#[derive(Debug, Clone, Default)]
struct Row {
    branches: Vec<BranchSlot>,
    width: f32,
    height: f32,
}

struct Solver<'a> {
    ctx: &'a FlowRenderContext,
    config: &'a LayoutConfig,
    sizes: HashMap<Guid, Dimensions>,
    rows: HashMap<Guid, Row>,
}

impl<'a> Solver<'a> {
    fn new(ctx: &'a FlowRenderContext) -> Self {
        let sizes = ctx
            .flow
            .graph
            .node_weights()
            .map(|e| (e.guid, node_dimensions(ctx, e)))
            .collect();
        Self {
            ctx,
            config: &ctx.layout_config,
            sizes,
            rows: HashMap::new(),
        }
    }

    fn size(&self, guid: Guid) -> Dimensions {
        self.sizes.get(&guid).copied().unwrap_or_default()
    }

    fn measure_chain(&mut self, head: Guid) -> Extent {
        let mut extent = Extent::default();
        for guid in self.ctx.flow.chain(head) {
            let size = self.size(guid);
            extent.left = extent.left.max(size.width / 2.0);
            extent.right = extent.right.max(size.width / 2.0);
            extent.height += size.height;

            let is_branching = self.ctx.flow.get(guid).is_some_and(|e| e.is_branching());
            if is_branching {
                let row = self.measure_row(guid);
                let half = row.width / 2.0;
                extent.left = extent.left.max(half);
                extent.right = extent.right.max(half);
                extent.height += self.config.connector.branch_height
                    + row.height
                    + self.config.connector.merge_height;
            }
            extent.height += self.config.connector.height;
        }
        extent
    }

    /// Branches of `guid` left to right: regular slots in order, fault last.
    fn measure_row(&mut self, guid: Guid) -> Row {
        let Some(element) = self.ctx.flow.get(guid) else {
            return Row::default();
        };
        let is_loop = element.kind == ElementKind::Loop;
        let order: Vec<usize> = element
            .regular_slots()
            .chain(element.fault_index())
            .collect();

        let mut branches = Vec::with_capacity(order.len());
        for index in order {
            let mut extent = match self.ctx.flow.structural_child(guid, index) {
                Some(head) => self.measure_chain(head),
                None => {
                    let half = self.config.connector.icon.w / 2.0;
                    Extent {
                        left: half,
                        right: half,
                        height: self.config.connector.height,
                    }
                }
            };
            if is_loop {
                extent.left += self.config.branch.loop_padding;
                extent.right += self.config.branch.loop_padding;
            }
            branches.push(BranchSlot {
                index,
                offset: 0.0,
                extent,
            });
        }

        let spacing = self.config.branch.spacing;
        let total: f32 = branches.iter().map(|b| b.extent.width()).sum::<f32>()
            + spacing * branches.len().saturating_sub(1) as f32;
        let mut cursor = -total / 2.0;
        for branch in &mut branches {
            branch.offset = cursor + branch.extent.left;
            cursor += branch.extent.width() + spacing;
        }

        let row = Row {
            width: total,
            height: branches.iter().map(|b| b.extent.height).fold(0.0, f32::max),
            branches,
        };
        self.rows.insert(guid, row.clone());
        row
    }

    // ─── Place pass ──────────────────────────────────────────────────────

    fn place_chain(&self, head: Guid, cx: f32, mut y: f32, out: &mut FlowLayout) -> f32 {
        for guid in self.ctx.flow.chain(head) {
            let size = self.size(guid);
            let node = NodeLayout {
                x: cx - size.width / 2.0,
                y,
                w: size.width,
                h: size.height,
            };
            log::trace!("place {guid} at ({}, {})", node.x, node.y);
            out.node_layout_map.insert(guid, node);
            y += size.height;

            if let Some(row) = self.rows.get(&guid)
                && let Some(element) = self.ctx.flow.get(guid)
            {
                let top = y + self.config.connector.branch_height;
                for branch in &row.branches {
                    let bx = cx + branch.offset;
                    let head = self.ctx.flow.structural_child(guid, branch.index);
                    if let Some(head) = head {
                        self.place_chain(head, bx, top, out);
                    }
                    out.branch_layout_map.insert(
                        ConnectionSource::branch(guid, branch.index),
                        BranchLayout {
                            offset_x: branch.offset,
                            x: bx,
                            y: top,
                            w: branch.extent.width(),
                            h: branch.extent.height,
                            is_terminal: resolve::is_branch_terminal(&self.ctx.flow, element, branch.index),
                            is_empty: self.ctx.flow.child(guid, branch.index).is_none(),
                        },
                    );
                }
                let merge_y = top + row.height;
                if !resolve::is_element_terminal(&self.ctx.flow, element) {
                    out.merge_points.insert(guid, MergePoint { x: cx, y: merge_y });
                }
                y = merge_y + self.config.connector.merge_height;
            }
            y += self.config.connector.height;
        }
        y
    }
}

/// Lay out the whole flow. Pure and deterministic.
pub fn compute_flow_layout(ctx: &FlowRenderContext) -> FlowLayout {
    let mut out = FlowLayout::default();
    let Some(start) = ctx.flow.start() else {
        return out;
    };
    let mut solver = Solver::new(ctx);
    let extent = solver.measure_chain(start);
    solver.place_chain(start, extent.left, 0.0, &mut out);
    out.width = extent.width();
    out.height = extent.height;
    out
}

/// Recompute `ctx.layout`. Returns `false` when nothing moved, so callers
/// can skip a redundant render. Calling it twice in a row is a no-op.
pub fn calculate_flow_layout(ctx: &mut FlowRenderContext) -> bool {
    let layout = compute_flow_layout(ctx);
    if layout == ctx.layout {
        log::trace!("layout unchanged");
        return false;
    }
    let old = std::mem::replace(&mut ctx.layout, layout);
    ctx.previous_layout = if old.is_empty() {
        None
    } else {
        // Mid-animation, start the next one from what is on screen.
        match ctx.previous_layout.take() {
            Some(origin) if ctx.rendered_progress < 1.0 => {
                Some(FlowLayout::interpolate(&origin, &old, ctx.rendered_progress))
            }
            _ => Some(old),
        }
    };
    log::debug!(
        "layout: {} nodes, {}x{}",
        ctx.layout.node_layout_map.len(),
        ctx.layout.width,
        ctx.layout.height
    );
    true
}
