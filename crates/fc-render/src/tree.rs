//! Layout → render tree.
//!
//! Walks the flow from the root's main branch and emits one node per
//! element, each carrying its outgoing connectors as kurbo paths. The view
//! layer only draws what it is given; every geometric decision (where a
//! branch merges, where a loop body returns, where the "+" button sits) is
//! made here.

use fc_core::layout::{FlowLayout, MergePoint};
use fc_core::model::*;
use fc_core::{FlowRenderContext, Guid, MenuGeometry, MenuTarget};
use kurbo::{BezPath, Point, Rect};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectorType {
    /// Straight line to the next element.
    Straight,
    /// From a branching element down into one of its branches.
    BranchHead,
    /// From a branch tail (or an empty branch) into the merge point.
    Merge,
    /// Stub ending in a reference to another element.
    GoTo,
    /// From a loop body tail back up to the loop.
    LoopBack,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorRenderInfo {
    pub source: ConnectionSource,
    pub connector_type: ConnectorType,
    pub path: BezPath,
    /// Center of the connector's "+" button.
    pub add_button: Point,
    pub goto_target: Option<Guid>,
    pub is_fault: bool,
    pub to_be_deleted: bool,
    pub menu_opened: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRenderInfo {
    pub guid: Guid,
    pub kind: ElementKind,
    pub element_type: String,
    pub label: Option<String>,
    pub geometry: Rect,
    pub is_dynamic: bool,
    pub has_menu: bool,
    pub to_be_deleted: bool,
    pub menu_opened: bool,
    pub branches: Vec<BranchRenderInfo>,
    pub merge: Option<Point>,
    /// Outgoing `next` connector. `None` for END and terminal elements.
    pub connector: Option<ConnectorRenderInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchRenderInfo {
    pub source: ConnectionSource,
    pub is_terminal: bool,
    /// Connector from the owner into the branch. `None` for the root.
    pub head: Option<ConnectorRenderInfo>,
    pub nodes: Vec<NodeRenderInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuAnchor {
    pub target: MenuTarget,
    pub point: Point,
    pub needs_to_position: bool,
    pub geometry: Option<MenuGeometry>,
}

/// One frame of the canvas.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRenderInfo {
    pub progress: f32,
    pub width: f64,
    pub height: f64,
    pub root: BranchRenderInfo,
    pub menu: Option<MenuAnchor>,
    pub is_deleting_branch: bool,
}

impl BranchRenderInfo {
    /// Depth-first walk over every node in this branch and below.
    pub fn nodes(&self) -> Vec<&NodeRenderInfo> {
        fn walk<'a>(branch: &'a BranchRenderInfo, out: &mut Vec<&'a NodeRenderInfo>) {
            for node in &branch.nodes {
                out.push(node);
                for child in &node.branches {
                    walk(child, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }

    /// Every connector below this branch, branch heads before `next`.
    pub fn connectors(&self) -> Vec<&ConnectorRenderInfo> {
        self.nodes()
            .into_iter()
            .flat_map(|n| {
                n.branches
                    .iter()
                    .filter_map(|b| b.head.as_ref())
                    .chain(n.connector.as_ref())
            })
            .collect()
    }

    pub fn connector(&self, source: ConnectionSource) -> Option<&ConnectorRenderInfo> {
        self.connectors().into_iter().find(|c| c.source == source)
    }
}

impl FlowRenderInfo {
    pub fn nodes(&self) -> Vec<&NodeRenderInfo> {
        self.root.nodes()
    }

    pub fn node(&self, guid: Guid) -> Option<&NodeRenderInfo> {
        self.nodes().into_iter().find(|n| n.guid == guid)
    }

    pub fn connectors(&self) -> Vec<&ConnectorRenderInfo> {
        self.root.connectors()
    }

    pub fn connector(&self, source: ConnectionSource) -> Option<&ConnectorRenderInfo> {
        self.root.connector(source)
    }
}

// ─── Building ────────────────────────────────────────────────────────────

/// How a chain continues once its tail has no `next`.
#[derive(Debug, Clone, Copy)]
enum ChainEnd {
    Merge(MergePoint),
    LoopBack { loop_rect: Rect, side_x: f64 },
    Open,
}

struct Builder<'a> {
    ctx: &'a FlowRenderContext,
    layout: &'a FlowLayout,
}

fn pt(x: f32, y: f32) -> Point {
    Point::new(f64::from(x), f64::from(y))
}

impl Builder<'_> {
    fn rect(&self, guid: Guid) -> Option<Rect> {
        self.layout.node_layout_map.get(&guid).map(|n| {
            Rect::new(
                f64::from(n.x),
                f64::from(n.y),
                f64::from(n.x + n.w),
                f64::from(n.y + n.h),
            )
        })
    }

    fn connector_height(&self) -> f64 {
        f64::from(self.ctx.layout_config.connector.height)
    }

    fn connector(
        &self,
        source: ConnectionSource,
        connector_type: ConnectorType,
        path: BezPath,
        add_button: Point,
    ) -> ConnectorRenderInfo {
        let state = &self.ctx.interaction_state;
        let is_fault = source.child_index.is_some_and(|i| {
            self.ctx
                .flow
                .get(source.guid)
                .is_some_and(|e| e.fault_index() == Some(i))
        });
        let goto_target = match self.ctx.flow.target(source.guid, source.port()) {
            Some((target, EdgeKind::GoTo)) => Some(target),
            _ => None,
        };
        ConnectorRenderInfo {
            source,
            connector_type,
            path,
            add_button,
            goto_target,
            is_fault,
            to_be_deleted: state
                .deletion_path_info
                .as_ref()
                .is_some_and(|d| d.contains_connector(&source)),
            menu_opened: state
                .menu_info
                .as_ref()
                .is_some_and(|m| m.target == MenuTarget::Connector(source)),
        }
    }

    /// Extend `path` from `from` to wherever `end` leads. Returns the type of
    /// connector the extension makes.
    fn extend_to_end(&self, path: &mut BezPath, from: Point, end: ChainEnd) -> ConnectorType {
        match end {
            ChainEnd::Merge(merge) => {
                let merge = pt(merge.x, merge.y);
                path.line_to((from.x, merge.y));
                path.line_to(merge);
                ConnectorType::Merge
            }
            ChainEnd::LoopBack { loop_rect, side_x } => {
                let turn_y = from.y + self.connector_height() / 2.0;
                let center_y = loop_rect.center().y;
                path.line_to((from.x, turn_y));
                path.line_to((side_x, turn_y));
                path.line_to((side_x, center_y));
                path.line_to((loop_rect.x0, center_y));
                ConnectorType::LoopBack
            }
            ChainEnd::Open => {
                path.line_to((from.x, from.y + self.connector_height()));
                ConnectorType::Straight
            }
        }
    }

    fn chain(&self, head: Guid, end: ChainEnd) -> Vec<NodeRenderInfo> {
        self.ctx
            .flow
            .chain(head)
            .into_iter()
            .filter_map(|guid| self.node(guid, end))
            .collect()
    }

    fn node(&self, guid: Guid, end: ChainEnd) -> Option<NodeRenderInfo> {
        let element = self.ctx.flow.get(guid)?;
        let rect = self.rect(guid)?;
        let merge = self.layout.merge_points.get(&guid).copied();
        let state = &self.ctx.interaction_state;

        let branches = (0..element.slots.len())
            .filter_map(|index| self.branch(element, rect, index, merge))
            .collect();

        let metadata = self.ctx.metadata(element);
        log::trace!("render {guid} at {:?}", rect.origin());
        Some(NodeRenderInfo {
            guid,
            kind: element.kind,
            element_type: element.type_key().to_string(),
            label: element.label.clone(),
            geometry: rect,
            is_dynamic: self.ctx.is_dynamic(element),
            has_menu: metadata.is_some_and(|m| m.menu_component.is_some()),
            to_be_deleted: state
                .deletion_path_info
                .as_ref()
                .is_some_and(|d| d.contains(guid)),
            menu_opened: state
                .menu_info
                .as_ref()
                .is_some_and(|m| m.target == MenuTarget::Node(guid)),
            branches,
            merge: merge.map(|m| pt(m.x, m.y)),
            connector: self.next_connector(element, rect, merge, end),
        })
    }

    fn next_connector(
        &self,
        element: &FlowElement,
        rect: Rect,
        merge: Option<MergePoint>,
        end: ChainEnd,
    ) -> Option<ConnectorRenderInfo> {
        if element.kind.is_end() {
            return None;
        }
        let start = match (element.is_branching(), merge) {
            (false, _) => Point::new(rect.center().x, rect.y1),
            (true, Some(merge)) => pt(merge.x, merge.y),
            (true, None) => return None,
        };
        let source = ConnectionSource::next(element.guid);
        let half = self.connector_height() / 2.0;
        let mut path = BezPath::new();
        path.move_to(start);

        let connector_type = match self.ctx.flow.target(element.guid, Port::Next) {
            Some((next, EdgeKind::Structural)) => {
                let top = self.rect(next).map_or(start.y + 2.0 * half, |r| r.y0);
                path.line_to((start.x, top));
                let button = Point::new(start.x, (start.y + top) / 2.0);
                return Some(self.connector(source, ConnectorType::Straight, path, button));
            }
            Some((_, EdgeKind::GoTo)) => {
                path.line_to((start.x, start.y + half));
                ConnectorType::GoTo
            }
            None => self.extend_to_end(&mut path, start, end),
        };
        let button = Point::new(start.x, start.y + half);
        Some(self.connector(source, connector_type, path, button))
    }

    fn branch(
        &self,
        element: &FlowElement,
        rect: Rect,
        index: usize,
        merge: Option<MergePoint>,
    ) -> Option<BranchRenderInfo> {
        let source = ConnectionSource::branch(element.guid, index);
        let branch = self.layout.branch_layout_map.get(&source)?;
        let is_loop = element.kind == ElementKind::Loop;
        let cx = rect.center().x;
        let bx = f64::from(branch.x);
        let top = f64::from(branch.y);
        let split_y = (rect.y1 + top) / 2.0;

        let mut path = BezPath::new();
        path.move_to((cx, rect.y1));
        if !is_loop {
            path.line_to((cx, split_y));
            path.line_to((bx, split_y));
        }
        path.line_to((bx, top));

        let end = if is_loop {
            let padding = f64::from(self.ctx.layout_config.branch.loop_padding);
            ChainEnd::LoopBack {
                loop_rect: rect,
                side_x: bx - f64::from(branch.w) / 2.0 + padding / 2.0,
            }
        } else {
            merge.map_or(ChainEnd::Open, ChainEnd::Merge)
        };

        let (connector_type, nodes, button) = match self.ctx.flow.target(element.guid, Port::Branch(index)) {
            Some((head, EdgeKind::Structural)) => (
                ConnectorType::BranchHead,
                self.chain(head, end),
                Point::new(bx, (split_y + top) / 2.0),
            ),
            Some((_, EdgeKind::GoTo)) => (ConnectorType::GoTo, Vec::new(), Point::new(bx, top)),
            None => {
                let kind = self.extend_to_end(&mut path, Point::new(bx, top), end);
                (kind, Vec::new(), Point::new(bx, top + self.connector_height() / 2.0))
            }
        };

        Some(BranchRenderInfo {
            source,
            is_terminal: branch.is_terminal,
            head: Some(self.connector(source, connector_type, path, button)),
            nodes,
        })
    }

    fn menu(&self, root: &BranchRenderInfo) -> Option<MenuAnchor> {
        let info = self.ctx.interaction_state.menu_info.as_ref()?;
        let point = match info.target {
            MenuTarget::Node(guid) => {
                let rect = self.rect(guid)?;
                Point::new(rect.x1, rect.y0)
            }
            MenuTarget::Connector(source) => root.connector(source)?.add_button,
        };
        Some(MenuAnchor {
            target: info.target,
            point,
            needs_to_position: info.needs_to_position,
            geometry: info.geometry,
        })
    }
}

/// Build the render tree at animation `progress` (0..=1).
///
/// Frames before 1 blend from the previous layout. Reaching 1 drops that
/// memo, which is the only change made to `ctx`.
pub fn render_flow(ctx: &mut FlowRenderContext, progress: f32) -> FlowRenderInfo {
    let progress = progress.clamp(0.0, 1.0);
    let layout = match &ctx.previous_layout {
        Some(previous) if progress < 1.0 => FlowLayout::interpolate(previous, &ctx.layout, progress),
        _ => ctx.layout.clone(),
    };

    let info = {
        let builder = Builder {
            ctx: &*ctx,
            layout: &layout,
        };
        let nodes = match ctx.flow.start() {
            Some(start) => builder.chain(start, ChainEnd::Open),
            None => Vec::new(),
        };
        let root = BranchRenderInfo {
            source: ConnectionSource::branch(ctx.flow.root_guid(), 0),
            is_terminal: false,
            head: None,
            nodes,
        };
        let menu = builder.menu(&root);
        FlowRenderInfo {
            progress,
            width: f64::from(layout.width),
            height: f64::from(layout.height),
            root,
            menu,
            is_deleting_branch: ctx.is_deleting_branch,
        }
    };

    ctx.rendered_progress = progress;
    if progress >= 1.0 {
        ctx.previous_layout = None;
    }
    info
}
