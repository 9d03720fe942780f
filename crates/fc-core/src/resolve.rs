//! Read-only queries over a `FlowGraph`.
//!
//! Every function here is pure: it never mutates the flow, and traversal
//! order is always the canonical pre-order so the same flow yields the same
//! ordered results. GoTo edges are treated as boundaries: traversals record
//! them but never walk through them.

use crate::error::{FlowError, Result};
use crate::id::Guid;
use crate::model::*;
use serde::Serialize;
use std::collections::HashSet;

// ─── Parents & ancestry ──────────────────────────────────────────────────

/// The element whose `next` or `children[i]` structurally holds `guid`.
pub fn resolve_parent(flow: &FlowGraph, guid: Guid) -> Result<&FlowElement> {
    flow.element(guid)?;
    let (parent, _) = flow
        .structural_parent(guid)
        .ok_or(FlowError::Unreachable(guid))?;
    flow.element(parent)
}

/// The branching element owning the branch `guid` sits in, and the branch
/// index. Walks back through `next` links to the branch head first.
pub fn resolve_branch_parent(flow: &FlowGraph, guid: Guid) -> Result<(&FlowElement, usize)> {
    flow.element(guid)?;
    let mut current = guid;
    loop {
        let (parent, port) = flow
            .structural_parent(current)
            .ok_or(FlowError::Unreachable(guid))?;
        match port {
            Port::Next => current = parent,
            Port::Branch(index) => return Ok((flow.element(parent)?, index)),
        }
    }
}

/// All structural ancestors of `guid`, nearest first, ending at the root.
pub fn ancestors(flow: &FlowGraph, guid: Guid) -> Result<Vec<Guid>> {
    flow.element(guid)?;
    let mut out = Vec::new();
    let mut current = guid;
    while !current.is_root() {
        let (parent, _) = flow
            .structural_parent(current)
            .ok_or(FlowError::Unreachable(guid))?;
        out.push(parent);
        current = parent;
    }
    Ok(out)
}

/// Branching elements enclosing `guid`, nearest first, with the branch index
/// `guid` sits in. The root's main branch is included last.
pub fn branch_ancestors(flow: &FlowGraph, guid: Guid) -> Result<Vec<(Guid, usize)>> {
    let mut out = Vec::new();
    let mut current = guid;
    while !current.is_root() {
        let (parent, index) = resolve_branch_parent(flow, current)?;
        out.push((parent.guid, index));
        current = parent.guid;
    }
    Ok(out)
}

/// The nearest loop whose body contains `guid`.
pub fn enclosing_loop(flow: &FlowGraph, guid: Guid) -> Result<Option<Guid>> {
    Ok(branch_ancestors(flow, guid)?
        .into_iter()
        .find(|(parent, index)| {
            flow.get(*parent)
                .and_then(|e| e.slots.get(*index))
                .is_some_and(|k| *k == BranchKind::LoopBody)
        })
        .map(|(parent, _)| parent))
}

/// Every element structurally below `head`, `head` included, in pre-order.
pub fn subtree(flow: &FlowGraph, head: Guid) -> Vec<Guid> {
    let mut out = Vec::new();
    let mut stack = vec![head];
    while let Some(guid) = stack.pop() {
        out.push(guid);
        if let Some(next) = flow.structural_next(guid) {
            stack.push(next);
        }
        let slots = flow.get(guid).map_or(0, |e| e.slots.len());
        for i in (0..slots).rev() {
            if let Some(child) = flow.structural_child(guid, i) {
                stack.push(child);
            }
        }
    }
    out
}

/// Everything inside `guid`'s branches (not `guid` itself, not its `next`).
pub fn branch_descendants(flow: &FlowGraph, guid: Guid) -> Vec<Guid> {
    let slots = flow.get(guid).map_or(0, |e| e.slots.len());
    (0..slots)
        .filter_map(|i| flow.structural_child(guid, i))
        .flat_map(|head| subtree(flow, head))
        .collect()
}

// ─── Terminal branches ───────────────────────────────────────────────────

/// True when the branch at `branch_index` of `element` ends (END, GoTo, or a
/// nested branching element whose regular branches all end) instead of
/// falling through to `element`'s next. An empty branch is not terminal.
pub fn is_branch_terminal(flow: &FlowGraph, element: &FlowElement, branch_index: usize) -> bool {
    match flow.target(element.guid, Port::Branch(branch_index)) {
        None => false,
        Some((_, EdgeKind::GoTo)) => true,
        Some((head, EdgeKind::Structural)) => is_chain_terminal(flow, head),
    }
}

/// True when the chain starting at `head` never falls through.
pub fn is_chain_terminal(flow: &FlowGraph, head: Guid) -> bool {
    let tail = flow.chain_tail(head);
    let Some(element) = flow.get(tail) else {
        return false;
    };
    if element.kind.is_end() || has_goto_on_next(flow, tail) {
        return true;
    }
    is_element_terminal(flow, element)
}

/// A branching element with no `next` whose regular branches all end.
/// Loops are never terminal: their body always returns to the loop.
pub fn is_element_terminal(flow: &FlowGraph, element: &FlowElement) -> bool {
    if element.kind == ElementKind::Loop || flow.next(element.guid).is_some() {
        return false;
    }
    let mut regular = element.regular_slots().peekable();
    regular.peek().is_some() && regular.all(|i| is_branch_terminal(flow, element, i))
}

// ─── GoTo queries ────────────────────────────────────────────────────────

pub fn has_goto_on_next(flow: &FlowGraph, guid: Guid) -> bool {
    matches!(flow.target(guid, Port::Next), Some((_, EdgeKind::GoTo)))
}

pub fn has_goto_on_branch_head(flow: &FlowGraph, guid: Guid, branch_index: usize) -> bool {
    matches!(
        flow.target(guid, Port::Branch(branch_index)),
        Some((_, EdgeKind::GoTo))
    )
}

/// When `element` collapses to the branch at `branch_index_to_keep`, the GoTo
/// on its `next` becomes unreachable if the kept branch is terminal.
pub fn should_delete_goto_on_next(
    flow: &FlowGraph,
    element: &FlowElement,
    branch_index_to_keep: usize,
) -> bool {
    has_goto_on_next(flow, element.guid) && is_branch_terminal(flow, element, branch_index_to_keep)
}

// ─── Connection endpoints ────────────────────────────────────────────────

/// The connection leading into `element`. `None` for the root.
pub fn get_connection_source(flow: &FlowGraph, element: &FlowElement) -> Option<ConnectionSource> {
    flow.structural_parent(element.guid)
        .map(|(guid, port)| ConnectionSource {
            guid,
            child_index: port.child_index(),
        })
}

/// The element `source` currently points at, through either edge kind.
pub fn get_connection_target(
    flow: &FlowGraph,
    source: ConnectionSource,
) -> Result<Option<&FlowElement>> {
    let element = flow.element(source.guid)?;
    check_port(element, source.port())?;
    match flow.target(source.guid, source.port()) {
        Some((target, _)) => flow.element(target).map(Some),
        None => Ok(None),
    }
}

fn check_port(element: &FlowElement, port: Port) -> Result<()> {
    match port {
        Port::Branch(index) if index >= element.slots.len() => Err(FlowError::SlotOutOfRange {
            guid: element.guid,
            index,
            slots: element.slots.len(),
        }),
        _ => Ok(()),
    }
}

/// Where execution continues once `guid` finishes with an empty `next`:
/// the `next` of the enclosing branching element (recursively), or the loop
/// itself for the tail of a loop body. `None` when the flow simply ends.
pub fn continuation_after(flow: &FlowGraph, guid: Guid) -> Result<Option<Guid>> {
    let mut current = guid;
    loop {
        if current.is_root() {
            return Ok(None);
        }
        let (parent, index) = resolve_branch_parent(flow, current)?;
        if parent.slots.get(index) == Some(&BranchKind::LoopBody) {
            return Ok(Some(parent.guid));
        }
        if let Some(next) = flow.next(parent.guid) {
            return Ok(Some(next));
        }
        current = parent.guid;
    }
}

/// The element `source` would reach if its port were left empty.
pub fn fall_through_target(flow: &FlowGraph, source: ConnectionSource) -> Result<Option<Guid>> {
    let element = flow.element(source.guid)?;
    check_port(element, source.port())?;
    match source.port() {
        Port::Next => continuation_after(flow, source.guid),
        Port::Branch(index) => {
            if element.slots[index] == BranchKind::LoopBody {
                return Ok(Some(element.guid));
            }
            match flow.next(element.guid) {
                Some(next) => Ok(Some(next)),
                None => continuation_after(flow, element.guid),
            }
        }
    }
}

// ─── Reconnection ────────────────────────────────────────────────────────

/// Candidate targets when reconnecting (or rerouting) `source`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectionTargets {
    /// Downstream elements on the fall-through path of `source`.
    pub mergeable_guids: Vec<Guid>,
    /// Every other legal GoTo destination, in pre-order.
    pub goto_able_guids: Vec<Guid>,
    /// First mergeable element whose own `next` is set.
    pub first_mergeable_non_null_next: Option<Guid>,
}

impl ReconnectionTargets {
    pub fn contains(&self, guid: Guid) -> bool {
        self.mergeable_guids.contains(&guid)
            || self.goto_able_guids.contains(&guid)
            || self.first_mergeable_non_null_next == Some(guid)
    }

    /// Union of every selectable guid.
    pub fn selectable(&self) -> HashSet<Guid> {
        self.mergeable_guids
            .iter()
            .chain(&self.goto_able_guids)
            .chain(self.first_mergeable_non_null_next.as_ref())
            .copied()
            .collect()
    }
}

/// Elements execution would visit after leaving `source`, stopping at an
/// END, a GoTo, a terminal branching element, or the return into a loop.
/// A GoTo currently on `source` is ignored: that edge is being replaced.
fn fall_through_path(flow: &FlowGraph, source: ConnectionSource) -> Result<Vec<Guid>> {
    let mut out = Vec::new();
    let mut guid = source.guid;
    let mut port = source.port();
    let mut first = true;

    loop {
        let edge = flow.target(guid, port);
        let edge = match edge {
            Some((_, EdgeKind::GoTo)) if first => None,
            other => other,
        };
        first = false;

        match edge {
            Some((target, EdgeKind::Structural)) => {
                out.push(target);
                if flow.element(target)?.kind.is_end() {
                    break;
                }
                guid = target;
                port = Port::Next;
            }
            Some((_, EdgeKind::GoTo)) => break,
            None => match port {
                Port::Branch(index) => {
                    if flow.element(guid)?.slots.get(index) == Some(&BranchKind::LoopBody) {
                        break;
                    }
                    port = Port::Next;
                }
                Port::Next => {
                    let element = flow.element(guid)?;
                    if guid.is_root() || is_element_terminal(flow, element) {
                        break;
                    }
                    let (parent, index) = resolve_branch_parent(flow, guid)?;
                    if parent.guid.is_root() || parent.slots.get(index) == Some(&BranchKind::LoopBody)
                    {
                        break;
                    }
                    guid = parent.guid;
                    port = Port::Next;
                }
            },
        }
    }
    Ok(out)
}

/// Compute the reconnection candidate sets for `source`.
///
/// Mergeable guids are the fall-through path minus the current target, END
/// elements and ancestors of the source. GoTo-able guids are every other
/// element, in pre-order, that is not the root, a start or end, the source
/// itself, the current target, a branching ancestor of the source, inside the
/// source's own branches, or in a different loop body than the source.
pub fn get_target_guids_for_reconnection(
    flow: &FlowGraph,
    source: ConnectionSource,
    current_target: Option<Guid>,
) -> Result<ReconnectionTargets> {
    let source_element = flow.element(source.guid)?;
    check_port(source_element, source.port())?;

    let upstream: HashSet<Guid> = ancestors(flow, source.guid)?.into_iter().collect();
    let enclosing: HashSet<Guid> = branch_ancestors(flow, source.guid)?
        .into_iter()
        .map(|(guid, _)| guid)
        .collect();
    let own_branches: HashSet<Guid> = branch_descendants(flow, source.guid).into_iter().collect();
    let source_loop = enclosing_loop(flow, source.guid)?;

    let mut mergeable_guids = Vec::new();
    for guid in fall_through_path(flow, source)? {
        let element = flow.element(guid)?;
        if Some(guid) == current_target
            || element.kind.is_end()
            || guid == source.guid
            || upstream.contains(&guid)
            || mergeable_guids.contains(&guid)
        {
            continue;
        }
        mergeable_guids.push(guid);
    }

    let first_mergeable_non_null_next = mergeable_guids
        .iter()
        .copied()
        .find(|guid| flow.next(*guid).is_some());

    let mut goto_able_guids = Vec::new();
    for guid in flow.preorder() {
        let element = flow.element(guid)?;
        let excluded = matches!(
            element.kind,
            ElementKind::Root | ElementKind::Start | ElementKind::End
        ) || guid == source.guid
            || Some(guid) == current_target
            || mergeable_guids.contains(&guid)
            || enclosing.contains(&guid)
            || own_branches.contains(&guid);
        if excluded || enclosing_loop(flow, guid)? != source_loop {
            continue;
        }
        goto_able_guids.push(guid);
    }

    log::trace!(
        "reconnection targets for {}: {} mergeable, {} goto-able",
        source.key(),
        mergeable_guids.len(),
        goto_able_guids.len()
    );

    Ok(ReconnectionTargets {
        mergeable_guids,
        goto_able_guids,
        first_mergeable_non_null_next,
    })
}

// ─── Deletion planning ───────────────────────────────────────────────────

/// Everything that disappears or changes when an element is deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionPlan {
    pub element_guid_to_delete: Guid,
    pub child_index_to_keep: Option<usize>,
    /// Removed elements in pre-order, target first.
    pub deleted: Vec<Guid>,
    /// Subset of `deleted` lying past the merge point: the cut-off `next`
    /// chain when the kept branch is terminal.
    pub beyond_merge_point: Vec<Guid>,
    /// GoTo edges removed along with their source or target.
    pub removed_gotos: Vec<(ConnectionSource, Guid)>,
    /// Surviving elements that lose an incoming GoTo.
    pub orphaned_goto_targets: Vec<Guid>,
    /// GoTos into the deleted element that move to its replacement.
    pub retargeted_gotos: Vec<ConnectionSource>,
    pub should_highlight_beyond_merging_point: bool,
}

/// The kept branch index, or `None` when `element` has no branches to keep.
fn effective_keep(element: &FlowElement, child_index_to_keep: Option<usize>) -> Result<Option<usize>> {
    match child_index_to_keep {
        Some(index) if element.is_branching() => {
            check_port(element, Port::Branch(index))?;
            Ok(Some(index))
        }
        _ => Ok(None),
    }
}

/// The element that takes over `guid`'s incoming connection after deletion.
pub fn deletion_replacement(
    flow: &FlowGraph,
    guid: Guid,
    child_index_to_keep: Option<usize>,
) -> Result<Option<(Guid, EdgeKind)>> {
    let element = flow.element(guid)?;
    let keep = effective_keep(element, child_index_to_keep)?;
    Ok(match keep {
        Some(index) => flow
            .target(guid, Port::Branch(index))
            .or_else(|| flow.target(guid, Port::Next)),
        None => flow.target(guid, Port::Next),
    })
}

/// Work out what deleting `guid` (keeping `child_index_to_keep` when it is a
/// branching element) removes.
pub fn plan_deletion(
    flow: &FlowGraph,
    guid: Guid,
    child_index_to_keep: Option<usize>,
) -> Result<DeletionPlan> {
    let element = flow.element(guid)?;
    if matches!(element.kind, ElementKind::Root | ElementKind::Start) {
        return Err(FlowError::InvalidEdit {
            guid,
            reason: "the root and start elements cannot be deleted",
        });
    }
    let keep = effective_keep(element, child_index_to_keep)?;

    let mut deleted = vec![guid];
    for i in 0..element.slots.len() {
        if Some(i) == keep {
            continue;
        }
        if let Some(head) = flow.structural_child(guid, i) {
            deleted.extend(subtree(flow, head));
        }
    }

    let cut_off = keep.is_some_and(|k| is_branch_terminal(flow, element, k));
    let beyond_merge_point = match (cut_off, flow.structural_next(guid)) {
        (true, Some(next)) => subtree(flow, next),
        _ => Vec::new(),
    };
    deleted.extend(beyond_merge_point.iter().copied());

    let deleted_set: HashSet<Guid> = deleted.iter().copied().collect();
    let replacement = match keep {
        Some(index) if cut_off => flow.target(guid, Port::Branch(index)),
        _ => deletion_replacement(flow, guid, keep)?,
    }
    .map(|(target, _)| target)
    .filter(|target| !deleted_set.contains(target));

    let mut removed_gotos = Vec::new();
    let mut retargeted_gotos = Vec::new();
    for (source, target) in flow.goto_edges() {
        // The deleted element's own GoTo moves to whatever replaces it,
        // unless collapsing cuts it off.
        let transferred = source.guid == guid
            && match source.child_index {
                None => !cut_off,
                Some(index) => Some(index) == keep,
            };
        if deleted_set.contains(&source.guid) && !transferred {
            removed_gotos.push((source, target));
        } else if target == guid && !deleted_set.contains(&source.guid) {
            if replacement.is_some_and(|r| r != source.guid) {
                retargeted_gotos.push(source);
            } else {
                removed_gotos.push((source, target));
            }
        } else if deleted_set.contains(&target) && !deleted_set.contains(&source.guid) {
            removed_gotos.push((source, target));
        }
    }

    let mut orphaned_goto_targets: Vec<Guid> = Vec::new();
    for (_, target) in &removed_gotos {
        if !deleted_set.contains(target) && !orphaned_goto_targets.contains(target) {
            orphaned_goto_targets.push(*target);
        }
    }

    let should_highlight_beyond_merging_point = !beyond_merge_point.is_empty()
        || keep.is_some_and(|k| should_delete_goto_on_next(flow, element, k))
        || !orphaned_goto_targets.is_empty();

    Ok(DeletionPlan {
        element_guid_to_delete: guid,
        child_index_to_keep: keep,
        deleted,
        beyond_merge_point,
        removed_gotos,
        orphaned_goto_targets,
        retargeted_gotos,
        should_highlight_beyond_merging_point,
    })
}

/// Whether the deletion highlight should extend past the merge point.
pub fn should_highlight_beyond_merging_point(
    flow: &FlowGraph,
    guid: Guid,
    child_index_to_keep: Option<usize>,
) -> Result<bool> {
    Ok(plan_deletion(flow, guid, child_index_to_keep)?.should_highlight_beyond_merging_point)
}
