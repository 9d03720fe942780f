//! Interaction state transitions.
//!
//! Menu state is encoded in `InteractionState::menu_info`:
//! `None` is closed, `needs_to_position` marks a menu awaiting its measured
//! geometry, anything else is open. The transition functions are pure and
//! return the next state; `InteractionMachine` holds the committed state plus
//! the positioned state waiting for the next render.

use crate::mutation::FlowMutation;
use fc_core::resolve::{get_target_guids_for_reconnection, plan_deletion};
use fc_core::{
    ConnectionSource, DeletionPathInfo, EdgeKind, FlowError, FlowGraph, Guid, InteractionState,
    MenuGeometry, MenuInfo, MenuTarget, ReconnectionTargets, Result,
};
use serde::Serialize;

// ─── Menu ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MenuPhase {
    Closed,
    OpenPending,
    Open,
}

pub fn menu_phase(state: &InteractionState) -> MenuPhase {
    match &state.menu_info {
        None => MenuPhase::Closed,
        Some(info) if info.needs_to_position => MenuPhase::OpenPending,
        Some(_) => MenuPhase::Open,
    }
}

/// A request to toggle the menu of `target`. `component_key` is the
/// registry key resolved for it, `None` when no menu component exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleMenuDetail {
    pub target: MenuTarget,
    pub component_key: Option<String>,
}

/// Close the menu when it is already open on `detail.target`, otherwise
/// open it there. Targets without a menu component leave the state alone.
pub fn toggle_flow_menu(detail: &ToggleMenuDetail, state: &InteractionState) -> InteractionState {
    let open_here = state
        .menu_info
        .as_ref()
        .is_some_and(|info| info.target == detail.target);
    if open_here {
        return close_flow_menu(state);
    }
    let Some(key) = &detail.component_key else {
        log::debug!("no menu component for {}", detail.target.key());
        return state.clone();
    };
    InteractionState {
        menu_info: Some(MenuInfo::new(detail.target, key.clone())),
        deletion_path_info: None,
    }
}

/// Close whatever menu is open. The deletion preview belongs to the menu and
/// goes with it.
pub fn close_flow_menu(_state: &InteractionState) -> InteractionState {
    InteractionState::default()
}

/// Record the measured geometry of a pending menu. Returns `None` when no
/// menu is waiting for one.
pub fn position_flow_menu(state: &InteractionState, geometry: MenuGeometry) -> Option<InteractionState> {
    let info = state.menu_info.as_ref().filter(|info| info.needs_to_position)?;
    Some(InteractionState {
        menu_info: Some(MenuInfo {
            needs_to_position: false,
            geometry: Some(geometry),
            ..info.clone()
        }),
        deletion_path_info: state.deletion_path_info.clone(),
    })
}

// ─── Deletion highlight ──────────────────────────────────────────────────

/// Preview the deletion of `target`, keeping `child_index_to_keep` when it
/// is a branching element.
///
/// Elements past the merge point, and surviving GoTo targets that would be
/// orphaned, are only highlighted when `highlight_beyond_merge_point` is set.
pub fn update_deletion_path_info(
    flow: &FlowGraph,
    target: Guid,
    child_index_to_keep: Option<usize>,
    state: &InteractionState,
    highlight_beyond_merge_point: bool,
) -> Result<InteractionState> {
    let plan = plan_deletion(flow, target, child_index_to_keep)?;

    let mut elements: Vec<Guid> = plan
        .deleted
        .iter()
        .copied()
        .filter(|guid| !plan.beyond_merge_point.contains(guid))
        .collect();
    if highlight_beyond_merge_point {
        elements.extend(plan.beyond_merge_point.iter().copied());
        for guid in &plan.orphaned_goto_targets {
            if !elements.contains(guid) {
                elements.push(*guid);
            }
        }
    }

    let kept = plan
        .child_index_to_keep
        .map(|index| ConnectionSource::branch(target, index));
    let mut connectors = Vec::new();
    for guid in &elements {
        if !plan.deleted.contains(guid) {
            continue;
        }
        let Ok(element) = flow.element(*guid) else {
            continue;
        };
        let ports = std::iter::once(None).chain((0..element.slots.len()).map(Some));
        for child_index in ports {
            let source = ConnectionSource { guid: *guid, child_index };
            if Some(source) != kept && !element.kind.is_end() {
                connectors.push(source);
            }
        }
    }
    for (source, _) in &plan.removed_gotos {
        if !connectors.contains(source) {
            connectors.push(*source);
        }
    }

    log::trace!(
        "deletion preview of {target}: {} elements, {} connectors",
        elements.len(),
        connectors.len()
    );
    Ok(InteractionState {
        menu_info: state.menu_info.clone(),
        deletion_path_info: Some(DeletionPathInfo {
            element_guid_to_delete: target,
            child_index_to_keep: plan.child_index_to_keep,
            should_highlight_beyond_merging_point: highlight_beyond_merge_point,
            elements,
            connectors,
        }),
    })
}

pub fn clear_deletion_path_info(state: &InteractionState) -> InteractionState {
    InteractionState {
        menu_info: state.menu_info.clone(),
        deletion_path_info: None,
    }
}

// ─── Selection ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionMode {
    #[default]
    Off,
    Selecting,
    Reconnecting,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    pub mode: SelectionMode,
    pub goto_source: Option<ConnectionSource>,
    pub is_rerouting_goto: bool,
    pub targets: Option<ReconnectionTargets>,
    /// Elements picked while in `Selecting` mode.
    pub selected: Vec<Guid>,
}

impl SelectionState {
    /// Start picking a new destination for `source`. Only empty ports and
    /// ports holding a GoTo can be reconnected; on error the state is kept.
    pub fn enter_reconnection(
        &mut self,
        flow: &FlowGraph,
        source: ConnectionSource,
        is_reroute: bool,
    ) -> Result<()> {
        let current = match flow.target(source.guid, source.port()) {
            Some((guid, EdgeKind::GoTo)) => Some(guid),
            Some((_, EdgeKind::Structural)) => {
                return Err(FlowError::InvalidEdit {
                    guid: source.guid,
                    reason: "the port still holds its successor",
                });
            }
            None => None,
        };
        let targets = get_target_guids_for_reconnection(flow, source, current)?;
        log::debug!(
            "reconnecting {}: {} mergeable, {} goto-able",
            source.key(),
            targets.mergeable_guids.len(),
            targets.goto_able_guids.len()
        );
        *self = SelectionState {
            mode: SelectionMode::Reconnecting,
            goto_source: Some(source),
            is_rerouting_goto: is_reroute,
            targets: Some(targets),
            selected: Vec::new(),
        };
        Ok(())
    }

    pub fn is_selectable(&self, guid: Guid) -> bool {
        match (&self.mode, &self.targets) {
            (SelectionMode::Reconnecting, Some(targets)) => targets.contains(guid),
            (SelectionMode::Reconnecting, None) => false,
            _ => true,
        }
    }

    /// Pick `guid`. While reconnecting this yields the edit to apply and
    /// leaves the mode; in `Selecting` it toggles membership.
    pub fn select_target(&mut self, guid: Guid) -> Option<FlowMutation> {
        match self.mode {
            SelectionMode::Reconnecting => {
                if !self.is_selectable(guid) {
                    log::debug!("{guid} is not a reconnection target");
                    return None;
                }
                let source = self.goto_source?;
                let mutation = FlowMutation::Connect {
                    source,
                    target: guid,
                    is_reroute: self.is_rerouting_goto,
                };
                self.exit();
                Some(mutation)
            }
            SelectionMode::Selecting => {
                match self.selected.iter().position(|g| *g == guid) {
                    Some(at) => {
                        self.selected.remove(at);
                    }
                    None => self.selected.push(guid),
                }
                None
            }
            SelectionMode::Off => None,
        }
    }

    /// Add every guid in `guids` to the selection. Only `Selecting` mode
    /// takes area picks; returns whether anything was added.
    pub fn select_area(&mut self, guids: impl IntoIterator<Item = Guid>) -> bool {
        if self.mode != SelectionMode::Selecting {
            return false;
        }
        let before = self.selected.len();
        for guid in guids {
            if !self.selected.contains(&guid) {
                self.selected.push(guid);
            }
        }
        self.selected.len() > before
    }

    pub fn toggle_selecting(&mut self) {
        if self.mode == SelectionMode::Off {
            self.mode = SelectionMode::Selecting;
        } else {
            self.exit();
        }
    }

    /// Leave any selection mode and make everything selectable again.
    pub fn exit(&mut self) {
        *self = SelectionState::default();
    }
}

// ─── Machine ─────────────────────────────────────────────────────────────

/// The committed interaction state plus a positioned state that is applied
/// on the next render.
#[derive(Debug, Clone, Default)]
pub struct InteractionMachine {
    state: InteractionState,
    pending: Option<InteractionState>,
    pub selection: SelectionState,
}

impl InteractionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn phase(&self) -> MenuPhase {
        menu_phase(&self.state)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Commit `state`, dropping any positioned state still waiting.
    pub fn set(&mut self, state: InteractionState) {
        self.pending = None;
        self.state = state;
    }

    /// Apply `f` to the committed state and to the buffered one, if any.
    pub fn modify(&mut self, f: impl Fn(&InteractionState) -> InteractionState) {
        self.state = f(&self.state);
        if let Some(pending) = self.pending.as_mut() {
            *pending = f(pending);
        }
    }

    /// Buffer the measured geometry of the pending menu. Only the first
    /// report counts; later ones return `false`.
    pub fn apply_geometry(&mut self, geometry: MenuGeometry) -> bool {
        if self.pending.is_some() {
            return false;
        }
        match position_flow_menu(&self.state, geometry) {
            Some(next) => {
                self.pending = Some(next);
                true
            }
            None => false,
        }
    }

    /// Commit the buffered state. Called right before rendering.
    pub fn flush_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(next) => {
                self.state = next;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc_core::{ElementKind, FlowElement};

    fn g(s: &str) -> Guid {
        Guid::intern(s)
    }

    fn detail(target: MenuTarget) -> ToggleMenuDetail {
        ToggleMenuDetail {
            target,
            component_key: Some("menu".to_string()),
        }
    }

    #[test]
    fn toggle_twice_returns_to_closed() {
        let target = MenuTarget::Node(g("i_a"));
        let closed = InteractionState::default();
        let open = toggle_flow_menu(&detail(target), &closed);
        assert_eq!(menu_phase(&open), MenuPhase::OpenPending);
        assert_eq!(toggle_flow_menu(&detail(target), &open), closed);
    }

    #[test]
    fn toggle_other_target_moves_menu() {
        let open = toggle_flow_menu(&detail(MenuTarget::Node(g("i_a"))), &InteractionState::default());
        let moved = toggle_flow_menu(&detail(MenuTarget::Node(g("i_b"))), &open);
        assert_eq!(moved.menu_info.map(|m| m.target), Some(MenuTarget::Node(g("i_b"))));
    }

    #[test]
    fn toggle_without_component_is_noop() {
        let open = toggle_flow_menu(&detail(MenuTarget::Node(g("i_a"))), &InteractionState::default());
        let request = ToggleMenuDetail {
            target: MenuTarget::Node(g("i_b")),
            component_key: None,
        };
        assert_eq!(toggle_flow_menu(&request, &open), open);
    }

    #[test]
    fn close_and_clear_are_idempotent() {
        let open = toggle_flow_menu(&detail(MenuTarget::Node(g("i_a"))), &InteractionState::default());
        let once = close_flow_menu(&open);
        assert_eq!(close_flow_menu(&once), once);
        let cleared = clear_deletion_path_info(&open);
        assert_eq!(clear_deletion_path_info(&cleared), cleared);
    }

    #[test]
    fn geometry_applies_once() {
        let mut machine = InteractionMachine::new();
        machine.set(toggle_flow_menu(&detail(MenuTarget::Node(g("i_a"))), &InteractionState::default()));
        let geometry = MenuGeometry { x: 1.0, y: 2.0, w: 3.0, h: 4.0 };

        assert!(machine.apply_geometry(geometry));
        assert!(!machine.apply_geometry(geometry));
        assert_eq!(machine.phase(), MenuPhase::OpenPending);
        assert!(machine.flush_pending());
        assert_eq!(machine.phase(), MenuPhase::Open);
        assert!(!machine.apply_geometry(geometry));
        assert!(!machine.flush_pending());
    }

    #[test]
    fn reconnection_restricts_then_restores() {
        let mut flow = FlowGraph::with_start(g("i_start"));
        flow.insert_element(ConnectionSource::next(g("i_start")), FlowElement::new(g("i_s1"), ElementKind::Screen))
            .unwrap();
        flow.insert_element(ConnectionSource::next(g("i_s1")), FlowElement::new(g("i_s2"), ElementKind::Screen))
            .unwrap();

        let mut selection = SelectionState::default();
        selection
            .enter_reconnection(&flow, ConnectionSource::next(g("i_s2")), false)
            .unwrap();
        assert_eq!(selection.mode, SelectionMode::Reconnecting);
        assert!(!selection.is_selectable(g("i_start")));
        assert!(selection.is_selectable(g("i_s1")));

        assert_eq!(selection.select_target(g("i_start")), None);
        assert_eq!(selection.mode, SelectionMode::Reconnecting);

        selection.exit();
        assert_eq!(selection, SelectionState::default());
        assert!(selection.is_selectable(g("i_start")));
    }

    #[test]
    fn area_selection_only_while_selecting() {
        let mut selection = SelectionState::default();
        assert!(!selection.select_area([g("i_a")]));

        selection.toggle_selecting();
        assert!(selection.select_area([g("i_a"), g("i_b")]));
        assert!(!selection.select_area([g("i_b")]));
        assert_eq!(selection.select_target(g("i_a")), None);
        assert_eq!(selection.selected, vec![g("i_b")]);
    }

    #[test]
    fn reconnection_refuses_port_with_successor() {
        let mut flow = FlowGraph::with_start(g("i2_start"));
        flow.insert_element(ConnectionSource::next(g("i2_start")), FlowElement::new(g("i2_s1"), ElementKind::Screen))
            .unwrap();

        let mut selection = SelectionState::default();
        let entered = selection.enter_reconnection(&flow, ConnectionSource::next(g("i2_start")), false);
        assert!(matches!(entered, Err(FlowError::InvalidEdit { .. })));
        assert_eq!(selection, SelectionState::default());
    }
}
