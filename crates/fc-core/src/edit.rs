//! Structural edits on a `FlowGraph`.
//!
//! Each edit checks everything it needs before touching the graph, so a
//! failed edit leaves the flow unchanged.

use crate::error::{FlowError, Result};
use crate::id::Guid;
use crate::model::*;
use crate::resolve::{self, DeletionPlan};

/// How `connect_to_element` ended up wiring the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The target is the natural fall-through, so the port stays empty.
    Merged,
    /// A GoTo edge now points at the target.
    GoTo,
}

impl FlowGraph {
    /// Insert `element` at `source`. Whatever `source` pointed at moves to
    /// the new element's `next`.
    pub fn insert_element(&mut self, source: ConnectionSource, element: FlowElement) -> Result<()> {
        let guid = element.guid;
        let host = self.element(source.guid)?;
        if host.kind.is_end() && source.port() == Port::Next {
            return Err(FlowError::InvalidEdit {
                guid: source.guid,
                reason: "end elements cannot continue",
            });
        }
        if matches!(element.kind, ElementKind::Root | ElementKind::Start) {
            return Err(FlowError::InvalidEdit {
                guid,
                reason: "only one root and start may exist",
            });
        }
        if self.contains(guid) {
            return Err(FlowError::DuplicateGuid(guid));
        }
        if let Port::Branch(index) = source.port()
            && index >= host.slots.len()
        {
            return Err(FlowError::SlotOutOfRange {
                guid: source.guid,
                index,
                slots: host.slots.len(),
            });
        }
        let existing = self.target(source.guid, source.port());
        if element.kind.is_end() && matches!(existing, Some((_, EdgeKind::Structural))) {
            return Err(FlowError::InvalidEdit {
                guid,
                reason: "an end element would cut off its successor",
            });
        }

        log::trace!("insert {guid} at {}", source.key());
        let is_end = element.kind.is_end();
        self.disconnect(source);
        self.add_element(element)?;
        self.connect(source, guid, EdgeKind::Structural)?;
        if let Some((target, kind)) = existing
            && !is_end
        {
            self.connect(ConnectionSource::next(guid), target, kind)?;
        }
        Ok(())
    }

    /// Delete `guid`. For branching elements, `child_index_to_keep` selects
    /// the branch spliced into its place; every other branch is removed.
    pub fn delete_element(&mut self, guid: Guid, child_index_to_keep: Option<usize>) -> Result<DeletionPlan> {
        let plan = resolve::plan_deletion(self, guid, child_index_to_keep)?;
        let keep = plan.child_index_to_keep;
        let element = self.element(guid)?;
        let incoming = resolve::get_connection_source(self, element).ok_or(FlowError::Unreachable(guid))?;

        let cut_off = keep.is_some_and(|k| resolve::is_branch_terminal(self, element, k));
        let next = self.target(guid, Port::Next);
        let replacement = match keep {
            Some(index) if cut_off => self.target(guid, Port::Branch(index)),
            _ => resolve::deletion_replacement(self, guid, keep)?,
        };
        // A kept, non-terminal branch hands its tail over to the old `next`.
        let tail_link = match (keep, next) {
            (Some(index), Some(next)) if !cut_off => self
                .structural_child(guid, index)
                .map(|head| (self.chain_tail(head), next)),
            _ => None,
        };

        log::trace!(
            "delete {guid} (keep {keep:?}): {} elements, {} gotos removed",
            plan.deleted.len(),
            plan.removed_gotos.len()
        );

        for (source, _) in &plan.removed_gotos {
            self.disconnect(*source);
        }
        for source in &plan.retargeted_gotos {
            self.disconnect(*source);
        }
        // Detach the kept branch and old `next` before removal so they survive.
        self.disconnect(incoming);
        if let Some(index) = keep {
            self.disconnect(ConnectionSource::branch(guid, index));
        }
        self.disconnect(ConnectionSource::next(guid));
        for deleted in &plan.deleted {
            self.remove_element(*deleted)?;
        }

        let alive = |flow: &FlowGraph, target: Guid| flow.contains(target);
        if let Some((target, kind)) = replacement
            && alive(self, target)
        {
            self.connect(incoming, target, kind)?;
        }
        if let Some((tail, (target, kind))) = tail_link
            && alive(self, target)
        {
            self.connect(ConnectionSource::next(tail), target, kind)?;
        }
        if let Some((target, _)) = replacement
            && alive(self, target)
        {
            for source in &plan.retargeted_gotos {
                self.connect(*source, target, EdgeKind::GoTo)?;
            }
        }
        Ok(plan)
    }

    /// Point `source` at `target`. When `target` is where `source` already
    /// falls through to, the port is simply cleared (a merge); otherwise a
    /// GoTo is created. Rerouting replaces an existing GoTo on the port.
    pub fn connect_to_element(
        &mut self,
        source: ConnectionSource,
        target: Guid,
        is_reroute: bool,
    ) -> Result<ConnectOutcome> {
        let target_element = self.element(target)?;
        if matches!(target_element.kind, ElementKind::Root | ElementKind::Start) || target == source.guid {
            return Err(FlowError::InvalidEdit {
                guid: target,
                reason: "not a valid connection target",
            });
        }
        let host = self.element(source.guid)?;
        if host.kind.is_end() {
            return Err(FlowError::InvalidEdit {
                guid: source.guid,
                reason: "end elements cannot continue",
            });
        }
        match self.target(source.guid, source.port()) {
            Some((_, EdgeKind::Structural)) => {
                return Err(FlowError::InvalidEdit {
                    guid: source.guid,
                    reason: "the port still holds its successor",
                });
            }
            Some((_, EdgeKind::GoTo)) if !is_reroute => {
                return Err(FlowError::PortOccupied {
                    guid: source.guid,
                    port: source.port(),
                });
            }
            _ => {}
        }

        let previous = self.disconnect(source);
        let fall_through = match resolve::fall_through_target(self, source) {
            Ok(found) => found,
            Err(err) => {
                if let Some((old, kind)) = previous {
                    self.connect(source, old, kind)?;
                }
                return Err(err);
            }
        };
        if fall_through == Some(target) {
            log::trace!("{} merges into {target}", source.key());
            return Ok(ConnectOutcome::Merged);
        }
        log::trace!("{} goes to {target}", source.key());
        self.connect(source, target, EdgeKind::GoTo)?;
        Ok(ConnectOutcome::GoTo)
    }

    /// Remove the GoTo leaving `source`.
    pub fn remove_goto(&mut self, source: ConnectionSource) -> Result<Guid> {
        self.element(source.guid)?;
        match self.target(source.guid, source.port()) {
            Some((target, EdgeKind::GoTo)) => {
                self.disconnect(source);
                Ok(target)
            }
            _ => Err(FlowError::InvalidEdit {
                guid: source.guid,
                reason: "no goto on this connector",
            }),
        }
    }

    /// Replace an element's intrinsic size override.
    pub fn set_dimensions(&mut self, guid: Guid, dimensions: Option<Dimensions>) -> Result<()> {
        let element = self.get_mut(guid).ok_or(FlowError::NotFound(guid))?;
        element.dimensions = dimensions;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate_graph;

    fn g(s: &str) -> Guid {
        Guid::intern(s)
    }

    fn linear(prefix: &str, names: &[&str]) -> FlowGraph {
        let mut flow = FlowGraph::with_start(g(&format!("{prefix}_start")));
        let mut prev = g(&format!("{prefix}_start"));
        for name in names {
            let guid = g(&format!("{prefix}_{name}"));
            let kind = if *name == "end" {
                ElementKind::End
            } else {
                ElementKind::Assignment
            };
            flow.insert_element(ConnectionSource::next(prev), FlowElement::new(guid, kind))
                .unwrap();
            prev = guid;
        }
        flow
    }

    #[test]
    fn insert_pushes_successor_down() {
        let mut flow = linear("ins", &["a", "end"]);
        flow.insert_element(
            ConnectionSource::next(g("ins_start")),
            FlowElement::new(g("ins_b"), ElementKind::Screen),
        )
        .unwrap();
        assert_eq!(
            flow.chain(g("ins_start")),
            vec![g("ins_start"), g("ins_b"), g("ins_a"), g("ins_end")]
        );
        assert_eq!(validate_graph(&flow), Ok(()));
    }

    #[test]
    fn inserting_end_before_successor_is_rejected() {
        let mut flow = linear("ie", &["a"]);
        let err = flow
            .insert_element(
                ConnectionSource::next(g("ie_start")),
                FlowElement::new(g("ie_end"), ElementKind::End),
            )
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidEdit { .. }));
        assert!(!flow.contains(g("ie_end")));
    }

    #[test]
    fn delete_plain_element_reattaches_next_and_gotos() {
        let mut flow = linear("dp", &["a", "b", "c", "end"]);
        flow.disconnect(ConnectionSource::next(g("dp_c")));
        flow.remove_element(g("dp_end")).unwrap();
        flow.connect(ConnectionSource::next(g("dp_c")), g("dp_b"), EdgeKind::GoTo)
            .unwrap();

        let plan = flow.delete_element(g("dp_b"), None).unwrap();
        assert_eq!(flow.next(g("dp_a")), Some(g("dp_c")));
        // The GoTo would now point at its own source, so it is dropped.
        assert_eq!(plan.removed_gotos, vec![(ConnectionSource::next(g("dp_c")), g("dp_b"))]);
        assert_eq!(flow.next(g("dp_c")), None);
    }

    #[test]
    fn delete_retargets_gotos_to_successor() {
        let mut flow = linear("dr", &["a", "b", "c"]);
        flow.connect(ConnectionSource::next(g("dr_c")), g("dr_a"), EdgeKind::GoTo)
            .unwrap();

        flow.delete_element(g("dr_a"), None).unwrap();
        assert_eq!(flow.next(g("dr_start")), Some(g("dr_b")));
        assert_eq!(flow.target(g("dr_c"), Port::Next), Some((g("dr_b"), EdgeKind::GoTo)));
        assert_eq!(validate_graph(&flow), Ok(()));
    }

    #[test]
    fn delete_decision_keeping_open_branch_splices_it_in() {
        let mut flow = linear("dk", &["end"]);
        flow.insert_element(
            ConnectionSource::next(g("dk_start")),
            FlowElement::with_outcomes(g("dk_dec"), ElementKind::Decision, 1),
        )
        .unwrap();
        flow.insert_element(
            ConnectionSource::branch(g("dk_dec"), 0),
            FlowElement::new(g("dk_left"), ElementKind::Screen),
        )
        .unwrap();
        flow.insert_element(
            ConnectionSource::branch(g("dk_dec"), 1),
            FlowElement::new(g("dk_right"), ElementKind::Screen),
        )
        .unwrap();

        let plan = flow.delete_element(g("dk_dec"), Some(0)).unwrap();
        assert_eq!(plan.deleted, vec![g("dk_dec"), g("dk_right")]);
        assert_eq!(
            flow.chain(g("dk_start")),
            vec![g("dk_start"), g("dk_left"), g("dk_end")]
        );
        assert_eq!(validate_graph(&flow), Ok(()));
    }

    #[test]
    fn connect_to_fall_through_merges() {
        let mut flow = linear("cm", &["end"]);
        flow.insert_element(
            ConnectionSource::next(g("cm_start")),
            FlowElement::with_outcomes(g("cm_dec"), ElementKind::Decision, 1),
        )
        .unwrap();
        flow.insert_element(
            ConnectionSource::next(g("cm_start")),
            FlowElement::new(g("cm_a"), ElementKind::Assignment),
        )
        .unwrap();

        let outcome = flow
            .connect_to_element(ConnectionSource::branch(g("cm_dec"), 0), g("cm_end"), false)
            .unwrap();
        assert_eq!(outcome, ConnectOutcome::Merged);

        let outcome = flow
            .connect_to_element(ConnectionSource::branch(g("cm_dec"), 0), g("cm_a"), false)
            .unwrap();
        assert_eq!(outcome, ConnectOutcome::GoTo);
        assert!(resolve::has_goto_on_branch_head(&flow, g("cm_dec"), 0));

        let again = flow.connect_to_element(ConnectionSource::branch(g("cm_dec"), 0), g("cm_end"), false);
        assert!(matches!(again, Err(FlowError::PortOccupied { .. })));
        let rerouted = flow
            .connect_to_element(ConnectionSource::branch(g("cm_dec"), 0), g("cm_end"), true)
            .unwrap();
        assert_eq!(rerouted, ConnectOutcome::Merged);
        assert_eq!(flow.child(g("cm_dec"), 0), None);
    }

    #[test]
    fn remove_goto_requires_goto() {
        let mut flow = linear("rg", &["a"]);
        flow.connect(ConnectionSource::next(g("rg_a")), g("rg_start"), EdgeKind::GoTo)
            .unwrap();
        assert_eq!(flow.remove_goto(ConnectionSource::next(g("rg_a"))), Ok(g("rg_start")));
        assert!(flow.remove_goto(ConnectionSource::next(g("rg_a"))).is_err());
    }
}
