//! Structural edits requested by canvas interactions.

use fc_core::resolve::get_connection_source;
use fc_core::{ConnectOutcome, ConnectionSource, DeletionPlan, FlowElement, FlowGraph, Guid, Result};

/// An edit the session applies to the flow.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowMutation {
    /// Insert `element` on `source`; the previous target becomes its `next`.
    AddElement {
        source: ConnectionSource,
        element: Box<FlowElement>,
    },
    DeleteElement {
        guid: Guid,
        child_index_to_keep: Option<usize>,
    },
    /// Merge `source` into `target` or point a GoTo at it.
    Connect {
        source: ConnectionSource,
        target: Guid,
        is_reroute: bool,
    },
    RemoveGoTo {
        source: ConnectionSource,
    },
}

/// What an applied mutation did.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    Added(Guid),
    Deleted(Box<DeletionPlan>),
    Connected(ConnectOutcome),
    GoToRemoved { target: Guid },
}

impl FlowMutation {
    /// The connector focus should land on once the edit has rendered.
    /// Evaluated before applying, while a deleted element still exists.
    pub fn focus_after(&self, flow: &FlowGraph) -> Option<ConnectionSource> {
        match self {
            FlowMutation::AddElement { element, .. } => Some(ConnectionSource::next(element.guid)),
            FlowMutation::DeleteElement { guid, .. } => flow
                .get(*guid)
                .and_then(|element| get_connection_source(flow, element)),
            FlowMutation::Connect { source, .. } | FlowMutation::RemoveGoTo { source } => Some(*source),
        }
    }

    pub fn apply(self, flow: &mut FlowGraph) -> Result<MutationOutcome> {
        log::trace!("apply {self:?}");
        match self {
            FlowMutation::AddElement { source, element } => {
                let guid = element.guid;
                flow.insert_element(source, *element)?;
                Ok(MutationOutcome::Added(guid))
            }
            FlowMutation::DeleteElement {
                guid,
                child_index_to_keep,
            } => {
                let plan = flow.delete_element(guid, child_index_to_keep)?;
                Ok(MutationOutcome::Deleted(Box::new(plan)))
            }
            FlowMutation::Connect {
                source,
                target,
                is_reroute,
            } => flow
                .connect_to_element(source, target, is_reroute)
                .map(MutationOutcome::Connected),
            FlowMutation::RemoveGoTo { source } => {
                let target = flow.remove_goto(source)?;
                Ok(MutationOutcome::GoToRemoved { target })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc_core::ElementKind;

    fn g(s: &str) -> Guid {
        Guid::intern(s)
    }

    #[test]
    fn add_then_delete() {
        let mut flow = FlowGraph::with_start(g("m_start"));
        let add = FlowMutation::AddElement {
            source: ConnectionSource::next(g("m_start")),
            element: Box::new(FlowElement::new(g("m_a"), ElementKind::Screen)),
        };
        assert_eq!(add.apply(&mut flow).unwrap(), MutationOutcome::Added(g("m_a")));
        assert_eq!(flow.next(g("m_start")), Some(g("m_a")));

        let delete = FlowMutation::DeleteElement {
            guid: g("m_a"),
            child_index_to_keep: None,
        };
        assert_eq!(delete.focus_after(&flow), Some(ConnectionSource::next(g("m_start"))));
        assert!(matches!(delete.apply(&mut flow).unwrap(), MutationOutcome::Deleted(_)));
        assert_eq!(flow.next(g("m_start")), None);
    }

    #[test]
    fn remove_missing_goto_fails() {
        let mut flow = FlowGraph::with_start(g("m2_start"));
        let remove = FlowMutation::RemoveGoTo {
            source: ConnectionSource::next(g("m2_start")),
        };
        assert!(remove.apply(&mut flow).is_err());
    }
}
