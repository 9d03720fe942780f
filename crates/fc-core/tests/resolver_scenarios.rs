//! Integration tests: document → FlowGraph → resolver queries and edits.

use fc_core::id::Guid;
use fc_core::model::*;
use fc_core::resolve::{self, get_target_guids_for_reconnection, plan_deletion};
use fc_core::{FlowDocument, validate_graph};
use pretty_assertions::assert_eq;
use std::collections::HashSet;

fn load(json: &str) -> FlowGraph {
    let _ = env_logger::builder().is_test(true).try_init();
    let doc = FlowDocument::from_json(json).unwrap();
    FlowGraph::from_document(&doc).unwrap()
}

fn g(s: &str) -> Guid {
    Guid::intern(s)
}

// ─── Deletion highlight ─────────────────────────────────────────────────

#[test]
fn deleting_screen_inside_terminal_branch_stays_local() {
    let flow = load(include_str!("fixtures/delete_decision.json"));
    let plan = plan_deletion(&flow, g("s1_screenB"), Some(1)).unwrap();

    assert!(!plan.should_highlight_beyond_merging_point);
    assert_eq!(plan.deleted, vec![g("s1_screenB")]);
    assert_eq!(plan.child_index_to_keep, None);
    assert!(plan.removed_gotos.is_empty());
}

#[test]
fn deleting_branch_with_goto_highlights_its_target() {
    let flow = load(include_str!("fixtures/delete_decision_goto.json"));
    let plan = plan_deletion(&flow, g("s2_decisionA"), Some(1)).unwrap();

    assert!(plan.should_highlight_beyond_merging_point);
    assert_eq!(plan.deleted, vec![g("s2_decisionA"), g("s2_screenB")]);
    assert_eq!(plan.orphaned_goto_targets, vec![g("s2_D")]);
    assert_eq!(
        plan.removed_gotos,
        vec![(ConnectionSource::next(g("s2_screenB")), g("s2_D"))]
    );
}

#[test]
fn deleting_branch_with_goto_splices_kept_branch() {
    let mut flow = load(include_str!("fixtures/delete_decision_goto.json"));
    flow.delete_element(g("s2_decisionA"), Some(1)).unwrap();

    assert_eq!(
        flow.chain(g("s2_start")),
        vec![g("s2_start"), g("s2_screenC"), g("s2_D"), g("s2_end")]
    );
    assert!(flow.goto_edges().is_empty());
    assert_eq!(validate_graph(&flow), Ok(()));
}

#[test]
fn deleting_whole_decision_keeps_its_next() {
    let mut flow = load(include_str!("fixtures/delete_decision_goto.json"));
    let plan = flow.delete_element(g("s2_decisionA"), None).unwrap();

    assert_eq!(
        plan.deleted,
        vec![g("s2_decisionA"), g("s2_screenB"), g("s2_screenC")]
    );
    assert_eq!(flow.next(g("s2_start")), Some(g("s2_D")));
    assert_eq!(validate_graph(&flow), Ok(()));
}

#[test]
fn root_and_start_cannot_be_deleted() {
    let flow = load(include_str!("fixtures/linear_chain.json"));
    assert!(plan_deletion(&flow, g("s3_start"), None).is_err());
    assert!(plan_deletion(&flow, Guid::root(), None).is_err());
}

// ─── Reconnection targets ───────────────────────────────────────────────

#[test]
fn linear_chain_reconnection_sets() {
    let flow = load(include_str!("fixtures/linear_chain.json"));
    let targets =
        get_target_guids_for_reconnection(&flow, ConnectionSource::next(g("s3_A")), Some(g("s3_B")))
            .unwrap();

    assert_eq!(targets.mergeable_guids, vec![g("s3_C"), g("s3_D")]);
    assert_eq!(targets.first_mergeable_non_null_next, Some(g("s3_C")));
    // Everything else is the current target, an ancestor, or an end.
    assert!(targets.goto_able_guids.is_empty());
}

#[test]
fn decision_branch_reconnection_sets() {
    let flow = load(include_str!("fixtures/loop_and_decision.json"));
    let targets = get_target_guids_for_reconnection(
        &flow,
        ConnectionSource::branch(g("ld_dec"), 1),
        None,
    )
    .unwrap();

    assert_eq!(targets.mergeable_guids, vec![g("ld_B")]);
    assert_eq!(targets.first_mergeable_non_null_next, Some(g("ld_B")));
    // The decision's own branch and the loop body are out of reach.
    assert_eq!(targets.goto_able_guids, vec![g("ld_A"), g("ld_loop")]);
}

#[test]
fn loop_body_reconnection_stays_in_loop() {
    let flow = load(include_str!("fixtures/loop_and_decision.json"));
    let targets =
        get_target_guids_for_reconnection(&flow, ConnectionSource::next(g("ld_L2")), None).unwrap();

    assert!(targets.mergeable_guids.is_empty());
    assert_eq!(targets.goto_able_guids, vec![g("ld_L1")]);
}

#[test]
fn reconnection_sets_are_disjoint_and_exclude_ancestors() {
    let flow = load(include_str!("fixtures/loop_and_decision.json"));
    for guid in flow.preorder() {
        let element = flow.get(guid).unwrap();
        if element.kind.is_end() {
            continue;
        }
        let sources = std::iter::once(ConnectionSource::next(guid))
            .chain((0..element.slots.len()).map(|i| ConnectionSource::branch(guid, i)));
        for source in sources {
            let current = flow.target(source.guid, source.port()).map(|(t, _)| t);
            let targets = get_target_guids_for_reconnection(&flow, source, current).unwrap();

            let mergeable: HashSet<_> = targets.mergeable_guids.iter().collect();
            let goto_able: HashSet<_> = targets.goto_able_guids.iter().collect();
            assert!(mergeable.is_disjoint(&goto_able), "overlap for {}", source.key());

            let upstream = resolve::ancestors(&flow, source.guid).unwrap();
            assert!(
                upstream.iter().all(|a| !mergeable.contains(a)),
                "ancestor in mergeable set for {}",
                source.key()
            );
        }
    }
}

#[test]
fn reconnection_is_deterministic() {
    let flow = load(include_str!("fixtures/loop_and_decision.json"));
    let source = ConnectionSource::branch(g("ld_dec"), 1);
    let a = get_target_guids_for_reconnection(&flow, source, None).unwrap();
    let b = get_target_guids_for_reconnection(&flow, source, None).unwrap();
    assert_eq!(a, b);
}

// ─── Terminal branches ──────────────────────────────────────────────────

#[test]
fn ending_a_branch_makes_it_terminal_and_it_stays_terminal() {
    let mut flow = load(include_str!("fixtures/loop_and_decision.json"));
    let is_terminal = |flow: &FlowGraph| {
        let dec = flow.get(g("ld_dec")).unwrap();
        resolve::is_branch_terminal(flow, dec, 1)
    };
    assert!(!is_terminal(&flow));

    flow.insert_element(
        ConnectionSource::branch(g("ld_dec"), 1),
        FlowElement::new(g("ld_newEnd"), ElementKind::End),
    )
    .unwrap();
    assert!(is_terminal(&flow));

    flow.insert_element(
        ConnectionSource::branch(g("ld_dec"), 1),
        FlowElement::new(g("ld_newStep"), ElementKind::Assignment),
    )
    .unwrap();
    assert!(is_terminal(&flow));
    assert_eq!(validate_graph(&flow), Ok(()));
}

#[test]
fn loop_body_is_never_terminal_through_the_loop() {
    let flow = load(include_str!("fixtures/loop_and_decision.json"));
    let lp = flow.get(g("ld_loop")).unwrap();
    assert!(!resolve::is_branch_terminal(&flow, lp, 0));
    assert_eq!(
        resolve::fall_through_target(&flow, ConnectionSource::next(g("ld_L2"))).unwrap(),
        Some(g("ld_loop"))
    );
}
