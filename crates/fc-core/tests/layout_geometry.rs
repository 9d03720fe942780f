//! Integration tests: document → FlowRenderContext → computed layout.

use fc_core::id::Guid;
use fc_core::layout::{NodeLayout, compute_flow_layout};
use fc_core::model::*;
use fc_core::{
    ElementMetadata, FlowDocument, FlowRenderContext, LayoutConfig, calculate_flow_layout,
};
use pretty_assertions::assert_eq;
use std::collections::HashMap;

fn context(json: &str, metadata: HashMap<String, ElementMetadata>) -> FlowRenderContext {
    let doc = FlowDocument::from_json(json).unwrap();
    let flow = FlowGraph::from_document(&doc).unwrap();
    FlowRenderContext::new(flow, metadata, LayoutConfig::default())
}

fn g(s: &str) -> Guid {
    Guid::intern(s)
}

fn assert_no_overlap(nodes: &HashMap<Guid, NodeLayout>) {
    let mut entries: Vec<_> = nodes.iter().collect();
    entries.sort_by_key(|(guid, _)| **guid);
    for (i, (ga, a)) in entries.iter().enumerate() {
        for (gb, b) in &entries[i + 1..] {
            let overlap = a.x < b.x + b.w && b.x < a.x + a.w && a.y < b.y + b.h && b.y < a.y + a.h;
            assert!(!overlap, "{ga} overlaps {gb}");
        }
    }
}

#[test]
fn every_reachable_element_is_placed() {
    let mut ctx = context(include_str!("fixtures/loop_and_decision.json"), HashMap::new());
    calculate_flow_layout(&mut ctx);

    let mut placed: Vec<Guid> = ctx.layout.node_layout_map.keys().copied().collect();
    placed.sort();
    let mut expected: Vec<Guid> = ctx.flow.preorder().into_iter().filter(|g| !g.is_root()).collect();
    expected.sort();
    assert_eq!(placed, expected);
    assert_no_overlap(&ctx.layout.node_layout_map);
}

#[test]
fn layout_does_not_depend_on_document_order() {
    let json = include_str!("fixtures/loop_and_decision.json");
    let a = context(json, HashMap::new());

    let mut doc = FlowDocument::from_json(json).unwrap();
    doc.elements.reverse();
    let flow = FlowGraph::from_document(&doc).unwrap();
    let b = FlowRenderContext::new(flow, HashMap::new(), LayoutConfig::default());

    assert_eq!(compute_flow_layout(&a), compute_flow_layout(&b));
}

#[test]
fn loop_body_is_indented_under_the_loop() {
    let mut ctx = context(include_str!("fixtures/loop_and_decision.json"), HashMap::new());
    calculate_flow_layout(&mut ctx);
    let layout = &ctx.layout;

    let lp = layout.node_layout_map[&g("ld_loop")];
    let body = layout.branch_layout_map[&ConnectionSource::branch(g("ld_loop"), 0)];
    assert_eq!(body.x, lp.center_x());
    assert!(body.w > layout.node_layout_map[&g("ld_L1")].w);

    let merge = layout.merge_points[&g("ld_loop")];
    assert!(layout.node_layout_map[&g("ld_dec")].y > merge.y);
}

#[test]
fn fault_branch_is_rightmost() {
    let json = include_str!("fixtures/loop_and_decision.json").replace(
        r#""slots": ["fault"], "children": [null]"#,
        r#""slots": ["outcome", "fault"], "children": [null, null]"#,
    );
    let mut ctx = context(&json, HashMap::new());
    calculate_flow_layout(&mut ctx);

    let regular = ctx.layout.branch_layout_map[&ConnectionSource::branch(g("ld_X"), 0)];
    let fault = ctx.layout.branch_layout_map[&ConnectionSource::branch(g("ld_X"), 1)];
    assert!(fault.offset_x > regular.offset_x);
}

#[test]
fn measured_dynamic_node_grows_its_branch() {
    let mut metadata = HashMap::new();
    metadata.insert(
        "screen".to_string(),
        ElementMetadata::new("screen").with_dynamic_node("screenPreview"),
    );
    let mut ctx = context(include_str!("fixtures/delete_decision.json"), metadata);
    calculate_flow_layout(&mut ctx);
    let before = ctx.layout.branch_layout_map[&ConnectionSource::branch(g("s1_decisionA"), 0)];
    assert_no_overlap(&ctx.layout.node_layout_map);

    ctx.dynamic_node_dimension_map
        .insert(g("s1_screenB"), Dimensions::new(640.0, 240.0));
    assert!(calculate_flow_layout(&mut ctx));
    let after = ctx.layout.branch_layout_map[&ConnectionSource::branch(g("s1_decisionA"), 0)];
    assert!(after.w > before.w);
    assert_no_overlap(&ctx.layout.node_layout_map);
}
