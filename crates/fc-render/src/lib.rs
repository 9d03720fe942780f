pub mod hit;
pub mod tree;

pub use hit::{HitTarget, hit_test, hit_test_rect};
pub use tree::{
    BranchRenderInfo, ConnectorRenderInfo, ConnectorType, FlowRenderInfo, MenuAnchor, NodeRenderInfo,
    render_flow,
};
