pub mod config;
pub mod context;
pub mod document;
pub mod edit;
pub mod error;
pub mod id;
pub mod layout;
pub mod model;
pub mod resolve;
pub mod validate;

pub use config::LayoutConfig;
pub use context::{
    DeletionPathInfo, ElementMetadata, FlowRenderContext, InteractionState, MenuGeometry, MenuInfo,
    MenuTarget, MenuType,
};
pub use document::{FlowDocument, Link};
pub use edit::ConnectOutcome;
pub use error::{FlowError, Result};
pub use id::Guid;
pub use layout::{BranchLayout, FlowLayout, MergePoint, NodeLayout, calculate_flow_layout};
pub use model::*;
pub use resolve::{DeletionPlan, ReconnectionTargets};
pub use validate::validate_graph;

// Re-export petgraph types so downstream crates don't need a direct dependency
pub use petgraph::graph::NodeIndex;
