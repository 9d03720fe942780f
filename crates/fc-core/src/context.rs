//! Per-canvas state shared by layout, rendering and interaction.

use crate::config::LayoutConfig;
use crate::id::Guid;
use crate::layout::FlowLayout;
use crate::model::{ConnectionSource, Dimensions, FlowElement, FlowGraph};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─── Element metadata ────────────────────────────────────────────────────

/// Host-provided description of an element type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementMetadata {
    pub element_type: String,
    /// Registry key of the menu opened for this type, if any.
    #[serde(default)]
    pub menu_component: Option<String>,
    /// Registry key of the component rendered inside the node. Such nodes
    /// are sized by the host after they mount.
    #[serde(default)]
    pub dynamic_node_component: Option<String>,
}

impl ElementMetadata {
    pub fn new(element_type: impl Into<String>) -> Self {
        Self {
            element_type: element_type.into(),
            menu_component: None,
            dynamic_node_component: None,
        }
    }

    pub fn with_menu(mut self, component: impl Into<String>) -> Self {
        self.menu_component = Some(component.into());
        self
    }

    pub fn with_dynamic_node(mut self, component: impl Into<String>) -> Self {
        self.dynamic_node_component = Some(component.into());
        self
    }
}

// ─── Interaction state ───────────────────────────────────────────────────

/// What a menu is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "source")]
pub enum MenuTarget {
    Node(Guid),
    Connector(ConnectionSource),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MenuType {
    Node,
    Connector,
}

impl MenuTarget {
    pub fn menu_type(&self) -> MenuType {
        match self {
            MenuTarget::Node(_) => MenuType::Node,
            MenuTarget::Connector(_) => MenuType::Connector,
        }
    }

    /// Guid of the element the target belongs to.
    pub fn guid(&self) -> Guid {
        match self {
            MenuTarget::Node(guid) => *guid,
            MenuTarget::Connector(source) => source.guid,
        }
    }

    /// Stable key: the guid for nodes, the connection key for connectors.
    pub fn key(&self) -> String {
        match self {
            MenuTarget::Node(guid) => guid.to_string(),
            MenuTarget::Connector(source) => source.key(),
        }
    }
}

/// Measured on-screen rectangle of an open menu.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MenuGeometry {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuInfo {
    pub target: MenuTarget,
    pub component_key: String,
    /// Set until the host reports the rendered geometry.
    pub needs_to_position: bool,
    pub geometry: Option<MenuGeometry>,
}

impl MenuInfo {
    pub fn new(target: MenuTarget, component_key: impl Into<String>) -> Self {
        Self {
            target,
            component_key: component_key.into(),
            needs_to_position: true,
            geometry: None,
        }
    }

    pub fn menu_type(&self) -> MenuType {
        self.target.menu_type()
    }

    pub fn key(&self) -> String {
        self.target.key()
    }
}

/// Elements and connectors highlighted as about to be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionPathInfo {
    pub element_guid_to_delete: Guid,
    pub child_index_to_keep: Option<usize>,
    pub should_highlight_beyond_merging_point: bool,
    /// Highlighted elements in pre-order.
    pub elements: Vec<Guid>,
    /// Highlighted outgoing connectors.
    pub connectors: Vec<ConnectionSource>,
}

impl DeletionPathInfo {
    pub fn contains(&self, guid: Guid) -> bool {
        self.elements.contains(&guid)
    }

    pub fn contains_connector(&self, source: &ConnectionSource) -> bool {
        self.connectors.contains(source)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionState {
    pub menu_info: Option<MenuInfo>,
    pub deletion_path_info: Option<DeletionPathInfo>,
}

// ─── Render context ──────────────────────────────────────────────────────

/// Everything layout and rendering read for one mounted canvas.
#[derive(Debug, Clone)]
pub struct FlowRenderContext {
    pub flow: FlowGraph,
    /// Metadata keyed by element type.
    pub elements_metadata: HashMap<String, ElementMetadata>,
    /// Sizes reported by the host for dynamic nodes.
    pub dynamic_node_dimension_map: HashMap<Guid, Dimensions>,
    pub layout_config: LayoutConfig,
    pub interaction_state: InteractionState,
    /// A branching element's deletion is being previewed.
    pub is_deleting_branch: bool,
    pub layout: FlowLayout,
    /// Where the current animation starts from. Cleared once it completes.
    pub previous_layout: Option<FlowLayout>,
    /// Progress of the last rendered frame.
    pub rendered_progress: f32,
}

impl FlowRenderContext {
    pub fn new(
        flow: FlowGraph,
        elements_metadata: HashMap<String, ElementMetadata>,
        layout_config: LayoutConfig,
    ) -> Self {
        Self {
            flow,
            elements_metadata,
            dynamic_node_dimension_map: HashMap::new(),
            layout_config,
            interaction_state: InteractionState::default(),
            is_deleting_branch: false,
            layout: FlowLayout::default(),
            previous_layout: None,
            rendered_progress: 1.0,
        }
    }

    pub fn metadata(&self, element: &FlowElement) -> Option<&ElementMetadata> {
        self.elements_metadata.get(element.type_key())
    }

    /// Elements rendering a host component whose size is only known after
    /// the host measures it.
    pub fn is_dynamic(&self, element: &FlowElement) -> bool {
        self.metadata(element)
            .is_some_and(|m| m.dynamic_node_component.is_some())
    }

    /// Dynamic elements currently in the flow, in pre-order.
    pub fn dynamic_guids(&self) -> Vec<Guid> {
        self.flow
            .preorder()
            .into_iter()
            .filter(|guid| self.flow.get(*guid).is_some_and(|e| self.is_dynamic(e)))
            .collect()
    }
}
