//! Layout configuration.
//!
//! Only the icon widths are required from the host; everything else has a
//! default. Deserializes from JSON with missing fields filled in.

use crate::error::{FlowError, Result};
use crate::model::Dimensions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IconConfig {
    pub w: f32,
}

impl IconConfig {
    pub const fn new(w: f32) -> Self {
        Self { w }
    }
}

impl Default for IconConfig {
    fn default() -> Self {
        Self::new(48.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub icon: IconConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// The "+" button drawn on every connector.
    pub icon: IconConfig,
    /// Vertical gap between consecutive elements.
    pub height: f32,
    /// Vertical drop from a branching element to its branch heads.
    pub branch_height: f32,
    /// Extra height below a branch row before the merge point.
    pub merge_height: f32,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            icon: IconConfig::new(20.0),
            height: 72.0,
            branch_height: 48.0,
            merge_height: 24.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchConfig {
    /// Horizontal gap between sibling branches.
    pub spacing: f32,
    /// Horizontal room on each side of a loop body for the loop-back line.
    pub loop_padding: f32,
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            spacing: 64.0,
            loop_padding: 32.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub node: NodeConfig,
    pub connector: ConnectorConfig,
    pub branch: BranchConfig,
    /// Size assumed for a dynamic node before the host measures it.
    pub dynamic_placeholder: Dimensions,
    /// Default duration of an animated re-layout, in milliseconds.
    pub animation_duration_ms: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            connector: ConnectorConfig::default(),
            branch: BranchConfig::default(),
            dynamic_placeholder: Dimensions::new(320.0, 160.0),
            animation_duration_ms: 300,
        }
    }
}

impl LayoutConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| FlowError::Document(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = LayoutConfig::from_json(r#"{ "node": { "icon": { "w": 56 } } }"#).unwrap();
        assert_eq!(config.node.icon.w, 56.0);
        assert_eq!(config.connector, ConnectorConfig::default());
        assert_eq!(config.animation_duration_ms, 300);
    }

    #[test]
    fn bad_json_is_a_document_error() {
        assert!(matches!(
            LayoutConfig::from_json("{ node: }"),
            Err(FlowError::Document(_))
        ));
    }
}
