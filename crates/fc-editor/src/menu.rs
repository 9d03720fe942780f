//! Menu component lookup.
//!
//! The canvas never builds menus itself. It only asks the host's registry
//! whether a component exists for a key, and opens a menu when it does.

use fc_core::{FlowRenderContext, MenuTarget};
use std::collections::HashMap;

/// Registry key of the menu opened from any connector's "+" button.
pub const CONNECTOR_MENU: &str = "connectorMenu";

/// What the host can build for a menu key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuFactory {
    pub component_key: String,
}

impl MenuFactory {
    pub fn new(component_key: impl Into<String>) -> Self {
        Self {
            component_key: component_key.into(),
        }
    }
}

/// Resolves menu component keys into factories.
pub trait MenuRegistry {
    fn resolve(&self, component_key: &str) -> Option<MenuFactory>;
}

/// A registry backed by a fixed map.
#[derive(Debug, Clone, Default)]
pub struct StaticMenuRegistry {
    factories: HashMap<String, MenuFactory>,
}

impl StaticMenuRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, factory: MenuFactory) -> Self {
        self.factories.insert(factory.component_key.clone(), factory);
        self
    }
}

impl MenuRegistry for StaticMenuRegistry {
    fn resolve(&self, component_key: &str) -> Option<MenuFactory> {
        self.factories.get(component_key).cloned()
    }
}

/// The menu factory for `target`, if its element type declares a menu and
/// the registry knows it.
pub fn resolve_menu(
    ctx: &FlowRenderContext,
    registry: &dyn MenuRegistry,
    target: MenuTarget,
) -> Option<MenuFactory> {
    let key = match target {
        MenuTarget::Node(guid) => {
            let element = ctx.flow.get(guid)?;
            ctx.metadata(element)?.menu_component.clone()?
        }
        MenuTarget::Connector(source) => {
            ctx.flow.get(source.guid)?;
            CONNECTOR_MENU.to_string()
        }
    };
    registry.resolve(&key)
}
