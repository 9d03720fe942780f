//! Keyboard shortcut mapping.
//!
//! Maps key + modifier combos to semantic `CanvasAction`s. `key` is the
//! host's `KeyboardEvent.key` value.

use crate::focus::FocusDirection;

/// Actions that keyboard shortcuts can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasAction {
    /// Close the open menu, or leave the current selection mode.
    Escape,
    /// Toggle the menu of the focused node or connector.
    ToggleMenu,
    MoveFocus(FocusDirection),
    /// Delete the focused element.
    Delete,
    /// Enter or leave multi-select.
    ToggleSelection,
}

pub struct ShortcutMap;

impl ShortcutMap {
    /// Resolve a key event to an action. Returns `None` if the combo has no
    /// binding.
    pub fn resolve(
        key: &str,
        ctrl: bool,
        shift: bool,
        _alt: bool,
        meta: bool,
    ) -> Option<CanvasAction> {
        let cmd = ctrl || meta;

        if cmd && shift {
            return match key {
                "s" | "S" => Some(CanvasAction::ToggleSelection),
                _ => None,
            };
        }

        if cmd {
            return None;
        }

        if shift {
            return match key {
                "Tab" => Some(CanvasAction::MoveFocus(FocusDirection::Up)),
                _ => None,
            };
        }

        match key {
            "Escape" => Some(CanvasAction::Escape),
            "Enter" | " " => Some(CanvasAction::ToggleMenu),
            "ArrowUp" => Some(CanvasAction::MoveFocus(FocusDirection::Up)),
            "ArrowDown" | "Tab" => Some(CanvasAction::MoveFocus(FocusDirection::Down)),
            "ArrowLeft" => Some(CanvasAction::MoveFocus(FocusDirection::Left)),
            "ArrowRight" => Some(CanvasAction::MoveFocus(FocusDirection::Right)),
            "Delete" | "Backspace" => Some(CanvasAction::Delete),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_menu_keys() {
        assert_eq!(
            ShortcutMap::resolve("Escape", false, false, false, false),
            Some(CanvasAction::Escape)
        );
        assert_eq!(
            ShortcutMap::resolve("Enter", false, false, false, false),
            Some(CanvasAction::ToggleMenu)
        );
        assert_eq!(
            ShortcutMap::resolve(" ", false, false, false, false),
            Some(CanvasAction::ToggleMenu)
        );
    }

    #[test]
    fn resolve_focus_movement() {
        assert_eq!(
            ShortcutMap::resolve("ArrowLeft", false, false, false, false),
            Some(CanvasAction::MoveFocus(FocusDirection::Left))
        );
        assert_eq!(
            ShortcutMap::resolve("Tab", false, false, false, false),
            Some(CanvasAction::MoveFocus(FocusDirection::Down))
        );
        assert_eq!(
            ShortcutMap::resolve("Tab", false, true, false, false),
            Some(CanvasAction::MoveFocus(FocusDirection::Up))
        );
    }

    #[test]
    fn resolve_delete_variants() {
        assert_eq!(
            ShortcutMap::resolve("Delete", false, false, false, false),
            Some(CanvasAction::Delete)
        );
        assert_eq!(
            ShortcutMap::resolve("Backspace", false, false, false, false),
            Some(CanvasAction::Delete)
        );
        assert_eq!(ShortcutMap::resolve("Backspace", true, false, false, false), None);
    }

    #[test]
    fn resolve_meta_as_cmd() {
        assert_eq!(
            ShortcutMap::resolve("s", false, true, false, true),
            Some(CanvasAction::ToggleSelection)
        );
        assert_eq!(
            ShortcutMap::resolve("s", true, true, false, false),
            Some(CanvasAction::ToggleSelection)
        );
    }

    #[test]
    fn resolve_unbound_key() {
        assert_eq!(ShortcutMap::resolve("q", false, false, false, false), None);
    }
}
