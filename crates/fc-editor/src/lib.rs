//! Interactive editing on top of the flow canvas: menus, deletion previews,
//! GoTo reconnection, keyboard focus and render scheduling.

pub mod clicks;
pub mod focus;
pub mod interaction;
pub mod menu;
pub mod mutation;
pub mod scheduler;
pub mod session;
pub mod shortcuts;

pub use clicks::{Click, ClickDisambiguator};
pub use focus::{FocusDirection, FocusTarget, move_focus};
pub use interaction::{
    InteractionMachine, MenuPhase, SelectionMode, SelectionState, ToggleMenuDetail,
    clear_deletion_path_info, close_flow_menu, menu_phase, toggle_flow_menu,
    update_deletion_path_info,
};
pub use menu::{CONNECTOR_MENU, MenuFactory, MenuRegistry, StaticMenuRegistry};
pub use mutation::{FlowMutation, MutationOutcome};
pub use scheduler::{
    AnimationHandle, RenderScheduler, RenderTicket, RenderTrigger, SchedulerConfig, SchedulerPhase,
    SettleEffect,
};
pub use session::{CanvasEvent, CanvasSession, HostEffect, SessionOptions, SessionOutput};
pub use shortcuts::{CanvasAction, ShortcutMap};
