//! One mounted canvas: flow, interaction state, scheduling and rendering.
//!
//! The host drives the session with `handle_event` and `tick`, passing its
//! own clock in milliseconds. Both return the frame to paint (if any) and
//! the effects the host must carry out.

use crate::clicks::{Click, ClickDisambiguator};
use crate::focus::{FocusTarget, move_focus};
use crate::interaction::{
    InteractionMachine, MenuPhase, SelectionMode, SelectionState, ToggleMenuDetail,
    clear_deletion_path_info, close_flow_menu, toggle_flow_menu, update_deletion_path_info,
};
use crate::menu::{MenuRegistry, resolve_menu};
use crate::mutation::{FlowMutation, MutationOutcome};
use crate::scheduler::{
    AnimationHandle, RenderScheduler, RenderTicket, RenderTrigger, SchedulerConfig, SettleEffect,
};
use crate::shortcuts::{CanvasAction, ShortcutMap};
use fc_core::resolve::should_highlight_beyond_merging_point;
use fc_core::{
    ConnectionSource, Dimensions, ElementMetadata, FlowElement, FlowError, FlowGraph, FlowLayout,
    FlowRenderContext, Guid, InteractionState, LayoutConfig, MenuGeometry, MenuTarget, Result,
    calculate_flow_layout,
};
use fc_render::{FlowRenderInfo, HitTarget, hit_test, hit_test_rect, render_flow};
use kurbo::Rect;
use std::collections::HashMap;

// ─── Options, events, effects ────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub layout: LayoutConfig,
    /// Defaults to `SchedulerConfig::default()` with the layout's animation
    /// duration.
    pub scheduler: Option<SchedulerConfig>,
    pub open_start_menu_on_load: bool,
    /// Zoom level at which node menus open.
    pub max_zoom: f32,
    pub initial_zoom: f32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            scheduler: None,
            open_start_menu_on_load: false,
            max_zoom: 1.0,
            initial_zoom: 1.0,
        }
    }
}

/// Host input.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    ToggleMenu(MenuTarget),
    CloseMenu,
    /// The host measured the pending menu.
    MenuPositioned(MenuGeometry),
    /// Preview deleting `guid`. The beyond-merge-point flag defaults to the
    /// deletion policy when not given.
    HighlightPath {
        guid: Guid,
        child_index_to_keep: Option<usize>,
        highlight_beyond_merge_point: Option<bool>,
    },
    ClearHighlight,
    /// Start picking a GoTo destination for `source`.
    GoToPath {
        source: ConnectionSource,
        is_reroute: bool,
    },
    SelectTarget(Guid),
    /// Box selection in canvas coordinates, from one corner to the other.
    SelectArea {
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
    },
    ExitSelection,
    Delete {
        guid: Guid,
        child_index_to_keep: Option<usize>,
    },
    Add {
        source: ConnectionSource,
        element: Box<FlowElement>,
    },
    RemoveGoTo {
        source: ConnectionSource,
    },
    NodeResized {
        guid: Guid,
        dimensions: Dimensions,
    },
    ZoomEnd {
        scale: f32,
    },
    Click {
        x: f64,
        y: f64,
    },
    Key {
        key: String,
        ctrl: bool,
        shift: bool,
        alt: bool,
        meta: bool,
    },
}

/// Work the host carries out on the session's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEffect {
    ZoomToElement { guid: Guid, scale: f32 },
    Focus(FocusTarget),
    /// A node was double-clicked.
    EditElement(Guid),
    /// The flow was edited and should be persisted.
    FlowChanged,
}

#[derive(Debug, Clone, Default)]
pub struct SessionOutput {
    pub frame: Option<FlowRenderInfo>,
    pub effects: Vec<HostEffect>,
}

// ─── Session ─────────────────────────────────────────────────────────────

pub struct CanvasSession {
    ctx: FlowRenderContext,
    interaction: InteractionMachine,
    scheduler: RenderScheduler,
    clicks: ClickDisambiguator,
    registry: Box<dyn MenuRegistry>,
    focus: Option<FocusTarget>,
    scale: f32,
    max_zoom: f32,
    /// Menu state to apply once the zoom requested for it has finished.
    interaction_state_after_zoom: Option<InteractionState>,
    /// Dynamic nodes present at load that are still in the flow.
    dynamic_guids_at_load: Vec<Guid>,
    /// The last pending dynamic node was just measured.
    load_settling: bool,
    open_start_menu_on_load: bool,
    initial_start_menu_displayed: bool,
    rendered_once: bool,
    animation: Option<AnimationHandle>,
    last_frame: Option<FlowRenderInfo>,
    torn_down: bool,
}

impl CanvasSession {
    pub fn new(
        flow: FlowGraph,
        elements_metadata: HashMap<String, ElementMetadata>,
        registry: Box<dyn MenuRegistry>,
        options: SessionOptions,
    ) -> Self {
        let scheduler_config = options.scheduler.unwrap_or(SchedulerConfig {
            animation_duration_ms: options.layout.animation_duration_ms,
            ..SchedulerConfig::default()
        });
        let ctx = FlowRenderContext::new(flow, elements_metadata, options.layout);
        let dynamic_guids_at_load = ctx.dynamic_guids();
        let mut session = Self {
            ctx,
            interaction: InteractionMachine::new(),
            scheduler: RenderScheduler::new(scheduler_config),
            clicks: ClickDisambiguator::new(scheduler_config.double_click_ms),
            registry,
            focus: None,
            scale: options.initial_zoom,
            max_zoom: options.max_zoom,
            interaction_state_after_zoom: None,
            dynamic_guids_at_load,
            load_settling: false,
            open_start_menu_on_load: options.open_start_menu_on_load,
            initial_start_menu_displayed: false,
            rendered_once: false,
            animation: None,
            last_frame: None,
            torn_down: false,
        };
        if session.open_start_menu_on_load {
            session.open_start_menu();
        }
        session
    }

    fn open_start_menu(&mut self) {
        let factory = self
            .ctx
            .flow
            .start()
            .map(MenuTarget::Node)
            .and_then(|target| resolve_menu(&self.ctx, self.registry.as_ref(), target).map(|f| (target, f)));
        match factory {
            Some((target, factory)) => {
                let detail = ToggleMenuDetail {
                    target,
                    component_key: Some(factory.component_key),
                };
                self.interaction
                    .set(toggle_flow_menu(&detail, &InteractionState::default()));
            }
            None => {
                log::debug!("start element has no menu; not opening it on load");
                self.open_start_menu_on_load = false;
            }
        }
    }

    /// Render the first frame.
    pub fn mount(&mut self, now: u64) -> SessionOutput {
        let mut out = SessionOutput::default();
        if self.torn_down {
            log::debug!("mount after teardown ignored");
            return out;
        }
        self.request_render(RenderTrigger::Mount, None, now, &mut out);
        out
    }

    /// Stop all deferred work. Later events and ticks do nothing.
    pub fn teardown(&mut self) {
        log::debug!("canvas session torn down");
        self.torn_down = true;
        self.scheduler.teardown();
        self.clicks.reset();
        self.animation = None;
        self.interaction_state_after_zoom = None;
    }

    // ─── Accessors & selectors ───────────────────────────────────────────

    pub fn flow(&self) -> &FlowGraph {
        &self.ctx.flow
    }

    pub fn context(&self) -> &FlowRenderContext {
        &self.ctx
    }

    pub fn interaction_state(&self) -> &InteractionState {
        self.interaction.state()
    }

    pub fn menu_phase(&self) -> MenuPhase {
        self.interaction.phase()
    }

    pub fn selection(&self) -> &SelectionState {
        &self.interaction.selection
    }

    pub fn is_selectable(&self, guid: Guid) -> bool {
        self.interaction.selection.is_selectable(guid)
    }

    pub fn focus(&self) -> Option<FocusTarget> {
        self.focus
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn last_frame(&self) -> Option<&FlowRenderInfo> {
        self.last_frame.as_ref()
    }

    pub fn interaction_state_after_zoom(&self) -> Option<&InteractionState> {
        self.interaction_state_after_zoom.as_ref()
    }

    pub fn dynamic_node_count_at_load(&self) -> usize {
        self.dynamic_guids_at_load.len()
    }

    pub fn initial_start_menu_displayed(&self) -> bool {
        self.initial_start_menu_displayed
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Some dynamic node present at load has not been measured yet.
    pub fn dynamic_nodes_pending(&self) -> bool {
        self.measured_count_at_load() < self.dynamic_guids_at_load.len()
    }

    fn measured_count_at_load(&self) -> usize {
        self.dynamic_guids_at_load
            .iter()
            .filter(|guid| self.ctx.dynamic_node_dimension_map.contains_key(guid))
            .count()
    }

    /// Adding elements is blocked while any selection mode is active.
    pub fn disable_add_elements(&self) -> bool {
        self.interaction.selection.mode != SelectionMode::Off
    }

    pub fn show_spinner(&self) -> bool {
        self.dynamic_nodes_pending()
            || (self.open_start_menu_on_load && !self.initial_start_menu_displayed)
    }

    // ─── Driving ─────────────────────────────────────────────────────────

    /// Advance deferred work to `now`: settle pending clicks, fire the
    /// debounced render and step the running animation.
    pub fn tick(&mut self, now: u64) -> SessionOutput {
        let mut out = SessionOutput::default();
        if self.torn_down {
            return out;
        }
        if let Some(Click::Single(guid)) = self.clicks.tick(now) {
            self.toggle_menu(MenuTarget::Node(guid), now, &mut out);
        }
        if let Some(ticket) = self.scheduler.tick(now) {
            self.run_render(ticket, now, &mut out);
        } else if let Some(handle) = self.animation {
            self.advance(handle, now, &mut out);
        }
        out
    }

    /// Apply one host event. Errors are graph integrity failures; rejected
    /// edits and menu requests without a component are absorbed.
    pub fn handle_event(&mut self, event: CanvasEvent, now: u64) -> Result<SessionOutput> {
        let mut out = SessionOutput::default();
        if self.torn_down {
            log::debug!("event after teardown ignored: {event:?}");
            return Ok(out);
        }
        match event {
            CanvasEvent::ToggleMenu(target) => self.toggle_menu(target, now, &mut out),
            CanvasEvent::CloseMenu => self.close_menu(now, &mut out),
            CanvasEvent::MenuPositioned(geometry) => {
                if self.interaction.apply_geometry(geometry) {
                    let fast = self.scheduler.config().fast_animation_duration_ms;
                    self.request_render(RenderTrigger::MenuPositioned, Some(fast), now, &mut out);
                } else {
                    log::debug!("menu geometry ignored: nothing awaiting it");
                }
            }
            CanvasEvent::HighlightPath {
                guid,
                child_index_to_keep,
                highlight_beyond_merge_point,
            } => self.highlight_path(guid, child_index_to_keep, highlight_beyond_merge_point, now, &mut out)?,
            CanvasEvent::ClearHighlight => {
                self.interaction.modify(clear_deletion_path_info);
                self.request_render(RenderTrigger::InteractionChanged, None, now, &mut out);
            }
            CanvasEvent::GoToPath { source, is_reroute } => {
                let entered = self
                    .interaction
                    .selection
                    .enter_reconnection(&self.ctx.flow, source, is_reroute);
                if absorb_rejected(entered)?.is_some() {
                    self.interaction.set(close_flow_menu(self.interaction.state()));
                    self.interaction_state_after_zoom = None;
                    self.request_render(RenderTrigger::InteractionChanged, None, now, &mut out);
                }
            }
            CanvasEvent::SelectTarget(guid) => self.select_target(guid, now, &mut out)?,
            CanvasEvent::SelectArea { x0, y0, x1, y1 } => {
                let picked = self
                    .last_frame
                    .as_ref()
                    .map(|frame| hit_test_rect(frame, Rect::from_points((x0, y0), (x1, y1))))
                    .unwrap_or_default();
                if self.interaction.selection.select_area(picked) {
                    self.request_render(RenderTrigger::InteractionChanged, None, now, &mut out);
                }
            }
            CanvasEvent::ExitSelection => {
                self.interaction.selection.exit();
                self.request_render(RenderTrigger::InteractionChanged, None, now, &mut out);
            }
            CanvasEvent::Delete {
                guid,
                child_index_to_keep,
            } => self.apply_mutation(
                FlowMutation::DeleteElement {
                    guid,
                    child_index_to_keep,
                },
                now,
                &mut out,
            )?,
            CanvasEvent::Add { source, element } => {
                self.apply_mutation(FlowMutation::AddElement { source, element }, now, &mut out)?
            }
            CanvasEvent::RemoveGoTo { source } => {
                self.apply_mutation(FlowMutation::RemoveGoTo { source }, now, &mut out)?
            }
            CanvasEvent::NodeResized { guid, dimensions } => self.node_resized(guid, dimensions, now, &mut out),
            CanvasEvent::ZoomEnd { scale } => {
                self.scale = scale;
                if let Some(state) = self.interaction_state_after_zoom.take() {
                    log::debug!("zoom finished; opening the deferred menu");
                    self.interaction.set(state);
                    self.request_render(RenderTrigger::ZoomEnd, None, now, &mut out);
                }
            }
            CanvasEvent::Click { x, y } => self.click(x, y, now, &mut out)?,
            CanvasEvent::Key {
                key,
                ctrl,
                shift,
                alt,
                meta,
            } => {
                if let Some(action) = ShortcutMap::resolve(&key, ctrl, shift, alt, meta) {
                    self.shortcut(action, now, &mut out)?;
                }
            }
        }
        Ok(out)
    }

    // ─── Menus ───────────────────────────────────────────────────────────

    fn toggle_menu(&mut self, target: MenuTarget, now: u64, out: &mut SessionOutput) {
        let detail = ToggleMenuDetail {
            target,
            component_key: resolve_menu(&self.ctx, self.registry.as_ref(), target).map(|f| f.component_key),
        };
        // A menu parked behind a zoom counts as the current one.
        let current = self
            .interaction_state_after_zoom
            .as_ref()
            .unwrap_or(self.interaction.state());
        let next = toggle_flow_menu(&detail, current);
        if next == *current {
            return;
        }
        if self.interaction_state_after_zoom.take().is_some() && next == *self.interaction.state() {
            log::debug!("menu toggled off before the zoom finished");
            return;
        }

        let opens_node_menu = matches!(
            next.menu_info.as_ref().map(|info| info.target),
            Some(MenuTarget::Node(_))
        );
        if opens_node_menu && self.scale < self.max_zoom {
            log::debug!("zooming to {} before opening its menu", target.guid());
            self.interaction_state_after_zoom = Some(next);
            out.effects.push(HostEffect::ZoomToElement {
                guid: target.guid(),
                scale: self.max_zoom,
            });
            return;
        }

        self.interaction_state_after_zoom = None;
        self.interaction.set(next);
        self.request_render(RenderTrigger::InteractionChanged, None, now, out);
    }

    fn close_menu(&mut self, now: u64, out: &mut SessionOutput) {
        self.interaction_state_after_zoom = None;
        if self.interaction.phase() == MenuPhase::Closed && self.interaction.state().deletion_path_info.is_none() {
            return;
        }
        self.interaction.set(close_flow_menu(self.interaction.state()));
        self.request_render(RenderTrigger::InteractionChanged, None, now, out);
    }

    fn highlight_path(
        &mut self,
        guid: Guid,
        child_index_to_keep: Option<usize>,
        highlight_beyond_merge_point: Option<bool>,
        now: u64,
        out: &mut SessionOutput,
    ) -> Result<()> {
        let flow = &self.ctx.flow;
        let preview = highlight_beyond_merge_point
            .map(Ok)
            .unwrap_or_else(|| should_highlight_beyond_merging_point(flow, guid, child_index_to_keep))
            .and_then(|beyond| {
                update_deletion_path_info(flow, guid, child_index_to_keep, &InteractionState::default(), beyond)
            });
        let Some(preview) = absorb_rejected(preview)? else {
            return Ok(());
        };
        let info = preview.deletion_path_info;
        self.interaction.modify(|state| InteractionState {
            menu_info: state.menu_info.clone(),
            deletion_path_info: info.clone(),
        });
        self.request_render(RenderTrigger::InteractionChanged, None, now, out);
        Ok(())
    }

    // ─── Edits ───────────────────────────────────────────────────────────

    fn select_target(&mut self, guid: Guid, now: u64, out: &mut SessionOutput) -> Result<()> {
        match self.interaction.selection.select_target(guid) {
            Some(mutation) => self.apply_mutation(mutation, now, out),
            None => {
                self.request_render(RenderTrigger::InteractionChanged, None, now, out);
                Ok(())
            }
        }
    }

    fn apply_mutation(&mut self, mutation: FlowMutation, now: u64, out: &mut SessionOutput) -> Result<()> {
        let focus = mutation.focus_after(&self.ctx.flow);
        let Some(outcome) = absorb_rejected(mutation.apply(&mut self.ctx.flow))? else {
            return Ok(());
        };
        if let MutationOutcome::Deleted(plan) = &outcome {
            log::debug!("deleted {} elements", plan.deleted.len());
            if self.focus.is_some_and(|f| plan.deleted.contains(&focus_guid(f))) {
                self.focus = None;
            }
            let was_pending = self.dynamic_nodes_pending();
            self.dynamic_guids_at_load.retain(|guid| !plan.deleted.contains(guid));
            for guid in &plan.deleted {
                self.ctx.dynamic_node_dimension_map.remove(guid);
            }
            if was_pending && !self.dynamic_nodes_pending() {
                log::debug!("remaining dynamic nodes are measured");
                self.load_settling = true;
            }
        }

        self.interaction.set(close_flow_menu(self.interaction.state()));
        self.interaction.selection.exit();
        self.interaction_state_after_zoom = None;
        if let Some(source) = focus {
            self.scheduler
                .queue_effect(SettleEffect::Focus(FocusTarget::Connector(source)));
        }
        out.effects.push(HostEffect::FlowChanged);
        self.request_render(RenderTrigger::GraphChanged, None, now, out);
        Ok(())
    }

    fn node_resized(&mut self, guid: Guid, dimensions: Dimensions, now: u64, out: &mut SessionOutput) {
        if !self.ctx.flow.contains(guid) {
            log::debug!("size report for unknown element {guid} ignored");
            return;
        }
        let was_pending = self.dynamic_nodes_pending();
        let previous = self.ctx.dynamic_node_dimension_map.insert(guid, dimensions);
        if previous == Some(dimensions) {
            return;
        }
        if was_pending && !self.dynamic_nodes_pending() {
            log::debug!("all {} dynamic nodes measured", self.dynamic_guids_at_load.len());
            self.load_settling = true;
        }
        self.request_render(RenderTrigger::NodeResized, None, now, out);
    }

    // ─── Pointer & keyboard ──────────────────────────────────────────────

    fn click(&mut self, x: f64, y: f64, now: u64, out: &mut SessionOutput) -> Result<()> {
        let radius = f64::from(self.ctx.layout_config.connector.icon.w) / 2.0;
        let Some(hit) = self.last_frame.as_ref().map(|frame| hit_test(frame, x, y, radius)) else {
            log::debug!("click before first render ignored");
            return Ok(());
        };
        match hit {
            Some(HitTarget::Connector(source)) => {
                if self.interaction.selection.mode == SelectionMode::Off {
                    self.toggle_menu(MenuTarget::Connector(source), now, out);
                }
            }
            Some(HitTarget::Node(guid)) => {
                if self.interaction.selection.mode != SelectionMode::Off {
                    return self.select_target(guid, now, out);
                }
                match self.clicks.click(guid, now) {
                    Some(Click::Double(guid)) => out.effects.push(HostEffect::EditElement(guid)),
                    Some(Click::Single(previous)) => self.toggle_menu(MenuTarget::Node(previous), now, out),
                    None => {}
                }
            }
            None => {
                self.clicks.reset();
                self.close_menu(now, out);
            }
        }
        Ok(())
    }

    fn shortcut(&mut self, action: CanvasAction, now: u64, out: &mut SessionOutput) -> Result<()> {
        match action {
            CanvasAction::Escape => {
                if self.interaction.selection.mode != SelectionMode::Off {
                    self.interaction.selection.exit();
                    self.request_render(RenderTrigger::InteractionChanged, None, now, out);
                } else {
                    self.close_menu(now, out);
                }
            }
            CanvasAction::ToggleMenu => {
                if let Some(focus) = self.focus {
                    let target = match focus {
                        FocusTarget::Node(guid) => MenuTarget::Node(guid),
                        FocusTarget::Connector(source) => MenuTarget::Connector(source),
                    };
                    self.toggle_menu(target, now, out);
                }
            }
            CanvasAction::MoveFocus(direction) => {
                let from = self.focus.or_else(|| self.ctx.flow.start().map(FocusTarget::Node));
                let next = from.and_then(|from| move_focus(&self.ctx.flow, from, direction));
                if let Some(next) = next {
                    self.focus = Some(next);
                    out.effects.push(HostEffect::Focus(next));
                }
            }
            CanvasAction::Delete => {
                if let Some(FocusTarget::Node(guid)) = self.focus {
                    self.apply_mutation(
                        FlowMutation::DeleteElement {
                            guid,
                            child_index_to_keep: None,
                        },
                        now,
                        out,
                    )?;
                }
            }
            CanvasAction::ToggleSelection => {
                self.interaction.selection.toggle_selecting();
                self.request_render(RenderTrigger::InteractionChanged, None, now, out);
            }
        }
        Ok(())
    }

    // ─── Rendering ───────────────────────────────────────────────────────

    fn request_render(
        &mut self,
        trigger: RenderTrigger,
        duration_override: Option<u64>,
        now: u64,
        out: &mut SessionOutput,
    ) {
        if let Some(ticket) = self.scheduler.schedule_render(trigger, duration_override, now) {
            self.run_render(ticket, now, out);
        }
    }

    fn run_render(&mut self, ticket: RenderTicket, now: u64, out: &mut SessionOutput) {
        if self.interaction.flush_pending() {
            log::trace!("menu geometry applied");
        }
        self.ctx.interaction_state = self.interaction.state().clone();
        self.ctx.is_deleting_branch = self
            .ctx
            .interaction_state
            .deletion_path_info
            .as_ref()
            .and_then(|info| self.ctx.flow.get(info.element_guid_to_delete))
            .is_some_and(FlowElement::is_branching);

        if !calculate_flow_layout(&mut self.ctx) {
            self.freeze_in_flight();
        }
        let single_frame = !self.rendered_once
            || self.dynamic_nodes_pending()
            || self.load_settling
            || self.ctx.previous_layout.is_none();
        let Some(handle) = self.scheduler.begin_animated_render(ticket, single_frame, now) else {
            return;
        };
        self.rendered_once = true;
        self.load_settling = false;
        self.animation = Some(handle);
        self.advance(handle, now, out);
    }

    /// Restart an interrupted animation from what is currently on screen.
    fn freeze_in_flight(&mut self) {
        if self.ctx.rendered_progress >= 1.0 {
            return;
        }
        if let Some(origin) = self.ctx.previous_layout.take() {
            self.ctx.previous_layout = Some(FlowLayout::interpolate(
                &origin,
                &self.ctx.layout,
                self.ctx.rendered_progress,
            ));
        }
    }

    fn advance(&mut self, handle: AnimationHandle, now: u64, out: &mut SessionOutput) {
        let Some(progress) = self.scheduler.progress(&handle, now) else {
            self.animation = None;
            return;
        };
        let frame = render_flow(&mut self.ctx, progress);
        self.last_frame = Some(frame.clone());
        out.frame = Some(frame);
        if progress >= 1.0 {
            self.animation = None;
            self.settle(&handle, out);
        }
    }

    fn settle(&mut self, handle: &AnimationHandle, out: &mut SessionOutput) {
        let Some(effects) = self.scheduler.on_render_settled(handle) else {
            return;
        };
        for effect in effects {
            match effect {
                SettleEffect::Focus(target) => {
                    self.focus = Some(target);
                    out.effects.push(HostEffect::Focus(target));
                }
            }
        }

        if self.open_start_menu_on_load && !self.initial_start_menu_displayed {
            let start_menu_open = self.interaction.phase() == MenuPhase::Open
                && self
                    .interaction
                    .state()
                    .menu_info
                    .as_ref()
                    .is_some_and(|info| Some(info.target.guid()) == self.ctx.flow.start());
            if start_menu_open {
                log::debug!("initial start menu displayed");
                self.initial_start_menu_displayed = true;
            }
        }
    }
}

fn focus_guid(focus: FocusTarget) -> Guid {
    match focus {
        FocusTarget::Node(guid) => guid,
        FocusTarget::Connector(source) => source.guid,
    }
}

/// Turn a rejected edit into `None`; integrity failures stay errors.
fn absorb_rejected<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(FlowError::InvalidEdit { guid, reason }) => {
            log::warn!("edit on {guid} rejected: {reason}");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
