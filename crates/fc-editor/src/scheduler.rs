//! Render scheduling: debounce, animation handles and cancellation.
//!
//! The scheduler never renders. It decides when a render may start, hands
//! out an `AnimationHandle` for it, and reports progress for that handle on
//! the caller's clock. Every deferred entry point checks the disconnect flag
//! and the handle's generation first, so late callbacks are no-ops.

use crate::focus::FocusTarget;
use fc_core::{FlowError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Quiet period collapsing bursts of render requests.
    pub debounce_ms: u64,
    pub animation_duration_ms: u64,
    /// Duration used to re-render after a menu reports its geometry.
    pub fast_animation_duration_ms: u64,
    pub double_click_ms: u64,
    pub animation_enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 16,
            animation_duration_ms: 300,
            fast_animation_duration_ms: 10,
            double_click_ms: 250,
            animation_enabled: true,
        }
    }
}

impl SchedulerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| FlowError::Document(e.to_string()))
    }
}

/// Why a render was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTrigger {
    Mount,
    GraphChanged,
    InteractionChanged,
    MenuPositioned,
    NodeResized,
    ZoomEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    PendingDebounced { fire_at: u64 },
    Animating(AnimationHandle),
}

/// Permission to start one render, valid for the generation it was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTicket {
    pub generation: u64,
    pub trigger: RenderTrigger,
    pub duration_override: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationHandle {
    pub generation: u64,
    pub started_at: u64,
    pub duration_ms: u64,
}

/// Work to run once an animation has settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleEffect {
    Focus(FocusTarget),
}

#[derive(Debug, Clone)]
pub struct RenderScheduler {
    config: SchedulerConfig,
    phase: SchedulerPhase,
    generation: u64,
    disconnected: bool,
    mounted: bool,
    pending_fire_at: Option<u64>,
    pending_trigger: RenderTrigger,
    pending_override: Option<u64>,
    effects: Vec<SettleEffect>,
}

impl RenderScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            phase: SchedulerPhase::Idle,
            generation: 0,
            disconnected: false,
            mounted: false,
            pending_fire_at: None,
            pending_trigger: RenderTrigger::Mount,
            pending_override: None,
            effects: Vec::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Ask for a render. The first render and renders with animation
    /// disabled are granted immediately; everything else waits for the
    /// debounce window, restarted by each new request. The latest trigger
    /// wins, but the shortest duration override within a window is kept.
    pub fn schedule_render(
        &mut self,
        trigger: RenderTrigger,
        duration_override: Option<u64>,
        now: u64,
    ) -> Option<RenderTicket> {
        if self.disconnected {
            log::debug!("render request after teardown ignored");
            return None;
        }
        if !self.mounted || !self.config.animation_enabled {
            self.mounted = true;
            return Some(RenderTicket {
                generation: self.generation,
                trigger,
                duration_override,
            });
        }
        let fire_at = now + self.config.debounce_ms;
        log::debug!("render debounced until {fire_at} ({trigger:?})");
        // An in-flight animation keeps running until the new render begins.
        if !matches!(self.phase, SchedulerPhase::Animating(_)) {
            self.phase = SchedulerPhase::PendingDebounced { fire_at };
        }
        self.pending_override = match (self.pending_fire_at, self.pending_override, duration_override) {
            (Some(_), Some(kept), Some(new)) => Some(kept.min(new)),
            (Some(_), kept, new) => kept.or(new),
            (None, _, new) => new,
        };
        self.pending_fire_at = Some(fire_at);
        self.pending_trigger = trigger;
        None
    }

    /// Hand out the debounced render once its window has passed.
    pub fn tick(&mut self, now: u64) -> Option<RenderTicket> {
        if self.disconnected {
            return None;
        }
        let fire_at = self.pending_fire_at.filter(|at| now >= *at)?;
        log::trace!("debounced render fires at {now} (due {fire_at})");
        self.pending_fire_at = None;
        if matches!(self.phase, SchedulerPhase::PendingDebounced { .. }) {
            self.phase = SchedulerPhase::Idle;
        }
        Some(RenderTicket {
            generation: self.generation,
            trigger: self.pending_trigger,
            duration_override: self.pending_override.take(),
        })
    }

    /// Start the render for `ticket`. Any earlier animation becomes stale.
    /// `single_frame` renders jump straight to progress 1.
    pub fn begin_animated_render(
        &mut self,
        ticket: RenderTicket,
        single_frame: bool,
        now: u64,
    ) -> Option<AnimationHandle> {
        if self.disconnected || ticket.generation != self.generation {
            log::debug!("stale render ticket {}", ticket.generation);
            return None;
        }
        self.generation += 1;
        let duration_ms = if single_frame || !self.config.animation_enabled {
            0
        } else {
            ticket
                .duration_override
                .unwrap_or(self.config.animation_duration_ms)
        };
        let handle = AnimationHandle {
            generation: self.generation,
            started_at: now,
            duration_ms,
        };
        self.phase = SchedulerPhase::Animating(handle);
        log::trace!("render {} begins ({:?}, {duration_ms}ms)", handle.generation, ticket.trigger);
        Some(handle)
    }

    /// Animation progress of `handle` at `now`, or `None` once it is stale.
    pub fn progress(&self, handle: &AnimationHandle, now: u64) -> Option<f32> {
        if self.disconnected || handle.generation != self.generation {
            return None;
        }
        if handle.duration_ms == 0 {
            return Some(1.0);
        }
        let elapsed = now.saturating_sub(handle.started_at);
        Some((elapsed as f32 / handle.duration_ms as f32).min(1.0))
    }

    /// Queue work for the next settled render.
    pub fn queue_effect(&mut self, effect: SettleEffect) {
        if !self.disconnected && !self.effects.contains(&effect) {
            self.effects.push(effect);
        }
    }

    /// Finish `handle`. Returns the queued effects, or `None` when the
    /// handle is stale.
    pub fn on_render_settled(&mut self, handle: &AnimationHandle) -> Option<Vec<SettleEffect>> {
        if self.disconnected || handle.generation != self.generation {
            return None;
        }
        if self.phase == SchedulerPhase::Animating(*handle) {
            self.phase = match self.pending_fire_at {
                Some(fire_at) => SchedulerPhase::PendingDebounced { fire_at },
                None => SchedulerPhase::Idle,
            };
        }
        Some(std::mem::take(&mut self.effects))
    }

    /// Disconnect: drop pending work and invalidate every outstanding handle.
    pub fn teardown(&mut self) {
        self.disconnected = true;
        self.generation += 1;
        self.phase = SchedulerPhase::Idle;
        self.pending_fire_at = None;
        self.pending_override = None;
        self.effects.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc_core::Guid;

    fn mounted() -> RenderScheduler {
        let mut scheduler = RenderScheduler::new(SchedulerConfig::default());
        let ticket = scheduler.schedule_render(RenderTrigger::Mount, None, 0).unwrap();
        let handle = scheduler.begin_animated_render(ticket, true, 0).unwrap();
        scheduler.on_render_settled(&handle).unwrap();
        scheduler
    }

    #[test]
    fn first_render_is_immediate() {
        let mut scheduler = RenderScheduler::new(SchedulerConfig::default());
        assert!(scheduler.schedule_render(RenderTrigger::Mount, None, 0).is_some());
        assert!(scheduler.schedule_render(RenderTrigger::GraphChanged, None, 0).is_none());
    }

    #[test]
    fn burst_collapses_into_one_render() {
        let mut scheduler = mounted();
        scheduler.schedule_render(RenderTrigger::GraphChanged, None, 100);
        scheduler.schedule_render(RenderTrigger::InteractionChanged, Some(10), 110);
        assert_eq!(scheduler.tick(120), None);

        let ticket = scheduler.tick(126).unwrap();
        assert_eq!(ticket.trigger, RenderTrigger::InteractionChanged);
        assert_eq!(ticket.duration_override, Some(10));
        assert_eq!(scheduler.tick(200), None);
    }

    #[test]
    fn fast_override_survives_a_later_plain_request() {
        let mut scheduler = mounted();
        scheduler.schedule_render(RenderTrigger::MenuPositioned, Some(10), 100);
        scheduler.schedule_render(RenderTrigger::GraphChanged, None, 105);
        let ticket = scheduler.tick(121).unwrap();
        assert_eq!(ticket.trigger, RenderTrigger::GraphChanged);
        assert_eq!(ticket.duration_override, Some(10));

        // The next window starts without an override.
        scheduler.schedule_render(RenderTrigger::GraphChanged, None, 200);
        assert_eq!(scheduler.tick(216).unwrap().duration_override, None);
    }

    #[test]
    fn animation_progress_and_settle() {
        let mut scheduler = mounted();
        scheduler.schedule_render(RenderTrigger::GraphChanged, None, 0);
        let ticket = scheduler.tick(16).unwrap();
        let handle = scheduler.begin_animated_render(ticket, false, 16).unwrap();
        assert_eq!(scheduler.progress(&handle, 166), Some(0.5));
        assert_eq!(scheduler.progress(&handle, 1000), Some(1.0));

        let focus = SettleEffect::Focus(FocusTarget::Node(Guid::intern("sch_a")));
        scheduler.queue_effect(focus.clone());
        scheduler.queue_effect(focus.clone());
        assert_eq!(scheduler.on_render_settled(&handle), Some(vec![focus]));
        assert_eq!(scheduler.phase(), SchedulerPhase::Idle);
    }

    #[test]
    fn newer_render_makes_old_handle_stale() {
        let mut scheduler = mounted();
        scheduler.schedule_render(RenderTrigger::GraphChanged, None, 0);
        let tick = scheduler.tick(16).unwrap();
        let first = scheduler.begin_animated_render(tick, false, 16).unwrap();
        scheduler.schedule_render(RenderTrigger::GraphChanged, None, 50);
        let tick = scheduler.tick(66).unwrap();
        let second = scheduler.begin_animated_render(tick, false, 66).unwrap();

        assert_eq!(scheduler.progress(&first, 100), None);
        assert_eq!(scheduler.on_render_settled(&first), None);
        assert!(scheduler.progress(&second, 100).is_some());
    }

    #[test]
    fn teardown_cancels_everything() {
        let mut scheduler = mounted();
        scheduler.schedule_render(RenderTrigger::GraphChanged, None, 0);
        let ticket = scheduler.tick(16).unwrap();
        let handle = scheduler.begin_animated_render(ticket, false, 16).unwrap();
        scheduler.schedule_render(RenderTrigger::GraphChanged, None, 20);

        scheduler.teardown();
        assert_eq!(scheduler.tick(1000), None);
        assert_eq!(scheduler.progress(&handle, 100), None);
        assert_eq!(scheduler.on_render_settled(&handle), None);
        assert_eq!(scheduler.schedule_render(RenderTrigger::GraphChanged, None, 2000), None);
    }

    #[test]
    fn disabled_animation_renders_synchronously() {
        let config = SchedulerConfig {
            animation_enabled: false,
            ..SchedulerConfig::default()
        };
        let mut scheduler = RenderScheduler::new(config);
        scheduler.schedule_render(RenderTrigger::Mount, None, 0).unwrap();
        let ticket = scheduler.schedule_render(RenderTrigger::GraphChanged, None, 5).unwrap();
        let handle = scheduler.begin_animated_render(ticket, false, 5).unwrap();
        assert_eq!(handle.duration_ms, 0);
    }
}
