//! Single versus double click disambiguation on a virtual clock.

use fc_core::Guid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickState {
    Idle,
    /// A first click on `target` is waiting for a possible second one.
    Armed { target: Guid, deadline: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Click {
    Single(Guid),
    Double(Guid),
}

#[derive(Debug, Clone)]
pub struct ClickDisambiguator {
    window_ms: u64,
    state: ClickState,
}

impl ClickDisambiguator {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            state: ClickState::Idle,
        }
    }

    pub fn state(&self) -> ClickState {
        self.state
    }

    /// Register a click on `target` at `now`. A second click on the same
    /// target inside the window is a double click. A click on another target
    /// settles the armed one as a single click and arms the new one.
    pub fn click(&mut self, target: Guid, now: u64) -> Option<Click> {
        match self.state {
            ClickState::Armed { target: armed, deadline } if armed == target && now <= deadline => {
                self.state = ClickState::Idle;
                Some(Click::Double(target))
            }
            // Also covers an expired arm that tick() never saw.
            ClickState::Armed { target: armed, .. } => {
                self.arm(target, now);
                Some(Click::Single(armed))
            }
            ClickState::Idle => {
                self.arm(target, now);
                None
            }
        }
    }

    /// Settle an armed click whose window has passed.
    pub fn tick(&mut self, now: u64) -> Option<Click> {
        match self.state {
            ClickState::Armed { target, deadline } if now > deadline => {
                self.state = ClickState::Idle;
                Some(Click::Single(target))
            }
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.state = ClickState::Idle;
    }

    fn arm(&mut self, target: Guid, now: u64) {
        self.state = ClickState::Armed {
            target,
            deadline: now + self.window_ms,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(s: &str) -> Guid {
        Guid::intern(s)
    }

    #[test]
    fn two_quick_clicks_are_double() {
        let mut clicks = ClickDisambiguator::new(250);
        assert_eq!(clicks.click(g("c_a"), 0), None);
        assert_eq!(clicks.click(g("c_a"), 100), Some(Click::Double(g("c_a"))));
        assert_eq!(clicks.state(), ClickState::Idle);
        assert_eq!(clicks.tick(1000), None);
    }

    #[test]
    fn expired_click_is_single() {
        let mut clicks = ClickDisambiguator::new(250);
        clicks.click(g("c_a"), 0);
        assert_eq!(clicks.tick(250), None);
        assert_eq!(clicks.tick(251), Some(Click::Single(g("c_a"))));
    }

    #[test]
    fn other_target_settles_first() {
        let mut clicks = ClickDisambiguator::new(250);
        clicks.click(g("c_a"), 0);
        assert_eq!(clicks.click(g("c_b"), 50), Some(Click::Single(g("c_a"))));
        assert_eq!(clicks.state(), ClickState::Armed { target: g("c_b"), deadline: 300 });
    }
}
