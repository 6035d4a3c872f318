//! Auto-cycle controller for the unattended display.
//!
//! The controller is a plain value: a state plus the time left in it. The
//! display loop feeds it elapsed time and reacts to the events it returns.
//! Because there is a single remaining-time field there is never more than
//! one pending transition.

use std::time::Duration;

use crate::models::Attribute;

pub const MIN_STEP: Duration = Duration::from_millis(800);
pub const MIN_PAUSE: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    FullOpacityPause,
    Highlighting(usize),
    /// Transient: resolved within the same tick.
    SwitchingCategory,
}

/// Where the cycle resumes after the target attribute advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumePolicy {
    #[default]
    FullOpacityPause,
    /// Go straight to the first highlight of the new pair.
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleEvent {
    /// The active highlight changed. `None` shows every flow at full opacity.
    Highlight(Option<usize>),
    TargetChanged(Attribute),
}

#[derive(Debug, Clone)]
pub struct Controller {
    source: Attribute,
    target: Attribute,
    rotation: Vec<Attribute>,
    state: CycleState,
    remaining: Duration,
    base_speed: Duration,
    enabled: bool,
    source_count: usize,
    hovered: Option<usize>,
    policy: ResumePolicy,
    rotations: usize,
}

impl Controller {
    pub fn new(source: Attribute, target: Attribute, base_speed: Duration) -> Self {
        Self {
            source,
            target,
            rotation: Attribute::rotation(source),
            state: CycleState::Idle,
            remaining: Duration::ZERO,
            base_speed,
            enabled: false,
            source_count: 0,
            hovered: None,
            policy: ResumePolicy::default(),
            rotations: 0,
        }
    }

    pub fn with_policy(mut self, policy: ResumePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn step_duration(&self) -> Duration {
        (self.base_speed / 8).max(MIN_STEP)
    }

    pub fn pause_duration(&self) -> Duration {
        (self.base_speed / 16).max(MIN_PAUSE)
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn source(&self) -> Attribute {
        self.source
    }

    pub fn target(&self) -> Attribute {
        self.target
    }

    /// Completed category switches since the current pair was selected.
    pub fn rotations(&self) -> usize {
        self.rotations
    }

    /// The single source index currently highlighted, if any. A hover wins
    /// over the cycle position.
    pub fn active_highlight(&self) -> Option<usize> {
        self.hovered.or(match self.state {
            CycleState::Highlighting(index) => Some(index),
            _ => None,
        })
    }

    /// Advance by `elapsed`, walking through every transition it covers.
    pub fn tick(&mut self, mut elapsed: Duration) -> Vec<CycleEvent> {
        let mut events = Vec::new();
        if self.hovered.is_some() || self.state == CycleState::Idle {
            return events;
        }

        while elapsed >= self.remaining {
            elapsed -= self.remaining;
            self.advance(&mut events);
            if self.state == CycleState::Idle {
                break;
            }
        }
        if self.state != CycleState::Idle {
            self.remaining -= elapsed;
        }
        events
    }

    fn advance(&mut self, events: &mut Vec<CycleEvent>) {
        match self.state {
            CycleState::FullOpacityPause => self.enter(CycleState::Highlighting(0), events),
            CycleState::Highlighting(index) if index + 1 < self.source_count => {
                self.enter(CycleState::Highlighting(index + 1), events)
            }
            CycleState::Highlighting(_) | CycleState::SwitchingCategory => {
                self.state = CycleState::SwitchingCategory;
                self.switch_category(events);
            }
            CycleState::Idle => {}
        }
    }

    fn switch_category(&mut self, events: &mut Vec<CycleEvent>) {
        if !self.rotation.is_empty() {
            let next = self
                .rotation
                .iter()
                .position(|attribute| *attribute == self.target)
                .map_or(0, |position| (position + 1) % self.rotation.len());
            self.target = self.rotation[next];
        }
        self.rotations += 1;
        events.push(CycleEvent::TargetChanged(self.target));

        match self.policy {
            ResumePolicy::FullOpacityPause => self.enter(CycleState::FullOpacityPause, events),
            ResumePolicy::Direct => self.enter(CycleState::Highlighting(0), events),
        }
    }

    fn enter(&mut self, state: CycleState, events: &mut Vec<CycleEvent>) {
        self.state = state;
        match state {
            CycleState::FullOpacityPause => {
                self.remaining = self.pause_duration();
                events.push(CycleEvent::Highlight(None));
            }
            CycleState::Highlighting(index) => {
                self.remaining = self.step_duration();
                events.push(CycleEvent::Highlight(Some(index)));
            }
            CycleState::Idle | CycleState::SwitchingCategory => {
                self.remaining = Duration::ZERO;
            }
        }
    }

    /// Start from the top of a cycle, or idle when auto-play is off or
    /// there is nothing to highlight.
    fn restart(&mut self) -> Vec<CycleEvent> {
        let mut events = Vec::new();
        if self.enabled && self.source_count > 0 {
            self.enter(CycleState::FullOpacityPause, &mut events);
        } else {
            let was_highlighting = matches!(self.state, CycleState::Highlighting(_));
            self.enter(CycleState::Idle, &mut events);
            if was_highlighting && self.hovered.is_none() {
                events.push(CycleEvent::Highlight(None));
            }
        }
        events
    }

    /// Freeze on a hovered source index, or resume with `None`.
    pub fn hover(&mut self, index: Option<usize>) -> Vec<CycleEvent> {
        if self.hovered == index {
            return Vec::new();
        }
        self.hovered = index;
        vec![CycleEvent::Highlight(self.active_highlight())]
    }

    /// Manual pair selection: interrupt and begin a fresh cycle on the new pair.
    pub fn select_pair(&mut self, source: Attribute, target: Attribute) -> Vec<CycleEvent> {
        self.source = source;
        self.target = target;
        self.rotation = Attribute::rotation(source);
        self.rotations = 0;
        self.hovered = None;
        self.restart()
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Vec<CycleEvent> {
        if self.enabled == enabled {
            return Vec::new();
        }
        self.enabled = enabled;
        self.restart()
    }

    /// New base speed. Time left in the current state never exceeds the new
    /// duration for that state.
    pub fn set_base_speed(&mut self, base_speed: Duration) {
        self.base_speed = base_speed;
        let limit = match self.state {
            CycleState::FullOpacityPause => self.pause_duration(),
            CycleState::Highlighting(_) => self.step_duration(),
            CycleState::Idle | CycleState::SwitchingCategory => Duration::ZERO,
        };
        self.remaining = self.remaining.min(limit);
    }

    /// The number of source values changed after a data update.
    pub fn set_source_count(&mut self, count: usize) -> Vec<CycleEvent> {
        let previous = self.source_count;
        self.source_count = count;

        if count == 0 || (previous == 0 && self.state == CycleState::Idle) {
            return self.restart();
        }
        if let Some(hovered) = self.hovered.filter(|index| *index >= count) {
            self.hovered = Some(hovered.min(count - 1));
        }
        match self.state {
            CycleState::Highlighting(index) if index >= count => {
                let mut events = Vec::new();
                self.enter(CycleState::Highlighting(count - 1), &mut events);
                events
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn running(source_count: usize) -> Controller {
        let mut controller = Controller::new(Attribute::Tenure, Attribute::LearningStyle, ms(5_000));
        controller.set_source_count(source_count);
        controller.set_enabled(true);
        controller
    }

    #[test]
    fn durations_respect_their_floors() {
        let fast = Controller::new(Attribute::Tenure, Attribute::Motivation, ms(1_000));
        assert_eq!(fast.step_duration(), ms(800));
        assert_eq!(fast.pause_duration(), ms(400));

        let slow = Controller::new(Attribute::Tenure, Attribute::Motivation, ms(10_000));
        assert_eq!(slow.step_duration(), ms(1_250));
        assert_eq!(slow.pause_duration(), ms(625));
    }

    #[test]
    fn stays_idle_without_data_or_auto_play() {
        let mut controller = Controller::new(Attribute::Tenure, Attribute::LearningStyle, ms(5_000));
        assert!(controller.set_enabled(true).is_empty());
        assert_eq!(controller.state(), CycleState::Idle);
        assert!(controller.tick(ms(60_000)).is_empty());

        let events = controller.set_source_count(3);
        assert_eq!(events, vec![CycleEvent::Highlight(None)]);
        assert_eq!(controller.state(), CycleState::FullOpacityPause);
    }

    #[test]
    fn walks_sources_then_switches_category() {
        let mut controller = running(3);
        assert_eq!(controller.tick(ms(400)), vec![CycleEvent::Highlight(Some(0))]);
        assert_eq!(controller.tick(ms(800)), vec![CycleEvent::Highlight(Some(1))]);
        assert_eq!(controller.tick(ms(799)), vec![]);
        assert_eq!(controller.tick(ms(1)), vec![CycleEvent::Highlight(Some(2))]);
        assert_eq!(
            controller.tick(ms(800)),
            vec![
                CycleEvent::TargetChanged(Attribute::ShapedBy),
                CycleEvent::Highlight(None),
            ]
        );
        assert_eq!(controller.state(), CycleState::FullOpacityPause);
        assert_eq!(controller.rotations(), 1);
    }

    #[test]
    fn direct_policy_skips_the_pause_after_switching() {
        let mut controller = running(1).with_policy(ResumePolicy::Direct);
        controller.tick(ms(400));
        let events = controller.tick(ms(800));
        assert_eq!(
            events,
            vec![
                CycleEvent::TargetChanged(Attribute::ShapedBy),
                CycleEvent::Highlight(Some(0)),
            ]
        );
        assert_eq!(controller.state(), CycleState::Highlighting(0));
    }

    #[test]
    fn target_rotation_wraps_and_skips_the_source() {
        let mut controller = Controller::new(Attribute::Tenure, Attribute::Motivation, ms(1_000));
        controller.set_source_count(1);
        controller.set_enabled(true);
        controller.tick(ms(400 + 800));
        assert_eq!(controller.target(), Attribute::LearningStyle);
    }

    #[test]
    fn one_long_tick_covers_several_transitions() {
        let mut controller = running(2);
        let events = controller.tick(ms(400 + 800 + 300));
        assert_eq!(
            events,
            vec![CycleEvent::Highlight(Some(0)), CycleEvent::Highlight(Some(1))]
        );
        assert_eq!(controller.remaining, ms(500));
    }

    #[test]
    fn hover_freezes_and_resumes_in_place() {
        let mut controller = running(4);
        controller.tick(ms(400 + 800));
        assert_eq!(controller.state(), CycleState::Highlighting(1));
        let remaining = controller.remaining;

        assert_eq!(controller.hover(Some(3)), vec![CycleEvent::Highlight(Some(3))]);
        assert_eq!(controller.active_highlight(), Some(3));
        assert!(controller.tick(ms(30_000)).is_empty());
        assert_eq!(controller.state(), CycleState::Highlighting(1));
        assert_eq!(controller.remaining, remaining);

        assert_eq!(controller.hover(None), vec![CycleEvent::Highlight(Some(1))]);
        assert_eq!(controller.tick(remaining), vec![CycleEvent::Highlight(Some(2))]);
    }

    #[test]
    fn manual_selection_restarts_the_cycle() {
        let mut controller = running(3);
        controller.tick(ms(400 + 800 * 3));
        assert_eq!(controller.rotations(), 1);

        let events = controller.select_pair(Attribute::Motivation, Attribute::PeakPerformance);
        assert_eq!(events, vec![CycleEvent::Highlight(None)]);
        assert_eq!(controller.state(), CycleState::FullOpacityPause);
        assert_eq!(controller.rotations(), 0);
        assert_eq!(controller.source(), Attribute::Motivation);
    }

    #[test]
    fn disabling_clears_the_highlight() {
        let mut controller = running(3);
        controller.tick(ms(400));
        assert_eq!(controller.set_enabled(false), vec![CycleEvent::Highlight(None)]);
        assert_eq!(controller.state(), CycleState::Idle);
        assert_eq!(controller.active_highlight(), None);
    }

    #[test]
    fn shrinking_data_keeps_the_highlight_in_range() {
        let mut controller = running(5);
        controller.tick(ms(400 + 800 * 4));
        assert_eq!(controller.state(), CycleState::Highlighting(4));
        assert_eq!(controller.set_source_count(2), vec![CycleEvent::Highlight(Some(1))]);
        assert_eq!(controller.set_source_count(0), vec![CycleEvent::Highlight(None)]);
        assert_eq!(controller.state(), CycleState::Idle);
    }

    #[test]
    fn slower_speed_does_not_extend_the_current_wait() {
        let mut controller = running(2);
        controller.set_base_speed(ms(10_000));
        assert_eq!(controller.remaining, ms(400));
        controller.set_base_speed(ms(1_000));
        assert_eq!(controller.remaining, ms(400));
    }

    proptest! {
        /// Property: after N completed passes through every source the target advanced N times
        #[test]
        fn prop_rotations_match_target_changes(
            source_count in 1usize..6,
            ticks in prop::collection::vec(0u64..3_000, 1..200),
            direct in any::<bool>(),
        ) {
            let policy = if direct { ResumePolicy::Direct } else { ResumePolicy::FullOpacityPause };
            let mut controller = Controller::new(Attribute::Tenure, Attribute::LearningStyle, ms(5_000))
                .with_policy(policy);
            controller.set_source_count(source_count);
            controller.set_enabled(true);

            let rotation = Attribute::rotation(Attribute::Tenure);
            let mut target_changes = 0usize;
            let mut last_highlights = 0usize;

            for elapsed in ticks {
                for event in controller.tick(ms(elapsed)) {
                    match event {
                        CycleEvent::TargetChanged(_) => target_changes += 1,
                        CycleEvent::Highlight(Some(index)) if index + 1 == source_count => {
                            last_highlights += 1
                        }
                        CycleEvent::Highlight(_) => {}
                    }
                }
                prop_assert!(controller.active_highlight().map_or(true, |i| i < source_count));
                prop_assert_ne!(controller.state(), CycleState::SwitchingCategory);
            }

            prop_assert_eq!(controller.rotations(), target_changes);
            prop_assert!(last_highlights >= target_changes);
            prop_assert!(last_highlights <= target_changes + 1);
            prop_assert_eq!(controller.target(), rotation[target_changes % rotation.len()]);
        }
    }
}
