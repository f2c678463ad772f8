//! Character reveal animations.
//!
//! A strategy decides *what* happens to the characters of the current line; the
//! [`Animator`] carries it out against a [`Scheduler`] and owns the pending reveals,
//! so a line switch, a pause or a strategy change can drop them in one call.

use std::collections::BTreeMap;

use log::debug;

use crate::tasks::{Scheduler, TaskSet};

/// A single character on screen.
pub trait CharNode {
    /// Make the character visible, running `transition` (a CSS animation shorthand)
    /// or showing it instantly when `None`.
    fn reveal(&self, transition: Option<&str>);
    /// Hide the character and clear any running transition.
    fn conceal(&self);
}

/// One timed reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealStep {
    pub index: usize,
    pub delay_ms: u32,
    pub transition: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealPlan {
    /// Conceal every character, then reveal them on the given schedule.
    Schedule(Vec<RevealStep>),
    /// Show every character now, without transition.
    RevealAll,
    /// A schedule is already running for this line.
    Unchanged,
}

pub trait CharAnimation {
    /// Registry key (matches the preset `<select>` values).
    fn name(&self) -> &'static str;
    fn label(&self) -> &'static str;
    fn step_delay_ms(&self) -> u32;
    fn transition(&self) -> Option<&'static str>;

    fn plan(&self, char_count: usize, is_playing: bool, already_scheduled: bool) -> RevealPlan {
        if !is_playing {
            return RevealPlan::RevealAll;
        }
        if already_scheduled {
            return RevealPlan::Unchanged;
        }
        let delay = self.step_delay_ms();
        let transition = self.transition();
        RevealPlan::Schedule(
            (0..char_count)
                .map(|index| RevealStep {
                    index,
                    delay_ms: delay.saturating_mul(index as u32),
                    transition,
                })
                .collect(),
        )
    }
}

/// Classic typewriter: characters simply appear one after another.
#[derive(Debug, Clone, Copy)]
pub struct Typewriter {
    pub delay_ms: u32,
}

impl CharAnimation for Typewriter {
    fn name(&self) -> &'static str {
        "typewriter"
    }
    fn label(&self) -> &'static str {
        "Typewriter"
    }
    fn step_delay_ms(&self) -> u32 {
        self.delay_ms
    }
    fn transition(&self) -> Option<&'static str> {
        None
    }
}

/// Characters appear one after another, each running a CSS keyframe animation.
#[derive(Debug, Clone, Copy)]
pub struct Keyframed {
    pub name: &'static str,
    pub label: &'static str,
    pub delay_ms: u32,
    pub keyframes: &'static str,
}

impl CharAnimation for Keyframed {
    fn name(&self) -> &'static str {
        self.name
    }
    fn label(&self) -> &'static str {
        self.label
    }
    fn step_delay_ms(&self) -> u32 {
        self.delay_ms
    }
    fn transition(&self) -> Option<&'static str> {
        Some(self.keyframes)
    }
}

const KEYFRAMED: [Keyframed; 6] = [
    Keyframed {
        name: "slideIn",
        label: "Slide In",
        delay_ms: 30,
        keyframes: "slideInLeft 0.5s ease forwards",
    },
    Keyframed {
        name: "bounce",
        label: "Bounce",
        delay_ms: 40,
        keyframes: "bounceIn 0.6s cubic-bezier(0.68, -0.55, 0.265, 1.55) forwards",
    },
    Keyframed {
        name: "fadeWave",
        label: "Fade Wave",
        delay_ms: 60,
        keyframes: "fadeInUp 0.8s ease forwards",
    },
    Keyframed {
        name: "scalePop",
        label: "Scale Pop",
        delay_ms: 35,
        keyframes: "scalePop 0.5s cubic-bezier(0.175, 0.885, 0.32, 1.275) forwards",
    },
    Keyframed {
        name: "rotateFlip",
        label: "Rotate Flip",
        delay_ms: 45,
        keyframes: "rotateFlip 0.7s ease forwards",
    },
    Keyframed {
        name: "glowPulse",
        label: "Glow Pulse",
        delay_ms: 50,
        keyframes: "glowPulse 1s ease forwards",
    },
];

/// Name-keyed strategy table.
pub struct AnimationRegistry {
    strategies: BTreeMap<&'static str, Box<dyn CharAnimation>>,
}

impl Default for AnimationRegistry {
    fn default() -> Self {
        let mut registry = Self { strategies: BTreeMap::new() };
        registry.register(Box::new(Typewriter { delay_ms: 50 }));
        for preset in KEYFRAMED {
            registry.register(Box::new(preset));
        }
        registry
    }
}

impl AnimationRegistry {
    pub fn register(&mut self, strategy: Box<dyn CharAnimation>) {
        self.strategies.insert(strategy.name(), strategy);
    }

    pub fn get(&self, name: &str) -> Option<&dyn CharAnimation> {
        self.strategies.get(name).map(|s| s.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.strategies.keys().copied()
    }
}

/// Executes reveal plans and tracks the reveals pending for the displayed line.
pub struct Animator<S: Scheduler> {
    scheduler: S,
    pending: TaskSet<S::Handle>,
    line: Option<usize>,
}

impl<S: Scheduler> Animator<S> {
    pub fn new(scheduler: S) -> Self {
        Self { scheduler, pending: TaskSet::new(), line: None }
    }

    /// Line the pending reveals belong to.
    pub fn line(&self) -> Option<usize> {
        self.line
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Drop every pending reveal. The next `show` on the same line starts over.
    pub fn cancel(&mut self) -> usize {
        let dropped = self.pending.cancel_all();
        if dropped > 0 {
            debug!("cancelled {dropped} pending reveals");
        }
        dropped
    }

    /// Animate the characters of `line` with `strategy`.
    pub fn show<N>(&mut self, line: usize, chars: &[N], strategy: &dyn CharAnimation, is_playing: bool)
    where
        N: CharNode + Clone + 'static,
    {
        if self.line != Some(line) {
            self.cancel();
            self.line = Some(line);
        }
        match strategy.plan(chars.len(), is_playing, !self.pending.is_empty()) {
            RevealPlan::Schedule(steps) => {
                for c in chars {
                    c.conceal();
                }
                for step in steps {
                    let Some(node) = chars.get(step.index).cloned() else { continue };
                    let transition = step.transition;
                    let handle = self
                        .scheduler
                        .schedule(step.delay_ms, Box::new(move || node.reveal(transition)));
                    self.pending.push(handle);
                }
            }
            RevealPlan::RevealAll => {
                for c in chars {
                    c.reveal(None);
                }
            }
            RevealPlan::Unchanged => {}
        }
    }

    /// Start `line` over with another strategy. A paused line is revealed at once.
    pub fn restyle<N>(&mut self, line: usize, chars: &[N], strategy: &dyn CharAnimation, is_playing: bool)
    where
        N: CharNode + Clone + 'static,
    {
        self.cancel();
        self.show(line, chars, strategy, is_playing);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::tasks::manual::ManualScheduler;

    #[derive(Debug, Clone, PartialEq)]
    enum Look {
        Hidden,
        Shown(Option<String>),
    }

    #[derive(Clone)]
    struct FakeChar(Rc<RefCell<Look>>);

    impl FakeChar {
        fn new() -> Self {
            FakeChar(Rc::new(RefCell::new(Look::Hidden)))
        }
        fn look(&self) -> Look {
            self.0.borrow().clone()
        }
    }

    impl CharNode for FakeChar {
        fn reveal(&self, transition: Option<&str>) {
            *self.0.borrow_mut() = Look::Shown(transition.map(str::to_owned));
        }
        fn conceal(&self) {
            *self.0.borrow_mut() = Look::Hidden;
        }
    }

    fn chars(n: usize) -> Vec<FakeChar> {
        (0..n).map(|_| FakeChar::new()).collect()
    }

    #[test]
    fn test_registry_has_all_presets() {
        let reg = AnimationRegistry::default();
        let names: Vec<_> = reg.names().collect();
        for name in [
            "typewriter", "slideIn", "bounce", "fadeWave", "scalePop", "rotateFlip", "glowPulse",
        ] {
            assert!(names.contains(&name), "missing {name}");
        }
        assert!(reg.get("nope").is_none());
        for name in names {
            let delay = reg.get(name).unwrap().step_delay_ms();
            assert!((30..=60).contains(&delay), "{name} delay {delay}");
        }
    }

    #[test]
    fn test_plan_schedule_is_index_times_delay() {
        let bounce = AnimationRegistry::default();
        let bounce = bounce.get("bounce").unwrap();
        let RevealPlan::Schedule(steps) = bounce.plan(3, true, false) else {
            panic!("expected schedule");
        };
        let delays: Vec<u32> = steps.iter().map(|s| s.delay_ms).collect();
        assert_eq!(delays, [0, 40, 80]);
        assert!(steps.iter().all(|s| s.transition.is_some()));
        assert_eq!(bounce.plan(3, true, true), RevealPlan::Unchanged);
        assert_eq!(bounce.plan(3, false, true), RevealPlan::RevealAll);
    }

    #[test]
    fn test_typewriter_reveals_in_order_without_transition() {
        let sched = ManualScheduler::default();
        let mut animator = Animator::new(sched.clone());
        let line = chars(3);
        let tw = Typewriter { delay_ms: 50 };
        animator.show(0, &line, &tw, true);
        assert_eq!(animator.pending(), 3);
        sched.advance(0);
        assert_eq!(line[0].look(), Look::Shown(None));
        assert_eq!(line[1].look(), Look::Hidden);
        sched.advance(100);
        assert!(line.iter().all(|c| c.look() == Look::Shown(None)));
    }

    #[test]
    fn test_repeated_frames_do_not_reschedule() {
        let sched = ManualScheduler::default();
        let mut animator = Animator::new(sched.clone());
        let line = chars(4);
        let tw = Typewriter { delay_ms: 50 };
        animator.show(0, &line, &tw, true);
        animator.show(0, &line, &tw, true);
        animator.show(0, &line, &tw, true);
        assert_eq!(sched.live(), 4);
    }

    #[test]
    fn test_line_switch_leaves_no_stale_reveals() {
        let sched = ManualScheduler::default();
        let mut animator = Animator::new(sched.clone());
        let first = chars(5);
        let second = chars(2);
        let tw = Typewriter { delay_ms: 50 };

        animator.show(0, &first, &tw, true);
        sched.advance(60);
        animator.show(1, &second, &tw, true);
        // Only the new line's reveals remain live.
        assert_eq!(sched.live(), 2);
        sched.advance(1_000);
        assert_eq!(first[4].look(), Look::Hidden);
        assert!(second.iter().all(|c| matches!(c.look(), Look::Shown(_))));
    }

    #[test]
    fn test_pause_reveals_everything_instantly() {
        let sched = ManualScheduler::default();
        let mut animator = Animator::new(sched.clone());
        let line = chars(3);
        let reg = AnimationRegistry::default();
        let glow = reg.get("glowPulse").unwrap();
        animator.show(0, &line, glow, true);
        animator.cancel();
        animator.show(0, &line, glow, false);
        assert_eq!(sched.live(), 0);
        assert!(line.iter().all(|c| c.look() == Look::Shown(None)));
    }

    #[test]
    fn test_strategy_switch_after_cancel_uses_new_transition() {
        let sched = ManualScheduler::default();
        let mut animator = Animator::new(sched.clone());
        let line = chars(2);
        let reg = AnimationRegistry::default();
        animator.show(0, &line, reg.get("slideIn").unwrap(), true);
        animator.cancel();
        animator.show(0, &line, reg.get("scalePop").unwrap(), true);
        sched.advance(500);
        assert_eq!(
            line[1].look(),
            Look::Shown(Some(
                "scalePop 0.5s cubic-bezier(0.175, 0.885, 0.32, 1.275) forwards".into()
            ))
        );
    }
}
