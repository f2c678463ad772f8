// Integration tests (native) for the `lyric-canvas` crate.
// These tests avoid wasm-specific functionality and exercise pure Rust logic so
// they can run under `cargo test` on the host.

use std::cell::RefCell;
use std::rc::Rc;

use lyric_canvas::animation::{AnimationRegistry, Animator, CharNode};
use lyric_canvas::config::{self, KeyValueStore, MemoryStore, Preferences, Settings};
use lyric_canvas::error::LyricsError;
use lyric_canvas::layout::{LayoutRegistry, LineRole};
use lyric_canvas::lyrics::{LyricLine, LyricTrack};
use lyric_canvas::playback::{Effect, PlaybackController, Timebase};
use lyric_canvas::tasks::{Scheduler, TaskHandle};

const SONG: &str = "[00:01.00]Hello\n[00:03.50]World";

fn song() -> LyricTrack {
    LyricTrack::parse(SONG, 5.0).unwrap()
}

#[test]
fn hello_world_scenario() {
    let track = song();
    assert_eq!(track.lines(), [LyricLine::new(1.0, "Hello"), LyricLine::new(3.5, "World")]);
    assert_eq!(track.total_time(), 8.5);
    assert_eq!(track.display_index(2.0), 0);
    assert_eq!(track.display_index(5.0), 1);
}

#[test]
fn valid_lines_are_all_kept_and_sorted() {
    let src = "[00:05.00]b\n[00:01.00]a\n[00:05.00]c\n[01:00.25]d\n";
    let track = LyricTrack::parse(src, 5.0).unwrap();
    assert_eq!(track.len(), 4);
    let texts: Vec<_> = track.lines().iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, ["a", "b", "c", "d"]);
    assert!(track.lines().windows(2).all(|w| w[0].time <= w[1].time));
}

#[test]
fn input_without_timestamps_is_a_parse_failure() {
    let err = LyricTrack::parse("just some words\n[ar:Someone]\n", 5.0).unwrap_err();
    assert!(matches!(err, LyricsError::EmptyParseResult { .. }));
    assert!(LyricTrack::parse("", 5.0).is_err());
}

#[test]
fn display_index_never_goes_backwards_while_time_advances() {
    let track = LyricTrack::parse("[00:00.50]a\n[00:01.00]b\n[00:01.00]c\n[00:04.00]d", 5.0).unwrap();
    let mut last = 0;
    for step in 0..=100 {
        let index = track.display_index(f64::from(step) * 0.1);
        assert!(index >= last);
        last = index;
    }
    assert_eq!(last, 3);
}

#[test]
fn tick_stays_within_bounds() {
    let mut tb = Timebase::new(8.5);
    for delta in [3.0, -10.0, 20.0, -1.0, 4.2, f64::NAN, -0.3] {
        tb.tick(delta);
        assert!((0.0..=8.5).contains(&tb.current_time()));
    }
}

#[test]
fn seek_past_the_end_clamps() {
    let mut controller = PlaybackController::new(song());
    assert_eq!(controller.seek(100.0), [Effect::Render]);
    assert_eq!(controller.timebase().current_time(), 8.5);
    assert_eq!(controller.display_index(), 1);
}

#[test]
fn a_finished_run_needs_a_seek_or_reset() {
    let mut controller = PlaybackController::new(song());
    assert_eq!(controller.toggle_play(0.0, false), [Effect::RequestFrame]);
    assert_eq!(controller.frame(4_000.0), [Effect::Render, Effect::RequestFrame]);
    assert_eq!(controller.display_index(), 1);

    let effects = controller.frame(10_000.0);
    assert!(effects.contains(&Effect::Finished));
    assert!(!controller.is_playing());
    assert!(controller.toggle_play(10_100.0, false).is_empty());

    controller.reset(false);
    assert_eq!(controller.timebase().current_time(), 0.0);
    assert_eq!(controller.toggle_play(11_000.0, false), [Effect::RequestFrame]);
}

#[test]
fn seek_gesture_resumes_only_what_was_playing() {
    let mut controller = PlaybackController::new(song());
    controller.toggle_play(0.0, false);
    controller.begin_seek();
    assert!(!controller.is_playing());
    controller.seek(2.0);
    assert_eq!(controller.end_seek(500.0), [Effect::RequestFrame]);
    assert!(controller.is_playing());

    controller.toggle_play(600.0, false);
    controller.begin_seek();
    assert!(controller.end_seek(700.0).is_empty());
    assert!(!controller.is_playing());
}

#[test]
fn audio_follows_the_transport_only_when_coupled() {
    let mut controller = PlaybackController::new(song());
    assert_eq!(controller.toggle_play(0.0, true), [Effect::RequestFrame, Effect::PlayAudio]);
    assert!(controller.toggle_play(100.0, true).contains(&Effect::PauseAudio));
    controller.toggle_play(200.0, false);
    assert!(!controller.toggle_play(300.0, false).contains(&Effect::PauseAudio));
}

// --- character reveals ---------------------------------------------------------

type Timers = Rc<RefCell<Vec<Option<Box<dyn FnOnce()>>>>>;

#[derive(Default, Clone)]
struct QueueScheduler {
    timers: Timers,
}

struct QueueHandle {
    timers: Timers,
    slot: usize,
}

impl TaskHandle for QueueHandle {
    fn cancel(self) {
        self.timers.borrow_mut()[self.slot] = None;
    }
}

impl Scheduler for QueueScheduler {
    type Handle = QueueHandle;

    fn schedule(&self, _delay_ms: u32, task: Box<dyn FnOnce()>) -> QueueHandle {
        let mut timers = self.timers.borrow_mut();
        timers.push(Some(task));
        QueueHandle { timers: self.timers.clone(), slot: timers.len() - 1 }
    }
}

impl QueueScheduler {
    fn live(&self) -> usize {
        self.timers.borrow().iter().filter(|t| t.is_some()).count()
    }

    fn fire_all(&self) {
        let tasks: Vec<_> = self.timers.borrow_mut().iter_mut().filter_map(Option::take).collect();
        for task in tasks {
            task();
        }
    }
}

#[derive(Clone)]
struct Char {
    line: usize,
    shown_on: Rc<RefCell<Vec<usize>>>,
}

impl CharNode for Char {
    fn reveal(&self, _transition: Option<&str>) {
        self.shown_on.borrow_mut().push(self.line);
    }

    fn conceal(&self) {}
}

#[test]
fn switching_lines_drops_the_previous_lines_reveals() {
    let scheduler = QueueScheduler::default();
    let mut animator = Animator::new(scheduler.clone());
    let registry = AnimationRegistry::default();
    let shown_on = Rc::new(RefCell::new(Vec::new()));
    let chars = |line: usize, n: usize| vec![Char { line, shown_on: shown_on.clone() }; n];

    for name in registry.names() {
        let strategy = registry.get(name).unwrap();
        animator.show(0, &chars(0, 4), strategy, true);
        assert_eq!(scheduler.live(), 4);
        animator.show(1, &chars(1, 3), strategy, true);
        assert_eq!(scheduler.live(), 3, "{name}");
        scheduler.fire_all();
        animator.cancel();
    }
    assert!(shown_on.borrow().iter().all(|&line| line == 1));
}

#[test]
fn paused_lines_are_revealed_at_once() {
    let scheduler = QueueScheduler::default();
    let mut animator = Animator::new(scheduler.clone());
    let registry = AnimationRegistry::default();
    let shown_on = Rc::new(RefCell::new(Vec::new()));
    let chars = vec![Char { line: 2, shown_on: shown_on.clone() }; 5];

    animator.show(2, &chars, registry.get("fadeWave").unwrap(), false);
    assert_eq!(scheduler.live(), 0);
    assert_eq!(shown_on.borrow().len(), 5);
}

#[test]
fn restyling_a_paused_line_leaves_nothing_pending() {
    let scheduler = QueueScheduler::default();
    let mut animator = Animator::new(scheduler.clone());
    let registry = AnimationRegistry::default();
    let shown_on = Rc::new(RefCell::new(Vec::new()));
    let chars = vec![Char { line: 0, shown_on: shown_on.clone() }; 6];

    animator.show(0, &chars, registry.get("typewriter").unwrap(), true);
    assert_eq!(scheduler.live(), 6);

    for name in registry.names() {
        animator.restyle(0, &chars, registry.get(name).unwrap(), false);
        assert_eq!(scheduler.live(), 0, "{name}");
        assert_eq!(animator.pending(), 0, "{name}");
    }
    assert_eq!(shown_on.borrow().len(), 6 * registry.names().count());

    animator.restyle(0, &chars, registry.get("bounce").unwrap(), true);
    assert_eq!(scheduler.live(), 6);
}

// --- layouts -------------------------------------------------------------------

#[test]
fn every_layout_hides_lines_outside_its_window() {
    let layouts = LayoutRegistry::default();
    let names: Vec<_> = layouts.names().collect();
    assert_eq!(names.len(), 4);
    for name in names {
        let arrangement = layouts.get(name).unwrap().arrange(8, 4);
        for (i, line) in arrangement.lines.iter().enumerate() {
            if !line.role.is_visible() {
                assert_eq!(line.style.get("display"), Some("none"), "{name} line {i}");
            }
        }
        assert!(arrangement.visible().any(|i| i == 4));
    }
}

#[test]
fn multiline_shows_neighbours_as_context() {
    let layouts = LayoutRegistry::default();
    let arrangement = layouts.get("multiline").unwrap().arrange(5, 0);
    let roles: Vec<_> = arrangement.lines.iter().map(|l| l.role).collect();
    assert_eq!(roles[0], LineRole::Current);
    assert_eq!(roles[1], LineRole::Next);
    assert!(roles[2..].iter().all(|r| *r == LineRole::Hidden));
}

// --- configuration -------------------------------------------------------------

#[test]
fn preferences_survive_a_reload() {
    let store = MemoryStore::new();
    let settings = Settings::default();
    assert_eq!(config::saved_background(&store, &settings), "bg1");

    let prefs = Preferences {
        animation: Some("bounce".into()),
        layout: None,
        theme: Some("#336699".into()),
    };
    assert!(prefs.save(&store));
    assert!(config::remember_background(&store, "bg4"));

    let loaded = Preferences::load(&store);
    assert_eq!(loaded.animation_or(&settings), "bounce");
    assert_eq!(loaded.layout_or(&settings), "classic");
    assert_eq!(loaded.theme_or(&settings), "#336699");
    assert_eq!(config::saved_background(&store, &settings), "bg4");
}

#[test]
fn unreadable_preferences_fall_back_to_defaults() {
    let store = MemoryStore::new();
    store.set(config::PREFERENCES_KEY, "{not json");
    assert_eq!(Preferences::load(&store), Preferences::default());
}

#[test]
fn settings_accept_partial_json() {
    let settings = Settings::from_optional_json(Some(r#"{"tailSeconds": 2.5, "defaultLayout": "multiline"}"#));
    assert_eq!(settings.tail_seconds, 2.5);
    assert_eq!(settings.default_layout, "multiline");
    assert_eq!(settings.container_id, "particles-js");
    assert_eq!(Settings::from_optional_json(Some("nope")), Settings::default());
}
