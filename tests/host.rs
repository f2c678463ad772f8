// Background host lifecycle driven through the public plugin traits with
// in-memory surfaces; no browser needed.

use std::cell::RefCell;
use std::rc::Rc;

use futures::executor::block_on;
use futures::future::{FutureExt, LocalBoxFuture, ready};
use lyric_canvas::background::color::Rgb;
use lyric_canvas::background::{
    Background, BackgroundDescriptor, BackgroundHost, PluginState, ResourceFetcher, ResourceKind, Surface,
};
use lyric_canvas::error::HostError;

type Journal = Rc<RefCell<Vec<String>>>;
/// Elements that already feed a source node, shared by every renderer instance.
type Tapped = Rc<RefCell<Vec<&'static str>>>;

#[derive(Clone, Default)]
struct Stage {
    present: bool,
}

impl Surface for Stage {
    type Container = &'static str;
    type Audio = &'static str;

    fn locate(&self, container_id: &str) -> Option<&'static str> {
        (self.present && container_id == "stage").then_some("stage")
    }

    fn clear(&self, _container: &&'static str) {}
}

struct NoFetch;

impl ResourceFetcher for NoFetch {
    fn fetch(&self, _kind: ResourceKind, _url: &str) -> LocalBoxFuture<'static, Result<(), String>> {
        ready(Ok(())).boxed_local()
    }
}

struct Recorder {
    id: &'static str,
    audio: bool,
    journal: Journal,
    /// `Some` for a renderer that opens a new source per connection, which
    /// works only once per element.
    tapped: Option<Tapped>,
}

impl Recorder {
    fn note(&self, what: String) {
        self.journal.borrow_mut().push(format!("{} {what}", self.id));
    }
}

impl Background<Stage> for Recorder {
    fn init<'a>(&'a mut self, _container: &'a &'static str) -> LocalBoxFuture<'a, Result<(), HostError>> {
        async move {
            self.note("init".into());
            Ok(())
        }
        .boxed_local()
    }

    fn destroy(&mut self) -> LocalBoxFuture<'_, ()> {
        async move { self.note("destroy".into()) }.boxed_local()
    }

    fn update_theme(&mut self, color: Rgb) {
        self.note(format!("theme {}", color.css()));
    }

    fn pause(&mut self) {
        self.note("pause".into());
    }

    fn play(&mut self) {
        self.note("play".into());
    }

    fn supports_audio(&self) -> bool {
        self.audio
    }

    fn set_audio(&mut self, audio: &&'static str) -> bool {
        self.note(format!("audio {audio}"));
        let Some(tapped) = &self.tapped else { return true };
        let mut tapped = tapped.borrow_mut();
        if tapped.contains(audio) {
            return false;
        }
        tapped.push(*audio);
        true
    }

    fn start_rendering(&mut self) {
        self.note("rendering".into());
    }

    fn configure(&mut self, key: &str, value: &str) -> bool {
        key == "speed" && value.parse::<f64>().is_ok()
    }
}

fn entry(id: &'static str, audio: bool, journal: &Journal) -> BackgroundDescriptor<Stage> {
    recorder_entry(id, audio, None, journal)
}

fn recorder_entry(
    id: &'static str,
    audio: bool,
    tapped: Option<Tapped>,
    journal: &Journal,
) -> BackgroundDescriptor<Stage> {
    let journal = journal.clone();
    BackgroundDescriptor {
        id,
        name: id,
        scripts: Vec::new(),
        styles: Vec::new(),
        factory: Rc::new(move || {
            let tapped = tapped.clone();
            Box::new(Recorder { id, audio, journal: journal.clone(), tapped }) as Box<dyn Background<Stage>>
        }),
    }
}

fn host(present: bool) -> (BackgroundHost<Stage, NoFetch>, Journal) {
    let journal = Journal::default();
    let catalogue = vec![entry("plain", false, &journal), entry("viz", true, &journal)];
    (BackgroundHost::new(Stage { present }, NoFetch, "stage", catalogue), journal)
}

#[test]
fn theme_and_audio_are_replayed_on_activation() {
    let (host, journal) = host(true);
    host.update_theme(Rgb::new(1, 2, 3));
    block_on(host.load("plain")).unwrap();
    host.set_audio("song.mp3");
    assert!(!host.has_audio_transport());

    block_on(host.load("viz")).unwrap();
    assert!(host.has_audio_transport());
    let log = journal.borrow().clone();
    assert_eq!(
        log,
        [
            "plain init",
            "plain theme rgb(1, 2, 3)",
            "plain destroy",
            "viz init",
            "viz theme rgb(1, 2, 3)",
            "viz audio song.mp3",
        ]
    );
}

#[test]
fn reactivating_with_the_same_element_reports_the_real_wiring() {
    let journal = Journal::default();
    let catalogue = vec![
        entry("plain", false, &journal),
        entry("viz", true, &journal),
        recorder_entry("once", true, Some(Tapped::default()), &journal),
    ];
    let host = BackgroundHost::new(Stage { present: true }, NoFetch, "stage", catalogue);
    host.set_audio("song.mp3");

    // keeps its source across activations
    block_on(host.load("viz")).unwrap();
    assert!(host.has_audio_transport());
    block_on(host.load("plain")).unwrap();
    assert!(!host.has_audio_transport());
    block_on(host.load("viz")).unwrap();
    assert!(host.has_audio_transport());

    // opens a new source each time
    block_on(host.load("once")).unwrap();
    assert!(host.has_audio_transport());
    block_on(host.load("plain")).unwrap();
    block_on(host.load("once")).unwrap();
    assert!(!host.has_audio_transport());
    assert_eq!(journal.borrow().iter().filter(|l| *l == "once audio song.mp3").count(), 2);
}

#[test]
fn rendering_waits_for_lyrics_and_audio() {
    let (host, journal) = host(true);
    block_on(host.load("viz")).unwrap();
    host.mark_lyrics_loaded();
    assert!(!journal.borrow().iter().any(|l| l == "viz rendering"));
    host.mark_audio_loaded();
    assert!(host.readiness().is_ready());
    assert!(journal.borrow().iter().any(|l| l == "viz rendering"));
}

#[test]
fn pause_and_play_reach_the_active_background() {
    let (host, journal) = host(true);
    host.pause();
    assert!(journal.borrow().is_empty());
    block_on(host.load("plain")).unwrap();
    host.pause();
    host.play();
    let log = journal.borrow().clone();
    assert_eq!(log[log.len() - 2..], ["plain pause", "plain play"]);
}

#[test]
fn missing_container_is_reported() {
    let (host, _) = host(false);
    let err = block_on(host.load("plain")).unwrap_err();
    assert_eq!(err, HostError::MissingContainer("stage".into()));
    assert_eq!(host.current(), None);
    assert_eq!(host.state("plain"), PluginState::Unloaded);
}

#[test]
fn options_reach_the_active_background_only() {
    let (host, _) = host(true);
    assert!(!host.configure("speed", "2"));
    block_on(host.load("plain")).unwrap();
    assert!(host.configure("speed", "2"));
    assert!(!host.configure("speed", "fast"));
    assert!(!host.configure("colour", "red"));
}

#[test]
fn catalogue_lists_registration_order() {
    let (host, _) = host(true);
    let json = serde_json::to_string(&host.backgrounds()).unwrap();
    assert_eq!(json, r#"[{"id":"plain","name":"plain"},{"id":"viz","name":"viz"}]"#);
}
