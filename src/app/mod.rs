//! Browser glue: owns the page-wide state, runs the frame loop and carries out the
//! playback controller's effects against the DOM and the background host.

pub mod input;
pub mod view;

use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use log::{LevelFilter, error, info, warn};
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{File, HtmlAudioElement, HtmlElement, Url};

use crate::animation::{AnimationRegistry, Animator};
use crate::background::color::{DEFAULT_THEME, Rgb};
use crate::background::dom::{self, Dom, DomFetcher};
use crate::background::frame::{FrameLoop, now_ms};
use crate::background::{BackgroundHost, CatalogueEntry};
use crate::config::{
    self, BrowserStorage, KeyValueStore, MemoryStore, Preferences, Settings, remember_background,
};
use crate::error::{AppError, ColorError, DomError, js_error_text};
use crate::layout::LayoutRegistry;
use crate::logging;
use crate::lyrics::LyricTrack;
use crate::playback::{Effect, PlaybackController, hover_time};
use crate::tasks::TimeoutScheduler;
use view::{Controls, LyricView, STATUS_FINISHED, STATUS_PARSE_FAILED};

const ANIMATION_SELECTS: &[&str] = &["animation-preset", "animation-preset-detail"];
const LAYOUT_SELECTS: &[&str] = &["layout-mode", "layout-mode-detail"];
const BACKGROUND_SELECTS: &[&str] = &["background-style", "background-style-detail"];
const THEME_PICKER: &[&str] = &["v2-theme-color-picker"];

thread_local! {
    static APP: RefCell<Option<App>> = const { RefCell::new(None) };
}

/// Run `f` against the started app. `None` before `start` or when called from
/// inside another app callback.
fn with_app<R>(f: impl FnOnce(&mut App) -> R) -> Option<R> {
    APP.with(|cell| match cell.try_borrow_mut() {
        Ok(mut app) => app.as_mut().map(f),
        Err(_) => {
            warn!("nested app access ignored");
            None
        }
    })
}

struct App {
    settings: Settings,
    prefs: Preferences,
    store: Box<dyn KeyValueStore>,
    host: Rc<BackgroundHost<Dom, DomFetcher>>,
    animations: AnimationRegistry,
    layouts: LayoutRegistry,
    animation: &'static str,
    layout: &'static str,
    view: Option<LyricView>,
    controller: Option<PlaybackController>,
    animator: Animator<TimeoutScheduler>,
    controls: Controls,
    frames: FrameLoop,
    seek_timer: Option<Timeout>,
}

impl App {
    fn playing(&self) -> bool {
        self.controller.as_ref().is_some_and(PlaybackController::is_playing)
    }

    fn save_prefs(&self) {
        if !self.prefs.save(self.store.as_ref()) {
            warn!("preferences not saved");
        }
    }

    /// Carry out `effects`. Returns whether another frame was requested.
    fn run(&mut self, effects: Vec<Effect>) -> bool {
        let mut next_frame = false;
        for effect in effects {
            match effect {
                Effect::RequestFrame => next_frame = true,
                Effect::CancelReveals => {
                    self.animator.cancel();
                }
                Effect::Render => self.render(),
                Effect::PlayAudio => self.host.play_audio(),
                Effect::PauseAudio => self.host.pause_audio(),
                Effect::Finished => self.controls.set_status(STATUS_FINISHED),
            }
        }
        next_frame
    }

    /// `run` outside the frame loop: starts or stops it and syncs the play button.
    fn apply(&mut self, effects: Vec<Effect>) {
        if self.run(effects) {
            self.frames.start();
        } else if !self.playing() {
            self.frames.stop();
        }
        self.controls.set_playing(self.playing());
    }

    fn on_frame(&mut self, now: f64) -> bool {
        let Some(controller) = self.controller.as_mut() else { return false };
        let effects = controller.frame(now);
        let again = self.run(effects);
        if !again {
            self.controls.set_playing(false);
        }
        again
    }

    fn render(&mut self) {
        let (Some(view), Some(controller)) = (self.view.as_mut(), self.controller.as_ref()) else { return };
        let Some(layout) = self.layouts.get(self.layout) else { return };
        let index = controller.display_index();
        let playing = controller.is_playing();

        let arrangement = layout.arrange(controller.track().len(), index);
        match view.arrange(&arrangement, index, self.layout) {
            Ok(true) if playing && layout.follows_current() => view.scroll_to(index),
            Ok(_) => {}
            Err(err) => warn!("lyric layout failed: {err}"),
        }
        if let Some(strategy) = self.animations.get(self.animation) {
            self.animator.show(index, view.chars(index), strategy, playing);
        }
        let timebase = controller.timebase();
        self.controls.update_clock(timebase.current_time(), timebase.total_time());
    }

    fn load_lyrics(&mut self, text: &str) -> usize {
        let track = match LyricTrack::parse(text, self.settings.tail_seconds) {
            Ok(track) => track,
            Err(err) => {
                error!("{err}");
                self.controls.set_status(STATUS_PARSE_FAILED);
                return 0;
            }
        };
        let Some(container) = view::element::<HtmlElement>(&self.settings.lyrics_container_id) else {
            let err = DomError::MissingElement(self.settings.lyrics_container_id.clone());
            error!("{err}");
            self.controls.set_status(&err.to_string());
            return 0;
        };

        if self.playing() && self.host.has_audio_transport() {
            self.host.pause_audio();
        }
        self.frames.stop();
        self.animator.cancel();

        let view = match LyricView::build(container, &track) {
            Ok(view) => view,
            Err(err) => {
                error!("could not build lyric display: {err}");
                return 0;
            }
        };
        let count = track.len();
        let total = track.total_time();
        self.view = Some(view);
        self.controller = Some(PlaybackController::new(track));

        if let Err(err) = self.controls.show(total) {
            warn!("{err}");
        }
        self.controls.set_status("");
        self.host.mark_lyrics_loaded();
        self.render();
        info!("{count} lyric lines ready, {total:.1}s");
        count
    }

    fn toggle_play(&mut self) -> bool {
        let coupled = self.host.has_audio_transport();
        let Some(controller) = self.controller.as_mut() else { return false };
        let effects = controller.toggle_play(now_ms(), coupled);
        self.apply(effects);
        self.playing()
    }

    fn seek(&mut self, seconds: f64) {
        let Some(controller) = self.controller.as_mut() else { return };
        let effects = controller.seek(seconds);
        self.apply(effects);
    }

    fn seek_by(&mut self, delta: f64) {
        let Some(controller) = self.controller.as_mut() else { return };
        let effects = controller.seek_by(delta);
        self.apply(effects);
    }

    fn begin_seek(&mut self) {
        let coupled = self.host.has_audio_transport();
        let Some(controller) = self.controller.as_mut() else { return };
        let was_playing = controller.is_playing();
        let effects = controller.begin_seek();
        if was_playing && coupled {
            self.host.pause_audio();
        }
        self.apply(effects);
    }

    fn end_seek(&mut self) {
        let coupled = self.host.has_audio_transport();
        let Some(controller) = self.controller.as_mut() else { return };
        let effects = controller.end_seek(now_ms());
        if effects.contains(&Effect::RequestFrame) && coupled {
            self.host.play_audio();
        }
        self.apply(effects);
    }

    fn reset(&mut self) {
        let coupled = self.host.has_audio_transport();
        let Some(controller) = self.controller.as_mut() else { return };
        let effects = controller.reset(coupled);
        self.apply(effects);
        self.controls.set_status("");
    }

    fn set_animation(&mut self, name: &str) -> bool {
        let Some(strategy) = self.animations.get(name) else {
            warn!("unknown animation '{name}'");
            return false;
        };
        self.animation = strategy.name();
        self.prefs.animation = Some(self.animation.to_owned());
        self.save_prefs();

        if let (Some(view), Some(controller)) = (self.view.as_ref(), self.controller.as_ref()) {
            let index = controller.display_index();
            self.animator.restyle(index, view.chars(index), strategy, controller.is_playing());
        }
        view::sync_control(ANIMATION_SELECTS, self.animation);
        true
    }

    fn set_layout(&mut self, name: &str) -> bool {
        let Some(layout) = self.layouts.get(name) else {
            warn!("unknown layout '{name}'");
            return false;
        };
        self.layout = layout.name();
        self.prefs.layout = Some(self.layout.to_owned());
        self.save_prefs();
        if let Some(view) = self.view.as_mut() {
            view.invalidate();
        }
        self.render();
        view::sync_control(LAYOUT_SELECTS, self.layout);
        true
    }

    fn set_theme_color(&mut self, hex: &str) -> Result<(), ColorError> {
        let color = Rgb::from_hex(hex)?;
        self.host.update_theme(color);
        self.prefs.theme = Some(hex.to_owned());
        self.save_prefs();
        Ok(())
    }

    fn attach_audio(&mut self, audio: HtmlAudioElement) {
        self.host.set_audio(audio);
        self.host.mark_audio_loaded();
    }

    /// A background switch completed.
    fn background_selected(&mut self, id: &str) {
        if !remember_background(self.store.as_ref(), id) {
            warn!("background choice not saved");
        }
        if let Err(err) = view::show_background_controls(id) {
            warn!("{err}");
        }
        view::sync_control(BACKGROUND_SELECTS, id);
    }

    fn hover_progress(&mut self, offset_x: f64, width: f64) {
        let Some(controller) = self.controller.as_ref() else { return };
        let time = hover_time(offset_x, width, controller.timebase().total_time());
        if let Err(err) = self.controls.hover(offset_x, time) {
            warn!("{err}");
        }
    }
}

/// Build the app from the page, wire its controls and restore the saved background.
pub fn start(settings_json: Option<&str>) -> Result<(), AppError> {
    logging::init(LevelFilter::Info);
    if APP.with(|cell| cell.borrow().is_some()) {
        warn!("lyric canvas already started");
        return Ok(());
    }
    let settings = Settings::from_optional_json(settings_json);
    logging::init(settings.level_filter());

    let store: Box<dyn KeyValueStore> = match BrowserStorage::local() {
        Some(storage) => Box::new(storage),
        None => {
            warn!("localStorage unavailable; preferences last for this page only");
            Box::new(MemoryStore::new())
        }
    };
    let prefs = Preferences::load(store.as_ref());

    let animations = AnimationRegistry::default();
    let layouts = LayoutRegistry::default();
    let animation = animations
        .get(prefs.animation_or(&settings))
        .or_else(|| animations.get(&settings.default_animation))
        .map_or("typewriter", |a| a.name());
    let layout = layouts
        .get(prefs.layout_or(&settings))
        .or_else(|| layouts.get(&settings.default_layout))
        .map_or("classic", |l| l.name());
    let theme = Rgb::from_hex(prefs.theme_or(&settings)).unwrap_or_else(|err| {
        warn!("{err}; using the default theme");
        DEFAULT_THEME
    });

    let host = Rc::new(BackgroundHost::new(
        Dom,
        DomFetcher,
        settings.container_id.clone(),
        dom::catalogue(&settings.style_root),
    ));
    host.update_theme(theme);

    let background = config::saved_background(store.as_ref(), &settings);
    let theme_hex = prefs.theme_or(&settings).to_owned();
    let app = App {
        settings,
        prefs,
        store,
        host,
        animations,
        layouts,
        animation,
        layout,
        view: None,
        controller: None,
        animator: Animator::new(TimeoutScheduler),
        controls: Controls::locate(),
        frames: FrameLoop::new(|now| with_app(|app| app.on_frame(now)).unwrap_or(false)),
        seek_timer: None,
    };
    APP.with(|cell| cell.replace(Some(app)));

    input::wire()?;
    view::sync_control(ANIMATION_SELECTS, animation);
    view::sync_control(LAYOUT_SELECTS, layout);
    view::sync_control(THEME_PICKER, &theme_hex);
    view::sync_control(BACKGROUND_SELECTS, &background);
    view::show_background_controls(&background)?;

    info!("lyric canvas started (animation {animation}, layout {layout}, background {background})");
    spawn_local(async move {
        if let Err(err) = select_background(&background).await {
            error!("could not restore background {background}: {err}");
        }
    });
    Ok(())
}

/// Parse and display `text`. Returns the number of lines, 0 when nothing parsed.
pub fn load_lyrics(text: &str) -> usize {
    with_app(|app| app.load_lyrics(text)).unwrap_or(0)
}

pub(crate) async fn load_lyrics_file(file: File) {
    let text = match JsFuture::from(file.text()).await {
        Ok(text) => text.as_string().unwrap_or_default(),
        Err(err) => {
            error!("could not read {}: {}", file.name(), js_error_text(&err));
            return;
        }
    };
    let name = file.name();
    if load_lyrics(&text) > 0 {
        view::show_title(view::title_from_file_name(&name));
    }
}

pub fn toggle_play() -> bool {
    with_app(App::toggle_play).unwrap_or(false)
}

pub fn seek(seconds: f64) {
    with_app(|app| app.seek(seconds));
}

pub(crate) fn seek_step(direction: f64) {
    with_app(|app| {
        let step = app.settings.seek_step_seconds;
        app.seek_by(direction * step);
    });
}

/// Debounced seek from the progress bar.
pub(crate) fn schedule_seek(seconds: f64) {
    with_app(|app| {
        let timer = Timeout::new(app.settings.seek_debounce_ms, move || seek(seconds));
        // Replacing the previous timer cancels it.
        app.seek_timer = Some(timer);
    });
}

pub(crate) fn begin_seek() {
    with_app(App::begin_seek);
}

pub(crate) fn end_seek() {
    with_app(App::end_seek);
}

pub fn reset() {
    with_app(App::reset);
}

pub fn set_animation(name: &str) -> bool {
    with_app(|app| app.set_animation(name)).unwrap_or(false)
}

pub fn set_layout(name: &str) -> bool {
    with_app(|app| app.set_layout(name)).unwrap_or(false)
}

pub(crate) fn toggle_fullscreen() {
    with_app(|app| {
        let next = input::fullscreen_toggle(app.layout);
        app.set_layout(next);
    });
}

/// Switch the background. Superseded requests resolve without switching.
pub async fn select_background(id: &str) -> Result<(), AppError> {
    let host = with_app(|app| app.host.clone()).ok_or(AppError::NotStarted)?;
    host.load(id).await?;
    if let Some(current) = host.current().filter(|current| *current == id) {
        with_app(|app| app.background_selected(current));
    }
    Ok(())
}

pub fn set_theme_color(hex: &str) -> Result<(), AppError> {
    with_app(|app| app.set_theme_color(hex))
        .ok_or(AppError::NotStarted)?
        .map_err(AppError::from)
}

pub fn attach_audio(audio: HtmlAudioElement) {
    with_app(|app| app.attach_audio(audio));
}

pub(crate) fn attach_audio_file(file: &File) -> Result<(), DomError> {
    let url = Url::create_object_url_with_blob(file)?;
    let audio = HtmlAudioElement::new_with_src(&url)?;
    info!("audio file {} attached", file.name());
    attach_audio(audio);
    Ok(())
}

pub fn backgrounds() -> Vec<CatalogueEntry> {
    with_app(|app| app.host.backgrounds()).unwrap_or_default()
}

pub fn current_background() -> Option<String> {
    with_app(|app| app.host.current().map(str::to_owned)).flatten()
}

pub fn configure_background(key: &str, value: &str) -> bool {
    with_app(|app| app.host.configure(key, value)).unwrap_or(false)
}

/// Freeze the active background's animation.
pub fn pause_background() {
    with_app(|app| app.host.pause());
}

pub fn play_background() {
    with_app(|app| app.host.play());
}

/// Option input of `background` changed; ignored unless that background is active.
pub(crate) fn configure_background_for(background: &str, key: &str, value: &str) {
    with_app(|app| {
        if app.host.current() == Some(background) {
            app.host.configure(key, value);
        }
    });
}

pub(crate) fn resize() {
    with_app(|app| app.host.resize());
}

pub(crate) fn hover_progress(offset_x: f64, width: f64) {
    with_app(|app| app.hover_progress(offset_x, width));
}

pub(crate) fn unhover_progress() {
    with_app(|app| app.controls.unhover());
}
