//! Page event wiring: transport buttons, progress bar, preset selects, file
//! inputs, per-background option inputs and keyboard shortcuts.

use wasm_bindgen::JsCast;
use wasm_bindgen::convert::FromWasmAbi;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    Element, Event, EventTarget, File, HtmlElement, HtmlInputElement, HtmlSelectElement, KeyboardEvent, MouseEvent,
};

use super::view::element;
use crate::background::dom::{document, window};
use crate::error::DomError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    TogglePlay,
    SeekBackward,
    SeekForward,
    ToggleFullscreen,
}

/// Map a `KeyboardEvent.code` to a shortcut. Keys typed into form fields are
/// left alone.
pub fn shortcut(code: &str, target_tag: Option<&str>) -> Option<Shortcut> {
    if let Some(tag) = target_tag {
        if ["INPUT", "TEXTAREA", "SELECT"].iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            return None;
        }
    }
    match code {
        "Space" | "KeyK" => Some(Shortcut::TogglePlay),
        "ArrowLeft" => Some(Shortcut::SeekBackward),
        "ArrowRight" => Some(Shortcut::SeekForward),
        "KeyF" => Some(Shortcut::ToggleFullscreen),
        _ => None,
    }
}

/// `F` flips between the fullscreen and classic layouts.
pub fn fullscreen_toggle(current: &str) -> &'static str {
    if current == "fullscreen" { "classic" } else { "fullscreen" }
}

/// Tuning inputs per background; the element id is `{background}-{key}`.
pub const BACKGROUND_OPTIONS: &[(&str, &[&str])] = &[
    ("bg1", &["animation-speed"]),
    ("bg2", &["gradient-style", "animation-speed"]),
    ("bg3", &["visualizer-style", "bar-count", "sensitivity"]),
    ("bg4", &["particle-count", "particle-size", "rotation-speed", "camera-speed", "fog-density"]),
    ("bg5", &["blob-count", "blob-size", "ray-count", "movement-speed"]),
];

fn listen<E>(target: &EventTarget, event: &str, handler: impl FnMut(E) + 'static) -> Result<(), DomError>
where
    E: FromWasmAbi + 'static,
{
    let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(E)>);
    target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}

/// Attach `handler` to `#id` if the page has it.
fn listen_id<E>(id: &str, event: &str, handler: impl FnMut(E) + 'static) -> Result<bool, DomError>
where
    E: FromWasmAbi + 'static,
{
    match element::<EventTarget>(id) {
        Some(target) => listen(&target, event, handler).map(|_| true),
        None => Ok(false),
    }
}

/// `value` of the input or select that fired `event`.
fn event_value(event: &Event) -> Option<String> {
    let target = event.target()?;
    if let Some(input) = target.dyn_ref::<HtmlInputElement>() {
        return Some(input.value());
    }
    target.dyn_ref::<HtmlSelectElement>().map(HtmlSelectElement::value)
}

fn first_file(event: &Event) -> Option<File> {
    event
        .target()?
        .dyn_into::<HtmlInputElement>()
        .ok()?
        .files()?
        .get(0)
}

fn target_tag(event: &Event) -> Option<String> {
    event.target()?.dyn_ref::<Element>().map(Element::tag_name)
}

pub fn wire() -> Result<(), DomError> {
    wire_keyboard()?;
    wire_transport()?;
    wire_progress()?;
    wire_presets()?;
    wire_files()?;
    wire_background_options()?;

    let window = window()?;
    listen(&window, "resize", |_: Event| super::resize())?;
    Ok(())
}

fn wire_keyboard() -> Result<(), DomError> {
    let document = document()?;
    listen(&document, "keydown", |event: KeyboardEvent| {
        let Some(action) = shortcut(&event.code(), target_tag(&event).as_deref()) else { return };
        event.prevent_default();
        match action {
            Shortcut::TogglePlay => {
                super::toggle_play();
            }
            Shortcut::SeekBackward => super::seek_step(-1.0),
            Shortcut::SeekForward => super::seek_step(1.0),
            Shortcut::ToggleFullscreen => super::toggle_fullscreen(),
        }
    })
}

fn wire_transport() -> Result<(), DomError> {
    listen_id("play-pause", "click", |_: Event| {
        super::toggle_play();
    })?;
    listen_id("reset-btn", "click", |_: Event| super::reset())?;
    Ok(())
}

fn wire_progress() -> Result<(), DomError> {
    let Some(progress) = element::<HtmlInputElement>("progress-bar") else { return Ok(()) };
    for event in ["mousedown", "touchstart"] {
        listen(&progress, event, |_: Event| super::begin_seek())?;
    }
    for event in ["mouseup", "touchend"] {
        listen(&progress, event, |_: Event| super::end_seek())?;
    }
    listen(&progress, "input", |event: Event| {
        if let Some(seconds) = event_value(&event).and_then(|v| v.parse::<f64>().ok()) {
            super::schedule_seek(seconds);
        }
    })?;

    let bar = progress.clone();
    listen(&progress, "mousemove", move |event: MouseEvent| {
        let rect = bar.get_bounding_client_rect();
        super::hover_progress(f64::from(event.client_x()) - rect.left(), rect.width());
    })?;
    listen(&progress, "mouseleave", |_: MouseEvent| super::unhover_progress())?;
    Ok(())
}

fn wire_presets() -> Result<(), DomError> {
    for id in ["animation-preset", "animation-preset-detail"] {
        listen_id(id, "change", |event: Event| {
            if let Some(name) = event_value(&event) {
                super::set_animation(&name);
            }
        })?;
    }
    for id in ["layout-mode", "layout-mode-detail"] {
        listen_id(id, "change", |event: Event| {
            if let Some(name) = event_value(&event) {
                super::set_layout(&name);
            }
        })?;
    }
    for id in ["background-style", "background-style-detail"] {
        listen_id(id, "change", |event: Event| {
            if let Some(bg) = event_value(&event) {
                spawn_local(async move {
                    if let Err(err) = super::select_background(&bg).await {
                        log::error!("background switch failed: {err}");
                    }
                });
            }
        })?;
    }
    listen_id("v2-theme-color-picker", "input", |event: Event| {
        if let Some(hex) = event_value(&event) {
            if let Err(err) = super::set_theme_color(&hex) {
                log::warn!("{err}");
            }
        }
    })?;
    Ok(())
}

fn wire_files() -> Result<(), DomError> {
    listen_id("file-input", "change", |event: Event| {
        if let Some(file) = first_file(&event) {
            spawn_local(super::load_lyrics_file(file));
        }
    })?;
    listen_id("audio-file", "change", |event: Event| {
        if let Some(file) = first_file(&event) {
            if let Err(err) = super::attach_audio_file(&file) {
                log::error!("audio file could not be attached: {err}");
            }
        }
    })?;
    Ok(())
}

fn wire_background_options() -> Result<(), DomError> {
    for (background, keys) in BACKGROUND_OPTIONS {
        for key in keys.iter() {
            let id = format!("{background}-{key}");
            let Some(input) = element::<HtmlElement>(&id) else { continue };
            let event = if input.dyn_ref::<HtmlSelectElement>().is_some() { "change" } else { "input" };
            listen(&input, event, move |event: Event| {
                if let Some(value) = event_value(&event) {
                    super::configure_background_for(background, key, &value);
                }
            })?;
        }
    }
    Ok(())
}
