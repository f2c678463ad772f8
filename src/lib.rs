//! Lyric Canvas core crate.
//!
//! Karaoke-style lyric playback for the browser: LRC parsing, a frame-driven
//! timebase, per-character reveal animations, pluggable line layouts and a host for
//! five canvas / WebGL / Web Audio backgrounds. Everything below `app` is plain Rust
//! and runs natively in tests; `app` is the page glue exported to JS here.

use wasm_bindgen::prelude::*;

pub mod animation;
pub mod background;
pub mod config;
pub mod error;
pub mod layout;
pub mod logging;
pub mod lyrics;
pub mod playback;
pub mod rng;
pub mod tasks;

mod app;

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

// -----------------------------------------------------------------------------
// Page API
// -----------------------------------------------------------------------------

/// Wire the page and restore saved preferences. `settings` is an optional JSON
/// object overriding [`config::Settings`] fields.
#[wasm_bindgen]
pub fn start(settings: Option<String>) -> Result<(), JsValue> {
    app::start(settings.as_deref()).map_err(Into::into)
}

/// Parse LRC text and show it. Returns the number of lines; 0 leaves a message in
/// `#status` instead of throwing.
#[wasm_bindgen(js_name = loadLyrics)]
pub fn load_lyrics(text: &str) -> usize {
    app::load_lyrics(text)
}

/// Returns whether playback is running afterwards.
#[wasm_bindgen(js_name = togglePlay)]
pub fn toggle_play() -> bool {
    app::toggle_play()
}

#[wasm_bindgen]
pub fn seek(seconds: f64) {
    app::seek(seconds);
}

#[wasm_bindgen]
pub fn reset() {
    app::reset();
}

#[wasm_bindgen(js_name = setAnimation)]
pub fn set_animation(name: &str) -> bool {
    app::set_animation(name)
}

#[wasm_bindgen(js_name = setLayout)]
pub fn set_layout(name: &str) -> bool {
    app::set_layout(name)
}

#[wasm_bindgen(js_name = selectBackground)]
pub async fn select_background(id: String) -> Result<(), JsValue> {
    app::select_background(&id).await.map_err(Into::into)
}

#[wasm_bindgen(js_name = setThemeColor)]
pub fn set_theme_color(hex: &str) -> Result<(), JsValue> {
    app::set_theme_color(hex).map_err(Into::into)
}

/// Hand the song's audio element to the backgrounds.
#[wasm_bindgen(js_name = attachAudio)]
pub fn attach_audio(audio: web_sys::HtmlAudioElement) {
    app::attach_audio(audio);
}

/// Background catalogue as JSON: `[{"id":"bg1","name":"Mesh Gradient"}, ...]`.
#[wasm_bindgen]
pub fn backgrounds() -> Result<String, JsValue> {
    serde_json::to_string(&app::backgrounds()).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen(js_name = currentBackground)]
pub fn current_background() -> Option<String> {
    app::current_background()
}

/// Tune the active background. Returns `false` for unknown keys or unusable values.
#[wasm_bindgen(js_name = configureBackground)]
pub fn configure_background(key: &str, value: &str) -> bool {
    app::configure_background(key, value)
}

/// Stop the active background's animation loop.
#[wasm_bindgen(js_name = pauseBackground)]
pub fn pause_background() {
    app::pause_background();
}

#[wasm_bindgen(js_name = playBackground)]
pub fn play_background() {
    app::play_background();
}
