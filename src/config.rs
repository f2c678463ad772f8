//! Runtime settings supplied by the page and preferences persisted in browser storage.

use std::cell::RefCell;
use std::collections::HashMap;

use log::{LevelFilter, warn};
use serde::{Deserialize, Serialize};

use crate::logging;

/// Storage key holding the selected background id as a plain string.
pub const BACKGROUND_KEY: &str = "lyricAnimatorV2Background";
/// Storage key holding the remaining preferences as JSON.
pub const PREFERENCES_KEY: &str = "lyricAnimatorV2Preferences";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Element that background renderers attach to.
    pub container_id: String,
    pub lyrics_container_id: String,
    /// Directory the background stylesheets are served from.
    pub style_root: String,
    /// Seconds of silence appended after the last lyric line.
    pub tail_seconds: f64,
    pub seek_step_seconds: f64,
    pub seek_debounce_ms: u32,
    pub log_level: String,
    pub default_background: String,
    pub default_animation: String,
    pub default_layout: String,
    pub default_theme: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            container_id: "particles-js".into(),
            lyrics_container_id: "lyrics-container".into(),
            style_root: "/static/css/backgrounds".into(),
            tail_seconds: 5.0,
            seek_step_seconds: 5.0,
            seek_debounce_ms: 50,
            log_level: "info".into(),
            default_background: "bg1".into(),
            default_animation: "typewriter".into(),
            default_layout: "classic".into(),
            default_theme: "#ff8e53".into(),
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Settings from an optional JSON blob; malformed input is logged and ignored.
    pub fn from_optional_json(json: Option<&str>) -> Self {
        match json.map(str::trim).filter(|s| !s.is_empty()) {
            None => Self::default(),
            Some(raw) => Self::from_json(raw).unwrap_or_else(|err| {
                warn!("ignoring malformed settings ({err}); using defaults");
                Self::default()
            }),
        }
    }

    pub fn level_filter(&self) -> LevelFilter {
        logging::parse_level(&self.log_level)
    }
}

/// Minimal string key/value storage (browser `localStorage` or in-memory).
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> bool;
}

/// `window.localStorage`.
pub struct BrowserStorage(web_sys::Storage);

impl BrowserStorage {
    pub fn local() -> Option<Self> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok().flatten())
            .map(BrowserStorage)
    }
}

impl KeyValueStore for BrowserStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        self.0.set_item(key, value).is_ok()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        self.entries.borrow_mut().insert(key.to_owned(), value.to_owned());
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub animation: Option<String>,
    pub layout: Option<String>,
    pub theme: Option<String>,
}

impl Preferences {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let Some(raw) = store.get(PREFERENCES_KEY) else {
            return Self::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!("discarding unreadable preferences: {err}");
            Self::default()
        })
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> bool {
        match serde_json::to_string(self) {
            Ok(json) => store.set(PREFERENCES_KEY, &json),
            Err(err) => {
                warn!("could not serialize preferences: {err}");
                false
            }
        }
    }

    pub fn animation_or<'a>(&'a self, settings: &'a Settings) -> &'a str {
        self.animation.as_deref().unwrap_or(&settings.default_animation)
    }

    pub fn layout_or<'a>(&'a self, settings: &'a Settings) -> &'a str {
        self.layout.as_deref().unwrap_or(&settings.default_layout)
    }

    pub fn theme_or<'a>(&'a self, settings: &'a Settings) -> &'a str {
        self.theme.as_deref().unwrap_or(&settings.default_theme)
    }
}

pub fn saved_background(store: &dyn KeyValueStore, settings: &Settings) -> String {
    store
        .get(BACKGROUND_KEY)
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| settings.default_background.clone())
}

pub fn remember_background(store: &dyn KeyValueStore, id: &str) -> bool {
    store.set(BACKGROUND_KEY, id)
}
