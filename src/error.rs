//! Error types shared across the crate. Everything converts into a `JsValue`
//! message at the export boundary in `lib.rs`.

use thiserror::Error;
use wasm_bindgen::JsValue;

/// Failure to turn raw LRC text into a playable track.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LyricsError {
    #[error("no timestamped lyric lines found ({skipped} lines skipped)")]
    EmptyParseResult { skipped: usize },
}

/// Failures of the background plugin host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("background '{0}' is not registered")]
    UnknownBackground(String),
    #[error("background container '#{0}' not found")]
    MissingContainer(String),
    #[error("failed to load resource {url}: {reason}")]
    ResourceLoad { url: String, reason: String },
    #[error("background '{id}' failed to initialize: {reason}")]
    Init { id: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("expected a #RRGGBB color, got '{0}'")]
    InvalidHex(String),
}

/// Glue-level DOM failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("required element #{0} is missing")]
    MissingElement(String),
    #[error("{0}")]
    Js(String),
}

/// Failures of the exported page API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("lyric canvas has not been started")]
    NotStarted,
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Color(#[from] ColorError),
    #[error(transparent)]
    Dom(#[from] DomError),
}

impl From<JsValue> for DomError {
    fn from(value: JsValue) -> Self {
        DomError::Js(js_error_text(&value))
    }
}

impl From<LyricsError> for JsValue {
    fn from(err: LyricsError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

impl From<HostError> for JsValue {
    fn from(err: HostError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

impl From<ColorError> for JsValue {
    fn from(err: ColorError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

impl From<DomError> for JsValue {
    fn from(err: DomError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

impl From<AppError> for JsValue {
    fn from(err: AppError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

/// Best-effort text for a thrown JS value (Error objects, strings, anything else).
pub fn js_error_text(value: &JsValue) -> String {
    if let Some(s) = value.as_string() {
        return s;
    }
    js_sys::Reflect::get(value, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", value))
}
