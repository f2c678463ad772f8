//! bg2: animated CSS gradient. All motion lives in the stylesheet; this side
//! only feeds it colour variables and toggles classes.

use futures::future::{FutureExt, LocalBoxFuture};
use log::{info, warn};
use web_sys::HtmlElement;

use super::color::{DEFAULT_THEME, Rgb, css_variables};
use super::dom::{Dom, div, init_error};
use super::{Background, option_number};
use crate::error::{DomError, HostError};

const BASE_CLASS: &str = "bg2-gradient-container";

/// Class list for a named gradient style (`linear`, `radial`, `conic`, ...).
pub fn gradient_class(style: &str) -> String {
    let style = style.trim();
    if style.is_empty() {
        BASE_CLASS.to_owned()
    } else {
        format!("{BASE_CLASS} bg2-{style}")
    }
}

/// `animation-duration` value for a speed in seconds per cycle.
pub fn animation_duration(seconds: f64) -> String {
    format!("{seconds}s")
}

pub struct CssGradient {
    element: Option<HtmlElement>,
    theme: Rgb,
    class: String,
    duration: Option<String>,
    paused: bool,
}

impl Default for CssGradient {
    fn default() -> Self {
        Self {
            element: None,
            theme: DEFAULT_THEME,
            class: BASE_CLASS.to_owned(),
            duration: None,
            paused: false,
        }
    }
}

impl CssGradient {
    fn apply_colors(&self, el: &HtmlElement) -> Result<(), DomError> {
        let style = el.style();
        for (name, value) in css_variables("bg2", self.theme) {
            style.set_property(&name, &value)?;
        }
        Ok(())
    }

    fn apply_play_state(&self, el: &HtmlElement) -> Result<(), DomError> {
        let state = if self.paused { "paused" } else { "running" };
        el.style().set_property("animation-play-state", state)?;
        Ok(())
    }

    fn apply_duration(&self, el: &HtmlElement) -> Result<(), DomError> {
        if let Some(duration) = &self.duration {
            el.style().set_property("animation-duration", duration)?;
        }
        Ok(())
    }

    fn refresh(&self, what: &str, apply: impl FnOnce(&Self, &HtmlElement) -> Result<(), DomError>) {
        if let Some(el) = &self.element {
            if let Err(err) = apply(self, el) {
                warn!("bg2: failed to update {what}: {err}");
            }
        }
    }
}

impl Background<Dom> for CssGradient {
    fn init<'a>(&'a mut self, container: &'a HtmlElement) -> LocalBoxFuture<'a, Result<(), HostError>> {
        async move {
            info!("initializing CSS gradient");
            let fail = init_error("bg2");
            let el = div("bg2-gradient", &self.class).map_err(&fail)?;
            self.apply_colors(&el).map_err(&fail)?;
            self.apply_duration(&el).map_err(&fail)?;
            self.apply_play_state(&el).map_err(&fail)?;
            container.append_child(&el).map_err(|e| fail(e.into()))?;
            self.element = Some(el);
            Ok(())
        }
        .boxed_local()
    }

    fn destroy(&mut self) -> LocalBoxFuture<'_, ()> {
        async move {
            if let Some(el) = self.element.take() {
                el.remove();
            }
            info!("CSS gradient destroyed");
        }
        .boxed_local()
    }

    fn update_theme(&mut self, color: Rgb) {
        self.theme = color;
        self.refresh("colours", Self::apply_colors);
    }

    fn pause(&mut self) {
        self.paused = true;
        self.refresh("play state", Self::apply_play_state);
    }

    fn play(&mut self) {
        self.paused = false;
        self.refresh("play state", Self::apply_play_state);
    }

    fn configure(&mut self, key: &str, value: &str) -> bool {
        match key {
            "gradient-style" if !value.trim().is_empty() => {
                self.class = gradient_class(value);
                if let Some(el) = &self.element {
                    el.set_class_name(&self.class);
                }
                true
            }
            "animation-speed" => match option_number(value) {
                Some(seconds) if seconds > 0.0 => {
                    self.duration = Some(animation_duration(seconds));
                    self.refresh("speed", Self::apply_duration);
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_class() {
        assert_eq!(gradient_class("radial"), "bg2-gradient-container bg2-radial");
        assert_eq!(gradient_class(" conic "), "bg2-gradient-container bg2-conic");
        assert_eq!(gradient_class(""), "bg2-gradient-container");
    }

    #[test]
    fn test_configure_before_init_is_remembered() {
        let mut bg = CssGradient::default();
        assert!(bg.configure("gradient-style", "radial"));
        assert_eq!(bg.class, "bg2-gradient-container bg2-radial");
        assert!(bg.configure("animation-speed", "12.5"));
        assert_eq!(bg.duration.as_deref(), Some("12.5s"));
        assert!(!bg.configure("animation-speed", "0"));
        assert!(!bg.configure("gradient-style", "  "));
        assert!(!bg.configure("blob-count", "4"));
    }

    #[test]
    fn test_pause_without_element() {
        let mut bg = CssGradient::default();
        bg.pause();
        assert!(bg.paused);
        bg.play();
        assert!(!bg.paused);
    }
}
