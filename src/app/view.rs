//! Lyric display and transport controls in the page.

use wasm_bindgen::JsCast;
use web_sys::{
    Document, Element, HtmlElement, HtmlInputElement, HtmlSelectElement, ScrollBehavior, ScrollIntoViewOptions,
    ScrollLogicalPosition,
};

use crate::animation::CharNode;
use crate::background::dom::document;
use crate::error::DomError;
use crate::layout::{Arrangement, LineRole, StyleSet};
use crate::lyrics::LyricTrack;
use crate::playback::format_time;

pub const STATUS_PARSE_FAILED: &str = "Upload a valid LRC file to continue";
pub const STATUS_FINISHED: &str = "Song complete! Reset to replay.";

/// Look up `#id` as a concrete element type.
pub fn element<T: JsCast>(id: &str) -> Option<T> {
    document().ok()?.get_element_by_id(id)?.dyn_into().ok()
}

fn create<T: JsCast>(doc: &Document, tag: &str) -> Result<T, DomError> {
    doc.create_element(tag)?
        .dyn_into()
        .map_err(|_| DomError::Js(format!("<{tag}> has an unexpected type")))
}

/// Apply a [`StyleSet`]: empty values remove the property.
pub fn apply_style(el: &HtmlElement, styles: &StyleSet) -> Result<(), DomError> {
    let style = el.style();
    for (prop, value) in styles.entries() {
        if value.is_empty() {
            style.remove_property(prop)?;
        } else {
            style.set_property(prop, value)?;
        }
    }
    Ok(())
}

/// Classes to add and to remove for a line in `role`.
pub fn line_classes(role: LineRole) -> (&'static [&'static str], &'static [&'static str]) {
    match role {
        LineRole::Current => (&["current"], &["fade-out", "multiline-context"]),
        LineRole::Previous | LineRole::Next => (&["multiline-context"], &["current", "fade-out"]),
        LineRole::Hidden => (&["fade-out"], &["current", "multiline-context"]),
    }
}

/// Text, `aria-label` and `aria-pressed` of the play button.
pub fn play_button_state(playing: bool) -> (&'static str, &'static str, &'static str) {
    if playing {
        ("Pause", "Pause lyrics animation", "true")
    } else {
        ("Play", "Play lyrics animation", "false")
    }
}

/// Song title from an uploaded file name: the name without its last extension.
pub fn title_from_file_name(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

/// A `.karaoke-char` span.
#[derive(Debug, Clone)]
pub struct CharSpan(HtmlElement);

impl CharNode for CharSpan {
    fn reveal(&self, transition: Option<&str>) {
        let classes = self.0.class_list();
        let style = self.0.style();
        let _ = classes.add_1("visible");
        match transition {
            Some(animation) => {
                let _ = classes.add_1("animated");
                let _ = style.set_property("animation", animation);
            }
            None => {
                let _ = classes.remove_1("animated");
                let _ = style.set_property("animation", "none");
            }
        }
    }

    fn conceal(&self) {
        let _ = self.0.class_list().remove_2("visible", "animated");
        let _ = self.0.style().set_property("animation", "none");
    }
}

struct LineView {
    element: HtmlElement,
    chars: Vec<CharSpan>,
}

/// The `.karaoke-line` elements of the loaded track.
pub struct LyricView {
    container: HtmlElement,
    lines: Vec<LineView>,
    /// `(display index, layout)` the DOM was last arranged for.
    arranged: Option<(usize, &'static str)>,
}

impl LyricView {
    /// Replace the container's content with one line element per lyric.
    pub fn build(container: HtmlElement, track: &LyricTrack) -> Result<Self, DomError> {
        let doc = document()?;
        container.set_inner_html("");
        let mut lines = Vec::with_capacity(track.len());
        for (index, lyric) in track.lines().iter().enumerate() {
            let line: HtmlElement = create(&doc, "div")?;
            line.set_class_name("karaoke-line");
            line.set_attribute("data-index", &index.to_string())?;
            line.set_attribute("data-time", &lyric.time.to_string())?;

            let mut chars = Vec::new();
            for (i, word) in lyric.words().enumerate() {
                if i > 0 {
                    line.append_child(&doc.create_text_node(" "))?;
                }
                let word_span: HtmlElement = create(&doc, "span")?;
                word_span.set_class_name("karaoke-word");
                word_span.style().set_property("white-space", "nowrap")?;
                for ch in word.chars() {
                    let span: HtmlElement = create(&doc, "span")?;
                    span.set_class_name("karaoke-char");
                    span.set_text_content(Some(&ch.to_string()));
                    word_span.append_child(&span)?;
                    chars.push(CharSpan(span));
                }
                line.append_child(&word_span)?;
            }
            container.append_child(&line)?;
            lines.push(LineView { element: line, chars });
        }
        Ok(Self { container, lines, arranged: None })
    }

    pub fn chars(&self, index: usize) -> &[CharSpan] {
        self.lines.get(index).map(|l| l.chars.as_slice()).unwrap_or_default()
    }

    /// Forget the last arrangement so the next `arrange` rewrites every line.
    pub fn invalidate(&mut self) {
        self.arranged = None;
    }

    /// Position lines for `display_index`. Lines leaving the screen lose their
    /// revealed characters; context lines are shown in full. Returns `false` when
    /// the DOM already matched.
    pub fn arrange(
        &mut self,
        arrangement: &Arrangement,
        display_index: usize,
        layout: &'static str,
    ) -> Result<bool, DomError> {
        if self.arranged == Some((display_index, layout)) {
            return Ok(false);
        }
        apply_style(&self.container, &arrangement.container)?;
        for (line, placement) in self.lines.iter().zip(&arrangement.lines) {
            apply_style(&line.element, &placement.style)?;
            let (add, remove) = line_classes(placement.role);
            let classes = line.element.class_list();
            for class in remove {
                classes.remove_1(class)?;
            }
            for class in add {
                classes.add_1(class)?;
            }
            match placement.role {
                LineRole::Hidden => line.chars.iter().for_each(CharNode::conceal),
                LineRole::Previous | LineRole::Next => line.chars.iter().for_each(|c| c.reveal(None)),
                LineRole::Current => {}
            }
        }
        self.arranged = Some((display_index, layout));
        Ok(true)
    }

    pub fn scroll_to(&self, index: usize) {
        let Some(line) = self.lines.get(index) else { return };
        let options = ScrollIntoViewOptions::new();
        options.set_behavior(ScrollBehavior::Smooth);
        options.set_block(ScrollLogicalPosition::Center);
        line.element.scroll_into_view_with_scroll_into_view_options(&options);
    }
}

/// Play button, clock, progress bar and status line. Missing elements are skipped.
pub struct Controls {
    panel: Option<HtmlElement>,
    play: Option<HtmlElement>,
    status: Option<HtmlElement>,
    clock: Option<HtmlElement>,
    progress: Option<HtmlInputElement>,
    tooltip: Option<HtmlElement>,
}

impl Controls {
    pub fn locate() -> Self {
        Self {
            panel: element("controls"),
            play: element("play-pause"),
            status: element("status"),
            clock: element("time-display"),
            progress: element("progress-bar"),
            tooltip: None,
        }
    }

    pub fn set_status(&self, text: &str) {
        if let Some(status) = &self.status {
            status.set_text_content(Some(text));
        }
    }

    /// Reveal the transport for a freshly loaded track of `total` seconds.
    pub fn show(&self, total: f64) -> Result<(), DomError> {
        if let Some(panel) = &self.panel {
            panel.style().set_property("display", "block")?;
        }
        if let Some(progress) = &self.progress {
            progress.set_max(&total.to_string());
        }
        self.update_clock(0.0, total);
        self.set_playing(false);
        Ok(())
    }

    pub fn update_clock(&self, current: f64, total: f64) {
        if let Some(clock) = &self.clock {
            clock.set_text_content(Some(&format!("{} / {}", format_time(current), format_time(total))));
        }
        if let Some(progress) = &self.progress {
            progress.set_value_as_number(current);
        }
    }

    pub fn set_playing(&self, playing: bool) {
        let Some(button) = &self.play else { return };
        let (text, label, pressed) = play_button_state(playing);
        match button.query_selector(".button-text") {
            Ok(Some(span)) => span.set_text_content(Some(text)),
            _ => button.set_text_content(Some(text)),
        }
        let _ = button.set_attribute("aria-label", label);
        let _ = button.set_attribute("aria-pressed", pressed);
    }

    fn tooltip(&mut self) -> Result<&HtmlElement, DomError> {
        if self.tooltip.is_none() {
            let doc = document()?;
            let tip: HtmlElement = create(&doc, "div")?;
            tip.set_class_name("progress-tooltip");
            tip.set_attribute("role", "tooltip")?;
            tip.set_attribute("aria-live", "polite")?;
            if let Some(panel) = &self.panel {
                panel.style().set_property("position", "relative")?;
                panel.append_child(&tip)?;
            }
            self.tooltip = Some(tip);
        }
        self.tooltip
            .as_ref()
            .ok_or_else(|| DomError::MissingElement("progress-tooltip".into()))
    }

    /// Show the tooltip `offset_x` pixels into the progress bar.
    pub fn hover(&mut self, offset_x: f64, time: f64) -> Result<(), DomError> {
        let tip = self.tooltip()?;
        tip.set_text_content(Some(&format_time(time)));
        tip.class_list().add_1("visible")?;
        tip.style().set_property("left", &format!("{offset_x}px"))?;
        Ok(())
    }

    pub fn unhover(&self) {
        if let Some(tip) = &self.tooltip {
            let _ = tip.class_list().remove_1("visible");
        }
    }
}

/// Show `#{id}-controls` and hide every other `.background-controls` panel.
pub fn show_background_controls(id: &str) -> Result<(), DomError> {
    let doc = document()?;
    let panels = doc.query_selector_all(".background-controls")?;
    for i in 0..panels.length() {
        if let Some(panel) = panels.item(i).and_then(|n| n.dyn_into::<HtmlElement>().ok()) {
            panel.style().set_property("display", "none")?;
        }
    }
    if let Some(panel) = element::<HtmlElement>(&format!("{id}-controls")) {
        panel.style().set_property("display", "block")?;
    }
    Ok(())
}

/// Mirror a value into the `<select>`s or `<input>`s with the given ids.
pub fn sync_control(ids: &[&str], value: &str) {
    for id in ids {
        if let Some(select) = element::<HtmlSelectElement>(id) {
            select.set_value(value);
        } else if let Some(input) = element::<HtmlInputElement>(id) {
            input.set_value(value);
        }
    }
}

/// Song title above the lyrics; hides the upload prompt.
pub fn show_title(title: &str) {
    if let Some(heading) = element::<Element>("upload-title") {
        heading.set_text_content(Some(title));
    }
    for id in ["upload-instructions", "user-inputs"] {
        if let Some(el) = element::<HtmlElement>(id) {
            let _ = el.style().set_property("display", "none");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_classes() {
        assert_eq!(line_classes(LineRole::Current).0, ["current"]);
        assert!(line_classes(LineRole::Current).1.contains(&"fade-out"));
        assert_eq!(line_classes(LineRole::Hidden).0, ["fade-out"]);
        assert_eq!(line_classes(LineRole::Next).0, ["multiline-context"]);
    }

    #[test]
    fn test_play_button_state() {
        assert_eq!(play_button_state(true), ("Pause", "Pause lyrics animation", "true"));
        assert_eq!(play_button_state(false), ("Play", "Play lyrics animation", "false"));
    }

    #[test]
    fn test_title_from_file_name() {
        assert_eq!(title_from_file_name("song.lrc"), "song");
        assert_eq!(title_from_file_name("my.song.v2.lrc"), "my.song.v2");
        assert_eq!(title_from_file_name("README"), "README");
        assert_eq!(title_from_file_name(".lrc"), ".lrc");
    }
}
