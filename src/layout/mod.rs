//! Line layouts.
//!
//! A layout maps `(line count, display index)` to inline styles for the lyrics
//! container and for every line. Each arrangement starts from a full reset of the
//! properties any layout may touch, so switching layouts never leaves stale
//! positioning behind.

use std::collections::BTreeMap;

/// Inline properties a layout may set on a line.
pub const LINE_PROPERTIES: &[&str] = &[
    "display",
    "font-size",
    "text-align",
    "position",
    "top",
    "left",
    "bottom",
    "transform",
    "width",
    "line-height",
    "opacity",
    "margin-top",
    "margin-bottom",
    "transition",
    "background-color",
    "padding",
    "border-radius",
];

/// Inline properties a layout may set on the lyrics container.
pub const CONTAINER_PROPERTIES: &[&str] = &["position", "top", "left", "transform", "width"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRole {
    Hidden,
    Current,
    Previous,
    Next,
}

impl LineRole {
    pub fn is_visible(self) -> bool {
        self != LineRole::Hidden
    }

    /// Shown for context around the current line.
    pub fn is_context(self) -> bool {
        matches!(self, LineRole::Previous | LineRole::Next)
    }
}

/// Ordered inline style declarations. An empty value removes the property.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleSet {
    entries: Vec<(&'static str, String)>,
}

impl StyleSet {
    /// Every property in `props`, cleared.
    pub fn reset(props: &[&'static str]) -> Self {
        Self { entries: props.iter().map(|p| (*p, String::new())).collect() }
    }

    pub fn set(mut self, prop: &'static str, value: &str) -> Self {
        match self.entries.iter_mut().find(|(p, _)| *p == prop) {
            Some(entry) => entry.1 = value.to_owned(),
            None => self.entries.push((prop, value.to_owned())),
        }
        self
    }

    pub fn get(&self, prop: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| *p == prop)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries.iter().map(|(p, v)| (*p, v.as_str()))
    }

    pub fn is_hidden(&self) -> bool {
        self.get("display") == Some("none")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinePlacement {
    pub role: LineRole,
    pub style: StyleSet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arrangement {
    pub container: StyleSet,
    pub lines: Vec<LinePlacement>,
}

impl Arrangement {
    pub fn visible(&self) -> impl Iterator<Item = usize> + '_ {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.role.is_visible())
            .map(|(i, _)| i)
    }
}

fn hidden_line() -> StyleSet {
    StyleSet::reset(LINE_PROPERTIES).set("display", "none")
}

pub trait Layout {
    fn name(&self) -> &'static str;
    fn label(&self) -> &'static str;

    fn role(&self, index: usize, display_index: usize) -> LineRole {
        if index == display_index { LineRole::Current } else { LineRole::Hidden }
    }

    /// Style of a visible line.
    fn line_style(&self, role: LineRole) -> StyleSet;

    fn container_style(&self) -> StyleSet {
        StyleSet::reset(CONTAINER_PROPERTIES)
    }

    /// Scroll the current line into view while playing.
    fn follows_current(&self) -> bool {
        false
    }

    fn arrange(&self, line_count: usize, display_index: usize) -> Arrangement {
        let lines = (0..line_count)
            .map(|i| {
                let role = self.role(i, display_index);
                let style = if role.is_visible() { self.line_style(role) } else { hidden_line() };
                LinePlacement { role, style }
            })
            .collect();
        Arrangement { container: self.container_style(), lines }
    }
}

/// One centered line (classic and fullscreen).
#[derive(Debug, Clone, Copy)]
pub struct Centered {
    pub name: &'static str,
    pub label: &'static str,
    pub font_size: &'static str,
    pub width: &'static str,
    pub line_height: Option<&'static str>,
}

impl Layout for Centered {
    fn name(&self) -> &'static str {
        self.name
    }
    fn label(&self) -> &'static str {
        self.label
    }

    fn line_style(&self, _role: LineRole) -> StyleSet {
        let style = StyleSet::reset(LINE_PROPERTIES)
            .set("display", "block")
            .set("font-size", self.font_size)
            .set("text-align", "center")
            .set("position", "absolute")
            .set("top", "50%")
            .set("left", "50%")
            .set("transform", "translate(-50%, -50%)")
            .set("width", self.width);
        match self.line_height {
            Some(lh) => style.set("line-height", lh),
            None => style,
        }
    }
}

/// Previous, current and next line stacked in the middle of the screen.
#[derive(Debug, Clone, Copy, Default)]
pub struct Multiline;

impl Layout for Multiline {
    fn name(&self) -> &'static str {
        "multiline"
    }
    fn label(&self) -> &'static str {
        "Multi-line"
    }

    fn role(&self, index: usize, display_index: usize) -> LineRole {
        if index == display_index {
            LineRole::Current
        } else if index + 1 == display_index {
            LineRole::Previous
        } else if index == display_index + 1 {
            LineRole::Next
        } else {
            LineRole::Hidden
        }
    }

    fn line_style(&self, role: LineRole) -> StyleSet {
        let base = StyleSet::reset(LINE_PROPERTIES)
            .set("display", "block")
            .set("position", "relative")
            .set("width", "100%")
            .set("text-align", "center")
            .set("transition", "all 0.3s ease");
        if role == LineRole::Current {
            base.set("font-size", "var(--text-xl)")
                .set("opacity", "1")
                .set("margin-top", "2rem")
                .set("margin-bottom", "2rem")
        } else {
            base.set("font-size", "var(--text-base)").set("opacity", "0.65")
        }
    }

    fn container_style(&self) -> StyleSet {
        StyleSet::reset(CONTAINER_PROPERTIES)
            .set("position", "absolute")
            .set("top", "50%")
            .set("left", "50%")
            .set("transform", "translate(-50%, -50%)")
            .set("width", "80%")
    }

    fn follows_current(&self) -> bool {
        true
    }
}

/// Subtitle-style panel anchored to the bottom of the viewport.
#[derive(Debug, Clone, Copy, Default)]
pub struct BottomBar;

impl Layout for BottomBar {
    fn name(&self) -> &'static str {
        "bottomBar"
    }
    fn label(&self) -> &'static str {
        "Bottom Bar"
    }

    fn line_style(&self, _role: LineRole) -> StyleSet {
        StyleSet::reset(LINE_PROPERTIES)
            .set("display", "block")
            .set("font-size", "var(--text-xl)")
            .set("text-align", "center")
            .set("position", "fixed")
            .set("bottom", "80px")
            .set("left", "50%")
            .set("transform", "translateX(-50%)")
            .set("width", "90%")
            .set("background-color", "rgba(0, 0, 0, 0.7)")
            .set("padding", "20px")
            .set("border-radius", "10px")
    }

    fn container_style(&self) -> StyleSet {
        StyleSet::reset(CONTAINER_PROPERTIES)
            .set("position", "relative")
            .set("top", "auto")
            .set("left", "auto")
            .set("transform", "none")
    }
}

pub const CLASSIC: Centered = Centered {
    name: "classic",
    label: "Classic",
    font_size: "var(--text-xl)",
    width: "80%",
    line_height: None,
};

pub const FULLSCREEN: Centered = Centered {
    name: "fullscreen",
    label: "Fullscreen",
    font_size: "var(--text-2xl)",
    width: "90%",
    line_height: Some("1.2"),
};

pub struct LayoutRegistry {
    layouts: BTreeMap<&'static str, Box<dyn Layout>>,
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        let mut registry = Self { layouts: BTreeMap::new() };
        registry.register(Box::new(CLASSIC));
        registry.register(Box::new(FULLSCREEN));
        registry.register(Box::new(Multiline));
        registry.register(Box::new(BottomBar));
        registry
    }
}

impl LayoutRegistry {
    pub fn register(&mut self, layout: Box<dyn Layout>) {
        self.layouts.insert(layout.name(), layout);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Layout> {
        self.layouts.get(name).map(|l| l.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.layouts.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.layouts.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classic_shows_only_current_line() {
        let arr = CLASSIC.arrange(5, 2);
        assert_eq!(arr.visible().collect::<Vec<_>>(), [2]);
        assert_eq!(arr.lines[2].style.get("font-size"), Some("var(--text-xl)"));
        assert!(arr.lines[0].style.is_hidden());
        assert!(arr.lines[4].style.is_hidden());
    }

    #[test]
    fn test_multiline_shows_neighbours_de_emphasized() {
        let arr = Multiline.arrange(5, 2);
        assert_eq!(arr.visible().collect::<Vec<_>>(), [1, 2, 3]);
        assert_eq!(arr.lines[1].role, LineRole::Previous);
        assert_eq!(arr.lines[3].role, LineRole::Next);
        assert_eq!(arr.lines[1].style.get("opacity"), Some("0.65"));
        assert_eq!(arr.lines[2].style.get("opacity"), Some("1"));
        assert_eq!(arr.container.get("width"), Some("80%"));
        assert!(Multiline.follows_current());
    }

    #[test]
    fn test_multiline_at_edges() {
        let first = Multiline.arrange(3, 0);
        assert_eq!(first.visible().collect::<Vec<_>>(), [0, 1]);
        let last = Multiline.arrange(3, 2);
        assert_eq!(last.visible().collect::<Vec<_>>(), [1, 2]);
    }

    #[test]
    fn test_every_arrangement_resets_all_properties() {
        let reg = LayoutRegistry::default();
        for name in reg.names() {
            let arr = reg.get(name).unwrap().arrange(4, 1);
            for line in &arr.lines {
                let props: Vec<&str> = line.style.entries().map(|(p, _)| p).collect();
                for p in LINE_PROPERTIES {
                    assert!(props.contains(p), "{name} leaves {p} untouched");
                }
            }
            let props: Vec<&str> = arr.container.entries().map(|(p, _)| p).collect();
            for p in CONTAINER_PROPERTIES {
                assert!(props.contains(p), "{name} leaves container {p} untouched");
            }
        }
    }

    #[test]
    fn test_switching_from_bottom_bar_clears_panel() {
        let bar = BottomBar.arrange(2, 0);
        assert_eq!(bar.lines[0].style.get("bottom"), Some("80px"));
        let classic = CLASSIC.arrange(2, 0);
        assert_eq!(classic.lines[0].style.get("bottom"), None);
        assert_eq!(classic.lines[0].style.get("background-color"), None);
    }

    #[test]
    fn test_registry_names() {
        let reg = LayoutRegistry::default();
        let names: Vec<_> = reg.names().collect();
        assert_eq!(names, ["bottomBar", "classic", "fullscreen", "multiline"]);
        assert_eq!(reg.get("fullscreen").unwrap().arrange(1, 0).lines[0].style.get("line-height"), Some("1.2"));
        assert!(reg.get("sideways").is_none());
    }
}
