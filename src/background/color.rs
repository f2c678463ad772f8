//! Theme colors and the palettes derived from them.

use std::fmt;
use std::str::FromStr;

use crate::error::ColorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// `#ff8e53`, the page's accent color.
pub const DEFAULT_THEME: Rgb = Rgb::new(255, 142, 83);

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` (the leading `#` is optional).
    pub fn from_hex(src: &str) -> Result<Self, ColorError> {
        let invalid = || ColorError::InvalidHex(src.to_owned());
        let hex = src.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Offset each channel, saturating at 0 and 255.
    pub fn shifted(self, dr: i16, dg: i16, db: i16) -> Self {
        let shift = |c: u8, d: i16| (c as i16 + d).clamp(0, 255) as u8;
        Self::new(shift(self.r, dr), shift(self.g, dg), shift(self.b, db))
    }

    /// `rgb(r, g, b)`
    pub fn css(&self) -> String {
        format!("rgb({}, {}, {})", self.r, self.g, self.b)
    }

    /// `rgba(r, g, b, a)`
    pub fn css_alpha(&self, alpha: f64) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, alpha.clamp(0.0, 1.0))
    }

    /// Channels in `0.0..=1.0`, multiplied by `factor`.
    pub fn unit_scaled(&self, factor: f32) -> [f32; 3] {
        [
            self.r as f32 / 255.0 * factor,
            self.g as f32 / 255.0 * factor,
            self.b as f32 / 255.0 * factor,
        ]
    }
}

impl FromStr for Rgb {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Four-stop palette around `base` shared by the gradient backgrounds.
pub fn palette(base: Rgb) -> [Rgb; 4] {
    [
        base,
        base.shifted(50, -30, 30),
        base.shifted(-30, 50, -20),
        base.shifted(20, 20, 60),
    ]
}

/// `--<prefix>-color1..4` custom properties for a CSS gradient.
pub fn css_variables(prefix: &str, base: Rgb) -> Vec<(String, String)> {
    palette(base)
        .iter()
        .enumerate()
        .map(|(i, c)| (format!("--{prefix}-color{}", i + 1), c.css()))
        .collect()
}
