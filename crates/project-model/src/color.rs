//! Color values as stored in project files (`#RRGGBB` strings) and as used for drawing.

use serde::{Deserialize, Serialize};

/// A color stored as a hex string, e.g. `#667EEA`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HexColor(pub String);

impl HexColor {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Parse into an opaque color. Unparsable digits read as zero.
    pub fn to_rgba(&self) -> Rgba {
        let digits = self.0.trim().trim_start_matches('#');
        let value = u32::from_str_radix(digits, 16).unwrap_or(0);
        Rgba::from_rgb8(
            ((value & 0xFF0000) >> 16) as u8,
            ((value & 0x00FF00) >> 8) as u8,
            (value & 0x0000FF) as u8,
        )
    }
}

/// Straight (non-premultiplied) RGBA in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Rgba = Rgba::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0)
    }

    /// Grey level, like a `white:` color initialiser.
    pub fn from_white(white: f32) -> Self {
        Self::new(white, white, white, 1.0)
    }

    pub fn with_opacity(self, opacity: f32) -> Self {
        Self {
            a: self.a * opacity.clamp(0.0, 1.0),
            ..self
        }
    }
}
