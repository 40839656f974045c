//! Tint colors for channel pseudo-coloring.

use serde::{Deserialize, Serialize};

/// Normalized RGB tint applied to a channel's intensity ramp.
///
/// Fluorescence channels are grayscale at the sensor; the tint is pure
/// presentation (DAPI blue, GFP green, and so on).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tint {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Tint {
    pub const WHITE: Tint = Tint { r: 1.0, g: 1.0, b: 1.0 };

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
        }
    }

    /// Parse a `#RRGGBB` hex string. Malformed input falls back to white
    /// rather than failing the render path.
    pub fn from_hex(hex: &str) -> Self {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 {
            return Self::WHITE;
        }
        let parse = |s: &str| u8::from_str_radix(s, 16).ok();
        match (parse(&hex[0..2]), parse(&hex[2..4]), parse(&hex[4..6])) {
            (Some(r), Some(g), Some(b)) => Self {
                r: r as f32 / 255.0,
                g: g as f32 / 255.0,
                b: b as f32 / 255.0,
            },
            _ => Self::WHITE,
        }
    }

    pub fn is_white(&self) -> bool {
        self.r == 1.0 && self.g == 1.0 && self.b == 1.0
    }

    pub fn as_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl Default for Tint {
    fn default() -> Self {
        Self::WHITE
    }
}
