//! Per-channel display settings.

use serde::{Deserialize, Serialize};

use crate::color::Tint;

/// How a channel's intensities map onto the screen: the display window,
/// display gamma, tint color, and visibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySettings {
    /// Lower edge of the display window (mapped to black).
    pub min_val: f32,
    /// Upper edge of the display window (mapped to full tint brightness).
    pub max_val: f32,
    /// Display gamma; 1.0 is linear.
    pub gamma: f32,
    pub tint: Tint,
    pub visible: bool,
}

impl DisplaySettings {
    pub fn new(min_val: f32, max_val: f32, gamma: f32, tint: Tint) -> Self {
        Self {
            min_val,
            max_val,
            gamma,
            tint,
            visible: true,
        }
    }

    /// Window width with the divisor clamped away from zero, so a
    /// degenerate window (max <= min) never divides by zero downstream.
    pub fn window_range(&self) -> f32 {
        (self.max_val - self.min_val).max(1e-6)
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self::new(0.0, 255.0, 1.0, Tint::WHITE)
    }
}
