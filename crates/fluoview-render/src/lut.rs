//! Per-channel lookup tables.

use fluoview_core::Tint;

/// Precomputed intensity → tinted-RGB table for integer-depth buffers.
///
/// One entry per possible input value: window, display gamma, and tint
/// collapse into a single indexed lookup, which is what makes 16-bit
/// full-frame rendering interactive.
#[derive(Debug, Clone)]
pub struct ChannelLut {
    /// Per-entry normalized RGB, indexed by raw intensity.
    table: Vec<[f32; 3]>,
}

impl ChannelLut {
    /// Smallest table (covers 8-bit data).
    pub const MIN_SIZE: usize = 256;
    /// Largest table (covers 16-bit data).
    pub const MAX_SIZE: usize = 65536;

    /// Build a table of `size` entries for the given display window.
    ///
    /// `size` is clamped to [256, 65536]; callers pass `data_max + 1` so
    /// the table covers exactly the values that occur. The window
    /// divisor is clamped away from zero, so a degenerate window
    /// (max <= min) produces a defined (saturated) ramp rather than a
    /// division by zero. Display gamma is applied as `n^(1/γ)` when γ is
    /// more than 0.01 away from neutral.
    pub fn build(min_val: f32, max_val: f32, gamma: f32, tint: Tint, size: usize) -> Self {
        let size = size.clamp(Self::MIN_SIZE, Self::MAX_SIZE);
        let range = (max_val - min_val).max(1e-6);
        let apply_gamma = gamma > 0.0 && (gamma - 1.0).abs() > 0.01;
        let inv_gamma = if apply_gamma { 1.0 / gamma } else { 1.0 };
        let tint = tint.as_array();

        let table = (0..size)
            .map(|value| {
                let mut n = ((value as f32 - min_val) / range).clamp(0.0, 1.0);
                if apply_gamma {
                    n = n.powf(inv_gamma);
                }
                [n * tint[0], n * tint[1], n * tint[2]]
            })
            .collect();
        Self { table }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Look up a raw intensity; values beyond the table saturate at the
    /// last entry.
    #[inline]
    pub fn lookup(&self, value: usize) -> [f32; 3] {
        self.table[value.min(self.table.len() - 1)]
    }
}
