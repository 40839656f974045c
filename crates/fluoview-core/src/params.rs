//! Enhancement parameter records.
//!
//! Users drive enhancement through percentage knobs; the algorithms need
//! raw values (clip limits, kernel sizes, sigmas). The raw values are
//! never stored — `PipelineParams::derive` recomputes them from
//! knob × auto-base whenever either side changes, so there is exactly one
//! source of truth.

use serde::{Deserialize, Serialize};

/// User-facing percentage knobs, one per enhancement stage.
///
/// The four strength knobs live in `0.0..=2.0` (0 = stage off, 1 = the
/// auto-estimated baseline, 2 = double strength). Gamma is bidirectional
/// in `-1.0..=1.0` (0 = neutral, negative darkens, positive brightens).
/// Values are clamped at construction; there is no way to hold an
/// out-of-range knob.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnhanceKnobs {
    pub stretch: f32,
    pub background: f32,
    pub contrast: f32,
    pub noise: f32,
    pub gamma: f32,
}

impl EnhanceKnobs {
    /// All stages off.
    pub const OFF: EnhanceKnobs = EnhanceKnobs {
        stretch: 0.0,
        background: 0.0,
        contrast: 0.0,
        noise: 0.0,
        gamma: 0.0,
    };

    pub fn new(stretch: f32, background: f32, contrast: f32, noise: f32, gamma: f32) -> Self {
        Self {
            stretch: stretch.clamp(0.0, 2.0),
            background: background.clamp(0.0, 2.0),
            contrast: contrast.clamp(0.0, 2.0),
            noise: noise.clamp(0.0, 2.0),
            gamma: gamma.clamp(-1.0, 1.0),
        }
    }

    /// Re-clamp after direct field mutation (e.g. deserialized settings).
    pub fn clamped(self) -> Self {
        Self::new(self.stretch, self.background, self.contrast, self.noise, self.gamma)
    }
}

impl Default for EnhanceKnobs {
    fn default() -> Self {
        Self::OFF
    }
}

/// Auto-estimated "100%" base values, computed once per raw buffer from a
/// downsampled analysis pass. Estimation only records what the baseline
/// would be; it never switches a stage on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoParams {
    /// Percentile clip for signal stretch, in percent (e.g. 2.0).
    pub stretch_clip: f32,
    /// Top-hat structuring-element size in pixels.
    pub bg_kernel: usize,
    /// CLAHE clip-limit base.
    pub contrast_clip: f32,
    /// CLAHE tile size in pixels.
    pub contrast_tile: usize,
    /// Bilateral smoothing sigma.
    pub noise_sigma: f32,
    /// Neutral gamma.
    pub gamma: f32,
}

impl Default for AutoParams {
    fn default() -> Self {
        Self {
            stretch_clip: 2.0,
            bg_kernel: 50,
            contrast_clip: 0.03,
            contrast_tile: 8,
            noise_sigma: 1.0,
            gamma: 1.0,
        }
    }
}

/// Raw algorithm parameters fed to the enhancement pipeline.
///
/// Only ever produced by [`PipelineParams::derive`]; holds both the
/// per-stage enabled flags and the derived values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineParams {
    pub stretch_enabled: bool,
    pub stretch_clip: f32,

    pub bg_enabled: bool,
    pub bg_kernel: usize,
    pub bg_strength: f32,

    pub contrast_enabled: bool,
    pub contrast_clip: f32,
    pub contrast_tile: usize,

    pub noise_enabled: bool,
    pub noise_sigma: f32,

    pub gamma_enabled: bool,
    pub gamma: f32,
}

impl PipelineParams {
    /// Deterministic knob × base mapping.
    ///
    /// - stretch clip = base × knob (linear)
    /// - background strength = knob directly; kernel size comes from auto
    /// - contrast clip = base × knob² — the quadratic curve gives finer
    ///   control near small values, where linear was far too aggressive
    /// - noise sigma = base × knob (linear)
    /// - gamma = 1 / (1 + knob × 0.8), so +100% brightens and −100% darkens
    pub fn derive(knobs: &EnhanceKnobs, auto: &AutoParams) -> Self {
        let knobs = knobs.clamped();

        let stretch_clip = (auto.stretch_clip * knobs.stretch).max(0.0);
        let bg_strength = knobs.background.max(0.0);
        let contrast_clip = auto.contrast_clip * knobs.contrast * knobs.contrast;
        let noise_sigma = auto.noise_sigma * knobs.noise;
        let gamma = 1.0 / (1.0 + knobs.gamma * 0.8);

        Self {
            stretch_enabled: stretch_clip > 1e-3,
            stretch_clip,
            bg_enabled: bg_strength > 1e-3,
            bg_kernel: auto.bg_kernel,
            bg_strength,
            contrast_enabled: contrast_clip > 1e-3,
            contrast_clip,
            contrast_tile: auto.contrast_tile.max(2),
            noise_enabled: noise_sigma > 1e-2,
            noise_sigma,
            gamma_enabled: (gamma - 1.0).abs() > 1e-3,
            gamma,
        }
    }

    /// True when at least one stage would run.
    pub fn any_enabled(&self) -> bool {
        self.stretch_enabled
            || self.bg_enabled
            || self.contrast_enabled
            || self.noise_enabled
            || self.gamma_enabled
    }

    /// Exact-equality cache key. Derivation is deterministic, so
    /// bit-pattern comparison of the floats is the right notion of "same
    /// parameters".
    pub fn key(&self) -> ParamsKey {
        let flags = (self.stretch_enabled as u8)
            | (self.bg_enabled as u8) << 1
            | (self.contrast_enabled as u8) << 2
            | (self.noise_enabled as u8) << 3
            | (self.gamma_enabled as u8) << 4;
        ParamsKey {
            flags,
            stretch_clip: self.stretch_clip.to_bits(),
            bg_strength: self.bg_strength.to_bits(),
            bg_kernel: self.bg_kernel as u32,
            contrast_clip: self.contrast_clip.to_bits(),
            contrast_tile: self.contrast_tile as u32,
            noise_sigma: self.noise_sigma.to_bits(),
            gamma: self.gamma.to_bits(),
        }
    }
}

/// Hashable identity of a `PipelineParams` value, used to key the
/// channel's enhanced-buffer caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamsKey {
    flags: u8,
    stretch_clip: u32,
    bg_strength: u32,
    bg_kernel: u32,
    contrast_clip: u32,
    contrast_tile: u32,
    noise_sigma: u32,
    gamma: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knobs_clamp_on_construction() {
        let k = EnhanceKnobs::new(5.0, -1.0, 1.0, 0.5, 3.0);
        assert_eq!(k.stretch, 2.0);
        assert_eq!(k.background, 0.0);
        assert_eq!(k.gamma, 1.0);
    }

    #[test]
    fn all_zero_knobs_disable_every_stage() {
        let p = PipelineParams::derive(&EnhanceKnobs::OFF, &AutoParams::default());
        assert!(!p.any_enabled());
    }

    #[test]
    fn contrast_mapping_is_quadratic() {
        let auto = AutoParams::default();
        let half = PipelineParams::derive(&EnhanceKnobs::new(0.0, 0.0, 0.5, 0.0, 0.0), &auto);
        let full = PipelineParams::derive(&EnhanceKnobs::new(0.0, 0.0, 1.0, 0.0, 0.0), &auto);
        // knob² : half strength yields a quarter of the clip limit.
        assert!((half.contrast_clip - full.contrast_clip * 0.25).abs() < 1e-6);
    }

    #[test]
    fn gamma_is_bidirectional_around_neutral() {
        let auto = AutoParams::default();
        let neutral = PipelineParams::derive(&EnhanceKnobs::OFF, &auto);
        assert!(!neutral.gamma_enabled);

        let bright = PipelineParams::derive(&EnhanceKnobs::new(0.0, 0.0, 0.0, 0.0, 1.0), &auto);
        assert!(bright.gamma_enabled);
        assert!(bright.gamma < 1.0);

        let dark = PipelineParams::derive(&EnhanceKnobs::new(0.0, 0.0, 0.0, 0.0, -1.0), &auto);
        assert!(dark.gamma > 1.0);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn knobs_always_land_in_range(
                s in -10.0f32..10.0,
                b in -10.0f32..10.0,
                c in -10.0f32..10.0,
                n in -10.0f32..10.0,
                g in -10.0f32..10.0,
            ) {
                let k = EnhanceKnobs::new(s, b, c, n, g);
                prop_assert!((0.0..=2.0).contains(&k.stretch));
                prop_assert!((0.0..=2.0).contains(&k.background));
                prop_assert!((0.0..=2.0).contains(&k.contrast));
                prop_assert!((0.0..=2.0).contains(&k.noise));
                prop_assert!((-1.0..=1.0).contains(&k.gamma));
            }

            #[test]
            fn derivation_is_deterministic(
                s in 0.0f32..2.0,
                b in 0.0f32..2.0,
                g in -1.0f32..1.0,
            ) {
                let knobs = EnhanceKnobs::new(s, b, 0.0, 0.0, g);
                let auto = AutoParams::default();
                let a = PipelineParams::derive(&knobs, &auto);
                let b2 = PipelineParams::derive(&knobs, &auto);
                prop_assert_eq!(a.key(), b2.key());
                prop_assert!(a.gamma > 0.0);
            }
        }
    }

    #[test]
    fn identical_derivations_share_a_key() {
        let auto = AutoParams::default();
        let knobs = EnhanceKnobs::new(1.0, 0.5, 0.3, 0.0, 0.2);
        let a = PipelineParams::derive(&knobs, &auto);
        let b = PipelineParams::derive(&knobs, &auto);
        assert_eq!(a.key(), b.key());

        let other = PipelineParams::derive(&EnhanceKnobs::new(1.1, 0.5, 0.3, 0.0, 0.2), &auto);
        assert_ne!(a.key(), other.key());
    }
}
