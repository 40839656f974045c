//! The channel data model.
//!
//! A `Channel` owns one raw intensity buffer plus the settings and derived
//! caches attached to it. The raw buffer is immutable except by explicit
//! replacement (crop). The two derived caches — a single full-resolution
//! enhanced slot and a small bounded preview cache — are owned exclusively
//! by the channel and mutated only from the owning context.

use smallvec::SmallVec;

use crate::buffer::{PixelBuffer, PixelDepth};
use crate::params::{AutoParams, EnhanceKnobs, ParamsKey};
use crate::settings::DisplaySettings;
use crate::PREVIEW_CACHE_CAPACITY;

/// Key of one preview-cache entry: exact target shape + exact derived
/// parameter set.
type PreviewKey = ((usize, usize), ParamsKey);

/// Fixed-capacity LRU for preview-resolution enhanced buffers.
///
/// Hits move to the back; inserting at capacity evicts only the oldest
/// entry.
#[derive(Debug, Default)]
struct PreviewCache {
    entries: SmallVec<[(PreviewKey, PixelBuffer); PREVIEW_CACHE_CAPACITY]>,
}

impl PreviewCache {
    fn get(&mut self, key: &PreviewKey) -> Option<&PixelBuffer> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        let entry = self.entries.remove(idx);
        self.entries.push(entry);
        self.entries.last().map(|(_, buf)| buf)
    }

    fn put(&mut self, key: PreviewKey, buffer: PixelBuffer) {
        self.entries.retain(|(k, _)| *k != key);
        if self.entries.len() >= PREVIEW_CACHE_CAPACITY {
            self.entries.remove(0);
        }
        self.entries.push((key, buffer));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A single fluorescence channel (e.g. DAPI, GFP).
#[derive(Debug)]
pub struct Channel {
    name: String,
    raw: PixelBuffer,
    pub display: DisplaySettings,
    knobs: EnhanceKnobs,
    auto: Option<AutoParams>,
    full_res: Option<(ParamsKey, PixelBuffer)>,
    preview: PreviewCache,
}

impl Channel {
    /// Create a channel and auto-scale its initial display window from
    /// the data.
    pub fn new(name: impl Into<String>, raw: PixelBuffer) -> Self {
        let mut ch = Self {
            name: name.into(),
            display: DisplaySettings::default(),
            knobs: EnhanceKnobs::OFF,
            auto: None,
            full_res: None,
            preview: PreviewCache::default(),
            raw,
        };
        ch.auto_scale();
        ch
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn raw(&self) -> &PixelBuffer {
        &self.raw
    }

    pub fn shape(&self) -> (usize, usize) {
        self.raw.shape()
    }

    /// Replace the raw buffer (crop or re-load). Drops every derived
    /// cache and the auto-estimated base values, and re-scales the
    /// display window.
    pub fn replace_data(&mut self, raw: PixelBuffer) {
        self.raw = raw;
        self.auto = None;
        self.clear_derived_caches();
        self.auto_scale();
    }

    pub fn knobs(&self) -> &EnhanceKnobs {
        &self.knobs
    }

    /// Update the enhancement knobs. Any change invalidates the full-res
    /// enhanced slot; the preview tier is keyed exactly and simply stops
    /// matching.
    pub fn set_knobs(&mut self, knobs: EnhanceKnobs) {
        let knobs = knobs.clamped();
        if knobs != self.knobs {
            self.knobs = knobs;
            self.full_res = None;
        }
    }

    /// Auto-estimated base values, if estimation has run for the current
    /// raw buffer.
    pub fn auto_params(&self) -> Option<&AutoParams> {
        self.auto.as_ref()
    }

    /// Install auto-estimated base values (the estimator lives in the
    /// enhancement crate). Installing new bases invalidates the full-res
    /// slot since derived parameters change with them.
    pub fn set_auto_params(&mut self, auto: AutoParams) {
        if self.auto != Some(auto) {
            self.auto = Some(auto);
            self.full_res = None;
        }
    }

    // ── Derived caches ─────────────────────────────────────────────

    /// Full-resolution enhanced buffer, valid only for this exact
    /// parameter key.
    pub fn full_res_cached(&self, key: &ParamsKey) -> Option<&PixelBuffer> {
        match &self.full_res {
            Some((k, buf)) if k == key => Some(buf),
            _ => None,
        }
    }

    pub fn store_full_res(&mut self, key: ParamsKey, buffer: PixelBuffer) {
        self.full_res = Some((key, buffer));
    }

    /// Preview-tier lookup; a hit refreshes the entry's LRU position.
    pub fn preview_cached(&mut self, shape: (usize, usize), key: &ParamsKey) -> Option<&PixelBuffer> {
        self.preview.get(&(shape, *key))
    }

    pub fn store_preview(&mut self, shape: (usize, usize), key: ParamsKey, buffer: PixelBuffer) {
        self.preview.put((shape, key), buffer);
    }

    pub fn preview_cache_len(&self) -> usize {
        self.preview.len()
    }

    /// Drop both derived caches, releasing their buffers.
    pub fn clear_derived_caches(&mut self) {
        self.full_res = None;
        self.preview.clear();
    }

    /// Total derived-cache footprint in bytes (diagnostics).
    pub fn derived_cache_size(&self) -> usize {
        let full = self.full_res.as_ref().map_or(0, |(_, b)| b.memory_size());
        let preview: usize = self.preview.entries.iter().map(|(_, b)| b.memory_size()).sum();
        full + preview
    }

    // ── Initial display window ─────────────────────────────────────

    /// Estimate the initial display window from the raw data.
    ///
    /// 8-bit and RGB sources default to the full 0..255 range. For
    /// higher depths the maximum comes from the 99.99th percentile of a
    /// strided sample, with a hot-pixel guard: when the absolute maximum
    /// towers over the percentile it is almost certainly a sensor
    /// artifact, so the percentile wins; otherwise the absolute maximum
    /// is kept to avoid clipping genuinely bright sparse signals.
    fn auto_scale(&mut self) {
        if self.raw.is_empty() {
            return;
        }
        let (min_val, max_val) = match self.raw.depth() {
            PixelDepth::U8 => (0.0, 255.0),
            _ => {
                let data_min = self.raw.min_value();
                let abs_max = self.raw.max_value();
                let sample = self.raw.sample_strided(250_000);
                let p_high = percentile(&sample, 99.99).unwrap_or(abs_max);

                let mut max = if abs_max > p_high * 2.0 && abs_max > data_min + 255.0 {
                    p_high
                } else {
                    abs_max
                };
                if max <= data_min {
                    max = data_min + 255.0;
                }
                (data_min, max)
            }
        };
        self.display.min_val = min_val;
        self.display.max_val = max_val;
        self.display.gamma = 1.0;
    }
}

/// Sort-based percentile over a (sampled) buffer. Returns `None` for an
/// empty buffer.
pub fn percentile(buffer: &PixelBuffer, pct: f32) -> Option<f32> {
    let mut values: Vec<f32> = match buffer {
        PixelBuffer::Gray8(a) => a.iter().map(|&v| v as f32).collect(),
        PixelBuffer::Gray16(a) => a.iter().map(|&v| v as f32).collect(),
        PixelBuffer::GrayF32(a) => a.iter().copied().collect(),
        PixelBuffer::Rgb8(a) => a.iter().map(|&v| v as f32).collect(),
    };
    if values.is_empty() {
        return None;
    }
    let pct = pct.clamp(0.0, 100.0);
    let idx = ((pct / 100.0) * (values.len() - 1) as f32).round() as usize;
    let (_, nth, _) = values.select_nth_unstable_by(idx, |a, b| a.total_cmp(b));
    Some(*nth)
}
