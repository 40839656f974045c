//! Single-channel rendering: enhance (cached) + window/gamma/tint.

use fluoview_core::{
    Channel, ColorLayer, DisplaySettings, OutputDepth, PipelineParams, PixelBuffer, RgbImage,
};
use fluoview_enhance::{estimate_auto_params, run_pipeline};
use ndarray::Array3;
use tracing::{debug, warn};

use crate::lut::ChannelLut;

/// Render one channel and quantize it for display at the requested
/// depth. The display-facing entry point; see [`render_layer`] for the
/// normalized working layer.
pub fn render_channel(
    channel: &mut Channel,
    target_shape: Option<(usize, usize)>,
    out_depth: OutputDepth,
) -> Option<RgbImage> {
    render_layer(channel, target_shape).map(|layer| layer.quantize(out_depth))
}

/// Render one channel into a tinted, normalized RGB layer.
///
/// Hidden or empty channels return `None`. When `target_shape` is
/// smaller than the source, the raw buffer is strided-downsampled
/// *before* enhancement, so preview renders stay cheap. The
/// channel's two-tier enhanced cache is consulted and populated here:
/// the full-resolution slot when rendering the unmodified buffer, the
/// bounded preview cache otherwise. With no enhancement stage enabled
/// the derived caches are dropped, since nothing can reuse them.
pub fn render_layer(channel: &mut Channel, target_shape: Option<(usize, usize)>) -> Option<ColorLayer> {
    if !channel.display.visible || channel.raw().is_empty() {
        return None;
    }

    let full = channel.shape();
    let (working, scale) = match target_shape {
        Some(target) if target.0 < full.0 || target.1 < full.1 => {
            let target = (target.0.min(full.0).max(1), target.1.min(full.1).max(1));
            let down = channel.raw().downsample(target);
            let scale = target.0 as f32 / full.0 as f32;
            (down, scale)
        }
        _ => (channel.raw().clone(), 1.0),
    };
    let is_preview = working.shape() != full;

    // Baseline parameters are estimated once per raw buffer, lazily.
    if channel.auto_params().is_none() {
        match estimate_auto_params(channel.raw()) {
            Ok(auto) => channel.set_auto_params(auto),
            Err(err) => {
                warn!(%err, channel = channel.name(), "auto estimation failed, using defaults");
                channel.set_auto_params(Default::default());
            }
        }
    }
    let auto = *channel.auto_params()?;
    let params = PipelineParams::derive(channel.knobs(), &auto);

    let enhanced = if !params.any_enabled() {
        // Nothing derivable to cache; let eviction reclaim old buffers.
        channel.clear_derived_caches();
        working
    } else {
        let key = params.key();
        if !is_preview {
            match channel.full_res_cached(&key) {
                Some(cached) => cached.clone(),
                None => {
                    let out = run_pipeline(&working, &params, 1.0);
                    channel.store_full_res(key, out.clone());
                    out
                }
            }
        } else {
            let shape = working.shape();
            match channel.preview_cached(shape, &key) {
                Some(cached) => cached.clone(),
                None => {
                    debug!(channel = channel.name(), ?shape, "preview enhance pass");
                    let out = run_pipeline(&working, &params, scale);
                    channel.store_preview(shape, key, out.clone());
                    out
                }
            }
        }
    };

    Some(colorize(&enhanced, &channel.display))
}

/// Apply window, display gamma, and tint to an enhanced buffer.
///
/// Integer depths go through a lookup table sized to the observed data
/// maximum. Float and RGB sources take the per-pixel fallback; a tinted
/// RGB source collapses to its per-pixel maximum before tinting (max
/// projection keeps faint structures that a luma weighting would crush).
fn colorize(buffer: &PixelBuffer, display: &DisplaySettings) -> ColorLayer {
    let (h, w) = buffer.shape();
    match buffer {
        PixelBuffer::Gray8(a) => {
            let lut = build_lut(display, buffer.max_value());
            ColorLayer::new(Array3::from_shape_fn((h, w, 3), |(y, x, c)| {
                lut.lookup(a[(y, x)] as usize)[c]
            }))
        }
        PixelBuffer::Gray16(a) => {
            let lut = build_lut(display, buffer.max_value());
            ColorLayer::new(Array3::from_shape_fn((h, w, 3), |(y, x, c)| {
                lut.lookup(a[(y, x)] as usize)[c]
            }))
        }
        PixelBuffer::GrayF32(a) => {
            let tint = display.tint.as_array();
            ColorLayer::new(Array3::from_shape_fn((h, w, 3), |(y, x, c)| {
                windowed(a[(y, x)], display) * tint[c]
            }))
        }
        PixelBuffer::Rgb8(a) => {
            if display.tint.is_white() {
                ColorLayer::new(Array3::from_shape_fn((h, w, 3), |(y, x, c)| {
                    windowed(a[(y, x, c)] as f32, display)
                }))
            } else {
                let tint = display.tint.as_array();
                ColorLayer::new(Array3::from_shape_fn((h, w, 3), |(y, x, c)| {
                    let peak = (0..3)
                        .map(|p| a[(y, x, p)] as f32)
                        .fold(0.0f32, f32::max);
                    windowed(peak, display) * tint[c]
                }))
            }
        }
    }
}

fn build_lut(display: &DisplaySettings, data_max: f32) -> ChannelLut {
    let size = data_max.max(0.0) as usize + 1;
    ChannelLut::build(
        display.min_val,
        display.max_val,
        display.gamma,
        display.tint,
        size,
    )
}

#[inline]
fn windowed(value: f32, display: &DisplaySettings) -> f32 {
    let mut n = ((value - display.min_val) / display.window_range()).clamp(0.0, 1.0);
    if display.gamma > 0.0 && (display.gamma - 1.0).abs() > 0.01 {
        n = n.powf(1.0 / display.gamma);
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluoview_core::{EnhanceKnobs, Tint};
    use ndarray::{Array2, Array3 as NdArray3};

    fn test_channel() -> Channel {
        let data = Array2::from_shape_fn((64, 64), |(y, x)| ((y * 64 + x) % 4096) as u16);
        Channel::new("GFP", PixelBuffer::Gray16(data))
    }

    #[test]
    fn hidden_channel_renders_none() {
        let mut ch = test_channel();
        ch.display.visible = false;
        assert!(render_layer(&mut ch, None).is_none());
    }

    #[test]
    fn full_res_render_matches_source_shape() {
        let mut ch = test_channel();
        let layer = render_layer(&mut ch, None).unwrap();
        assert_eq!(layer.shape(), (64, 64));
    }

    #[test]
    fn preview_target_downsamples_before_enhancement() {
        let mut ch = test_channel();
        ch.set_knobs(EnhanceKnobs::new(1.0, 0.0, 0.0, 0.0, 0.0));
        let layer = render_layer(&mut ch, Some((16, 16))).unwrap();
        assert_eq!(layer.shape(), (16, 16));
        // Preview pass populated the preview tier, not the full-res slot.
        assert_eq!(ch.preview_cache_len(), 1);
    }

    #[test]
    fn full_res_render_populates_the_full_res_slot() {
        let mut ch = test_channel();
        ch.set_knobs(EnhanceKnobs::new(1.0, 0.0, 0.0, 0.0, 0.0));
        render_layer(&mut ch, None).unwrap();

        let auto = *ch.auto_params().unwrap();
        let key = PipelineParams::derive(ch.knobs(), &auto).key();
        assert!(ch.full_res_cached(&key).is_some());
    }

    #[test]
    fn repeat_render_hits_the_cache() {
        let mut ch = test_channel();
        ch.set_knobs(EnhanceKnobs::new(1.0, 0.5, 0.0, 0.0, 0.0));
        let first = render_layer(&mut ch, Some((32, 32))).unwrap();
        let second = render_layer(&mut ch, Some((32, 32))).unwrap();
        assert_eq!(first, second);
        assert_eq!(ch.preview_cache_len(), 1);
    }

    #[test]
    fn no_enhancement_drops_derived_caches() {
        let mut ch = test_channel();
        ch.set_knobs(EnhanceKnobs::new(1.0, 0.0, 0.0, 0.0, 0.0));
        render_layer(&mut ch, Some((16, 16))).unwrap();
        assert_eq!(ch.preview_cache_len(), 1);

        ch.set_knobs(EnhanceKnobs::OFF);
        render_layer(&mut ch, Some((16, 16))).unwrap();
        assert_eq!(ch.preview_cache_len(), 0);
    }

    #[test]
    fn quantized_render_matches_the_layer_scale() {
        let mut ch = test_channel();
        let layer = render_layer(&mut ch, None).unwrap();
        let Some(RgbImage::Rgb8(img)) = render_channel(&mut ch, None, OutputDepth::U8) else {
            panic!("expected an 8-bit image");
        };
        assert_eq!(&img.shape()[..2], &[64, 64]);
        let expected = (layer.data()[(10, 10, 0)] * 255.0).round() as u8;
        assert_eq!(img[(10, 10, 0)], expected);
    }

    #[test]
    fn sixteen_bit_output_uses_the_full_scale() {
        let mut ch = test_channel();
        ch.display.min_val = 0.0;
        ch.display.max_val = 100.0; // saturates most of the frame
        let Some(RgbImage::Rgb16(img)) = render_channel(&mut ch, None, OutputDepth::U16) else {
            panic!("expected a 16-bit image");
        };
        assert_eq!(img.iter().copied().max(), Some(65535));
    }

    #[test]
    fn tint_colors_the_output() {
        let mut ch = test_channel();
        ch.display.tint = Tint::new(0.0, 1.0, 0.0);
        let layer = render_layer(&mut ch, None).unwrap();
        let data = layer.data();
        // Red and blue stay dark, green carries the signal.
        assert!(data.iter().enumerate().all(|(i, &v)| i % 3 == 1 || v == 0.0));
        assert!(data.iter().skip(1).step_by(3).any(|&v| v > 0.0));
    }

    #[test]
    fn tinted_rgb_source_uses_max_projection() {
        let mut rgb = NdArray3::<u8>::zeros((2, 2, 3));
        rgb[(0, 0, 0)] = 200; // strong red only
        let mut ch = Channel::new("bf", PixelBuffer::Rgb8(rgb));
        ch.display.tint = Tint::new(0.0, 0.0, 1.0);
        let layer = render_layer(&mut ch, None).unwrap();
        let d = layer.data();
        // Max projection keeps the red-only signal, remapped to blue.
        assert!(d[(0, 0, 2)] > 0.5);
        assert_eq!(d[(0, 0, 0)], 0.0);
    }
}
