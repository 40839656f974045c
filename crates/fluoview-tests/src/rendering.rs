//! Integration tests for the enhancement → render → composite path.
//!
//! Exercises fluoview-core, fluoview-enhance, and fluoview-render
//! together on realistic synthetic microscopy data.

use fluoview_core::{
    AutoParams, Channel, EnhanceKnobs, OutputDepth, PipelineParams, PixelBuffer, RgbImage, Tint,
};
use fluoview_enhance::{percentile_stretch, run_pipeline};
use fluoview_render::{composite, composite_layers, render_layer, ChannelLut};
use ndarray::Array2;

// ── Helpers ────────────────────────────────────────────────────

/// Synthetic fluorescence field: dim background, a few bright spots,
/// deterministic per-pixel jitter.
fn synthetic_field(h: usize, w: usize) -> Array2<u16> {
    Array2::from_shape_fn((h, w), |(y, x)| {
        let jitter = ((y.wrapping_mul(31) ^ x.wrapping_mul(17)) % 40) as u16;
        let mut v = 200 + jitter;
        for &(cy, cx) in &[(h / 4, w / 4), (h / 2, w / 2), (3 * h / 4, 3 * w / 4)] {
            let dy = y.abs_diff(cy);
            let dx = x.abs_diff(cx);
            if dy * dy + dx * dx < 25 {
                v = v.saturating_add(3000);
            }
        }
        v
    })
}

fn tinted_channel(name: &str, tint: Tint) -> Channel {
    let mut ch = Channel::new(name, PixelBuffer::Gray16(synthetic_field(500, 500)));
    ch.display.tint = tint;
    ch
}

// ── Pipeline properties ────────────────────────────────────────

#[test]
fn disabled_pipeline_is_bit_identical() {
    let buf = PixelBuffer::Gray16(synthetic_field(128, 128));
    let params = PipelineParams::derive(&EnhanceKnobs::OFF, &AutoParams::default());
    assert_eq!(run_pipeline(&buf, &params, 1.0), buf);
}

#[test]
fn stretch_is_idempotent_on_stretched_data() {
    let buf = PixelBuffer::Gray16(synthetic_field(128, 128));
    let once = percentile_stretch(&buf, 0.0, 100.0).unwrap();
    let twice = percentile_stretch(&once, 0.0, 100.0).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn full_pipeline_preserves_shape_and_depth() {
    let buf = PixelBuffer::Gray16(synthetic_field(128, 96));
    let knobs = EnhanceKnobs::new(1.0, 1.0, 1.0, 1.0, 0.3);
    let auto = fluoview_enhance::estimate_auto_params(&buf).unwrap();
    let params = PipelineParams::derive(&knobs, &auto);
    let out = run_pipeline(&buf, &params, 1.0);
    assert_eq!(out.shape(), (128, 96));
    assert_eq!(out.depth(), buf.depth());
}

// ── LUT properties ─────────────────────────────────────────────

#[test]
fn lut_is_monotonic_across_gammas() {
    for gamma in [0.5f32, 1.0, 1.8] {
        let lut = ChannelLut::build(100.0, 3000.0, gamma, Tint::WHITE, 4096);
        let mut prev = [0.0f32; 3];
        for i in 0..lut.len() {
            let v = lut.lookup(i);
            assert!(v[0] >= prev[0] && v[1] >= prev[1] && v[2] >= prev[2]);
            prev = v;
        }
    }
}

#[test]
fn degenerate_window_renders_without_panic() {
    let mut ch = Channel::new("flat", PixelBuffer::Gray16(Array2::from_elem((32, 32), 777u16)));
    ch.display.min_val = 777.0;
    ch.display.max_val = 777.0;
    let layer = render_layer(&mut ch, None).unwrap();
    assert_eq!(layer.shape(), (32, 32));
    assert!(layer.data().iter().all(|v| v.is_finite()));
}

// ── End-to-end composite ───────────────────────────────────────

#[test]
fn two_channel_composite_is_the_clipped_sum_of_layers() {
    let mut green = tinted_channel("GFP", Tint::new(0.0, 1.0, 0.0));
    let mut red = tinted_channel("mCherry", Tint::new(1.0, 0.0, 0.0));
    green.set_knobs(EnhanceKnobs::new(1.0, 0.5, 0.0, 0.0, 0.0));
    red.set_knobs(EnhanceKnobs::new(0.8, 0.0, 0.0, 0.0, 0.2));

    let layer_a = render_layer(&mut green, Some((500, 500))).unwrap();
    let layer_b = render_layer(&mut red, Some((500, 500))).unwrap();

    let mut channels = vec![green, red];
    let composed = composite_layers(&mut channels, Some((500, 500)));

    let expected = {
        let mut sum = layer_a.clone();
        sum.accumulate(&layer_b);
        sum.clamp01();
        sum
    };
    assert_eq!(composed, expected);
}

#[test]
fn noop_knobs_composite_is_the_sum_of_raw_color_mappings() {
    // Background strength 0 and neutral gamma derive to "nothing
    // enabled", so the composite is exactly the clipped sum of the two
    // raw-to-color mappings.
    let mut a = tinted_channel("a", Tint::new(0.0, 1.0, 0.0));
    let mut b = tinted_channel("b", Tint::new(1.0, 0.0, 0.0));
    a.set_knobs(EnhanceKnobs::new(0.0, 0.0, 0.0, 0.0, 0.0));
    b.set_knobs(EnhanceKnobs::new(0.0, 0.0, 0.0, 0.0, 0.0));

    let raw_a = render_layer(&mut a, Some((500, 500))).unwrap();
    let raw_b = render_layer(&mut b, Some((500, 500))).unwrap();
    let composed = composite_layers(&mut [a, b], Some((500, 500)));

    let mut expected = raw_a;
    expected.accumulate(&raw_b);
    expected.clamp01();
    assert_eq!(composed, expected);
}

#[test]
fn display_output_quantizes_at_the_requested_depth() {
    let mut channels = vec![tinted_channel("GFP", Tint::new(0.0, 1.0, 0.0))];
    let layer = composite_layers(&mut channels, Some((100, 100)));
    let RgbImage::Rgb16(img) = composite(&mut channels, Some((100, 100)), OutputDepth::U16) else {
        panic!("expected a 16-bit image");
    };
    assert_eq!(img.shape()[..2], [100, 100]);
    let expected = (layer.data()[(50, 50, 1)] * 65535.0).round() as u16;
    assert_eq!(img[(50, 50, 1)], expected);
}

#[test]
fn hidden_channel_contributes_nothing() {
    let mut visible = tinted_channel("a", Tint::WHITE);
    let mut both = vec![tinted_channel("a", Tint::WHITE), {
        let mut hidden = tinted_channel("b", Tint::WHITE);
        hidden.display.visible = false;
        hidden
    }];
    let with_hidden = composite_layers(&mut both, Some((250, 250)));
    let alone = composite_layers(std::slice::from_mut(&mut visible), Some((250, 250)));
    assert_eq!(with_hidden, alone);
}

#[test]
fn preview_composite_shrinks_every_layer() {
    let mut channels = vec![
        tinted_channel("a", Tint::new(0.0, 0.5, 1.0)),
        tinted_channel("b", Tint::new(1.0, 1.0, 0.0)),
    ];
    let layer = composite_layers(&mut channels, Some((125, 125)));
    assert_eq!(layer.shape(), (125, 125));
    // With no enhancement enabled nothing gets cached along the way.
    assert_eq!(channels[0].preview_cache_len(), 0);
}
