//! Additive multi-channel compositing.

use fluoview_core::{Channel, ColorLayer, OutputDepth, RgbImage};

use crate::renderer::render_layer;

/// Composite a scene and quantize the result for display at the
/// requested depth. The display-facing entry point; see
/// [`composite_layers`] for the normalized working layer.
pub fn composite(
    channels: &mut [Channel],
    target_shape: Option<(usize, usize)>,
    out_depth: OutputDepth,
) -> RgbImage {
    composite_layers(channels, target_shape).quantize(out_depth)
}

/// Composite the visible channels of a scene into one RGB layer.
///
/// The target shape defaults to the first non-empty channel's shape.
/// Each visible layer is rendered (through its channel cache), resized
/// to the target if needed, and summed; the sum is clamped to [0, 1].
/// With nothing to draw the result is a black layer — never `None` —
/// falling back to 1×1 when no shape is resolvable at all.
pub fn composite_layers(channels: &mut [Channel], target_shape: Option<(usize, usize)>) -> ColorLayer {
    let target = target_shape
        .or_else(|| {
            channels
                .iter()
                .find(|c| !c.raw().is_empty())
                .map(|c| c.shape())
        })
        .unwrap_or((1, 1));

    let mut out = ColorLayer::black(target);
    for channel in channels.iter_mut() {
        let Some(layer) = render_layer(channel, Some(target)) else {
            continue;
        };
        if layer.shape() == target {
            out.accumulate(&layer);
        } else {
            out.accumulate(&layer.resize_nearest(target));
        }
    }
    out.clamp01();
    out
}
