//! The interactive enhancement pipeline.

use fluoview_core::{PipelineParams, PixelBuffer};
use tracing::warn;

use crate::{apply_gamma, local_contrast, percentile_stretch, smooth_noise, suppress_background};

/// Run the enabled stages in their fixed order: background suppression,
/// local contrast, noise smoothing, signal stretch, gamma.
///
/// `scale_factor` is the preview scale (output pixels per source pixel,
/// 1.0 at full resolution); spatial kernel sizes shrink with it so a
/// preview render looks like the full-resolution one. Disabled stages
/// are skipped entirely — with everything disabled the output is
/// bit-identical to the input. A failing stage logs a warning and the
/// pipeline continues from the previous stage's output.
pub fn run_pipeline(
    buffer: &PixelBuffer,
    params: &PipelineParams,
    scale_factor: f32,
) -> PixelBuffer {
    if !params.any_enabled() || buffer.is_empty() {
        return buffer.clone();
    }
    let scale = if scale_factor.is_finite() && scale_factor > 0.0 {
        scale_factor.min(1.0)
    } else {
        1.0
    };

    let mut current = buffer.clone();

    if params.bg_enabled {
        let kernel = ((params.bg_kernel as f32 * scale).round() as usize).max(3);
        match suppress_background(&current, kernel, params.bg_strength) {
            Ok(out) => current = out,
            Err(err) => warn!(%err, "background suppression failed, keeping previous output"),
        }
    }

    if params.contrast_enabled {
        match local_contrast(&current, params.contrast_clip, params.contrast_tile) {
            Ok(out) => current = out,
            Err(err) => warn!(%err, "local contrast failed, keeping previous output"),
        }
    }

    if params.noise_enabled {
        match smooth_noise(&current, params.noise_sigma) {
            Ok(out) => current = out,
            Err(err) => warn!(%err, "noise smoothing failed, keeping previous output"),
        }
    }

    if params.stretch_enabled {
        let low = params.stretch_clip;
        let high = 100.0 - params.stretch_clip;
        match percentile_stretch(&current, low, high) {
            Ok(out) => current = out,
            Err(err) => warn!(%err, "signal stretch failed, keeping previous output"),
        }
    }

    if params.gamma_enabled {
        match apply_gamma(&current, params.gamma) {
            Ok(out) => current = out,
            Err(err) => warn!(%err, "gamma failed, keeping previous output"),
        }
    }

    current
}
