//! Automatic parameter estimation.
//!
//! Derives per-image baseline values for every enhancement stage so the
//! user-facing knobs can stay plain percentages of "what looks right for
//! this image". Estimation is deterministic and runs on a small
//! downsampled copy, so it is cheap enough to do once per loaded buffer.

use fluoview_core::error::Result;
use fluoview_core::{AutoParams, PixelBuffer};
use ndarray::Array2;
use tracing::debug;

use crate::plane::plane_to_f32;

/// Long side of the analysis downsample.
const ANALYSIS_MAX_DIM: usize = 256;

/// Estimate baseline enhancement parameters for a buffer.
///
/// - Signal radius from the image dimensions: `clamp(max(h, w)/50, 10, 50)`.
/// - Top-hat kernel 4× the radius, CLAHE tile 2× the radius.
/// - Noise sigma from the residual against a 3×3 median filter of the
///   normalized analysis image, mapped into 1.0..=5.0.
/// - Stretch clip and contrast clip are fixed bases (2.0 percent,
///   0.03); gamma is neutral.
pub fn estimate_auto_params(buffer: &PixelBuffer) -> Result<AutoParams> {
    if buffer.is_empty() {
        return Ok(AutoParams::default());
    }

    let (h, w) = buffer.shape();
    let signal_radius = (h.max(w) / 50).clamp(10, 50);

    let analysis = analysis_copy(buffer)?;
    let noise_sigma = estimate_noise_sigma(&analysis);

    let params = AutoParams {
        stretch_clip: 2.0,
        bg_kernel: signal_radius * 4,
        contrast_clip: 0.03,
        contrast_tile: signal_radius * 2,
        noise_sigma,
        gamma: 1.0,
    };
    debug!(
        radius = signal_radius,
        noise_sigma, "estimated auto enhancement parameters"
    );
    Ok(params)
}

/// Grayscale, normalized, ≤256px-long-side copy for statistics.
fn analysis_copy(buffer: &PixelBuffer) -> Result<Array2<f32>> {
    let (h, w) = buffer.shape();
    let long = h.max(w);
    let scaled = if long > ANALYSIS_MAX_DIM {
        let th = (h * ANALYSIS_MAX_DIM / long).max(1);
        let tw = (w * ANALYSIS_MAX_DIM / long).max(1);
        buffer.downsample((th, tw))
    } else {
        buffer.clone()
    };

    // Collapse RGB to its first plane; fluorescence sources are
    // grayscale anyway.
    let plane = match scaled.split_planes().into_iter().next() {
        Some(p) => p,
        None => return Ok(Array2::zeros((1, 1))),
    };
    let data = plane_to_f32(&plane)?;
    let max = data.iter().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return Ok(data);
    }
    Ok(data.mapv(|v| v / max))
}

/// Median-filter-residual noise estimate on the normalized image,
/// mapped to the bilateral sigma range 1.0..=5.0.
fn estimate_noise_sigma(normalized: &Array2<f32>) -> f32 {
    let (h, w) = normalized.dim();
    if h < 3 || w < 3 {
        return 1.0;
    }

    let mut residuals: Vec<f32> = Vec::with_capacity((h - 2) * (w - 2));
    let mut window = [0.0f32; 9];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut i = 0;
            for dy in 0..3 {
                for dx in 0..3 {
                    window[i] = normalized[(y + dy - 1, x + dx - 1)];
                    i += 1;
                }
            }
            window.sort_unstable_by(|a, b| a.total_cmp(b));
            residuals.push((normalized[(y, x)] - window[4]).abs());
        }
    }
    if residuals.is_empty() {
        return 1.0;
    }
    let mid = residuals.len() / 2;
    let (_, median, _) = residuals.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    let norm_noise = *median;

    (1.0 + norm_noise * 200.0).clamp(1.0, 5.0)
}
