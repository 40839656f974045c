//! Percentile-based signal stretch.

use fluoview_core::error::Result;
use fluoview_core::PixelBuffer;
use ndarray::Array2;

use crate::plane::{f32_to_depth, map_planes, plane_to_f32};

/// Stretch the intensities so the `low_pct`..`high_pct` percentile span
/// fills the buffer's observed range.
///
/// Percentiles are clamped to [0, 100]; `low >= high` or a percentile
/// span narrower than 1e-6 leaves the buffer untouched. Integer depths
/// use an exact cumulative histogram; f32 falls back to a partial sort.
pub fn percentile_stretch(buffer: &PixelBuffer, low_pct: f32, high_pct: f32) -> Result<PixelBuffer> {
    let low_pct = low_pct.clamp(0.0, 100.0);
    let high_pct = high_pct.clamp(0.0, 100.0);
    if low_pct >= high_pct || buffer.is_empty() {
        return Ok(buffer.clone());
    }

    map_planes(buffer, |plane| {
        let (p_low, p_high) = plane_percentiles(plane, low_pct, high_pct)?;
        let span = p_high - p_low;
        if span < 1e-6 {
            return Ok(plane.clone());
        }

        // Map [p_low, p_high] onto the plane's own observed range so the
        // output stays comparable to the input.
        let out_min = plane.min_value();
        let out_max = plane.max_value();
        let scale = (out_max - out_min) / span;

        let data = plane_to_f32(plane)?;
        let stretched = data.mapv(|v| ((v - p_low) * scale + out_min).clamp(out_min, out_max));
        Ok(f32_to_depth(stretched, plane.depth()))
    })
}

fn plane_percentiles(plane: &PixelBuffer, low_pct: f32, high_pct: f32) -> Result<(f32, f32)> {
    match plane {
        PixelBuffer::Gray8(a) => {
            let mut hist = [0u32; 256];
            for &v in a.iter() {
                hist[v as usize] += 1;
            }
            Ok(histogram_percentiles(&hist, a.len(), low_pct, high_pct))
        }
        PixelBuffer::Gray16(a) => {
            let mut hist = vec![0u32; 65536];
            for &v in a.iter() {
                hist[v as usize] += 1;
            }
            Ok(histogram_percentiles(&hist, a.len(), low_pct, high_pct))
        }
        _ => {
            let data = plane_to_f32(plane)?;
            Ok(sorted_percentiles(data, low_pct, high_pct))
        }
    }
}

fn histogram_percentiles(hist: &[u32], total: usize, low_pct: f32, high_pct: f32) -> (f32, f32) {
    let low_target = (low_pct as f64 / 100.0 * total as f64).round() as u64;
    let high_target = (high_pct as f64 / 100.0 * total as f64).round() as u64;

    let mut cumulative = 0u64;
    let mut p_low = 0.0;
    let mut p_high = (hist.len() - 1) as f32;
    let mut low_found = false;
    for (value, &count) in hist.iter().enumerate() {
        cumulative += count as u64;
        if !low_found && cumulative >= low_target.max(1) {
            p_low = value as f32;
            low_found = true;
        }
        if cumulative >= high_target {
            p_high = value as f32;
            break;
        }
    }
    (p_low, p_high)
}

fn sorted_percentiles(data: Array2<f32>, low_pct: f32, high_pct: f32) -> (f32, f32) {
    let mut values: Vec<f32> = data.into_iter().collect();
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let last = values.len() - 1;
    let low_idx = (low_pct / 100.0 * last as f32).round() as usize;
    let high_idx = (high_pct / 100.0 * last as f32).round() as usize;

    let (_, low, _) = values.select_nth_unstable_by(low_idx, |a, b| a.total_cmp(b));
    let p_low = *low;
    let (_, high, _) = values.select_nth_unstable_by(high_idx.max(low_idx), |a, b| a.total_cmp(b));
    (p_low, *high)
}
