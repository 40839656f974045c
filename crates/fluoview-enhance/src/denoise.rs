//! Heavy-duty denoising (offline stages).
//!
//! Non-local means and Haar-wavelet soft thresholding. Like
//! deconvolution these are explicit, slider-free operations: NLM in
//! particular is orders of magnitude too slow for the interactive path.

use fluoview_core::error::Result;
use fluoview_core::PixelBuffer;
use ndarray::{Array2, Axis};
use rayon::prelude::*;

use crate::plane::{f32_to_depth, from_u8_proxy, map_planes, plane_to_f32, to_u8_proxy};

const NLM_TEMPLATE_RADIUS: isize = 3; // 7x7 patches
const NLM_SEARCH_RADIUS: isize = 10; // 21x21 search window

/// Non-local-means denoising with filter strength `h` (in 8-bit units,
/// typical range 3..=20).
///
/// Runs on a normalized 8-bit proxy per plane, comparing 7×7 patches
/// over a 21×21 search window.
pub fn nlm_denoise(buffer: &PixelBuffer, h: f32) -> Result<PixelBuffer> {
    if h <= 0.0 || buffer.is_empty() {
        return Ok(buffer.clone());
    }

    map_planes(buffer, |plane| {
        let (proxy, min, max) = to_u8_proxy(plane)?;
        if min == max {
            return Ok(plane.clone());
        }
        let filtered = nlm_u8(&proxy, h);
        Ok(from_u8_proxy(filtered, min, max, plane.depth()))
    })
}

fn nlm_u8(src: &Array2<u8>, h: f32) -> Array2<u8> {
    let (height, width) = src.dim();
    let inv_h2 = -1.0 / (h * h);
    let patch_px = ((NLM_TEMPLATE_RADIUS * 2 + 1) * (NLM_TEMPLATE_RADIUS * 2 + 1)) as f32;

    let at = |y: isize, x: isize| -> f32 {
        src[(
            y.clamp(0, height as isize - 1) as usize,
            x.clamp(0, width as isize - 1) as usize,
        )] as f32
    };

    let mut out = Array2::<u8>::zeros((height, width));
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(y, mut row)| {
            let y = y as isize;
            for (x, dst) in row.iter_mut().enumerate() {
                let x = x as isize;
                let mut acc = 0.0f32;
                let mut weight_sum = 0.0f32;

                for sy in -NLM_SEARCH_RADIUS..=NLM_SEARCH_RADIUS {
                    for sx in -NLM_SEARCH_RADIUS..=NLM_SEARCH_RADIUS {
                        // Mean squared patch distance.
                        let mut d2 = 0.0f32;
                        for py in -NLM_TEMPLATE_RADIUS..=NLM_TEMPLATE_RADIUS {
                            for px in -NLM_TEMPLATE_RADIUS..=NLM_TEMPLATE_RADIUS {
                                let diff = at(y + py, x + px) - at(y + sy + py, x + sx + px);
                                d2 += diff * diff;
                            }
                        }
                        let weight = (d2 / patch_px * inv_h2).exp();
                        acc += weight * at(y + sy, x + sx);
                        weight_sum += weight;
                    }
                }
                *dst = (acc / weight_sum.max(f32::EPSILON)).round().clamp(0.0, 255.0) as u8;
            }
        });
    out
}

/// Haar-wavelet soft-threshold denoising.
///
/// `sigma = None` estimates the noise level from the median absolute
/// deviation of the finest diagonal subband (the standard robust
/// estimator). The threshold follows the universal rule
/// `σ·sqrt(2·ln n)`.
pub fn wavelet_denoise(buffer: &PixelBuffer, sigma: Option<f32>, levels: usize) -> Result<PixelBuffer> {
    if buffer.is_empty() || levels == 0 {
        return Ok(buffer.clone());
    }

    map_planes(buffer, |plane| {
        let mut data = plane_to_f32(plane)?;
        let (h, w) = data.dim();
        if h < 4 || w < 4 {
            return Ok(plane.clone());
        }
        let levels = usable_levels(h, w, levels);

        forward_haar(&mut data, levels);

        let sigma = match sigma {
            Some(s) => s.max(0.0),
            None => estimate_sigma_mad(&data, h, w),
        };
        let n = (h * w) as f32;
        let threshold = sigma * (2.0 * n.ln()).sqrt();
        soft_threshold_details(&mut data, h, w, levels, threshold);

        inverse_haar(&mut data, levels);
        Ok(f32_to_depth(data, plane.depth()))
    })
}

fn usable_levels(h: usize, w: usize, requested: usize) -> usize {
    let mut levels = 0;
    let (mut lh, mut lw) = (h, w);
    while levels < requested && lh >= 4 && lw >= 4 {
        lh /= 2;
        lw /= 2;
        levels += 1;
    }
    levels.max(1)
}

/// In-place multi-level 2-D Haar transform of the top-left region.
fn forward_haar(data: &mut Array2<f32>, levels: usize) {
    let (mut h, mut w) = data.dim();
    for _ in 0..levels {
        h &= !1; // even sizes only; a trailing odd row/col is left as-is
        w &= !1;
        haar_rows(data, h, w, true);
        haar_cols(data, h, w, true);
        h /= 2;
        w /= 2;
    }
}

fn inverse_haar(data: &mut Array2<f32>, levels: usize) {
    // Recompute the region sizes of each level, then undo in reverse.
    let (mut h, mut w) = data.dim();
    let mut sizes = Vec::with_capacity(levels);
    for _ in 0..levels {
        h &= !1;
        w &= !1;
        sizes.push((h, w));
        h /= 2;
        w /= 2;
    }
    for &(lh, lw) in sizes.iter().rev() {
        haar_cols(data, lh, lw, false);
        haar_rows(data, lh, lw, false);
    }
}

const SQRT2_INV: f32 = std::f32::consts::FRAC_1_SQRT_2;

fn haar_rows(data: &mut Array2<f32>, h: usize, w: usize, forward: bool) {
    let half = w / 2;
    let mut tmp = vec![0.0f32; w];
    for y in 0..h {
        if forward {
            for i in 0..half {
                let a = data[(y, 2 * i)];
                let b = data[(y, 2 * i + 1)];
                tmp[i] = (a + b) * SQRT2_INV;
                tmp[half + i] = (a - b) * SQRT2_INV;
            }
        } else {
            for i in 0..half {
                let s = data[(y, i)];
                let d = data[(y, half + i)];
                tmp[2 * i] = (s + d) * SQRT2_INV;
                tmp[2 * i + 1] = (s - d) * SQRT2_INV;
            }
        }
        for (x, &v) in tmp.iter().enumerate().take(w) {
            data[(y, x)] = v;
        }
    }
}

fn haar_cols(data: &mut Array2<f32>, h: usize, w: usize, forward: bool) {
    let half = h / 2;
    let mut tmp = vec![0.0f32; h];
    for x in 0..w {
        if forward {
            for i in 0..half {
                let a = data[(2 * i, x)];
                let b = data[(2 * i + 1, x)];
                tmp[i] = (a + b) * SQRT2_INV;
                tmp[half + i] = (a - b) * SQRT2_INV;
            }
        } else {
            for i in 0..half {
                let s = data[(i, x)];
                let d = data[(half + i, x)];
                tmp[2 * i] = (s + d) * SQRT2_INV;
                tmp[2 * i + 1] = (s - d) * SQRT2_INV;
            }
        }
        for (y, &v) in tmp.iter().enumerate().take(h) {
            data[(y, x)] = v;
        }
    }
}

/// Robust noise estimate: MAD of the finest diagonal (HH) subband.
fn estimate_sigma_mad(data: &Array2<f32>, h: usize, w: usize) -> f32 {
    let (h, w) = (h & !1, w & !1);
    let (hy, hx) = (h / 2, w / 2);
    let mut coeffs: Vec<f32> = (hy..h)
        .flat_map(|y| (hx..w).map(move |x| (y, x)))
        .map(|(y, x)| data[(y, x)].abs())
        .collect();
    if coeffs.is_empty() {
        return 0.0;
    }
    let mid = coeffs.len() / 2;
    let (_, median, _) = coeffs.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *median / 0.6745
}

/// Soft-threshold every detail coefficient, leaving the final
/// approximation band untouched.
fn soft_threshold_details(data: &mut Array2<f32>, h: usize, w: usize, levels: usize, threshold: f32) {
    if threshold <= 0.0 {
        return;
    }
    let (mut lh, mut lw) = (h & !1, w & !1);
    for _ in 0..levels {
        let (hy, hx) = (lh / 2, lw / 2);
        for y in 0..lh {
            for x in 0..lw {
                // Approximation quadrant of this level is refined later
                // (or kept, at the last level).
                if y < hy && x < hx {
                    continue;
                }
                let v = data[(y, x)];
                data[(y, x)] = v.signum() * (v.abs() - threshold).max(0.0);
            }
        }
        lh = hy & !1;
        lw = hx & !1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haar_roundtrip_is_lossless() {
        let src = Array2::from_shape_fn((16, 16), |(y, x)| (y * 3 + x * 7) as f32);
        let mut data = src.clone();
        forward_haar(&mut data, 3);
        inverse_haar(&mut data, 3);
        for (a, b) in src.iter().zip(data.iter()) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn wavelet_flattens_small_noise() {
        let data = Array2::from_shape_fn((32, 32), |(y, x)| {
            1000.0 + if (y + x) % 2 == 0 { 5.0 } else { -5.0 }
        });
        let buf = PixelBuffer::GrayF32(data);
        let out = wavelet_denoise(&buf, None, 2).unwrap();
        let spread = out.max_value() - out.min_value();
        assert!(spread < 10.0, "residual spread {spread}");
    }

    #[test]
    fn zero_strength_nlm_is_identity() {
        let buf = PixelBuffer::Gray8(Array2::from_elem((8, 8), 50u8));
        assert_eq!(nlm_denoise(&buf, 0.0).unwrap(), buf);
    }

    #[test]
    fn nlm_smooths_impulse_noise() {
        let mut data = Array2::from_elem((24, 24), 100u8);
        data[(12, 12)] = 200; // lone impulse
        let buf = PixelBuffer::Gray8(data);
        let out = nlm_denoise(&buf, 15.0).unwrap();
        if let PixelBuffer::Gray8(a) = &out {
            assert!(a[(12, 12)] < 200, "impulse untouched");
        }
    }

    #[test]
    fn tiny_buffers_pass_through_wavelet() {
        let buf = PixelBuffer::Gray16(Array2::from_elem((3, 3), 9u16));
        assert_eq!(wavelet_denoise(&buf, None, 3).unwrap(), buf);
    }
}
