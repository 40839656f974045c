//! Edge-preserving noise smoothing (bilateral filter).

use fluoview_core::error::Result;
use fluoview_core::PixelBuffer;
use ndarray::{Array2, Axis};
use rayon::prelude::*;

use crate::plane::{from_u8_proxy, map_planes, to_u8_proxy};

/// Bilateral smoothing driven by a single sigma.
///
/// The window diameter is `4σ` forced odd (minimum 3), the range sigma
/// is `20σ` in 8-bit units and the spatial sigma `3σ`. The filter runs
/// on a normalized 8-bit proxy of each plane and maps the result back
/// to the source depth, which keeps the kernel tables small and the
/// behavior identical across bit depths.
pub fn smooth_noise(buffer: &PixelBuffer, sigma: f32) -> Result<PixelBuffer> {
    if sigma <= 1e-2 || buffer.is_empty() {
        return Ok(buffer.clone());
    }

    let diameter = (((sigma * 4.0).round() as usize) | 1).max(3);
    let sigma_color = sigma * 20.0;
    let sigma_space = sigma * 3.0;

    map_planes(buffer, |plane| {
        let (proxy, min, max) = to_u8_proxy(plane)?;
        if min == max {
            return Ok(plane.clone());
        }
        let filtered = bilateral_u8(&proxy, diameter, sigma_color, sigma_space);
        Ok(from_u8_proxy(filtered, min, max, plane.depth()))
    })
}

fn bilateral_u8(src: &Array2<u8>, diameter: usize, sigma_color: f32, sigma_space: f32) -> Array2<u8> {
    let (h, w) = src.dim();
    let radius = (diameter / 2) as isize;

    // Precompute both kernel tables.
    let space_norm = -0.5 / (sigma_space * sigma_space);
    let color_norm = -0.5 / (sigma_color * sigma_color);
    let side = diameter;
    let spatial: Vec<f32> = (0..side * side)
        .map(|i| {
            let dy = i as isize / side as isize - radius;
            let dx = i as isize % side as isize - radius;
            (((dy * dy + dx * dx) as f32) * space_norm).exp()
        })
        .collect();
    let range: Vec<f32> = (0..=255u32)
        .map(|d| ((d * d) as f32 * color_norm).exp())
        .collect();

    let mut out = Array2::<u8>::zeros((h, w));
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(y, mut row)| {
            for (x, dst) in row.iter_mut().enumerate() {
                let center = src[(y, x)] as f32;
                let mut acc = 0.0f32;
                let mut weight_sum = 0.0f32;
                for dy in -radius..=radius {
                    let sy = (y as isize + dy).clamp(0, h as isize - 1) as usize;
                    for dx in -radius..=radius {
                        let sx = (x as isize + dx).clamp(0, w as isize - 1) as usize;
                        let v = src[(sy, sx)] as f32;
                        let ki = ((dy + radius) * side as isize + (dx + radius)) as usize;
                        let weight = spatial[ki] * range[(v - center).abs() as usize];
                        acc += v * weight;
                        weight_sum += weight;
                    }
                }
                *dst = (acc / weight_sum.max(f32::EPSILON)).round().clamp(0.0, 255.0) as u8;
            }
        });
    out
}
