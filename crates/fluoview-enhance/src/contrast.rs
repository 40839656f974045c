//! Local contrast enhancement (CLAHE).
//!
//! Contrast-limited adaptive histogram equalization: the image is split
//! into tiles, each tile gets a clipped-histogram equalization mapping,
//! and every pixel bilinearly interpolates between the four surrounding
//! tile mappings to avoid visible tile seams.

use fluoview_core::error::Result;
use fluoview_core::PixelBuffer;
use ndarray::{Array2, Axis};
use rayon::prelude::*;

use crate::plane::map_planes;

/// Largest tile grid per axis. Keeps the per-tile histogram memory
/// bounded on very large images with small tile sizes.
const MAX_GRID: usize = 16;

/// Apply CLAHE with the given clip limit (fraction of tile area, as in
/// the adaptive-equalization literature) and tile size in pixels.
///
/// A clip limit at or below 1e-3 is identity. f32 buffers run on a
/// 16-bit proxy over their observed range and are mapped back.
pub fn local_contrast(buffer: &PixelBuffer, clip_limit: f32, tile: usize) -> Result<PixelBuffer> {
    if clip_limit <= 1e-3 || buffer.is_empty() {
        return Ok(buffer.clone());
    }
    let tile = tile.max(2);

    map_planes(buffer, |plane| match plane {
        PixelBuffer::Gray8(a) => {
            let wide = a.mapv(|v| v as u16);
            let eq = clahe_plane(&wide, 256, clip_limit, tile);
            Ok(PixelBuffer::Gray8(eq.mapv(|v| v.min(255) as u8)))
        }
        PixelBuffer::Gray16(a) => Ok(PixelBuffer::Gray16(clahe_plane(a, 65536, clip_limit, tile))),
        PixelBuffer::GrayF32(a) => {
            let min = a.iter().copied().fold(f32::INFINITY, f32::min);
            let max = a.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let range = max - min;
            if !range.is_finite() || range <= f32::EPSILON {
                return Ok(plane.clone());
            }
            let proxy = a.mapv(|v| (((v - min) / range) * 65535.0).round() as u16);
            let eq = clahe_plane(&proxy, 65536, clip_limit, tile);
            Ok(PixelBuffer::GrayF32(
                eq.mapv(|v| min + (v as f32 / 65535.0) * range),
            ))
        }
        // map_planes only hands us grayscale planes.
        PixelBuffer::Rgb8(_) => Ok(plane.clone()),
    })
}

fn clahe_plane(data: &Array2<u16>, levels: usize, clip_limit: f32, tile: usize) -> Array2<u16> {
    let (h, w) = data.dim();
    if h < 2 || w < 2 {
        return data.clone();
    }
    let grid_h = (h / tile).clamp(1, MAX_GRID);
    let grid_w = (w / tile).clamp(1, MAX_GRID);
    let tile_h = h.div_ceil(grid_h);
    let tile_w = w.div_ceil(grid_w);

    // One equalization mapping per tile.
    let mappings: Vec<Vec<u16>> = (0..grid_h * grid_w)
        .into_par_iter()
        .map(|idx| {
            let ty = idx / grid_w;
            let tx = idx % grid_w;
            let y0 = ty * tile_h;
            let x0 = tx * tile_w;
            let y1 = (y0 + tile_h).min(h);
            let x1 = (x0 + tile_w).min(w);

            let mut hist = vec![0u32; levels];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[data[(y, x)] as usize] += 1;
                }
            }
            let area = (y1 - y0) * (x1 - x0);
            clip_and_map(&mut hist, area, clip_limit, levels)
        })
        .collect();

    // Bilinear interpolation between the four surrounding tile mappings.
    let mut out = Array2::<u16>::zeros((h, w));
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(y, mut row)| {
            let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
            let ty0 = (fy.floor().max(0.0) as usize).min(grid_h - 1);
            let ty1 = (ty0 + 1).min(grid_h - 1);
            let wy = (fy - fy.floor()).clamp(0.0, 1.0);
            let wy = if fy < 0.0 { 0.0 } else { wy };

            for (x, dst) in row.iter_mut().enumerate() {
                let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
                let tx0 = (fx.floor().max(0.0) as usize).min(grid_w - 1);
                let tx1 = (tx0 + 1).min(grid_w - 1);
                let wx = (fx - fx.floor()).clamp(0.0, 1.0);
                let wx = if fx < 0.0 { 0.0 } else { wx };

                let v = data[(y, x)] as usize;
                let top = mappings[ty0 * grid_w + tx0][v] as f32 * (1.0 - wx)
                    + mappings[ty0 * grid_w + tx1][v] as f32 * wx;
                let bottom = mappings[ty1 * grid_w + tx0][v] as f32 * (1.0 - wx)
                    + mappings[ty1 * grid_w + tx1][v] as f32 * wx;
                *dst = (top * (1.0 - wy) + bottom * wy).round() as u16;
            }
        });
    out
}

/// Clip the histogram at `clip_limit × area`, redistribute the excess
/// uniformly, and return the resulting equalization mapping.
fn clip_and_map(hist: &mut [u32], area: usize, clip_limit: f32, levels: usize) -> Vec<u16> {
    let clip_at = ((clip_limit * area as f32) as u32).max(1);

    let mut excess = 0u64;
    for count in hist.iter_mut() {
        if *count > clip_at {
            excess += (*count - clip_at) as u64;
            *count = clip_at;
        }
    }
    let bonus = (excess / levels as u64) as u32;
    if bonus > 0 {
        for count in hist.iter_mut() {
            *count += bonus;
        }
    }

    let total: u64 = hist.iter().map(|&c| c as u64).sum();
    let scale = (levels - 1) as f64 / total.max(1) as f64;
    let mut cumulative = 0u64;
    hist.iter()
        .map(|&c| {
            cumulative += c as u64;
            (cumulative as f64 * scale).round() as u16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluoview_core::PixelDepth;

    #[test]
    fn zero_clip_is_identity() {
        let buf = PixelBuffer::Gray16(Array2::from_elem((32, 32), 777u16));
        assert_eq!(local_contrast(&buf, 0.0, 8).unwrap(), buf);
    }

    #[test]
    fn output_shape_and_depth_match_input() {
        let data = Array2::from_shape_fn((64, 48), |(y, x)| ((y * x) % 4000) as u16);
        let buf = PixelBuffer::Gray16(data);
        let out = local_contrast(&buf, 0.03, 16).unwrap();
        assert_eq!(out.shape(), (64, 48));
        assert_eq!(out.depth(), PixelDepth::U16);
    }

    #[test]
    fn equalization_spreads_a_compressed_histogram() {
        // Values confined to a narrow band spread out after equalization.
        let data = Array2::from_shape_fn((64, 64), |(y, x)| 1000 + ((y + x) % 64) as u16);
        let buf = PixelBuffer::Gray16(data);
        let out = local_contrast(&buf, 0.5, 32).unwrap();
        let spread = out.max_value() - out.min_value();
        assert!(spread > 10_000.0, "spread only {spread}");
    }

    #[test]
    fn flat_image_stays_flat_in_f32() {
        let buf = PixelBuffer::GrayF32(Array2::from_elem((16, 16), 0.5f32));
        let out = local_contrast(&buf, 0.03, 8).unwrap();
        assert_eq!(out, buf);
    }
}
