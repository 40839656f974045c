//! Morphological background suppression (top-hat).
//!
//! A grayscale opening with a square structuring element estimates the
//! smooth background; subtracting it keeps only structures smaller than
//! the kernel. The opening runs as separable sliding-window min then max
//! passes, so the cost is independent of the kernel size.

use fluoview_core::error::{FluoViewError, Result};
use fluoview_core::PixelBuffer;
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use std::collections::VecDeque;

use crate::plane::{f32_to_depth, map_planes, plane_to_f32};

/// Suppress smooth background with a top-hat of the given kernel size,
/// blended by `strength`.
///
/// `strength` is clamped to [0, 2]: values near zero are identity, 1.0
/// returns the top-hat itself, values above 1 over-subtract. The kernel
/// is forced odd and at least 3.
pub fn suppress_background(
    buffer: &PixelBuffer,
    kernel: usize,
    strength: f32,
) -> Result<PixelBuffer> {
    let strength = strength.clamp(0.0, 2.0);
    if strength <= 1e-3 || buffer.is_empty() {
        return Ok(buffer.clone());
    }
    let kernel = (kernel | 1).max(3);

    map_planes(buffer, |plane| {
        let src = plane_to_f32(plane)?;
        let opened = gray_open(&src, kernel)?;
        let out_max = plane.depth().nominal_max().max(plane.max_value());

        let blended = ndarray::Zip::from(&src).and(&opened).map_collect(|&orig, &bg| {
            let tophat = (orig - bg).max(0.0);
            ((1.0 - strength) * orig + strength * tophat).clamp(0.0, out_max)
        });
        Ok(f32_to_depth(blended, plane.depth()))
    })
}

/// Grayscale opening: separable erosion (min) then dilation (max).
fn gray_open(src: &Array2<f32>, kernel: usize) -> Result<Array2<f32>> {
    if kernel < 3 {
        return Err(FluoViewError::InvalidParameter(format!(
            "opening kernel {kernel} below minimum of 3"
        )));
    }
    let eroded = separable_extrema(src, kernel, Extremum::Min);
    Ok(separable_extrema(&eroded, kernel, Extremum::Max))
}

#[derive(Clone, Copy, PartialEq)]
enum Extremum {
    Min,
    Max,
}

/// Run the sliding extremum along rows, then along columns.
fn separable_extrema(src: &Array2<f32>, window: usize, which: Extremum) -> Array2<f32> {
    let mut horizontal = src.clone();
    filter_rows(&mut horizontal, window, which);

    // Transpose so the column pass reuses the row machinery.
    let mut transposed = horizontal.reversed_axes().as_standard_layout().to_owned();
    filter_rows(&mut transposed, window, which);
    transposed.reversed_axes().as_standard_layout().to_owned()
}

fn filter_rows(data: &mut Array2<f32>, window: usize, which: Extremum) {
    data.axis_iter_mut(Axis(0))
        .into_par_iter()
        .for_each(|mut row| {
            let values: Vec<f32> = row.iter().copied().collect();
            let filtered = sliding_extremum(&values, window, which);
            for (dst, v) in row.iter_mut().zip(filtered) {
                *dst = v;
            }
        });
}

/// Monotonic-deque sliding min/max over a centered window, clamped at
/// the edges. O(n) regardless of window size.
fn sliding_extremum(data: &[f32], window: usize, which: Extremum) -> Vec<f32> {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }
    let radius = window / 2;
    let keeps = |candidate: f32, incumbent: f32| match which {
        Extremum::Min => candidate <= incumbent,
        Extremum::Max => candidate >= incumbent,
    };

    let mut deque: VecDeque<usize> = VecDeque::new();
    let mut out = vec![0.0f32; n];
    for i in 0..n + radius {
        if i < n {
            while let Some(&back) = deque.back() {
                if keeps(data[i], data[back]) {
                    deque.pop_back();
                } else {
                    break;
                }
            }
            deque.push_back(i);
        }
        if i >= radius {
            let center = i - radius;
            while let Some(&front) = deque.front() {
                if front + radius < center {
                    deque.pop_front();
                } else {
                    break;
                }
            }
            if let Some(&front) = deque.front() {
                out[center] = data[front];
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn zero_strength_is_identity() {
        let buf = PixelBuffer::Gray16(Array2::from_elem((16, 16), 500u16));
        assert_eq!(suppress_background(&buf, 15, 0.0).unwrap(), buf);
    }

    #[test]
    fn flat_background_is_removed_at_full_strength() {
        // Uniform background 1000 with a small bright spot.
        let mut data = Array2::from_elem((32, 32), 1000u16);
        data[(16, 16)] = 5000;
        let buf = PixelBuffer::Gray16(data);
        let out = suppress_background(&buf, 9, 1.0).unwrap();
        if let PixelBuffer::Gray16(a) = &out {
            // Background pixels collapse toward zero, the spot survives.
            assert_eq!(a[(2, 2)], 0);
            assert_eq!(a[(16, 16)], 4000);
        } else {
            panic!("depth changed");
        }
    }

    #[test]
    fn sliding_min_matches_naive() {
        let data = [5.0, 3.0, 8.0, 1.0, 9.0, 2.0, 7.0];
        let got = sliding_extremum(&data, 3, Extremum::Min);
        let naive: Vec<f32> = (0..data.len())
            .map(|i| {
                let lo = i.saturating_sub(1);
                let hi = (i + 1).min(data.len() - 1);
                data[lo..=hi].iter().copied().fold(f32::INFINITY, f32::min)
            })
            .collect();
        assert_eq!(got, naive);
    }

    #[test]
    fn sliding_max_matches_naive() {
        let data = [5.0, 3.0, 8.0, 1.0, 9.0, 2.0, 7.0];
        let got = sliding_extremum(&data, 5, Extremum::Max);
        let naive: Vec<f32> = (0..data.len())
            .map(|i| {
                let lo = i.saturating_sub(2);
                let hi = (i + 2).min(data.len() - 1);
                data[lo..=hi].iter().copied().fold(f32::NEG_INFINITY, f32::max)
            })
            .collect();
        assert_eq!(got, naive);
    }

    #[test]
    fn even_kernel_is_rounded_up_not_rejected() {
        let buf = PixelBuffer::Gray8(Array2::from_elem((8, 8), 10u8));
        assert!(suppress_background(&buf, 4, 1.0).is_ok());
    }
}
