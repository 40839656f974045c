//! Richardson-Lucy deconvolution (offline stage).
//!
//! Not part of the interactive pipeline: iterative deconvolution is far
//! too slow for slider feedback, so callers run it explicitly on demand.

use fluoview_core::error::{FluoViewError, Result};
use fluoview_core::PixelBuffer;
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::plane::{f32_to_depth, map_planes, plane_to_f32};

/// Deconvolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeconvParams {
    /// Richardson-Lucy iteration count.
    pub iterations: u32,
    /// Total-variation regularization weight; 0 disables the
    /// regularization pass.
    pub tv_weight: f32,
}

impl Default for DeconvParams {
    fn default() -> Self {
        Self {
            iterations: 10,
            tv_weight: 0.0,
        }
    }
}

/// Normalized 2-D Gaussian point-spread function.
pub fn gaussian_psf(radius: usize, sigma: f32) -> Array2<f32> {
    let radius = radius.max(1);
    let sigma = sigma.max(0.1);
    let side = radius * 2 + 1;
    let norm = -0.5 / (sigma * sigma);
    let mut psf = Array2::from_shape_fn((side, side), |(y, x)| {
        let dy = y as f32 - radius as f32;
        let dx = x as f32 - radius as f32;
        ((dy * dy + dx * dx) * norm).exp()
    });
    let sum: f32 = psf.iter().sum();
    psf.mapv_inplace(|v| v / sum);
    psf
}

/// Richardson-Lucy deconvolution with the given PSF.
///
/// Runs on a [0, 1]-normalized float copy of each plane and rescales
/// back to the source depth. With `tv_weight > 0` each iteration is
/// damped by a total-variation term that suppresses ringing.
pub fn richardson_lucy(
    buffer: &PixelBuffer,
    psf: &Array2<f32>,
    params: &DeconvParams,
) -> Result<PixelBuffer> {
    if params.iterations == 0 || buffer.is_empty() {
        return Ok(buffer.clone());
    }
    if psf.nrows() % 2 == 0 || psf.ncols() % 2 == 0 {
        return Err(FluoViewError::InvalidParameter(
            "PSF dimensions must be odd".into(),
        ));
    }
    let psf_sum: f32 = psf.iter().sum();
    if psf_sum <= f32::EPSILON {
        return Err(FluoViewError::InvalidParameter("PSF sums to zero".into()));
    }

    let flipped = flip(psf);
    let tv_weight = params.tv_weight.clamp(0.0, 0.5);

    map_planes(buffer, |plane| {
        let src = plane_to_f32(plane)?;
        let max = src.iter().copied().fold(0.0f32, f32::max);
        if max <= 0.0 {
            return Ok(plane.clone());
        }
        let observed = src.mapv(|v| (v / max).max(0.0));

        let mut estimate = observed.clone();
        for _ in 0..params.iterations {
            let blurred = convolve(&estimate, psf);
            let ratio = ndarray::Zip::from(&observed)
                .and(&blurred)
                .map_collect(|&o, &b| o / b.max(1e-6));
            let correction = convolve(&ratio, &flipped);
            estimate = ndarray::Zip::from(&estimate)
                .and(&correction)
                .map_collect(|&e, &c| (e * c).clamp(0.0, 4.0));

            if tv_weight > 0.0 {
                let div = tv_divergence(&estimate);
                estimate = ndarray::Zip::from(&estimate)
                    .and(&div)
                    .map_collect(|&e, &d| (e / (1.0 - tv_weight * d).max(0.1)).clamp(0.0, 4.0));
            }
        }

        Ok(f32_to_depth(estimate.mapv(|v| v * max), plane.depth()))
    })
}

fn flip(kernel: &Array2<f32>) -> Array2<f32> {
    let (h, w) = kernel.dim();
    Array2::from_shape_fn((h, w), |(y, x)| kernel[(h - 1 - y, w - 1 - x)])
}

/// Direct spatial convolution with clamp-to-edge borders.
fn convolve(src: &Array2<f32>, kernel: &Array2<f32>) -> Array2<f32> {
    let (h, w) = src.dim();
    let (kh, kw) = kernel.dim();
    let ry = (kh / 2) as isize;
    let rx = (kw / 2) as isize;

    let mut out = Array2::<f32>::zeros((h, w));
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(y, mut row)| {
            for (x, dst) in row.iter_mut().enumerate() {
                let mut acc = 0.0f32;
                for ky in 0..kh {
                    let sy = (y as isize + ky as isize - ry).clamp(0, h as isize - 1) as usize;
                    for kx in 0..kw {
                        let sx = (x as isize + kx as isize - rx).clamp(0, w as isize - 1) as usize;
                        acc += src[(sy, sx)] * kernel[(ky, kx)];
                    }
                }
                *dst = acc;
            }
        });
    out
}

/// Divergence of the normalized gradient, the total-variation term.
fn tv_divergence(img: &Array2<f32>) -> Array2<f32> {
    let (h, w) = img.dim();
    let at = |y: isize, x: isize| {
        img[(
            y.clamp(0, h as isize - 1) as usize,
            x.clamp(0, w as isize - 1) as usize,
        )]
    };
    Array2::from_shape_fn((h, w), |(y, x)| {
        let (y, x) = (y as isize, x as isize);
        let gx = at(y, x + 1) - at(y, x);
        let gy = at(y + 1, x) - at(y, x);
        let mag = (gx * gx + gy * gy).sqrt().max(1e-6);
        let gx_prev = at(y, x) - at(y, x - 1);
        let gy_prev = at(y, x) - at(y - 1, x);
        let mag_prev = (gx_prev * gx_prev + gy_prev * gy_prev).sqrt().max(1e-6);
        (gx / mag - gx_prev / mag_prev) + (gy / mag - gy_prev / mag_prev)
    })
}
