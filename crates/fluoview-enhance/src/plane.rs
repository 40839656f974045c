//! Shared plane plumbing for the filters.
//!
//! Every filter works on a single grayscale plane; multi-plane (RGB)
//! buffers are split, filtered per plane, and recombined here so the
//! individual filters stay 2-D only.

use fluoview_core::error::{FluoViewError, Result};
use fluoview_core::{PixelBuffer, PixelDepth};
use ndarray::Array2;

/// Apply a grayscale filter to every plane of `buffer` and recombine.
pub(crate) fn map_planes<F>(buffer: &PixelBuffer, mut f: F) -> Result<PixelBuffer>
where
    F: FnMut(&PixelBuffer) -> Result<PixelBuffer>,
{
    if !buffer.is_multiplane() {
        return f(buffer);
    }
    let planes = buffer.split_planes();
    let mut out = Vec::with_capacity(planes.len());
    for plane in &planes {
        out.push(f(plane)?);
    }
    PixelBuffer::merge_planes(&out)
        .ok_or_else(|| FluoViewError::Filter("plane recombination failed".into()))
}

/// Copy a grayscale plane into an f32 array in native units.
pub(crate) fn plane_to_f32(plane: &PixelBuffer) -> Result<Array2<f32>> {
    match plane {
        PixelBuffer::Gray8(a) => Ok(a.mapv(|v| v as f32)),
        PixelBuffer::Gray16(a) => Ok(a.mapv(|v| v as f32)),
        PixelBuffer::GrayF32(a) => Ok(a.clone()),
        PixelBuffer::Rgb8(_) => Err(FluoViewError::Filter(
            "expected a grayscale plane, got RGB".into(),
        )),
    }
}

/// Cast f32 data back to the given depth, clamping integer outputs to
/// their nominal range.
pub(crate) fn f32_to_depth(data: Array2<f32>, depth: PixelDepth) -> PixelBuffer {
    match depth {
        PixelDepth::U8 => PixelBuffer::Gray8(data.mapv(|v| v.clamp(0.0, 255.0).round() as u8)),
        PixelDepth::U16 => {
            PixelBuffer::Gray16(data.mapv(|v| v.clamp(0.0, 65535.0).round() as u16))
        }
        PixelDepth::F32 => PixelBuffer::GrayF32(data),
    }
}

/// Normalize a plane onto a u8 proxy using its observed range.
///
/// Returns the proxy plus the (min, max) needed to map results back.
/// A flat plane maps to all zeros with max == min.
pub(crate) fn to_u8_proxy(plane: &PixelBuffer) -> Result<(Array2<u8>, f32, f32)> {
    let data = plane_to_f32(plane)?;
    let min = data.iter().copied().fold(f32::INFINITY, f32::min);
    let max = data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !min.is_finite() || !max.is_finite() {
        return Err(FluoViewError::Filter("non-finite plane statistics".into()));
    }
    let range = max - min;
    let proxy = if range <= f32::EPSILON {
        Array2::zeros(data.dim())
    } else {
        data.mapv(|v| (((v - min) / range) * 255.0).round().clamp(0.0, 255.0) as u8)
    };
    Ok((proxy, min, max))
}

/// Map a filtered u8 proxy back into the original depth and range.
pub(crate) fn from_u8_proxy(
    proxy: Array2<u8>,
    min: f32,
    max: f32,
    depth: PixelDepth,
) -> PixelBuffer {
    let range = (max - min).max(0.0);
    let restored = proxy.mapv(|v| min + (v as f32 / 255.0) * range);
    f32_to_depth(restored, depth)
}
