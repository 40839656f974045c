//! Gamma adjustment.

use fluoview_core::error::Result;
use fluoview_core::PixelBuffer;

use crate::plane::map_planes;

/// Apply `out = (in / range)^gamma × range`.
///
/// `gamma == 1.0` is an exact no-op. Integer depths go through a
/// precomputed table over their nominal range; float buffers normalize
/// by their observed maximum.
pub fn apply_gamma(buffer: &PixelBuffer, gamma: f32) -> Result<PixelBuffer> {
    if gamma == 1.0 || buffer.is_empty() {
        return Ok(buffer.clone());
    }
    let gamma = gamma.max(1e-3);

    map_planes(buffer, |plane| match plane {
        PixelBuffer::Gray8(a) => {
            let table = gamma_table::<256>(gamma, 255.0);
            Ok(PixelBuffer::Gray8(a.mapv(|v| table[v as usize] as u8)))
        }
        PixelBuffer::Gray16(a) => {
            let table = gamma_table::<65536>(gamma, 65535.0);
            Ok(PixelBuffer::Gray16(a.mapv(|v| table[v as usize])))
        }
        PixelBuffer::GrayF32(a) => {
            let max = a.iter().copied().fold(0.0f32, f32::max);
            if max <= 0.0 {
                return Ok(plane.clone());
            }
            Ok(PixelBuffer::GrayF32(
                a.mapv(|v| (v.max(0.0) / max).powf(gamma) * max),
            ))
        }
        PixelBuffer::Rgb8(_) => Ok(plane.clone()),
    })
}

fn gamma_table<const N: usize>(gamma: f32, max: f32) -> Vec<u16> {
    (0..N)
        .map(|i| ((i as f32 / max).powf(gamma) * max).round().clamp(0.0, max) as u16)
        .collect()
}
