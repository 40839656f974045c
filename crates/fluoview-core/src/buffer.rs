//! Intensity buffers and color layers.
//!
//! A `PixelBuffer` holds one channel's raw or enhanced intensity data in
//! its native bit depth. A `ColorLayer` is the normalized float RGB output
//! of the renderer, the only currency the compositor deals in.

use ndarray::{Array2, Array3, Zip};

/// Bit depth of a pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelDepth {
    U8,
    U16,
    F32,
}

impl PixelDepth {
    /// Nominal maximum value for integer depths. Float buffers have no
    /// fixed range; callers use the observed maximum instead.
    pub fn nominal_max(self) -> f32 {
        match self {
            Self::U8 => 255.0,
            Self::U16 => 65535.0,
            Self::F32 => 1.0,
        }
    }
}

/// A single channel's intensity data.
///
/// 2-D grayscale in 8/16-bit or float, or an 8-bit H×W×3 RGB source
/// (brightfield/reference images). Buffers are value types: filters never
/// mutate their input, they produce new buffers.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    Gray8(Array2<u8>),
    Gray16(Array2<u16>),
    GrayF32(Array2<f32>),
    Rgb8(Array3<u8>),
}

impl PixelBuffer {
    /// Spatial shape as (height, width).
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Gray8(a) => (a.nrows(), a.ncols()),
            Self::Gray16(a) => (a.nrows(), a.ncols()),
            Self::GrayF32(a) => (a.nrows(), a.ncols()),
            Self::Rgb8(a) => (a.shape()[0], a.shape()[1]),
        }
    }

    /// Total number of samples (pixels × planes).
    pub fn len(&self) -> usize {
        match self {
            Self::Gray8(a) => a.len(),
            Self::Gray16(a) => a.len(),
            Self::GrayF32(a) => a.len(),
            Self::Rgb8(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn depth(&self) -> PixelDepth {
        match self {
            Self::Gray8(_) | Self::Rgb8(_) => PixelDepth::U8,
            Self::Gray16(_) => PixelDepth::U16,
            Self::GrayF32(_) => PixelDepth::F32,
        }
    }

    pub fn is_multiplane(&self) -> bool {
        matches!(self, Self::Rgb8(_))
    }

    /// Memory footprint in bytes.
    pub fn memory_size(&self) -> usize {
        match self {
            Self::Gray8(a) => a.len(),
            Self::Gray16(a) => a.len() * 2,
            Self::GrayF32(a) => a.len() * 4,
            Self::Rgb8(a) => a.len(),
        }
    }

    /// Observed minimum as f32. Empty buffers report 0.
    pub fn min_value(&self) -> f32 {
        match self {
            Self::Gray8(a) => a.iter().copied().min().unwrap_or(0) as f32,
            Self::Gray16(a) => a.iter().copied().min().unwrap_or(0) as f32,
            Self::GrayF32(a) => a.iter().copied().fold(f32::INFINITY, f32::min).min(0.0),
            Self::Rgb8(a) => a.iter().copied().min().unwrap_or(0) as f32,
        }
    }

    /// Observed maximum as f32. Empty buffers report 0.
    pub fn max_value(&self) -> f32 {
        match self {
            Self::Gray8(a) => a.iter().copied().max().unwrap_or(0) as f32,
            Self::Gray16(a) => a.iter().copied().max().unwrap_or(0) as f32,
            Self::GrayF32(a) => a.iter().copied().fold(0.0f32, f32::max),
            Self::Rgb8(a) => a.iter().copied().max().unwrap_or(0) as f32,
        }
    }

    /// Split a multi-plane buffer into grayscale planes. Grayscale
    /// buffers come back as a single-element list.
    pub fn split_planes(&self) -> Vec<PixelBuffer> {
        match self {
            Self::Rgb8(a) => (0..a.shape()[2])
                .map(|c| {
                    PixelBuffer::Gray8(a.index_axis(ndarray::Axis(2), c).to_owned())
                })
                .collect(),
            other => vec![other.clone()],
        }
    }

    /// Recombine grayscale planes produced by `split_planes`. Planes must
    /// be `Gray8` with identical shapes; anything else returns `None`.
    pub fn merge_planes(planes: &[PixelBuffer]) -> Option<PixelBuffer> {
        if planes.len() == 1 {
            return Some(planes[0].clone());
        }
        let (h, w) = planes.first()?.shape();
        let mut out = Array3::<u8>::zeros((h, w, planes.len()));
        for (c, plane) in planes.iter().enumerate() {
            let PixelBuffer::Gray8(a) = plane else {
                return None;
            };
            if a.dim() != (h, w) {
                return None;
            }
            out.index_axis_mut(ndarray::Axis(2), c).assign(a);
        }
        Some(PixelBuffer::Rgb8(out))
    }

    /// Downsample to `target` (height, width) with strided slicing, then
    /// a nearest-neighbor pass when the stride alone does not land on the
    /// target. Strided slicing is the fast path: it avoids touching every
    /// source pixel for large reduction factors.
    pub fn downsample(&self, target: (usize, usize)) -> PixelBuffer {
        match self {
            Self::Gray8(a) => PixelBuffer::Gray8(downsample_plane(a, target)),
            Self::Gray16(a) => PixelBuffer::Gray16(downsample_plane(a, target)),
            Self::GrayF32(a) => PixelBuffer::GrayF32(downsample_plane(a, target)),
            Self::Rgb8(a) => {
                let planes = self.split_planes();
                let down: Vec<PixelBuffer> = planes
                    .iter()
                    .map(|p| p.downsample(target))
                    .collect();
                PixelBuffer::merge_planes(&down)
                    .unwrap_or_else(|| PixelBuffer::Rgb8(a.clone()))
            }
        }
    }

    /// Strided sample of a grayscale buffer targeting roughly
    /// `target_pixels` samples. Used for fast statistics (percentiles,
    /// noise estimation) without scanning the full image.
    pub fn sample_strided(&self, target_pixels: usize) -> PixelBuffer {
        let (h, w) = self.shape();
        let total = h * w;
        if total <= target_pixels || target_pixels == 0 {
            return self.clone();
        }
        let step = ((total as f64 / target_pixels as f64).sqrt().ceil() as usize).max(1);
        let th = h.div_ceil(step);
        let tw = w.div_ceil(step);
        self.downsample((th.max(1), tw.max(1)))
    }
}

fn downsample_plane<T: Copy>(src: &Array2<T>, target: (usize, usize)) -> Array2<T> {
    let (h, w) = src.dim();
    let (th, tw) = (target.0.max(1), target.1.max(1));
    if (h, w) == (th, tw) || h == 0 || w == 0 {
        return src.clone();
    }

    let sy = (h / th).max(1);
    let sx = (w / tw).max(1);
    let strided = src.slice(ndarray::s![..;sy, ..;sx]).to_owned();

    if strided.dim() == (th, tw) {
        return strided;
    }

    // Exact nearest-neighbor resize for the residual factor.
    let (sh, sw) = strided.dim();
    Array2::from_shape_fn((th, tw), |(y, x)| {
        let src_y = (y * sh / th).min(sh - 1);
        let src_x = (x * sw / tw).min(sw - 1);
        strided[(src_y, src_x)]
    })
}

/// A normalized float RGB layer (H×W×3, values in 0..=1).
///
/// The renderer emits one per visible channel; the compositor sums them
/// and clamps. Keeping the layer in float avoids quantization across the
/// additive blend.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorLayer {
    data: Array3<f32>,
}

impl ColorLayer {
    /// Wrap an H×W×3 array. Shapes are trusted; the renderer is the only
    /// producer.
    pub fn new(data: Array3<f32>) -> Self {
        debug_assert_eq!(data.shape()[2], 3, "color layers are H x W x 3");
        Self { data }
    }

    /// All-black layer of the given (height, width).
    pub fn black(shape: (usize, usize)) -> Self {
        Self {
            data: Array3::zeros((shape.0.max(1), shape.1.max(1), 3)),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.data.shape()[0], self.data.shape()[1])
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn into_inner(self) -> Array3<f32> {
        self.data
    }

    /// Nearest-neighbor resize to `target` (height, width).
    pub fn resize_nearest(&self, target: (usize, usize)) -> ColorLayer {
        let (h, w) = self.shape();
        let (th, tw) = (target.0.max(1), target.1.max(1));
        if (h, w) == (th, tw) {
            return self.clone();
        }
        let data = Array3::from_shape_fn((th, tw, 3), |(y, x, c)| {
            let src_y = (y * h / th).min(h - 1);
            let src_x = (x * w / tw).min(w - 1);
            self.data[(src_y, src_x, c)]
        });
        ColorLayer { data }
    }

    /// Additive accumulate. Shapes must match; mismatches are a
    /// programming error upstream and are ignored in release builds.
    pub fn accumulate(&mut self, other: &ColorLayer) {
        if self.data.dim() != other.data.dim() {
            debug_assert!(false, "accumulate shape mismatch");
            return;
        }
        Zip::from(&mut self.data)
            .and(&other.data)
            .for_each(|a, &b| *a += b);
    }

    /// Clamp every component into 0..=1.
    pub fn clamp01(&mut self) {
        self.data.mapv_inplace(|v| v.clamp(0.0, 1.0));
    }

    /// Quantize into an integer display image at the requested depth.
    ///
    /// Components are clamped to 0..=1 first, so an un-clamped
    /// accumulation still produces a valid image.
    pub fn quantize(&self, depth: OutputDepth) -> RgbImage {
        match depth {
            OutputDepth::U8 => RgbImage::Rgb8(
                self.data
                    .mapv(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8),
            ),
            OutputDepth::U16 => RgbImage::Rgb16(
                self.data
                    .mapv(|v| (v.clamp(0.0, 1.0) * 65535.0).round() as u16),
            ),
        }
    }
}

/// Integer depth of a quantized display image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputDepth {
    #[default]
    U8,
    U16,
}

/// A quantized RGB image (H×W×3), ready for the display layer.
///
/// Produced by [`ColorLayer::quantize`]; the normalized float layer stays
/// the internal currency so the additive blend never quantizes early.
#[derive(Debug, Clone, PartialEq)]
pub enum RgbImage {
    Rgb8(Array3<u8>),
    Rgb16(Array3<u16>),
}

impl RgbImage {
    /// Spatial shape as (height, width).
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Rgb8(a) => (a.shape()[0], a.shape()[1]),
            Self::Rgb16(a) => (a.shape()[0], a.shape()[1]),
        }
    }

    pub fn depth(&self) -> OutputDepth {
        match self {
            Self::Rgb8(_) => OutputDepth::U8,
            Self::Rgb16(_) => OutputDepth::U16,
        }
    }
}
