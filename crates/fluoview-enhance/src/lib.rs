//! FluoView Enhance - The enhancement filter pipeline
//!
//! Pure buffer-in/buffer-out filters for fluorescence microscopy images:
//! percentile stretch, morphological background suppression, CLAHE local
//! contrast, bilateral noise smoothing, gamma, plus the offline
//! Richardson-Lucy deconvolution and denoising stages. Filters never
//! mutate their input and always return a buffer of the same shape and
//! depth.
//!
//! `run_pipeline` chains the real-time stages in a fixed order, and
//! `estimate_auto_params` derives per-image baseline parameters so that
//! user knobs can stay simple percentages.

pub mod auto;
pub mod background;
pub mod contrast;
pub mod deconv;
pub mod denoise;
pub mod gamma;
pub mod pipeline;
pub mod smooth;
pub mod stretch;

mod plane;

pub use auto::estimate_auto_params;
pub use background::suppress_background;
pub use contrast::local_contrast;
pub use deconv::{gaussian_psf, richardson_lucy, DeconvParams};
pub use denoise::{nlm_denoise, wavelet_denoise};
pub use gamma::apply_gamma;
pub use pipeline::run_pipeline;
pub use smooth::smooth_noise;
pub use stretch::percentile_stretch;
