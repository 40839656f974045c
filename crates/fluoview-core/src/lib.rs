//! FluoView Core - Foundation types for the rendering and caching engine
//!
//! This crate provides the fundamental types used throughout FluoView:
//! - Intensity buffers and color layers (PixelBuffer, ColorLayer)
//! - Channel data model with its two-tier enhanced-buffer cache
//! - Display settings and tint colors
//! - Enhancement knob / parameter records

pub mod buffer;
pub mod channel;
pub mod color;
pub mod error;
pub mod params;
pub mod settings;

pub use buffer::{ColorLayer, OutputDepth, PixelBuffer, PixelDepth, RgbImage};
pub use channel::Channel;
pub use color::Tint;
pub use error::{FluoViewError, Result};
pub use params::{AutoParams, EnhanceKnobs, ParamsKey, PipelineParams};
pub use settings::DisplaySettings;

/// Capacity of a channel's bounded preview-enhancement cache.
pub const PREVIEW_CACHE_CAPACITY: usize = 5;
