//! FluoView Render - LUT-based channel rendering and compositing
//!
//! Turns a channel's intensity buffer into a tinted, normalized RGB
//! layer (window/gamma/tint via a precomputed lookup table for integer
//! depths), and additively composites the visible layers of a scene.

pub mod compositor;
pub mod lut;
pub mod renderer;

pub use compositor::{composite, composite_layers};
pub use lut::ChannelLut;
pub use renderer::{render_channel, render_layer};
