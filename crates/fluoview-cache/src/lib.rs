//! FluoView Cache - Scene retention with pressure-driven eviction
//!
//! Keeps fully-loaded scenes (their channels, including raw buffers and
//! derived enhancement caches) resident so switching back to a recently
//! viewed scene is instant. A retention policy bounds how many scenes
//! stay alive; a pluggable memory-pressure probe can override the policy
//! and force eviction, but never of the active scene.

pub mod policy;
pub mod probe;
pub mod scene_cache;

pub use policy::RetentionPolicy;
pub use probe::{NoPressure, PressureProbe};
pub use scene_cache::{CacheStats, SceneCache};
