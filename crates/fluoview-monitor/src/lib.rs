//! FluoView Monitor - Resource and performance supervision
//!
//! A heartbeat-driven monitor owned by the viewer context: it samples
//! process memory on each heartbeat, runs a watchdog thread that turns
//! missed heartbeats into stall events, tracks frame-time statistics,
//! and maps everything onto a preview quality tier. The monitor never
//! acts on its own; it emits [`MonitorEvent`]s and the owning context
//! decides what to do with them.

pub mod config;
pub mod event;
pub mod monitor;
pub mod quality;
mod watchdog;

pub use config::MonitorConfig;
pub use event::MonitorEvent;
pub use monitor::PerformanceMonitor;
pub use quality::QualityTier;
