//! Monitor configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the performance monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// How often the owner is expected to call `heartbeat()`.
    pub heartbeat_interval: Duration,
    /// Missing heartbeats for this long counts as a stall.
    pub stall_threshold: Duration,
    /// Watchdog polling period.
    pub watchdog_poll: Duration,
    /// Process RSS above this many GiB counts as memory pressure.
    pub memory_threshold_gb: f64,
    /// Whether pressure should request cache cleanup at all.
    pub auto_cleanup: bool,
    /// Minimum time between two pressure events.
    pub cleanup_cooldown: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(2),
            stall_threshold: Duration::from_secs(10),
            watchdog_poll: Duration::from_millis(10),
            memory_threshold_gb: 4.0,
            auto_cleanup: true,
            cleanup_cooldown: Duration::from_secs(30),
        }
    }
}
