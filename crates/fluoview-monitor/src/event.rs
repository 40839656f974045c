//! Events emitted by the monitor.

use std::time::Duration;

/// What the monitor noticed. The owning context reacts; the monitor
/// itself never touches caches or render state.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// Process memory crossed the configured threshold (value in GiB).
    PressureDetected(f64),
    /// No heartbeat for longer than the stall threshold. Emitted once
    /// per sustained stall.
    Stall(Duration),
    /// Heartbeats resumed after a stall. Paired with `Stall`.
    Recovered,
    /// Frame times or interaction speed indicate a struggling UI.
    HighJitter,
}
