//! The viewer context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fluoview_cache::{CacheStats, PressureProbe, RetentionPolicy, SceneCache};
use fluoview_core::error::Result;
use fluoview_core::{Channel, OutputDepth, RgbImage};
use fluoview_monitor::{MonitorConfig, MonitorEvent, PerformanceMonitor, QualityTier};
use tracing::{info, warn};

/// Cache pressure probe backed by the monitor's shared flag.
struct MonitorProbe(Arc<AtomicBool>);

impl PressureProbe for MonitorProbe {
    fn is_high(&self) -> Result<bool> {
        Ok(self.0.load(Ordering::Relaxed))
    }
}

/// Owns the scene cache and the performance monitor, and stands between
/// the display layer and the renderer.
///
/// Passed explicitly to whoever needs it; there is no global instance.
/// Single-writer by construction: every mutating call takes `&mut self`.
pub struct ViewerContext {
    cache: SceneCache,
    monitor: PerformanceMonitor,
}

impl ViewerContext {
    pub fn new(policy: RetentionPolicy, config: MonitorConfig) -> Self {
        let mut monitor = PerformanceMonitor::new(config);
        monitor.start_watchdog();
        let cache = SceneCache::new(policy, Box::new(MonitorProbe(monitor.pressure_flag())));
        Self { cache, monitor }
    }

    /// Context with default policy and monitoring, for tests and tools.
    pub fn with_defaults() -> Self {
        Self::new(RetentionPolicy::default(), MonitorConfig::default())
    }

    // ── Rendering ──────────────────────────────────────────────────

    /// Render one channel at the requested output depth, with the
    /// requested target clamped to the quality tier's preview cap.
    pub fn render_channel(
        &mut self,
        channel: &mut Channel,
        target_shape: Option<(usize, usize)>,
        out_depth: OutputDepth,
    ) -> Option<RgbImage> {
        let target = self.capped_target(channel.shape(), target_shape);
        fluoview_render::render_channel(channel, target, out_depth)
    }

    /// Composite a scene's channels, capped the same way.
    pub fn composite(
        &mut self,
        channels: &mut [Channel],
        target_shape: Option<(usize, usize)>,
        out_depth: OutputDepth,
    ) -> RgbImage {
        let full = channels
            .iter()
            .find(|c| !c.raw().is_empty())
            .map(|c| c.shape())
            .unwrap_or((1, 1));
        let target = self.capped_target(full, target_shape).or(Some(full));
        fluoview_render::composite(channels, target, out_depth)
    }

    /// Clamp a requested target to the source shape and the tier cap,
    /// preserving aspect ratio. `None` means "full resolution fits the
    /// cap as-is".
    fn capped_target(
        &self,
        full: (usize, usize),
        requested: Option<(usize, usize)>,
    ) -> Option<(usize, usize)> {
        let (h, w) = match requested {
            Some(t) => (t.0.min(full.0).max(1), t.1.min(full.1).max(1)),
            None => full,
        };
        let long = h.max(w).max(1);
        let cap = self.monitor.preview_dimension_cap(long);
        if long <= cap {
            return requested.map(|_| (h, w));
        }
        Some(((h * cap / long).max(1), (w * cap / long).max(1)))
    }

    // ── Scene cache ────────────────────────────────────────────────

    pub fn store_scene(&mut self, scene_id: &str, channels: Vec<Channel>) {
        self.cache.store(scene_id, channels);
    }

    pub fn fetch_scene(&mut self, scene_id: &str) -> Option<&mut Vec<Channel>> {
        self.cache.fetch(scene_id)
    }

    pub fn take_scene(&mut self, scene_id: &str) -> Option<Vec<Channel>> {
        self.cache.take(scene_id)
    }

    pub fn set_active_scene(&mut self, scene_id: Option<&str>) {
        self.cache.set_active(scene_id);
    }

    pub fn set_policy(&mut self, policy: RetentionPolicy) {
        self.cache.set_policy(policy);
    }

    pub fn clear_all(&mut self) {
        self.cache.clear_all();
    }

    pub fn clear_all_except(&mut self, keep: &str) {
        self.cache.evict_for_pressure(Some(keep));
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cached_scene_count(&self) -> usize {
        self.cache.len()
    }

    // ── Monitoring ─────────────────────────────────────────────────

    pub fn quality_tier(&self) -> QualityTier {
        self.monitor.tier()
    }

    pub fn set_quality_tier(&mut self, tier: QualityTier) {
        self.monitor.set_tier(tier);
    }

    /// Whether expensive rendering extras (antialiasing) are still on.
    /// The first thing a stall or slow frames switch off.
    pub fn antialiasing(&self) -> bool {
        self.monitor.antialiasing()
    }

    pub fn report_frame_time(&mut self, ms: f32) {
        self.monitor.report_frame_time(ms);
    }

    pub fn report_interaction_speed(&mut self, speed: f32) {
        self.monitor.report_interaction_speed(speed);
    }

    /// The UI loop's periodic call: heartbeat the monitor, drain its
    /// events, and react. Returns the drained events so the display
    /// layer can surface status messages.
    pub fn tick(&mut self) -> Vec<MonitorEvent> {
        self.monitor.heartbeat();
        let events = self.monitor.poll_events();
        self.handle_events(&events);
        events
    }

    /// Apply the context's standard reactions to monitor events.
    pub fn handle_events(&mut self, events: &[MonitorEvent]) {
        for event in events {
            match event {
                MonitorEvent::PressureDetected(gb) => {
                    info!(gb, "pressure event, evicting non-active scenes");
                    self.cache.evict_for_pressure(None);
                    self.monitor.optimize_for_speed();
                }
                MonitorEvent::HighJitter => self.monitor.optimize_for_speed(),
                MonitorEvent::Stall(stalled) => {
                    warn!(?stalled, "ui stall, stepping quality down");
                    self.monitor.optimize_for_speed();
                }
                MonitorEvent::Recovered => self.monitor.restore_quality(),
            }
        }
    }

    /// Stop the watchdog thread. Also happens on drop.
    pub fn shutdown(&mut self) {
        self.monitor.stop();
    }
}
