//! Integration tests for the monitor and the viewer context wiring.

use std::time::Duration;

use fluoview_cache::RetentionPolicy;
use fluoview_core::{Channel, OutputDepth, PixelBuffer};
use fluoview_monitor::{MonitorConfig, MonitorEvent, PerformanceMonitor, QualityTier};
use fluoview_viewer::ViewerContext;
use ndarray::Array2;

fn scene(tag: u16) -> Vec<Channel> {
    vec![Channel::new(
        format!("ch{tag}"),
        PixelBuffer::Gray16(Array2::from_elem((32, 32), tag)),
    )]
}

fn fast_stall_config() -> MonitorConfig {
    MonitorConfig {
        stall_threshold: Duration::from_millis(60),
        watchdog_poll: Duration::from_millis(5),
        memory_threshold_gb: 1e6, // never trips on real usage
        ..Default::default()
    }
}

// ── Watchdog ───────────────────────────────────────────────────

#[test]
fn sustained_stall_emits_exactly_one_pair() {
    let mut monitor = PerformanceMonitor::new(fast_stall_config());
    monitor.start_watchdog();
    monitor.heartbeat();

    // Sleep well past the stall threshold without heartbeats.
    std::thread::sleep(Duration::from_millis(150));
    monitor.heartbeat();
    std::thread::sleep(Duration::from_millis(30));
    monitor.stop();

    let events = monitor.poll_events();
    let stalls = events
        .iter()
        .filter(|e| matches!(e, MonitorEvent::Stall(_)))
        .count();
    let recoveries = events
        .iter()
        .filter(|e| matches!(e, MonitorEvent::Recovered))
        .count();
    assert_eq!(stalls, 1, "events: {events:?}");
    assert_eq!(recoveries, 1, "events: {events:?}");
}

#[test]
fn regular_heartbeats_keep_the_watchdog_silent() {
    let mut monitor = PerformanceMonitor::new(fast_stall_config());
    monitor.start_watchdog();
    for _ in 0..10 {
        monitor.heartbeat();
        std::thread::sleep(Duration::from_millis(10));
    }
    monitor.stop();
    let events = monitor.poll_events();
    assert!(
        !events.iter().any(|e| matches!(e, MonitorEvent::Stall(_))),
        "unexpected stall: {events:?}"
    );
}

// ── Context wiring ─────────────────────────────────────────────

#[test]
fn pressure_event_through_the_context_evicts_and_degrades() {
    let mut ctx = ViewerContext::new(RetentionPolicy::All, fast_stall_config());
    ctx.store_scene("A", scene(1));
    ctx.store_scene("B", scene(2));
    ctx.set_active_scene(Some("B"));

    ctx.handle_events(&[MonitorEvent::PressureDetected(8.0)]);

    assert!(ctx.fetch_scene("B").is_some());
    assert!(ctx.fetch_scene("A").is_none());
    ctx.shutdown();
}

#[test]
fn tier_cap_applies_to_context_renders() {
    let mut ctx = ViewerContext::new(RetentionPolicy::Current, fast_stall_config());
    ctx.set_quality_tier(QualityTier::High);
    let mut ch = Channel::new("big", PixelBuffer::Gray16(Array2::zeros((2000, 1000))));
    let layer = ctx
        .render_channel(&mut ch, Some((2000, 1000)), OutputDepth::U8)
        .unwrap();
    let (h, w) = layer.shape();
    assert!(h.max(w) <= 512, "tier cap ignored: {h}x{w}");
    ctx.shutdown();
}

#[test]
fn stall_events_through_the_context_disable_expensive_features() {
    // A watchdog-emitted stall, routed through the context's reaction
    // path, must step the quality ladder down; recovery steps it back.
    let mut monitor = PerformanceMonitor::new(fast_stall_config());
    monitor.start_watchdog();
    monitor.heartbeat();
    std::thread::sleep(Duration::from_millis(150));
    monitor.stop();
    let events = monitor.poll_events();
    assert!(events.iter().any(|e| matches!(e, MonitorEvent::Stall(_))));

    let mut ctx = ViewerContext::new(RetentionPolicy::Current, fast_stall_config());
    assert!(ctx.antialiasing());
    ctx.handle_events(&events);
    assert!(!ctx.antialiasing(), "stall left expensive features on");

    ctx.handle_events(&[MonitorEvent::Recovered]);
    assert!(ctx.antialiasing());
    ctx.shutdown();
}

#[test]
fn tick_heartbeats_and_returns_events() {
    let mut ctx = ViewerContext::new(RetentionPolicy::Current, fast_stall_config());
    let events = ctx.tick();
    // A fresh context with live heartbeats reports nothing alarming.
    assert!(
        !events.iter().any(|e| matches!(e, MonitorEvent::Stall(_))),
        "events: {events:?}"
    );
    ctx.shutdown();
}
