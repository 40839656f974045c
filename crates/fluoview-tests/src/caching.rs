//! Integration tests for scene retention and pressure eviction.

use fluoview_cache::{NoPressure, PressureProbe, RetentionPolicy, SceneCache};
use fluoview_core::error::Result;
use fluoview_core::{Channel, EnhanceKnobs, PixelBuffer};
use fluoview_render::render_layer;
use ndarray::Array2;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ── Helpers ────────────────────────────────────────────────────

struct FlagProbe(Arc<AtomicBool>);

impl PressureProbe for FlagProbe {
    fn is_high(&self) -> Result<bool> {
        Ok(self.0.load(Ordering::Relaxed))
    }
}

fn scene(tag: u16) -> Vec<Channel> {
    vec![Channel::new(
        format!("DAPI-{tag}"),
        PixelBuffer::Gray16(Array2::from_shape_fn((64, 64), |(y, x)| {
            tag.wrapping_mul((y * 64 + x) as u16 % 97)
        })),
    )]
}

// ── Retention ──────────────────────────────────────────────────

#[test]
fn recent_two_after_three_stores_keeps_b_and_c() {
    let mut cache = SceneCache::new(RetentionPolicy::Recent(2), Box::new(NoPressure));
    cache.store("A", scene(1));
    cache.store("B", scene(2));
    cache.store("C", scene(3));

    assert!(!cache.contains("A"));
    assert!(cache.contains("B"));
    assert!(cache.contains("C"));
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn switching_policy_to_none_empties_the_cache() {
    let mut cache = SceneCache::new(RetentionPolicy::All, Box::new(NoPressure));
    cache.store("A", scene(1));
    cache.store("B", scene(2));
    cache.set_policy(RetentionPolicy::None);
    assert!(cache.is_empty());
}

// ── Pressure interaction ───────────────────────────────────────

#[test]
fn storing_under_pressure_protects_active_scene_x() {
    let flag = Arc::new(AtomicBool::new(false));
    let mut cache = SceneCache::new(
        RetentionPolicy::All,
        Box::new(FlagProbe(Arc::clone(&flag))),
    );
    cache.store("X", scene(1));
    cache.store("other", scene(2));
    cache.set_active(Some("X"));

    flag.store(true, Ordering::Relaxed);
    cache.store("Y", scene(3));

    assert!(cache.contains("X"), "active scene evicted under pressure");
    assert!(cache.contains("Y"));
    assert!(!cache.contains("other"));
}

#[test]
fn eviction_releases_derived_channel_caches() {
    let mut cache = SceneCache::new(RetentionPolicy::Recent(1), Box::new(NoPressure));

    // Build a scene whose channel carries a populated enhanced cache.
    let mut channels = scene(5);
    channels[0].set_knobs(EnhanceKnobs::new(1.0, 0.0, 0.0, 0.0, 0.0));
    render_layer(&mut channels[0], Some((16, 16))).unwrap();
    assert!(channels[0].derived_cache_size() > 0);
    let baseline = cache.memory_footprint();
    cache.store("first", channels);
    assert!(cache.memory_footprint() > baseline);

    // Storing a second scene under Recent(1) evicts the first,
    // clearing its derived caches on the way out.
    cache.store("second", scene(6));
    assert!(!cache.contains("first"));
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn fetched_scene_renders_from_its_cache() {
    let mut cache = SceneCache::new(RetentionPolicy::Current, Box::new(NoPressure));
    let mut channels = scene(9);
    channels[0].set_knobs(EnhanceKnobs::new(1.0, 0.5, 0.0, 0.0, 0.0));
    render_layer(&mut channels[0], Some((32, 32))).unwrap();
    cache.store("S", channels);

    let fetched = cache.fetch("S").unwrap();
    assert_eq!(fetched[0].preview_cache_len(), 1);
    let layer = render_layer(&mut fetched[0], Some((32, 32))).unwrap();
    assert_eq!(layer.shape(), (32, 32));
    // Still exactly one preview entry; the render was a cache hit.
    assert_eq!(fetched[0].preview_cache_len(), 1);
}
