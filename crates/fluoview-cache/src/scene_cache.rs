//! The scene cache proper.

use std::collections::{HashMap, VecDeque};

use fluoview_core::Channel;
use tracing::{debug, info, warn};

use crate::policy::RetentionPolicy;
use crate::probe::{read_pressure, NoPressure, PressureProbe};

/// Hit/miss/eviction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub evictions: u64,
}

/// LRU scene cache with a retention policy and a pressure override.
///
/// Entries are whole scenes: the channel list with raw buffers and any
/// derived enhancement caches. `order` runs oldest → newest; the active
/// scene is pinned against pressure eviction but not against an explicit
/// `clear_all`.
pub struct SceneCache {
    entries: HashMap<String, Vec<Channel>>,
    order: VecDeque<String>,
    active: Option<String>,
    policy: RetentionPolicy,
    probe: Box<dyn PressureProbe>,
    stats: CacheStats,
}

impl SceneCache {
    pub fn new(policy: RetentionPolicy, probe: Box<dyn PressureProbe>) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            active: None,
            policy,
            probe,
            stats: CacheStats::default(),
        }
    }

    /// Cache with the default policy and no pressure source.
    pub fn unmonitored() -> Self {
        Self::new(RetentionPolicy::default(), Box::new(NoPressure))
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Change the retention policy and immediately re-apply it to the
    /// resident entries.
    pub fn set_policy(&mut self, policy: RetentionPolicy) {
        self.policy = policy;
        match policy {
            RetentionPolicy::None => self.clear_all(),
            RetentionPolicy::Current => {
                if let Some(keep) = self.active.clone() {
                    self.evict_others(&keep);
                } else {
                    self.clear_all();
                }
            }
            RetentionPolicy::Recent(n) => self.trim_to(n),
            RetentionPolicy::All => {}
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, scene_id: &str) -> bool {
        self.entries.contains_key(scene_id)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Store a scene's channels.
    ///
    /// Memory pressure overrides the policy: everything except the
    /// incoming scene (and the active one) is evicted first. Under
    /// `None` nothing is ever stored; under `Current` only the incoming
    /// scene survives; `Recent(n)` trims strictly the oldest entries
    /// past `n`; `All` stores unconditionally.
    pub fn store(&mut self, scene_id: &str, channels: Vec<Channel>) {
        if read_pressure(self.probe.as_ref()) {
            info!(scene_id, "memory pressure during store, evicting other scenes");
            self.evict_for_pressure(Some(scene_id));
        }

        match self.policy {
            RetentionPolicy::None => {
                self.clear_all();
                return;
            }
            RetentionPolicy::Current => {
                self.evict_others(scene_id);
                self.insert(scene_id, channels);
            }
            RetentionPolicy::Recent(n) => {
                self.insert(scene_id, channels);
                self.trim_to(n.max(1));
            }
            RetentionPolicy::All => {
                self.insert(scene_id, channels);
            }
        }
        self.stats.stores += 1;
    }

    /// Look up a scene. A hit under `Recent` refreshes its LRU position.
    pub fn fetch(&mut self, scene_id: &str) -> Option<&mut Vec<Channel>> {
        if !self.entries.contains_key(scene_id) {
            self.stats.misses += 1;
            return None;
        }
        self.stats.hits += 1;
        if matches!(self.policy, RetentionPolicy::Recent(_)) {
            self.touch(scene_id);
        }
        self.entries.get_mut(scene_id)
    }

    /// Remove a scene from the cache, handing its channels back.
    pub fn take(&mut self, scene_id: &str) -> Option<Vec<Channel>> {
        self.order.retain(|id| id != scene_id);
        self.entries.remove(scene_id)
    }

    /// Mark the scene that must survive pressure eviction. If pressure
    /// is already high, run an eviction pass right away.
    pub fn set_active(&mut self, scene_id: Option<&str>) {
        self.active = scene_id.map(str::to_owned);
        if read_pressure(self.probe.as_ref()) {
            info!(?scene_id, "memory pressure on activation, evicting other scenes");
            self.evict_for_pressure(None);
        }
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Pressure-path eviction: drops every resident scene except the
    /// active one and `also_keep`.
    pub fn evict_for_pressure(&mut self, also_keep: Option<&str>) {
        let keep: Vec<String> = self
            .active
            .iter()
            .map(String::clone)
            .chain(also_keep.map(str::to_owned))
            .collect();
        let victims: Vec<String> = self
            .order
            .iter()
            .filter(|id| !keep.iter().any(|k| k == *id))
            .cloned()
            .collect();
        for id in victims {
            self.evict(&id);
        }
    }

    /// Drop everything, the active scene included. Owner-initiated only.
    pub fn clear_all(&mut self) {
        let victims: Vec<String> = self.order.iter().cloned().collect();
        for id in victims {
            self.evict(&id);
        }
    }

    /// Estimated resident bytes across all cached scenes.
    pub fn memory_footprint(&self) -> usize {
        self.entries
            .values()
            .flatten()
            .map(|ch| ch.raw().memory_size() + ch.derived_cache_size())
            .sum()
    }

    fn insert(&mut self, scene_id: &str, channels: Vec<Channel>) {
        if self.entries.insert(scene_id.to_owned(), channels).is_some() {
            debug!(scene_id, "replacing cached scene");
        }
        self.touch(scene_id);
    }

    fn touch(&mut self, scene_id: &str) {
        self.order.retain(|id| id != scene_id);
        self.order.push_back(scene_id.to_owned());
    }

    fn evict_others(&mut self, keep: &str) {
        let victims: Vec<String> = self
            .order
            .iter()
            .filter(|id| id.as_str() != keep)
            .cloned()
            .collect();
        for id in victims {
            self.evict(&id);
        }
    }

    /// Trim strictly the oldest entries until at most `n` remain.
    fn trim_to(&mut self, n: usize) {
        while self.entries.len() > n {
            let Some(oldest) = self.order.front().cloned() else {
                break;
            };
            self.evict(&oldest);
        }
    }

    fn evict(&mut self, scene_id: &str) {
        let Some(mut channels) = self.entries.remove(scene_id) else {
            return;
        };
        self.order.retain(|id| id != scene_id);
        // Release derived buffers before the channels drop, so the
        // reclaim happens even if someone still holds a clone.
        for channel in &mut channels {
            channel.clear_derived_caches();
        }
        self.stats.evictions += 1;
        debug!(scene_id, "evicted scene");
        if self.active.as_deref() == Some(scene_id) {
            warn!(scene_id, "evicted the active scene (explicit clear)");
            self.active = None;
        }
    }
}
