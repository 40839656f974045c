//! The performance monitor.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::event::MonitorEvent;
use crate::quality::QualityTier;
use crate::watchdog::Watchdog;

const FRAME_HISTORY: usize = 50;
const JITTER_HISTORY: usize = 20;
const INTERACTION_HISTORY: usize = 10;

/// Frame average above this is "too slow", below the lower bound the
/// quality can come back.
const SLOW_FRAME_MS: f32 = 100.0;
const FAST_FRAME_MS: f32 = 30.0;
const JITTER_LIMIT_MS: f32 = 50.0;
const VIOLENT_INTERACTION: f32 = 0.5;

/// Preview cap while degraded under load, and the hard floor on
/// low-end hardware.
const DEGRADED_CAP: usize = 512;
const LOW_END_CAP: usize = 384;

/// Heartbeat-driven resource and performance monitor.
///
/// Owned and driven by the viewer context; the only background activity
/// is the watchdog thread, which communicates exclusively through the
/// event channel.
pub struct PerformanceMonitor {
    config: MonitorConfig,
    last_tick: Arc<Mutex<Instant>>,
    pressure_flag: Arc<AtomicBool>,
    events_tx: Sender<MonitorEvent>,
    events_rx: Receiver<MonitorEvent>,
    watchdog: Option<Watchdog>,

    system: System,
    last_memory_gb: f64,
    last_pressure: Option<Instant>,

    tier: QualityTier,
    low_end: bool,
    degraded: bool,
    antialiasing: bool,

    frame_times: VecDeque<f32>,
    jitter: VecDeque<f32>,
    interaction: VecDeque<f32>,
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        let (events_tx, events_rx) = unbounded();
        let mut system = System::new();
        system.refresh_memory();
        let total_gb = system.total_memory() as f64 / f64::from(1 << 30);
        let cpus = num_cpus::get();
        let low_end = cpus <= 4 || total_gb < 4.1;
        if low_end {
            info!(cpus, total_gb, "low-end hardware profile active");
        }

        Self {
            config,
            last_tick: Arc::new(Mutex::new(Instant::now())),
            pressure_flag: Arc::new(AtomicBool::new(false)),
            events_tx,
            events_rx,
            watchdog: None,
            system,
            last_memory_gb: 0.0,
            last_pressure: None,
            tier: QualityTier::Auto,
            low_end,
            degraded: false,
            antialiasing: true,
            frame_times: VecDeque::with_capacity(FRAME_HISTORY),
            jitter: VecDeque::with_capacity(JITTER_HISTORY),
            interaction: VecDeque::with_capacity(INTERACTION_HISTORY),
        }
    }

    /// Launch the stall watchdog. Safe to call once; repeated calls are
    /// ignored.
    pub fn start_watchdog(&mut self) {
        if self.watchdog.is_some() {
            return;
        }
        self.watchdog = Some(Watchdog::spawn(
            Arc::clone(&self.last_tick),
            self.config.stall_threshold,
            self.config.watchdog_poll,
            self.events_tx.clone(),
        ));
    }

    /// Stop and join the watchdog thread.
    pub fn stop(&mut self) {
        if let Some(mut dog) = self.watchdog.take() {
            dog.stop();
        }
    }

    /// The owner's "I am alive" call, expected roughly every
    /// `heartbeat_interval`. Stamps the watchdog clock and samples
    /// process memory against the pressure threshold.
    pub fn heartbeat(&mut self) {
        *self.last_tick.lock() = Instant::now();
        if let Some(gb) = self.sample_process_memory() {
            self.evaluate_memory(gb);
        }
    }

    /// Drain everything the monitor (and its watchdog) emitted since
    /// the last poll.
    pub fn poll_events(&self) -> Vec<MonitorEvent> {
        self.events_rx.try_iter().collect()
    }

    /// Shared flag mirroring the latest over-threshold reading; made
    /// for wiring into the scene cache's pressure probe.
    pub fn pressure_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.pressure_flag)
    }

    pub fn last_memory_gb(&self) -> f64 {
        self.last_memory_gb
    }

    pub fn tier(&self) -> QualityTier {
        self.tier
    }

    pub fn set_tier(&mut self, tier: QualityTier) {
        self.tier = tier;
    }

    pub fn antialiasing(&self) -> bool {
        self.antialiasing
    }

    /// Resolve the preview dimension cap for the current tier and load
    /// state. On low-end hardware the `Auto` cap never rises above the
    /// hard floor, no matter how well frames are doing.
    pub fn preview_dimension_cap(&self, base: usize) -> usize {
        if let Some(cap) = self.tier.fixed_cap(base) {
            return cap;
        }
        if self.low_end {
            LOW_END_CAP.min(base.max(1))
        } else if self.degraded {
            DEGRADED_CAP.min(base.max(1))
        } else {
            base.max(1)
        }
    }

    /// Feed one frame's render duration in milliseconds.
    pub fn report_frame_time(&mut self, ms: f32) {
        if let Some(&previous) = self.frame_times.back() {
            push_bounded(&mut self.jitter, (ms - previous).abs(), JITTER_HISTORY);
        }
        push_bounded(&mut self.frame_times, ms, FRAME_HISTORY);

        let avg = mean(&self.frame_times);
        if avg > SLOW_FRAME_MS {
            self.optimize_for_speed();
        } else if avg < FAST_FRAME_MS {
            self.restore_quality();
        }

        let avg_jitter = mean(&self.jitter);
        if avg_jitter > JITTER_LIMIT_MS && ms > SLOW_FRAME_MS {
            debug!(avg_jitter, ms, "frame jitter over limit");
            let _ = self.events_tx.send(MonitorEvent::HighJitter);
        }
    }

    /// Feed a normalized interaction speed (0 = idle, 1 = frantic).
    pub fn report_interaction_speed(&mut self, speed: f32) {
        push_bounded(&mut self.interaction, speed.max(0.0), INTERACTION_HISTORY);
        if mean(&self.interaction) > VIOLENT_INTERACTION {
            let _ = self.events_tx.send(MonitorEvent::HighJitter);
        }
    }

    /// Step quality down one notch: antialiasing goes first, the
    /// preview cap second.
    pub fn optimize_for_speed(&mut self) {
        if self.antialiasing {
            info!("frames are slow, disabling antialiasing");
            self.antialiasing = false;
        } else if !self.degraded {
            info!("frames are still slow, lowering the preview cap");
            self.degraded = true;
        }
    }

    /// Step quality back up, in reverse order of degradation.
    pub fn restore_quality(&mut self) {
        if self.degraded {
            self.degraded = false;
        } else if !self.antialiasing {
            self.antialiasing = true;
        }
    }

    fn sample_process_memory(&mut self) -> Option<f64> {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => pid,
            Err(err) => {
                warn!(err, "cannot resolve own pid, memory sampling disabled");
                return None;
            }
        };
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let process = self.system.process(pid)?;
        Some(process.memory() as f64 / f64::from(1 << 30))
    }

    /// Compare a memory reading against the threshold; emit at most one
    /// pressure event per cooldown window.
    fn evaluate_memory(&mut self, gb: f64) {
        self.last_memory_gb = gb;
        let over = gb > self.config.memory_threshold_gb;
        self.pressure_flag.store(over, Ordering::Relaxed);
        if !over || !self.config.auto_cleanup {
            return;
        }
        let cooled_down = self
            .last_pressure
            .map_or(true, |t| t.elapsed() >= self.config.cleanup_cooldown);
        if cooled_down {
            warn!(gb, threshold = self.config.memory_threshold_gb, "memory pressure");
            self.last_pressure = Some(Instant::now());
            let _ = self.events_tx.send(MonitorEvent::PressureDetected(gb));
        }
    }
}

impl Drop for PerformanceMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn push_bounded(buf: &mut VecDeque<f32>, value: f32, cap: usize) {
    if buf.len() >= cap {
        buf.pop_front();
    }
    buf.push_back(value);
}

fn mean(buf: &VecDeque<f32>) -> f32 {
    if buf.is_empty() {
        return 0.0;
    }
    buf.iter().sum::<f32>() / buf.len() as f32
}
