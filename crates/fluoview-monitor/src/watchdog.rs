//! Heartbeat watchdog thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::event::MonitorEvent;

/// Background thread that compares "now" against the last heartbeat
/// stamp and reports stalls. Edge-triggered: one `Stall` per sustained
/// outage, one `Recovered` when heartbeats resume.
pub(crate) struct Watchdog {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub(crate) fn spawn(
        last_tick: Arc<Mutex<Instant>>,
        stall_threshold: Duration,
        poll: Duration,
        events: Sender<MonitorEvent>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = std::thread::Builder::new()
            .name("fluoview-watchdog".into())
            .spawn(move || {
                let mut stalled = false;
                while !stop_flag.load(Ordering::Relaxed) {
                    std::thread::sleep(poll);
                    let elapsed = last_tick.lock().elapsed();
                    if !stalled && elapsed >= stall_threshold {
                        stalled = true;
                        warn!(?elapsed, "UI heartbeat stalled");
                        if events.send(MonitorEvent::Stall(elapsed)).is_err() {
                            break; // owner is gone
                        }
                    } else if stalled && elapsed < stall_threshold {
                        stalled = false;
                        info!("UI heartbeat recovered");
                        if events.send(MonitorEvent::Recovered).is_err() {
                            break;
                        }
                    }
                }
            })
            .ok();

        Self { stop, handle }
    }

    /// Signal the thread and wait for it to exit.
    pub(crate) fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}
