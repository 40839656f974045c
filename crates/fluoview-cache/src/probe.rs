//! Memory-pressure probing.

use fluoview_core::error::Result;
use tracing::warn;

/// Answers "is memory currently tight?" for the cache.
///
/// Injected rather than read from a global so tests (and the monitor)
/// can supply their own notion of pressure.
pub trait PressureProbe: Send {
    fn is_high(&self) -> Result<bool>;
}

/// A probe that never reports pressure.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPressure;

impl PressureProbe for NoPressure {
    fn is_high(&self) -> Result<bool> {
        Ok(false)
    }
}

/// Resolve a probe reading, failing open: an unreadable probe is
/// treated as "no pressure" so an uncertain measurement never triggers
/// an eviction.
pub(crate) fn read_pressure(probe: &dyn PressureProbe) -> bool {
    match probe.is_high() {
        Ok(high) => high,
        Err(err) => {
            warn!(%err, "memory pressure probe failed, assuming no pressure");
            false
        }
    }
}
