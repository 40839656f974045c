//! Preview quality tiers.

use serde::{Deserialize, Serialize};

/// How aggressively preview renders are capped.
///
/// The manual tiers pin the preview dimension cap outright; `Auto`
/// lets the monitor pick based on hardware and observed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    /// Monitor-controlled (the default).
    Auto,
    /// Fastest: tiny previews.
    Ultra,
    /// Fast previews.
    High,
    /// Middle ground.
    Balanced,
    /// Fidelity first.
    Quality,
}

impl Default for QualityTier {
    fn default() -> Self {
        Self::Auto
    }
}

impl QualityTier {
    /// Preview dimension cap for the manual tiers. `Auto` returns
    /// `None`; the monitor resolves it from hardware and load state.
    pub fn fixed_cap(self, base: usize) -> Option<usize> {
        match self {
            Self::Auto => None,
            Self::Ultra => Some(256),
            Self::High => Some(512),
            Self::Balanced => Some(1024),
            Self::Quality => Some(base.max(2048)),
        }
    }
}
