//! FluoView Viewer - The explicit viewer context
//!
//! `ViewerContext` is the single owner of the scene cache and the
//! performance monitor. All cache and channel mutation flows through it
//! on the owning thread; the only background activity is the monitor's
//! watchdog, which communicates via events drained in [`ViewerContext::tick`].

mod context;

pub use context::ViewerContext;
