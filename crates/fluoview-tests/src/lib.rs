//! Integration test crate for FluoView.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on multiple fluoview crates to verify they work together.

#[cfg(test)]
mod caching;

#[cfg(test)]
mod monitoring;

#[cfg(test)]
mod rendering;
