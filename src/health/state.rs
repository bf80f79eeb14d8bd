//! Backend health records.
//!
//! # States
//! - Unknown: not probed yet, excluded from selection
//! - Healthy: last probe returned 200 in time
//! - Unhealthy: last probe failed
//!
//! No hysteresis: a single probe result decides the state until the next one.

use std::time::Instant;

/// Health state of one backend, as last observed by its monitor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthRecord {
    /// Result of the most recent probe. `false` before the first probe.
    pub is_healthy: bool,
    /// When the most recent probe finished. `None` until the first probe.
    pub last_checked_at: Option<Instant>,
}

impl HealthRecord {
    /// A record for a backend that has not been probed yet.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.last_checked_at.is_none()
    }

    /// Apply a probe result. Returns true if the healthy flag flipped.
    pub fn observe(&mut self, healthy: bool, at: Instant) -> bool {
        let changed = self.is_healthy != healthy;
        self.is_healthy = healthy;
        self.last_checked_at = Some(at);
        changed
    }
}
