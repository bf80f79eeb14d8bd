//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     One timer per backend
//!     → probe.rs (GET /health, bounded by the request timeout)
//!     → Registry::report (update state.rs record, republish snapshot)
//! ```
//!
//! # Design Decisions
//! - Probe failures are data, never errors
//! - A single probe decides the state; retry happens on the next tick
//! - Request-path failures do not touch health state; only probes do
//! - A slow backend only delays its own loop

pub mod active;
pub mod probe;
pub mod state;

pub use active::HealthMonitor;
pub use probe::{HealthProbe, ProbeFailure};
pub use state::HealthRecord;
