//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Health monitor
//!     → registry.rs (record probe result, republish healthy snapshot)
//!
//! Inbound request
//!     → registry.rs (load current snapshot, once per request)
//!     → client_hash.rs (hash client key, index into snapshot)
//!     → Return backend or NoHealthyBackend
//! ```
//!
//! # Design Decisions
//! - Selection is a pure function of (client key, snapshot)
//! - Unhealthy and not-yet-probed backends are excluded from the snapshot
//! - No per-backend counters are shared between requests

use std::sync::Arc;

use thiserror::Error;

pub mod backend;
pub mod client_hash;
pub mod registry;

pub use backend::{Backend, BackendError, Scheme};
pub use client_hash::ClientHash;
pub use registry::{HealthySnapshot, Registry};

/// Selection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("no healthy backend available")]
    NoHealthyBackend,
}

/// Strategy choosing one backend out of a healthy snapshot.
pub trait Selector: Send + Sync + std::fmt::Debug {
    fn select(&self, client_key: &str, healthy: &[Arc<Backend>]) -> Result<Arc<Backend>, SelectError>;
}
