//! Registry of currently healthy backends.
//!
//! # Responsibilities
//! - Own the fixed backend pool
//! - Hold one health record per backend
//! - Publish the filtered healthy list as an immutable snapshot
//!
//! # Design Decisions
//! - Readers load the current snapshot through `ArcSwap` and never take a lock
//! - Writers serialize on the record mutex, rebuild the list, then swap it in
//! - A published list is never mutated; a reader keeps its `Arc` for the whole request

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use arc_swap::ArcSwap;

use crate::config::BackendsConfig;
use crate::health::state::HealthRecord;
use crate::load_balancer::backend::{Backend, BackendError, Scheme};
use crate::observability::metrics;

/// Point-in-time list of healthy backends, in pool order.
pub type HealthySnapshot = Arc<Vec<Arc<Backend>>>;

/// Authoritative, concurrently readable view of backend health.
#[derive(Debug)]
pub struct Registry {
    pool: Vec<Arc<Backend>>,
    records: Mutex<Vec<HealthRecord>>,
    healthy: ArcSwap<Vec<Arc<Backend>>>,
}

impl Registry {
    /// Create a registry where every backend starts unconfirmed (excluded).
    pub fn new(pool: Vec<Backend>) -> Self {
        let records = vec![HealthRecord::unknown(); pool.len()];
        Self {
            pool: pool.into_iter().map(Arc::new).collect(),
            records: Mutex::new(records),
            healthy: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Build the pool from configuration.
    pub fn from_config(config: &BackendsConfig) -> Result<Self, BackendError> {
        let scheme = Scheme::from_https(config.https);
        let pool = config
            .servers
            .iter()
            .map(|address| Backend::parse(address, scheme))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(pool))
    }

    /// All configured backends, healthy or not.
    pub fn pool(&self) -> &[Arc<Backend>] {
        &self.pool
    }

    /// The latest published healthy snapshot.
    pub fn current_healthy(&self) -> HealthySnapshot {
        self.healthy.load_full()
    }

    /// Record a probe result for the backend at `index` in the pool.
    ///
    /// Republishes the snapshot when the healthy flag changes and returns
    /// whether it did.
    pub fn report(&self, index: usize, healthy: bool) -> bool {
        let mut records = self.lock_records();
        let Some(record) = records.get_mut(index) else {
            tracing::warn!(index, pool_size = self.pool.len(), "Health report for unknown backend index");
            return false;
        };

        let changed = record.observe(healthy, Instant::now());
        metrics::record_backend_health(self.pool[index].address(), healthy);

        if changed {
            tracing::info!(
                backend = %self.pool[index],
                healthy,
                "Backend health changed"
            );
            self.publish(&records);
        }
        changed
    }

    /// Copy of every health record, in pool order.
    pub fn records(&self) -> Vec<HealthRecord> {
        self.lock_records().clone()
    }

    fn publish(&self, records: &MutexGuard<'_, Vec<HealthRecord>>) {
        let snapshot: Vec<Arc<Backend>> = self
            .pool
            .iter()
            .zip(records.iter())
            .filter(|(_, record)| record.is_healthy)
            .map(|(backend, _)| backend.clone())
            .collect();

        tracing::debug!(healthy = snapshot.len(), total = self.pool.len(), "Publishing healthy snapshot");
        metrics::record_healthy_backends(snapshot.len());
        self.healthy.store(Arc::new(snapshot));
    }

    fn lock_records(&self) -> MutexGuard<'_, Vec<HealthRecord>> {
        // Records are plain data; a panicked writer cannot leave them torn.
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
