//! Active health checking.
//!
//! # Responsibilities
//! - Run one periodic probing loop per backend
//! - Feed every probe result into the registry

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::probe::HealthProbe;
use crate::lifecycle::Shutdown;
use crate::load_balancer::Registry;

pub struct HealthMonitor {
    registry: Arc<Registry>,
    probe: HealthProbe,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(registry: Arc<Registry>, probe: HealthProbe, interval: Duration) -> Self {
        Self {
            registry,
            probe,
            interval,
        }
    }

    /// Build a monitor whose probes are bounded by `timeout`.
    pub fn from_config(
        registry: Arc<Registry>,
        config: &HealthCheckConfig,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let probe = HealthProbe::new(config.path.clone(), timeout)?;
        Ok(Self::new(registry, probe, Duration::from_secs(config.interval_secs)))
    }

    /// Start one independent loop per backend. Each loop probes immediately,
    /// then every interval, until shutdown is triggered.
    pub fn spawn(self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        tracing::info!(
            backends = self.registry.pool().len(),
            interval = ?self.interval,
            timeout = ?self.probe.timeout(),
            "Health monitor starting"
        );

        let monitor = Arc::new(self);
        (0..monitor.registry.pool().len())
            .map(|index| {
                let monitor = monitor.clone();
                let shutdown = shutdown.subscribe();
                tokio::spawn(async move { monitor.watch(index, shutdown).await })
            })
            .collect()
    }

    /// Probe every backend once, concurrently.
    pub async fn check_all(&self) {
        let checks = (0..self.registry.pool().len()).map(|index| self.check_backend(index));
        join_all(checks).await;
    }

    /// Probe one backend and record the result. Returns the observed health.
    pub async fn check_backend(&self, index: usize) -> bool {
        let Some(backend) = self.registry.pool().get(index) else {
            return false;
        };

        let healthy = match self.probe.check(backend).await {
            Ok(()) => true,
            Err(failure) => {
                tracing::warn!(backend = %backend, reason = %failure, "Health check failed");
                false
            }
        };

        self.registry.report(index, healthy);
        healthy
    }

    async fn watch(&self, index: usize, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_backend(index).await;
                }
                _ = shutdown.recv() => {
                    tracing::debug!(index, "Health loop received shutdown signal, exiting");
                    break;
                }
            }
        }
    }
}
