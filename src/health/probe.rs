//! Single liveness probe against one backend.

use std::time::Duration;

use axum::http::{header::USER_AGENT, StatusCode};
use thiserror::Error;
use tokio::time;

use crate::load_balancer::Backend;

const PROBE_USER_AGENT: &str = "hash-balancer-health-check";

/// Why a probe did not count as healthy. Pure data, never escalated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeFailure {
    #[error("timeout")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    Status(StatusCode),
}

/// Issues `GET {scheme}://{backend}{path}` and expects a 200 within the timeout.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    client: reqwest::Client,
    path: String,
    timeout: Duration,
}

impl HealthProbe {
    pub fn new(path: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            path: path.into(),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe one backend once. No retries within a single check.
    pub async fn check(&self, backend: &Backend) -> Result<(), ProbeFailure> {
        let url = backend
            .url_for(&self.path)
            .map_err(|e| ProbeFailure::Transport(e.to_string()))?;

        let request = self.client.get(url).header(USER_AGENT, PROBE_USER_AGENT).send();

        match time::timeout(self.timeout, request).await {
            Ok(Ok(response)) if response.status() == StatusCode::OK => Ok(()),
            Ok(Ok(response)) => Err(ProbeFailure::Status(response.status())),
            Ok(Err(e)) if e.is_timeout() => Err(ProbeFailure::Timeout),
            Ok(Err(e)) => Err(ProbeFailure::Transport(e.to_string())),
            Err(_) => Err(ProbeFailure::Timeout),
        }
    }
}
