//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The static backend pool.
    pub backends: BackendsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Backend selection and response tracing.
    pub routing: RoutingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8090").
    pub bind_address: String,
}

impl ListenerConfig {
    /// Replace the port of the bind address, keeping the host.
    pub fn set_port(&mut self, port: u16) {
        let host = match self.bind_address.rsplit_once(':') {
            Some((host, _)) => host.to_string(),
            None => self.bind_address.clone(),
        };
        self.bind_address = format!("{}:{}", host, port);
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8090".to_string(),
        }
    }
}

/// Backend pool configuration.
///
/// Membership is fixed for the lifetime of the process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendsConfig {
    /// Talk to backends over HTTPS instead of HTTP (applies to all of them).
    pub https: bool,

    /// Backend authorities (`host:port`), in selection order.
    pub servers: Vec<String>,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            https: false,
            servers: vec![
                "server1:8080".to_string(),
                "server2:8080".to_string(),
                "server3:8080".to_string(),
            ],
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-request deadline in seconds. Also bounds each health probe.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 3 }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Path to probe on each backend.
    pub path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            path: "/health".to_string(),
        }
    }
}

/// Hash applied to the client key during backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HashFunction {
    /// 32-bit FNV-1 (multiply, then xor).
    #[default]
    Fnv1,
    /// 32-bit FNV-1a (xor, then multiply).
    Fnv1a,
}

/// Routing configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Add an `lb-from` header naming the serving backend to every response.
    pub trace: bool,

    /// Client key hash.
    pub hash: HashFunction,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: BalancerConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8090");
        assert_eq!(config.backends.servers.len(), 3);
        assert!(!config.backends.https);
        assert_eq!(config.timeouts.request_secs, 3);
        assert_eq!(config.health_check.interval_secs, 10);
        assert_eq!(config.health_check.path, "/health");
        assert!(!config.routing.trace);
        assert_eq!(config.routing.hash, HashFunction::Fnv1);
    }

    #[test]
    fn test_partial_document() {
        let config: BalancerConfig = toml::from_str(
            r#"
            [backends]
            https = true
            servers = ["10.0.0.1:443"]

            [routing]
            trace = true
            hash = "fnv1a"
            "#,
        )
        .unwrap();
        assert!(config.backends.https);
        assert_eq!(config.backends.servers, vec!["10.0.0.1:443".to_string()]);
        assert!(config.routing.trace);
        assert_eq!(config.routing.hash, HashFunction::Fnv1a);
        assert_eq!(config.timeouts.request_secs, 3);
    }

    #[test]
    fn test_set_port() {
        let mut listener = ListenerConfig::default();
        listener.set_port(9000);
        assert_eq!(listener.bind_address, "0.0.0.0:9000");

        let mut v6 = ListenerConfig {
            bind_address: "[::1]:80".to_string(),
        };
        v6.set_port(81);
        assert_eq!(v6.bind_address, "[::1]:81");
    }
}
