//! Client-hash HTTP load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────┐
//!                          │                 LOAD BALANCER                │
//!     Client Request       │  ┌────────┐   ┌──────────┐   ┌───────────┐   │
//!     ─────────────────────┼─▶│  http  │──▶│ registry │──▶│ selector  │   │
//!                          │  │ server │   │ snapshot │   │ FNV % len │   │
//!                          │  └────────┘   └────▲─────┘   └─────┬─────┘   │
//!                          │                    │               ▼         │
//!                          │              ┌─────┴─────┐   ┌───────────┐   │
//!                          │              │  health   │   │ forwarding│◀──┼──── Backend
//!     Client Response      │              │ monitor   │   │   proxy   │───┼───▶ Server
//!     ◀────────────────────┼──────────────┴───────────┴───┴───────────┘   │
//!                          └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use hash_balancer::config::{load_config, validation::validate_config, BalancerConfig, ConfigError};
use hash_balancer::lifecycle::{wait_for_termination, Shutdown};
use hash_balancer::observability::{logging, metrics};
use hash_balancer::HttpServer;

#[derive(Parser)]
#[command(name = "hash-balancer")]
#[command(about = "HTTP load balancer with client-address hashing", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Load balancer port.
    #[arg(long)]
    port: Option<u16>,

    /// Request timeout in seconds.
    #[arg(long = "timeout-sec")]
    timeout_sec: Option<u64>,

    /// Backends support HTTPS.
    #[arg(long)]
    https: bool,

    /// Include tracing information into responses.
    #[arg(long)]
    trace: bool,
}

impl Cli {
    fn apply(&self, config: &mut BalancerConfig) {
        if let Some(port) = self.port {
            config.listener.set_port(port);
        }
        if let Some(secs) = self.timeout_sec {
            config.timeouts.request_secs = secs;
        }
        if self.https {
            config.backends.https = true;
        }
        if self.trace {
            config.routing.trace = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BalancerConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability.log_level);
    tracing::info!("hash-balancer v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = ?config.backends.servers,
        https = config.backends.https,
        request_timeout_secs = config.timeouts.request_secs,
        health_interval_secs = config.health_check.interval_secs,
        trace = config.routing.trace,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_termination().await;
        trigger.trigger();
    });

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from(["hash-balancer", "--port", "9001", "--timeout-sec", "7", "--https", "--trace"]);
        let mut config = BalancerConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.listener.bind_address, "0.0.0.0:9001");
        assert_eq!(config.timeouts.request_secs, 7);
        assert!(config.backends.https);
        assert!(config.routing.trace);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let cli = Cli::parse_from(["hash-balancer"]);
        let mut config = BalancerConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8090");
        assert!(!config.routing.trace);
    }
}
