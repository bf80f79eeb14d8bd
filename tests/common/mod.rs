//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, Uri},
    response::IntoResponse,
    routing::{any, get},
    Router,
};
use hash_balancer::config::BalancerConfig;
use hash_balancer::load_balancer::Registry;
use hash_balancer::{HttpServer, Shutdown};
use tokio::net::TcpListener;

/// Serve an axum app on an ephemeral local port.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// A backend that answers `/health` with 200 and every other path with `body`.
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    serve(
        Router::new()
            .route("/health", get(|| async { "ok" }))
            .fallback(move || async move { body }),
    )
    .await
}

/// A backend whose `/health` follows the `up` flag. Other paths echo `body`.
pub async fn start_switchable_backend(body: &'static str, up: Arc<AtomicBool>) -> SocketAddr {
    let app = Router::new()
        .route(
            "/health",
            get(|State(up): State<Arc<AtomicBool>>| async move {
                if up.load(Ordering::SeqCst) {
                    StatusCode::OK
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }),
        )
        .fallback(move || async move { body })
        .with_state(up);
    serve(app).await
}

/// A backend that echoes the request body back.
pub async fn start_echo_backend() -> SocketAddr {
    serve(Router::new().route(
        "/{*path}",
        any(|request: Request<Body>| async move {
            match axum::body::to_bytes(request.into_body(), usize::MAX).await {
                Ok(bytes) => (StatusCode::OK, bytes).into_response(),
                Err(_) => StatusCode::BAD_REQUEST.into_response(),
            }
        }),
    ))
    .await
}

/// A backend that answers every path with the request target it received.
pub async fn start_target_echo_backend() -> SocketAddr {
    serve(Router::new().fallback(|uri: Uri| async move { uri.to_string() })).await
}

/// A backend whose `/stall` sends its head and a first chunk, then stalls for
/// `stall` before finishing. Every other path answers `ok` right away.
pub async fn start_stalling_backend(stall: Duration) -> SocketAddr {
    serve(
        Router::new()
            .route(
                "/stall",
                get(move || async move {
                    let head = futures_util::stream::once(async { Ok::<_, std::io::Error>("head-") });
                    let tail = futures_util::stream::once(async move {
                        tokio::time::sleep(stall).await;
                        Ok("tail")
                    });
                    Body::from_stream(futures_util::StreamExt::chain(head, tail))
                }),
            )
            .fallback(|| async { "ok" }),
    )
    .await
}

/// A backend that waits `delay` before answering any path.
pub async fn start_slow_backend(delay: Duration) -> SocketAddr {
    serve(Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        "slow"
    }))
    .await
}

/// An address nothing listens on.
pub fn dead_address() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Balancer config pointing at `backends`, with probes off unless re-enabled.
pub fn config_for(backends: &[SocketAddr]) -> BalancerConfig {
    let mut config = BalancerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.backends.servers = backends.iter().map(|a| a.to_string()).collect();
    config.health_check.enabled = false;
    config.routing.trace = true;
    config
}

pub struct RunningBalancer {
    pub addr: SocketAddr,
    pub registry: Arc<Registry>,
    pub shutdown: Shutdown,
}

impl RunningBalancer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Mark every backend healthy without probing.
    pub fn mark_all_healthy(&self) {
        for index in 0..self.registry.pool().len() {
            self.registry.report(index, true);
        }
    }
}

impl Drop for RunningBalancer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_balancer(config: BalancerConfig) -> RunningBalancer {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    let registry = server.registry();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    RunningBalancer {
        addr,
        registry,
        shutdown,
    }
}

/// Client opening a fresh connection (and client port) per request.
pub fn fresh_connection_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
