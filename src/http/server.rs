//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the dispatcher handler
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener
//! - Start the health monitor alongside the server
//! - Dispatch every request: snapshot → select → forward

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::BalancerConfig;
use crate::health::HealthMonitor;
use crate::http::proxy::ForwardingProxy;
use crate::http::request::{RequestContext, UuidRequestId, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{BackendError, ClientHash, Registry, Selector};
use crate::observability::metrics;

/// Error building the server from configuration.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid backend: {0}")]
    Backend(#[from] BackendError),

    #[error("failed to build health probe client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to set up TLS for the forwarding client: {0}")]
    Tls(#[from] rustls::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub selector: Arc<dyn Selector>,
    pub proxy: ForwardingProxy,
    pub timeout: Duration,
    pub trace: bool,
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    config: BalancerConfig,
    registry: Arc<Registry>,
    monitor: Option<HealthMonitor>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: BalancerConfig) -> Result<Self, ServerError> {
        let registry = Arc::new(Registry::from_config(&config.backends)?);
        let timeout = Duration::from_secs(config.timeouts.request_secs);

        let monitor = if config.health_check.enabled {
            Some(HealthMonitor::from_config(registry.clone(), &config.health_check, timeout)?)
        } else {
            None
        };

        let state = AppState {
            registry: registry.clone(),
            selector: Arc::new(ClientHash::new(config.routing.hash)),
            proxy: ForwardingProxy::new()?,
            timeout,
            trace: config.routing.trace,
        };

        let router = Self::build_router(state);
        Ok(Self {
            router,
            config,
            registry,
            monitor,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(dispatch))
            .route("/{*path}", any(dispatch))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        let request_id = request
                            .headers()
                            .get(X_REQUEST_ID)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("unknown");
                        tracing::info_span!(
                            "request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = %request_id,
                        )
                    }))
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            )
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` is triggered.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.registry.pool().len(),
            trace = self.config.routing.trace,
            "HTTP server starting"
        );

        let monitor_tasks = match self.monitor {
            Some(monitor) => monitor.spawn(&shutdown),
            None => {
                tracing::info!("Active health checks disabled");
                Vec::new()
            }
        };

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let mut stop = shutdown.subscribe();

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        for task in monitor_tasks {
            task.abort();
        }

        tracing::info!("HTTP server stopped");
        result
    }

    /// The router, for serving without a listener (tests, embedding).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The shared health registry.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }
}

/// Dispatcher: pick a backend from the current snapshot and forward to it.
async fn dispatch(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let ctx = RequestContext::from_request(peer, &request, state.timeout, state.trace);
    let method = request.method().to_string();

    // One snapshot per request; selection never sees a later republish.
    let snapshot = state.registry.current_healthy();
    let backend = match state.selector.select(&ctx.client_key, &snapshot) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::warn!(request_id = %ctx.request_id, client = %ctx.client_key, "No healthy backends");
            metrics::record_request(&method, 503, "none", start_time);
            return e.into_response();
        }
    };

    match state.proxy.forward(&backend, request, &ctx).await {
        Ok(response) => {
            tracing::info!(
                request_id = %ctx.request_id,
                client = %ctx.client_key,
                backend = %backend,
                status = %response.status(),
                "Forwarded request"
            );
            metrics::record_request(&method, response.status().as_u16(), backend.address(), start_time);
            response
        }
        Err(e) => {
            tracing::warn!(
                request_id = %ctx.request_id,
                client = %ctx.client_key,
                backend = %backend,
                error = %e,
                "Failed to forward request"
            );
            metrics::record_forward_failure(e.reason());
            metrics::record_request(&method, 503, backend.address(), start_time);
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::StatusCode;
    use axum::routing::get;
    use tower::ServiceExt;

    fn config(servers: Vec<String>, trace: bool) -> BalancerConfig {
        let mut config = BalancerConfig::default();
        config.backends.servers = servers;
        config.health_check.enabled = false;
        config.routing.trace = trace;
        config
    }

    fn peer() -> SocketAddr {
        "92.168.0.0:80".parse().unwrap()
    }

    #[tokio::test]
    async fn test_no_healthy_backend_is_503() {
        let server = HttpServer::new(config(BalancerConfig::default().backends.servers, false)).unwrap();
        let app = server.router().layer(MockConnectInfo(peer()));

        let response = app
            .oneshot(Request::get("/anything").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_dispatches_to_healthy_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend_addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let app = Router::new().route("/{*path}", get(|| async { "from backend" }));
            let _ = axum::serve(listener, app).await;
        });

        let server = HttpServer::new(config(vec!["127.0.0.1:1".into(), backend_addr.to_string()], true)).unwrap();
        server.registry().report(1, true);
        let app = server.router().layer(MockConnectInfo(peer()));

        let response = app
            .oneshot(
                Request::get("/api/v1/some-data")
                    .header(X_REQUEST_ID, "fixed-id")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("lb-from").unwrap(), backend_addr.to_string().as_str());
        assert_eq!(response.headers().get(X_REQUEST_ID).unwrap(), "fixed-id");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"from backend");
    }

    #[tokio::test]
    async fn test_forward_failure_is_503() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead = listener.local_addr().unwrap();
        drop(listener);

        let server = HttpServer::new(config(vec![dead.to_string()], true)).unwrap();
        server.registry().report(0, true);
        let app = server.router().layer(MockConnectInfo(peer()));

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        // Request-path failures leave health to the monitor.
        assert_eq!(server.registry().current_healthy().len(), 1);
    }

    #[test]
    fn test_invalid_backend_rejected() {
        let result = HttpServer::new(config(vec!["not a backend".into()], false));
        assert!(matches!(result, Err(ServerError::Backend(_))));
    }
}
