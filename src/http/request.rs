//! Request handling.
//!
//! # Responsibilities
//! - Generate unique request IDs (UUID v4)
//! - Capture per-request context: client key, deadline, trace flag
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The client key is the peer address exactly as the transport reports it
//! - The deadline starts at arrival, not at dispatch

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Request};
use tokio::time::Instant;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates `x-request-id` values for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Per-request data, created on arrival and dropped with the response.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Selection key: the peer address as `ip:port` (`[ip]:port` for IPv6).
    pub client_key: String,
    /// The outbound exchange, response body included, must finish by this instant.
    pub deadline: Instant,
    /// Emit the `lb-from` header.
    pub trace: bool,
    pub request_id: String,
}

impl RequestContext {
    pub fn new(peer: SocketAddr, timeout: Duration, trace: bool, request_id: impl Into<String>) -> Self {
        Self {
            client_key: peer.to_string(),
            deadline: Instant::now() + timeout,
            trace,
            request_id: request_id.into(),
        }
    }

    /// Build the context for an inbound request, picking up its request ID.
    pub fn from_request<B>(peer: SocketAddr, request: &Request<B>, timeout: Duration, trace: bool) -> Self {
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        Self::new(peer, timeout, trace, request_id)
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_key_includes_port() {
        let ctx = RequestContext::new("92.168.0.0:80".parse().unwrap(), Duration::from_secs(3), false, "id");
        assert_eq!(ctx.client_key, "92.168.0.0:80");

        let v6 = RequestContext::new("[::1]:4000".parse().unwrap(), Duration::from_secs(3), false, "id");
        assert_eq!(v6.client_key, "[::1]:4000");
    }

    #[test]
    fn test_request_id_from_header() {
        let request = Request::builder()
            .header(X_REQUEST_ID, "abc-123")
            .body(())
            .unwrap();
        let ctx = RequestContext::from_request("127.0.0.1:1".parse().unwrap(), &request, Duration::from_secs(1), true);
        assert_eq!(ctx.request_id, "abc-123");
        assert!(ctx.trace);

        let bare = Request::builder().body(()).unwrap();
        let ctx = RequestContext::from_request("127.0.0.1:1".parse().unwrap(), &bare, Duration::from_secs(1), false);
        assert_eq!(ctx.request_id, "unknown");
    }

    #[test]
    fn test_generated_request_id_is_uuid() {
        let request = Request::builder().body(()).unwrap();
        let id = UuidRequestId.make_request_id(&request).unwrap();
        let value = id.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(value).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline() {
        let ctx = RequestContext::new("127.0.0.1:1".parse().unwrap(), Duration::from_secs(3), false, "id");
        assert!(!ctx.is_expired());
        assert_eq!(ctx.remaining(), Duration::from_secs(3));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Duration::ZERO);
    }
}
