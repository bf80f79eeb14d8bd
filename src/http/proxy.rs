//! Forwarding proxy.
//!
//! # Responsibilities
//! - Rewrite the inbound request for the selected backend
//! - Bound the exchange by the request deadline
//! - Stream the backend response back without buffering it
//!
//! # Per-request states
//! ```text
//! Forwarding → Streaming → Done
//!            ↘ Failed (503)
//! ```
//! No retries and no re-selection: a failure is returned to the dispatcher.
//! The deadline also covers the response body: a body still streaming when
//! it passes is cut off, and the client sees a truncated response.

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Request, Version};
use axum::response::Response;
use futures_util::{stream, StreamExt, TryStreamExt};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tokio::time;

use crate::http::request::RequestContext;
use crate::http::response::strip_hop_by_hop;
use crate::load_balancer::Backend;
use crate::observability::metrics;

/// Diagnostic response header naming the backend that served the request.
pub const LB_FROM: HeaderName = HeaderName::from_static("lb-from");

type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Why a request could not be relayed to its backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("backend did not respond before the deadline")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl ForwardError {
    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            ForwardError::InvalidTarget(_) => "invalid_target",
            ForwardError::Timeout => "timeout",
            ForwardError::Connect(_) => "connect",
            ForwardError::Transport(_) => "transport",
        }
    }
}

impl From<hyper_util::client::legacy::Error> for ForwardError {
    fn from(e: hyper_util::client::legacy::Error) -> Self {
        let detail = match std::error::Error::source(&e) {
            Some(source) => format!("{}: {}", e, source),
            None => e.to_string(),
        };
        if e.is_connect() {
            ForwardError::Connect(detail)
        } else {
            ForwardError::Transport(detail)
        }
    }
}

/// Failure while relaying a response body whose head was already sent.
#[derive(Debug, Error)]
enum RelayError {
    #[error("deadline passed while streaming the response body")]
    Deadline,

    #[error("upstream body error: {0}")]
    Upstream(#[from] axum::Error),
}

impl RelayError {
    fn reason(&self) -> &'static str {
        match self {
            RelayError::Deadline => "body_deadline",
            RelayError::Upstream(_) => "body_copy",
        }
    }
}

/// Relays requests to backends over a shared, pooled client.
#[derive(Debug, Clone)]
pub struct ForwardingProxy {
    client: UpstreamClient,
}

impl ForwardingProxy {
    pub fn new() -> Result<Self, rustls::Error> {
        let connector = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())?
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Ok(Self { client })
    }

    /// Forward `request` to `backend` and return the backend's response,
    /// with its body still streaming.
    pub async fn forward(
        &self,
        backend: &Backend,
        request: Request<Body>,
        ctx: &RequestContext,
    ) -> Result<Response, ForwardError> {
        let (parts, body) = request.into_parts();

        let uri = backend
            .uri_for(parts.uri.path_and_query())
            .map_err(|e| ForwardError::InvalidTarget(e.to_string()))?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        let host = HeaderValue::from_str(backend.authority().as_str())
            .map_err(|e| ForwardError::InvalidTarget(e.to_string()))?;
        headers.insert(header::HOST, host);

        tracing::debug!(
            request_id = %ctx.request_id,
            backend = %backend,
            method = %parts.method,
            uri = %uri,
            "Forwarding request"
        );

        // The body is passed through whatever its framing on the inbound leg;
        // the client re-frames it (content-length, chunked or h2 data frames).
        let mut outbound = Request::builder()
            .method(parts.method)
            .uri(uri)
            .version(Version::HTTP_11)
            .body(body)
            .map_err(|e| ForwardError::InvalidTarget(e.to_string()))?;
        *outbound.headers_mut() = headers;

        let upstream = match time::timeout_at(ctx.deadline, self.client.request(outbound)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ForwardError::Timeout),
        };

        let (mut head, incoming) = upstream.into_parts();
        strip_hop_by_hop(&mut head.headers);
        if ctx.trace {
            if let Ok(value) = HeaderValue::from_str(backend.address()) {
                head.headers.insert(LB_FROM, value);
            }
        }

        let deadline = ctx.deadline;
        let chunks = Body::new(incoming).into_data_stream();
        let relay = stream::try_unfold(chunks, move |mut chunks| async move {
            match time::timeout_at(deadline, chunks.next()).await {
                Ok(Some(Ok(chunk))) => Ok(Some((chunk, chunks))),
                Ok(Some(Err(e))) => Err(RelayError::Upstream(e)),
                Ok(None) => Ok(None),
                Err(_) => Err(RelayError::Deadline),
            }
        });

        let backend_addr = backend.address().to_string();
        let request_id = ctx.request_id.clone();
        let relay = relay.inspect_err(move |e| {
            metrics::record_forward_failure(e.reason());
            tracing::warn!(
                request_id = %request_id,
                backend = %backend_addr,
                error = %e,
                "Failed to relay response body"
            );
        });

        let mut response = Response::new(Body::from_stream(relay));
        *response.status_mut() = head.status;
        *response.headers_mut() = head.headers;
        Ok(response)
    }
}
