//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, access span)
//!     → request.rs (RequestContext: client key, deadline, trace flag)
//!     → Registry snapshot + Selector pick a backend
//!     → proxy.rs (rewrite, forward, stream the response back)
//!     → response.rs (hop-by-hop stripping, failures → 503)
//!     → Send to client
//! ```

pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use proxy::{ForwardError, ForwardingProxy, LB_FROM};
pub use request::{RequestContext, UuidRequestId, X_REQUEST_ID};
pub use server::{HttpServer, ServerError};
