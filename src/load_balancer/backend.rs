//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server (authority + scheme)
//! - Build outbound URIs for forwarded requests and URLs for probes
//!
//! Backends are immutable; health lives in the registry.

use std::fmt;
use std::str::FromStr;

use axum::http::uri::{Authority, PathAndQuery};
use axum::http::Uri;
use thiserror::Error;
use url::Url;

/// Transport scheme used to reach backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Pick the scheme from the global HTTPS flag.
    pub fn from_https(https: bool) -> Self {
        if https {
            Scheme::Https
        } else {
            Scheme::Http
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised for a malformed backend address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("not a valid authority: {0}")]
    InvalidAuthority(String),

    #[error("user info is not allowed")]
    UserInfo,

    #[error("missing port")]
    MissingPort,

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// A single backend server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    /// The address as configured (`host:port`).
    address: String,
    /// Parsed authority, used for the outbound `host` header.
    authority: Authority,
    scheme: Scheme,
    /// Pre-calculated base URL.
    base_url: Url,
}

impl Backend {
    /// Parse a `host:port` address.
    pub fn parse(address: &str, scheme: Scheme) -> Result<Self, BackendError> {
        let authority = Authority::from_str(address)
            .map_err(|e| BackendError::InvalidAuthority(e.to_string()))?;
        if authority.as_str().contains('@') {
            return Err(BackendError::UserInfo);
        }
        if authority.port_u16().is_none() {
            return Err(BackendError::MissingPort);
        }

        let base_url = Url::parse(&format!("{}://{}/", scheme, authority))
            .map_err(|e| BackendError::InvalidUrl(e.to_string()))?;

        Ok(Self {
            address: address.to_string(),
            authority,
            scheme,
            base_url,
        })
    }

    /// The configured address, as used in the `lb-from` header.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the outbound URI for a forwarded request. The request target is
    /// carried over as-is, without resolving dot segments or re-encoding.
    pub fn uri_for(&self, path_and_query: Option<&PathAndQuery>) -> Result<Uri, axum::http::Error> {
        let target = path_and_query
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        Uri::builder()
            .scheme(self.scheme.as_str())
            .authority(self.authority.clone())
            .path_and_query(target)
            .build()
    }

    /// Build the URL for a probe path (`/path?query`) on this backend.
    pub fn url_for(&self, path_and_query: &str) -> Result<Url, url::ParseError> {
        let target = if path_and_query.starts_with('/') {
            path_and_query.to_string()
        } else {
            format!("/{}", path_and_query)
        };
        Url::parse(&format!("{}://{}{}", self.scheme, self.authority, target))
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}
