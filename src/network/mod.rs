//! Transport abstraction for talking HTTP to etcd members
//!
//! The client never touches sockets directly. It asks a [`Connector`] for an
//! [`HttpConnection`] per endpoint and issues calls through it; the default
//! implementation is [`ReqwestConnector`]. Tests substitute their own.

mod connection_registry;
mod reqwest_transport;

pub use connection_registry::*;
pub use reqwest_transport::*;


use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::header::HeaderMap;

use crate::Result;

/// A store member address. `host` is kept without IPv6 brackets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        let host = host.into();
        let host = match host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            Some(bare) => bare.to_string(),
            None => host,
        };
        Self { host, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// HTTP verbs used by the v2 keys API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Put,
    Post,
    Delete,
}

impl Verb {
    /// Write-style verbs carry their parameters as a form body.
    pub fn has_form_body(&self) -> bool {
        matches!(self, Verb::Put | Verb::Post)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Put => "PUT",
            Verb::Post => "POST",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound call, addressed relative to the connection's endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub verb: Verb,
    /// Path plus optional query string, e.g. `/v2/keys/a?wait=true`
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// What came back from the server
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(
        &self,
        name: &str,
    ) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// The transport produced no response object
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("connection to {endpoint} failed: {message}")]
    Connect { endpoint: String, message: String },

    #[error("{0}")]
    Other(String),
}

/// A reusable connection to one endpoint
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HttpConnection: Send + Sync + 'static {
    fn endpoint(&self) -> Endpoint;

    /// Returns a connection to the same endpoint that shares no sockets with
    /// `self`, so a blocking long poll cannot starve other calls.
    fn clone_private(&self) -> Result<Arc<dyn HttpConnection>>;

    /// Issues one HTTP call, bounded by `timeout`.
    ///
    /// Redirects must NOT be followed: a 307 is returned as-is with its
    /// `Location` header intact.
    async fn send(
        &self,
        request: HttpRequest,
        timeout: Duration,
    ) -> std::result::Result<HttpResponse, TransportError>;
}

/// Opens connections to endpoints
#[cfg_attr(test, automock)]
pub trait Connector: Send + Sync + 'static {
    fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Arc<dyn HttpConnection>>;
}
