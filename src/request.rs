//! The request value handed to [`Router::dispatch`].
//!
//! Transport is out of scope for this crate: a server embedding the
//! router builds a [`Request`] from whatever connection machinery it
//! uses and hands it over per call. Bodies are not part of the value;
//! body handling belongs to the embedding server.
//!
//! [`Router::dispatch`]: crate::Router::dispatch

use std::net::SocketAddr;

use http::{HeaderMap, HeaderName, HeaderValue, Method};

/// An incoming request: method, path, headers and (optionally) the
/// address of the peer that sent it.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    headers: HeaderMap,
    peer_addr: Option<SocketAddr>,
}

impl Request {
    /// Create a new [`Request`] for the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            peer_addr: None,
        }
    }

    /// Attach a request header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach the peer address the request arrived from.
    #[must_use]
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The value of the given request header, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new(Method::GET, "/")
    }
}
