//! The response value produced by [`Router::dispatch`].
//!
//! [`Router::dispatch`]: crate::Router::dispatch

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// The accumulated response of one dispatched request: the status the
/// chain wrote (200 when no handler wrote one), the response headers,
/// and the body bytes written by the chain.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Deconstruct into status, headers and body.
    #[must_use]
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body)
    }
}
