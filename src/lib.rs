//! `fn handle(&self, &mut Context)`
//!
//! # senda
//!
//! A small routing core for HTTP services: a per-method prefix tree
//! maps `(method, path)` pairs to ordered handler chains, extracts path
//! parameters, and drives each request through its chain with
//! continue/abort flow control and a pooled, concurrency-safe
//! per-request store.
//!
//! Transport is deliberately out of scope: senda neither listens nor
//! parses bodies. An embedding server builds a [`Request`] per call,
//! hands it to [`Router::dispatch`], and writes the returned
//! [`Response`] back to the wire however it likes.
//!
//! ```
//! use senda::{Context, Request, Router};
//! use senda::http::{Method, StatusCode};
//!
//! let mut router = Router::new();
//! router.with(senda::middleware::access_log())?;
//! router.get("/users/:id", |cx: &mut Context| {
//!     let id = cx.param("id").unwrap_or("?").to_owned();
//!     cx.text(StatusCode::OK, id);
//! })?;
//!
//! let response = router.dispatch(Request::new(Method::GET, "/users/42"));
//! assert_eq!(response.status(), StatusCode::OK);
//! assert_eq!(&response.body()[..], b"42");
//! # Ok::<_, senda::RegisterError>(())
//! ```
//!
//! Routes are registered before serving starts; registration conflicts
//! (duplicates, incompatible wildcards, misplaced catch-alls) are
//! rejected with a [`RouteConflict`] at registration time, never at
//! request time.

pub mod context;
pub use context::{Context, Key};

pub mod error;
pub use error::{BoxError, MissingKey, RegisterError, RouteConflict, StatusRejected};

pub mod handler;
pub use handler::{Chain, DynHandler, Handler, HandlerChain, IntoHandlerChain};

pub mod middleware;

pub mod path;
pub use path::{Param, Params};

pub mod request;
pub use request::Request;

pub mod response;
pub use response::Response;

pub mod router;
pub use router::{RouteGroup, Router};

pub(crate) mod tree;

/// Re-export of the [`http`] crate: the method, status and header
/// vocabulary used throughout this crate.
pub use http;
