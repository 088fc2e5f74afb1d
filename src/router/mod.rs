//! Route registration and the dispatch entry point.

use std::fmt;
use std::sync::Arc;

use ahash::{HashMap, HashMapExt as _};
use http::{Method, StatusCode};
use tracing::trace;

use crate::context::pool::ContextPool;
use crate::context::{Context, MAX_CHAIN_LEN};
use crate::error::RegisterError;
use crate::handler::{DynHandler, Handler, HandlerChain, IntoHandlerChain};
use crate::request::Request;
use crate::response::Response;
use crate::tree::Tree;

mod group;

pub use group::RouteGroup;

/// Maps (method, path) pairs to handler chains and executes them.
///
/// One routing trie exists per HTTP method, created lazily on the first
/// registration for that method. Registration must complete before
/// [`dispatch`][Self::dispatch] is called: the trees are read-only at
/// request time and dispatch takes `&self`.
///
/// ```
/// use senda::{Context, Request, Router};
/// use senda::http::{Method, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/hello/:name", |cx: &mut Context| {
///     let name = cx.param("name").unwrap_or("world").to_owned();
///     cx.text(StatusCode::OK, format!("hello {name}"));
/// })?;
///
/// let response = router.dispatch(Request::new(Method::GET, "/hello/senda"));
/// assert_eq!(response.status(), StatusCode::OK);
/// assert_eq!(&response.body()[..], b"hello senda");
/// # Ok::<_, senda::RegisterError>(())
/// ```
pub struct Router {
    trees: HashMap<Method, Tree>,
    /// Router-level middleware, combined into every chain registered
    /// after it was added, and into the built-in not-found chain.
    middleware: Vec<DynHandler>,
    not_found: DynHandler,
    pool: ContextPool,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self {
            trees: HashMap::new(),
            middleware: Vec::new(),
            not_found: Arc::new(not_found),
            pool: ContextPool::new(),
        }
    }

    /// Append router-level middleware.
    ///
    /// Middleware only applies to routes registered after this call;
    /// chains are combined at registration time.
    pub fn with(&mut self, middleware: impl Handler) -> Result<&mut Self, RegisterError> {
        // +1: the not-found handler shares the middleware prefix.
        let count = self.middleware.len() + 1;
        if count >= MAX_CHAIN_LEN {
            return Err(RegisterError::TooManyHandlers {
                pattern: "/".to_owned(),
                count,
            });
        }
        self.middleware.push(Arc::new(middleware));
        Ok(self)
    }

    /// Register `handlers` for the given method and pattern.
    ///
    /// Pattern syntax: `/literal`, `/:name` (one path segment),
    /// `/*name` (rest of the path, final segment only). A conflicting
    /// pattern is rejected immediately: fail fast at startup, not at
    /// request time.
    pub fn route(
        &mut self,
        method: Method,
        pattern: &str,
        handlers: impl IntoHandlerChain,
    ) -> Result<&mut Self, RegisterError> {
        let prefix = self.middleware.clone();
        self.add_route(
            method,
            join_paths("/", pattern),
            &prefix,
            handlers.into_handlers(),
        )?;
        Ok(self)
    }

    pub fn get(
        &mut self,
        pattern: &str,
        handlers: impl IntoHandlerChain,
    ) -> Result<&mut Self, RegisterError> {
        self.route(Method::GET, pattern, handlers)
    }

    pub fn post(
        &mut self,
        pattern: &str,
        handlers: impl IntoHandlerChain,
    ) -> Result<&mut Self, RegisterError> {
        self.route(Method::POST, pattern, handlers)
    }

    pub fn put(
        &mut self,
        pattern: &str,
        handlers: impl IntoHandlerChain,
    ) -> Result<&mut Self, RegisterError> {
        self.route(Method::PUT, pattern, handlers)
    }

    pub fn patch(
        &mut self,
        pattern: &str,
        handlers: impl IntoHandlerChain,
    ) -> Result<&mut Self, RegisterError> {
        self.route(Method::PATCH, pattern, handlers)
    }

    pub fn delete(
        &mut self,
        pattern: &str,
        handlers: impl IntoHandlerChain,
    ) -> Result<&mut Self, RegisterError> {
        self.route(Method::DELETE, pattern, handlers)
    }

    pub fn head(
        &mut self,
        pattern: &str,
        handlers: impl IntoHandlerChain,
    ) -> Result<&mut Self, RegisterError> {
        self.route(Method::HEAD, pattern, handlers)
    }

    pub fn options(
        &mut self,
        pattern: &str,
        handlers: impl IntoHandlerChain,
    ) -> Result<&mut Self, RegisterError> {
        self.route(Method::OPTIONS, pattern, handlers)
    }

    /// Create a [`RouteGroup`] under the given path prefix.
    ///
    /// The group snapshots the router middleware added so far.
    pub fn group(&mut self, prefix: &str) -> RouteGroup<'_> {
        let middleware = self.middleware.clone();
        RouteGroup::new(self, join_paths("/", prefix), middleware)
    }

    pub(crate) fn add_route(
        &mut self,
        method: Method,
        pattern: String,
        prefix: &[DynHandler],
        tail: Vec<DynHandler>,
    ) -> Result<(), RegisterError> {
        let count = prefix.len() + tail.len();
        if count >= MAX_CHAIN_LEN {
            return Err(RegisterError::TooManyHandlers { pattern, count });
        }
        let chain = HandlerChain::from_parts(prefix, tail);
        self.trees
            .entry(method.clone())
            .or_insert_with(Tree::new)
            .add_route(&pattern, chain)
            .map_err(RegisterError::from)?;
        trace!(method = %method, pattern = %pattern, handlers = count, "route registered");
        Ok(())
    }

    /// Resolve the request and drive its chain to completion.
    ///
    /// An unregistered method and an unmatched path are indistinguishable
    /// in the response: both run the built-in not-found chain (status
    /// 404, body naming the unmatched path), wrapped by the router-level
    /// middleware. The internal cause is still distinguished in the
    /// trace log for diagnostics.
    pub fn dispatch(&self, request: Request) -> Response {
        let mut cx = self.pool.checkout();
        cx.reset(request);

        let resolved = match self.trees.get(cx.request().method()) {
            Some(tree) => tree.resolve(cx.request().path()),
            None => None,
        };

        match resolved {
            Some(matched) => {
                trace!(
                    method = %cx.request().method(),
                    path = cx.request().path(),
                    route = %matched.pattern,
                    "route matched"
                );
                cx.install_route(matched);
            }
            None => {
                let cause = if self.trees.contains_key(cx.request().method()) {
                    "path"
                } else {
                    "method"
                };
                trace!(
                    method = %cx.request().method(),
                    path = cx.request().path(),
                    cause,
                    "no route matched"
                );
                cx.install_chain(HandlerChain::from_parts(
                    &self.middleware,
                    vec![self.not_found.clone()],
                ));
            }
        }

        cx.advance();
        let response = cx.take_response();
        self.pool.release(cx);
        response
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("methods", &self.trees.len())
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// The built-in terminal handler of the not-found chain.
fn not_found(cx: &mut Context) {
    let path = cx.request().path().to_owned();
    cx.text(StatusCode::NOT_FOUND, format!("url {path} not found"));
}

/// Join two path fragments into one normalized absolute pattern.
pub(crate) fn join_paths(base: &str, relative: &str) -> String {
    let segments: Vec<&str> = crate::path::split(base)
        .into_iter()
        .chain(crate::path::split(relative))
        .collect();
    if segments.is_empty() {
        "/".to_owned()
    } else {
        format!("/{}", segments.join("/"))
    }
}
