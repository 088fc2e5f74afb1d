//! Route groups: a shared path prefix plus a shared middleware chain.

use std::fmt;
use std::sync::Arc;

use http::Method;

use crate::error::RegisterError;
use crate::handler::{DynHandler, Handler, IntoHandlerChain};
use crate::router::{Router, join_paths};

/// A registration scope borrowing its [`Router`].
///
/// Routes registered through a group live under the group's base path
/// and inherit the middleware the group carried when they were
/// registered. Groups nest; a nested group snapshots its parent's
/// middleware at creation time.
///
/// ```
/// use senda::{Context, Router};
/// use senda::http::StatusCode;
///
/// let mut router = Router::new();
/// let mut api = router.group("/api");
/// api.get("/ping", |cx: &mut Context| {
///     cx.text(StatusCode::OK, "pong");
/// })?;
/// # Ok::<_, senda::RegisterError>(())
/// ```
pub struct RouteGroup<'r> {
    router: &'r mut Router,
    base_path: String,
    middleware: Vec<DynHandler>,
}

impl<'r> RouteGroup<'r> {
    pub(crate) fn new(router: &'r mut Router, base_path: String, middleware: Vec<DynHandler>) -> Self {
        Self {
            router,
            base_path,
            middleware,
        }
    }

    /// The absolute path prefix of this group.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Append middleware to this group.
    ///
    /// Applies to routes registered through this group (and groups
    /// derived from it) after this call.
    pub fn with(&mut self, middleware: impl Handler) -> Result<&mut Self, RegisterError> {
        let count = self.middleware.len() + 1;
        if count >= crate::context::MAX_CHAIN_LEN {
            return Err(RegisterError::TooManyHandlers {
                pattern: self.base_path.clone(),
                count,
            });
        }
        self.middleware.push(Arc::new(middleware));
        Ok(self)
    }

    /// Derive a nested group under `prefix`.
    pub fn group(&mut self, prefix: &str) -> RouteGroup<'_> {
        RouteGroup {
            base_path: join_paths(&self.base_path, prefix),
            middleware: self.middleware.clone(),
            router: &mut *self.router,
        }
    }

    /// Register `handlers` for the given method under this group.
    pub fn route(
        &mut self,
        method: Method,
        pattern: &str,
        handlers: impl IntoHandlerChain,
    ) -> Result<&mut Self, RegisterError> {
        let absolute = join_paths(&self.base_path, pattern);
        self.router
            .add_route(method, absolute, &self.middleware, handlers.into_handlers())?;
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
}

impl fmt::Debug for RouteGroup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteGroup")
            .field("base_path", &self.base_path)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use http::StatusCode;

    use super::*;
    use crate::context::Context;
    use crate::request::Request;

    #[test]
    fn test_group_routes_live_under_the_base_path() {
        let mut router = Router::new();
        let mut api = router.group("/api");
        api.get("/ping", |cx: &mut Context| {
            cx.text(StatusCode::OK, "pong");
        })
        .unwrap();

        let response = router.dispatch(Request::new(Method::GET, "/api/ping"));
        assert_eq!(response.status(), StatusCode::OK);

        let response = router.dispatch(Request::new(Method::GET, "/ping"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_nested_groups_join_prefixes_and_middleware() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let record = |entry: &'static str| {
            let log = log.clone();
            move |_: &mut Context| log.lock().unwrap().push(entry)
        };

        let mut router = Router::new();
        let mut api = router.group("/api");
        api.with(record("api")).unwrap();
        let mut v1 = api.group("/v1");
        assert_eq!(v1.base_path(), "/api/v1");
        v1.with(record("v1")).unwrap();
        v1.get("/users/:id", record("handler")).unwrap();

        router.dispatch(Request::new(Method::GET, "/api/v1/users/1"));
        assert_eq!(*log.lock().unwrap(), vec!["api", "v1", "handler"]);
    }

    #[test]
    fn test_group_middleware_snapshot_is_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let record = |entry: &'static str| {
            let log = log.clone();
            move |_: &mut Context| log.lock().unwrap().push(entry)
        };

        let mut router = Router::new();
        let mut api = router.group("/api");
        api.get("/before", record("before")).unwrap();
        api.with(record("mw")).unwrap();
        api.get("/after", record("after")).unwrap();

        router.dispatch(Request::new(Method::GET, "/api/before"));
        assert_eq!(*log.lock().unwrap(), vec!["before"]);

        log.lock().unwrap().clear();
        router.dispatch(Request::new(Method::GET, "/api/after"));
        assert_eq!(*log.lock().unwrap(), vec!["mw", "after"]);
    }

    #[test]
    fn test_group_conflicts_surface_at_registration() {
        let mut router = Router::new();
        router.get("/api/users/:id", |_: &mut Context| {}).unwrap();

        let mut api = router.group("/api");
        let err = api.get("/users/:name", |_: &mut Context| {}).unwrap_err();
        assert!(matches!(err, RegisterError::Conflict(_)));
    }
}
