//! The uniform handler contract and the chains built from it.
//!
//! A [`Handler`] receives the request's [`Context`] and may read
//! parameters, read/write the context store, write response data, record
//! non-fatal errors, and steer chain execution via [`Context::advance`]
//! and [`Context::abort`]. Middleware and terminal route handlers share
//! this one contract.

use std::fmt;
use std::sync::Arc;

use crate::context::Context;

/// A request handler or middleware.
///
/// Implemented for any `Fn(&mut Context)` closure or function. A handler
/// that does not call [`Context::advance`] simply lets the driver loop
/// continue with the next handler in the chain once it returns; calling
/// `advance` explicitly instead runs the remaining chain *inside* the
/// handler, allowing pre- and post-processing around downstream work.
pub trait Handler: Send + Sync + 'static {
    /// Handle the request driven through the given [`Context`].
    fn handle(&self, cx: &mut Context);
}

impl<F> Handler for F
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    fn handle(&self, cx: &mut Context) {
        self(cx)
    }
}

/// A shared, type-erased [`Handler`].
pub type DynHandler = Arc<dyn Handler>;

/// An ordered sequence of handlers bound to a route.
///
/// Immutable once attached; shared by reference across all requests
/// matching the route, never mutated per request.
#[derive(Clone)]
pub struct HandlerChain {
    handlers: Arc<[DynHandler]>,
}

impl HandlerChain {
    pub(crate) fn empty() -> Self {
        Self {
            handlers: Arc::from(Vec::new()),
        }
    }

    /// Build a chain by copying `prefix` and appending `tail`.
    ///
    /// Length guarding happens at the registration surface, where the
    /// offending pattern is known.
    pub(crate) fn from_parts(prefix: &[DynHandler], tail: Vec<DynHandler>) -> Self {
        let mut handlers = Vec::with_capacity(prefix.len() + tail.len());
        handlers.extend(prefix.iter().cloned());
        handlers.extend(tail);
        Self {
            handlers: Arc::from(handlers),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// The handler addressed by the given cursor, if the cursor is a
    /// valid index. Negative (ready) and sentinel (aborted) cursors
    /// address nothing.
    pub(crate) fn handler_at(&self, cursor: i8) -> Option<DynHandler> {
        let index = usize::try_from(cursor).ok()?;
        self.handlers.get(index).cloned()
    }
}

impl Default for HandlerChain {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain")
            .field("len", &self.len())
            .finish()
    }
}

/// Builder for registering more than one handler on a single route,
/// middleware first:
///
/// ```
/// use senda::{Chain, Context, Router};
/// use senda::http::StatusCode;
///
/// fn throttle(cx: &mut Context) { /* ... */ }
///
/// let mut router = Router::new();
/// router.get(
///     "/expensive",
///     Chain::new().then(throttle).then(|cx: &mut Context| {
///         cx.text(StatusCode::OK, "done");
///     }),
/// )?;
/// # Ok::<_, senda::RegisterError>(())
/// ```
#[derive(Default)]
pub struct Chain {
    handlers: Vec<DynHandler>,
}

impl Chain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler to the chain.
    #[must_use]
    pub fn then(mut self, handler: impl Handler) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("len", &self.len()).finish()
    }
}

impl FromIterator<DynHandler> for Chain {
    fn from_iter<I: IntoIterator<Item = DynHandler>>(iter: I) -> Self {
        Self {
            handlers: iter.into_iter().collect(),
        }
    }
}

/// Conversion accepted by the route registration surface: a single
/// [`Handler`] or a [`Chain`] of them.
pub trait IntoHandlerChain {
    /// Convert into the ordered handler list to register.
    fn into_handlers(self) -> Vec<DynHandler>;
}

impl<H: Handler> IntoHandlerChain for H {
    fn into_handlers(self) -> Vec<DynHandler> {
        vec![Arc::new(self) as DynHandler]
    }
}

impl IntoHandlerChain for Chain {
    fn into_handlers(self) -> Vec<DynHandler> {
        self.handlers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_cursor_addressing() {
        let chain =
            HandlerChain::from_parts(&[], vec![Arc::new(|_: &mut Context| {}) as DynHandler]);
        assert_eq!(chain.len(), 1);
        assert!(chain.handler_at(-1).is_none());
        assert!(chain.handler_at(0).is_some());
        assert!(chain.handler_at(1).is_none());
        assert!(chain.handler_at(i8::MAX >> 1).is_none());
    }

    #[test]
    fn test_into_handler_chain_shapes() {
        fn noop(_: &mut Context) {}

        assert_eq!(noop.into_handlers().len(), 1);
        assert_eq!(Chain::new().then(noop).then(noop).into_handlers().len(), 2);
        assert!(Chain::new().is_empty());
    }

    #[test]
    fn test_chain_collects_erased_handlers() {
        fn noop(_: &mut Context) {}

        let chain: Chain = (0..3).map(|_| Arc::new(noop) as DynHandler).collect();
        assert_eq!(chain.len(), 3);
        assert!(!chain.is_empty());
    }
}
