//! Per-request execution state and the chain driver.
//!
//! A [`Context`] is handed to every [`Handler`] of the resolved chain.
//! It carries the request, the extracted route parameters, the response
//! being accumulated, a list of non-fatal errors, and the cursor that
//! drives chain execution.
//!
//! # Flow control
//!
//! Handlers run strictly in registration order. A handler that returns
//! without touching the cursor lets the driver continue with the next
//! handler; calling [`Context::advance`] runs the *remaining* chain
//! inside the calling handler, so code placed after the call observes
//! the downstream handlers' effects (timing, logging, recovery);
//! [`Context::abort`] prevents all pending handlers from running.
//!
//! [`Handler`]: crate::Handler

use std::fmt;
use std::mem;
use std::sync::Arc;

use bytes::BytesMut;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;

use crate::error::{BoxError, MissingKey, StatusRejected};
use crate::handler::HandlerChain;
use crate::path::Params;
use crate::request::Request;
use crate::response::Response;
use crate::tree::RouteMatch;

pub(crate) mod pool;
pub(crate) mod store;

pub use store::Key;

/// Cursor value of a context whose chain has not started yet.
const READY_CURSOR: i8 = -1;

/// Cursor sentinel: larger than any addressable chain index, so the
/// driver loop's bound check fails and no further handler runs.
pub(crate) const ABORT_CURSOR: i8 = i8::MAX >> 1;

/// Upper bound (exclusive) on combined chain length, enforced at
/// registration time. Keeps every real index below [`ABORT_CURSOR`]
/// and bounds the recursion depth of [`Context::advance`].
pub(crate) const MAX_CHAIN_LEN: usize = ABORT_CURSOR as usize;

const TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
const APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json; charset=utf-8");

/// The mutable state of one request being driven through its chain.
///
/// Contexts are pooled and reused; user code must never retain one past
/// the end of the request it serves.
pub struct Context {
    request: Request,

    chain: HandlerChain,
    cursor: i8,

    params: Params,
    /// The registered pattern that matched, e.g. `/users/:id`.
    route: Option<Arc<str>>,

    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
    body_size: usize,

    errors: Vec<BoxError>,

    store: store::Store,
}

impl Context {
    pub(crate) fn fresh() -> Box<Self> {
        Box::new(Self {
            request: Request::default(),
            chain: HandlerChain::empty(),
            cursor: READY_CURSOR,
            params: Params::default(),
            route: None,
            status: None,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            body_size: 0,
            errors: Vec::new(),
            store: store::Store::new(),
        })
    }

    /// The single reset routine run before a pooled context serves a
    /// request. Every mutable field is cleared or truncated here; the
    /// store is dropped back to its unallocated state rather than
    /// cleared, so no reference survives into the next request.
    pub(crate) fn reset(&mut self, request: Request) {
        self.request = request;
        self.chain = HandlerChain::empty();
        self.cursor = READY_CURSOR;
        self.params.clear();
        self.route = None;
        self.status = None;
        self.headers.clear();
        self.body.clear();
        self.body_size = 0;
        self.errors.clear();
        self.store.reset();
    }

    pub(crate) fn install_route(&mut self, matched: RouteMatch) {
        self.chain = matched.chain;
        self.params = matched.params;
        self.route = Some(matched.pattern);
    }

    pub(crate) fn install_chain(&mut self, chain: HandlerChain) {
        self.chain = chain;
    }

    /// Assemble the accumulated response, leaving the context ready to
    /// be returned to its pool.
    pub(crate) fn take_response(&mut self) -> Response {
        Response::new(
            self.status.unwrap_or(StatusCode::OK),
            mem::take(&mut self.headers),
            self.body.split().freeze(),
        )
    }

    /* request data */

    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The value of the route parameter bound under `name`.
    ///
    /// Shortcut for `self.params().get(name)`.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The registered pattern the request matched, if any.
    #[must_use]
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /* flow control */

    /// Execute the pending handlers of the chain inside the calling
    /// handler.
    ///
    /// Code before this call runs before any downstream handler; code
    /// after it runs once the entire downstream chain has finished or
    /// aborted. Recursion depth is bounded by the chain length, which
    /// registration keeps below [`i8::MAX`]` >> 1`.
    pub fn advance(&mut self) {
        self.cursor = self.cursor.saturating_add(1);
        while let Some(handler) = self.chain.handler_at(self.cursor) {
            handler.handle(self);
            self.cursor = self.cursor.saturating_add(1);
        }
    }

    /// Prevent all pending handlers from being called.
    ///
    /// Does not stop the currently executing handler; callers that want
    /// no further side effects should return promptly after aborting.
    /// Idempotent, safe to call at any time.
    pub fn abort(&mut self) {
        self.cursor = ABORT_CURSOR;
    }

    /// [`abort`][Self::abort], after writing the given status code.
    pub fn abort_with_status(&mut self, code: StatusCode) {
        self.set_status(code);
        self.abort();
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.cursor >= ABORT_CURSOR
    }

    /* response */

    /// Write the response status code.
    ///
    /// The status is write-once: a later call with a *different* code is
    /// rejected and recorded as a context error, keeping the original;
    /// re-setting the same code is tolerated.
    pub fn set_status(&mut self, code: StatusCode) {
        if let Some(current) = self.status {
            if current != code {
                self.record_error(StatusRejected {
                    current,
                    rejected: code,
                });
            }
            return;
        }
        self.status = Some(code);
    }

    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Shortcut for `set_status(StatusCode::OK)`.
    pub fn ok(&mut self) -> &mut Self {
        self.set_status(StatusCode::OK);
        self
    }

    /// Shortcut for `set_status(StatusCode::NOT_FOUND)`.
    pub fn not_found(&mut self) -> &mut Self {
        self.set_status(StatusCode::NOT_FOUND);
        self
    }

    /// Shortcut for `set_status(StatusCode::FORBIDDEN)`.
    pub fn forbidden(&mut self) -> &mut Self {
        self.set_status(StatusCode::FORBIDDEN);
        self
    }

    /// Set a response header, replacing any previous value.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Remove a response header.
    pub fn remove_header(&mut self, name: HeaderName) -> Option<HeaderValue> {
        self.headers.remove(name)
    }

    /// Append raw bytes to the response body, returning the number of
    /// bytes written.
    pub fn write(&mut self, data: &[u8]) -> usize {
        self.body.extend_from_slice(data);
        self.body_size += data.len();
        data.len()
    }

    /// Write `body` as `text/plain` with the given status code.
    pub fn text(&mut self, code: StatusCode, body: impl AsRef<str>) -> &mut Self {
        self.set_status(code);
        self.with_text(body)
    }

    /// Write `body` as `text/plain`, leaving the status untouched.
    pub fn with_text(&mut self, body: impl AsRef<str>) -> &mut Self {
        self.content_type_if_absent(TEXT_PLAIN);
        self.write(body.as_ref().as_bytes());
        self
    }

    /// Serialize `value` as JSON into the response body with the given
    /// status code.
    ///
    /// A serialization failure is recorded as a context error and leaves
    /// status and body untouched.
    pub fn json<T>(&mut self, code: StatusCode, value: &T) -> &mut Self
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_vec(value) {
            Ok(data) => {
                self.set_status(code);
                self.content_type_if_absent(APPLICATION_JSON);
                self.write(&data);
            }
            Err(err) => self.record_error(err),
        }
        self
    }

    /// Total number of body bytes written so far.
    #[must_use]
    pub fn bytes_written(&self) -> usize {
        self.body_size
    }

    fn content_type_if_absent(&mut self, value: HeaderValue) {
        self.headers.entry(CONTENT_TYPE).or_insert(value);
    }

    /* error management */

    /// Attach a non-fatal error to this context.
    ///
    /// Errors accumulate over the lifetime of the request and can be
    /// collected by middleware (e.g. the access log) once the chain has
    /// finished.
    pub fn record_error(&mut self, err: impl Into<BoxError>) {
        self.errors.push(err.into());
    }

    /// The errors recorded so far, in insertion order.
    #[must_use]
    pub fn errors(&self) -> &[BoxError] {
        &self.errors
    }

    /* context store */

    /// Store `value` under `key`, returning the previous value if the
    /// slot was occupied. Allocates the store on first use.
    ///
    /// Takes `&self`: the store is safe to use from multiple threads
    /// sharing one context, e.g. when a handler fans out work:
    ///
    /// ```
    /// use senda::{Context, Key};
    ///
    /// const LEFT: Key<u64> = Key::new("left");
    /// const RIGHT: Key<u64> = Key::new("right");
    ///
    /// fn handler(cx: &mut Context) {
    ///     std::thread::scope(|scope| {
    ///         let cx = &*cx;
    ///         scope.spawn(move || cx.insert(LEFT, 1));
    ///         scope.spawn(move || cx.insert(RIGHT, 2));
    ///     });
    /// }
    /// ```
    pub fn insert<T: Send + Sync + 'static>(
        &self,
        key: Key<T>,
        value: T,
    ) -> Option<Arc<T>> {
        self.store.insert(key, value)
    }

    /// The value stored under `key`, if any.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self, key: Key<T>) -> Option<Arc<T>> {
        self.store.get(key)
    }

    /// The value stored under `key`, or a [`MissingKey`] error.
    ///
    /// Absence signals a contract violation between handlers; the caller
    /// decides whether that is fatal.
    pub fn require<T: Send + Sync + 'static>(
        &self,
        key: Key<T>,
    ) -> Result<Arc<T>, MissingKey> {
        self.store.require(key)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", self.request.method())
            .field("path", &self.request.path())
            .field("route", &self.route)
            .field("cursor", &self.cursor)
            .field("chain", &self.chain)
            .field("status", &self.status)
            .field("errors", &self.errors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::handler::DynHandler;

    fn driven(handlers: Vec<DynHandler>) -> Box<Context> {
        let mut cx = Context::fresh();
        cx.reset(Request::default());
        cx.install_chain(HandlerChain::from_parts(&[], handlers));
        cx.advance();
        cx
    }

    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, entry: &'static str) -> DynHandler {
        let log = log.clone();
        Arc::new(move |_: &mut Context| log.lock().unwrap().push(entry))
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        driven(vec![
            recording(&log, "first"),
            recording(&log, "second"),
            recording(&log, "third"),
        ]);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_advance_wraps_downstream_handlers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let wrapper: DynHandler = {
            let log = log.clone();
            Arc::new(move |cx: &mut Context| {
                log.lock().unwrap().push("pre");
                cx.advance();
                log.lock().unwrap().push("post");
            })
        };
        driven(vec![wrapper, recording(&log, "inner")]);
        assert_eq!(*log.lock().unwrap(), vec!["pre", "inner", "post"]);
    }

    #[test]
    fn test_abort_stops_pending_handlers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let aborting: DynHandler = {
            let log = log.clone();
            Arc::new(move |cx: &mut Context| {
                log.lock().unwrap().push("abort");
                cx.abort();
            })
        };
        let cx = driven(vec![
            recording(&log, "before"),
            aborting,
            recording(&log, "never"),
        ]);

        assert_eq!(*log.lock().unwrap(), vec!["before", "abort"]);
        assert!(cx.is_aborted());
    }

    #[test]
    fn test_abort_is_idempotent() {
        let mut cx = Context::fresh();
        cx.reset(Request::default());
        cx.abort();
        cx.abort();
        assert!(cx.is_aborted());
    }

    #[test]
    fn test_abort_observed_through_wrapping_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let wrapper: DynHandler = {
            let log = log.clone();
            Arc::new(move |cx: &mut Context| {
                cx.advance();
                let entry = if cx.is_aborted() { "aborted" } else { "finished" };
                log.lock().unwrap().push(entry);
            })
        };
        let aborting: DynHandler = Arc::new(|cx: &mut Context| cx.abort());
        driven(vec![wrapper, aborting, recording(&log, "never")]);
        assert_eq!(*log.lock().unwrap(), vec!["aborted"]);
    }

    #[test]
    fn test_status_is_write_once_with_detection() {
        let mut cx = Context::fresh();
        cx.reset(Request::default());

        cx.set_status(StatusCode::OK);
        cx.set_status(StatusCode::OK);
        assert!(cx.errors().is_empty());

        cx.set_status(StatusCode::NOT_FOUND);
        assert_eq!(cx.status(), Some(StatusCode::OK));
        assert_eq!(cx.errors().len(), 1);
        let err: &dyn std::error::Error = cx.errors()[0].as_ref();
        assert!(err.is::<StatusRejected>());
    }

    #[test]
    fn test_text_sets_content_type_once() {
        let mut cx = Context::fresh();
        cx.reset(Request::default());
        cx.set_header(CONTENT_TYPE, HeaderValue::from_static("application/xml"));
        cx.text(StatusCode::OK, "hello");

        let response = cx.take_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "application/xml");
        assert_eq!(&response.body()[..], b"hello");
    }

    #[test]
    fn test_json_body() {
        #[derive(serde::Serialize)]
        struct Greeting {
            hello: &'static str,
        }

        let mut cx = Context::fresh();
        cx.reset(Request::default());
        cx.json(StatusCode::CREATED, &Greeting { hello: "world" });
        assert_eq!(cx.bytes_written(), cx.take_response().body().len());

        let mut cx = Context::fresh();
        cx.reset(Request::default());
        cx.json(StatusCode::OK, &Greeting { hello: "world" });
        let response = cx.take_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json; charset=utf-8"
        );
        assert_eq!(&response.body()[..], br#"{"hello":"world"}"#);
    }

    #[test]
    fn test_json_serialization_failure_is_recorded() {
        struct Broken;

        impl Serialize for Broken {
            fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("broken"))
            }
        }

        let mut cx = Context::fresh();
        cx.reset(Request::default());
        cx.json(StatusCode::OK, &Broken);

        assert_eq!(cx.status(), None);
        assert_eq!(cx.errors().len(), 1);
        assert_eq!(cx.bytes_written(), 0);
    }

    #[test]
    fn test_reset_clears_every_mutable_field() {
        const MARKER: Key<u64> = Key::new("marker");

        let mut cx = Context::fresh();
        cx.reset(Request::default());
        cx.install_route(RouteMatch {
            chain: HandlerChain::from_parts(
                &[],
                vec![Arc::new(|_: &mut Context| {}) as DynHandler],
            ),
            params: {
                let mut params = Params::default();
                params.push(crate::path::Param::new("id", "1"));
                params
            },
            pattern: Arc::from("/users/:id"),
        });
        cx.text(StatusCode::OK, "body");
        cx.record_error(MissingKey::new("probe"));
        cx.insert(MARKER, 7);
        cx.advance();

        cx.reset(Request::default());

        assert!(cx.params().is_empty());
        assert!(cx.route().is_none());
        assert_eq!(cx.status(), None);
        assert!(cx.errors().is_empty());
        assert_eq!(cx.bytes_written(), 0);
        assert!(cx.get(MARKER).is_none());
        assert!(!cx.is_aborted());
        assert!(cx.chain.is_empty());
        let response = cx.take_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_empty());
        assert!(response.headers().is_empty());
    }
}
