//! Structured access logging.

use std::time::Instant;

use tracing::info;

use crate::context::Context;
use crate::handler::Handler;

/// Middleware emitting one structured `info` event per request, once
/// the downstream chain has finished or aborted.
///
/// The event carries the method, path, matched route pattern, response
/// status, latency, written body size, peer address and the number of
/// recorded context errors. Reporting goes through [`tracing`]; wire a
/// subscriber in the embedding application to direct the output.
pub fn access_log() -> impl Handler {
    |cx: &mut Context| {
        let started = Instant::now();

        cx.advance();

        let status = cx
            .status()
            .unwrap_or(http::StatusCode::OK)
            .as_u16();
        info!(
            method = %cx.request().method(),
            path = cx.request().path(),
            route = cx.route().unwrap_or(""),
            peer = ?cx.request().peer_addr(),
            status,
            latency = ?started.elapsed(),
            bytes = cx.bytes_written(),
            errors = cx.errors().len(),
            "request served"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::handler::{DynHandler, HandlerChain};
    use crate::request::Request;

    #[test]
    fn test_access_log_is_transparent_to_the_chain() {
        let mut cx = Context::fresh();
        cx.reset(Request::default());
        cx.install_chain(HandlerChain::from_parts(
            &[],
            vec![
                Arc::new(access_log()) as DynHandler,
                Arc::new(|cx: &mut Context| {
                    cx.text(http::StatusCode::OK, "logged");
                }),
            ],
        ));
        cx.advance();

        assert_eq!(cx.status(), Some(http::StatusCode::OK));
        assert_eq!(cx.bytes_written(), 6);
    }
}
