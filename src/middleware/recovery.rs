//! Panic containment for handler chains.

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use http::StatusCode;
use tracing::error;

use crate::context::Context;
use crate::handler::Handler;

/// Recorded as a context error when a downstream handler panicked.
#[derive(Debug)]
pub struct HandlerPanic {
    message: String,
}

impl HandlerPanic {
    /// The panic payload, rendered as text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HandlerPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler panicked: {}", self.message)
    }
}

impl Error for HandlerPanic {}

/// Middleware that contains panics of the downstream chain.
///
/// A caught panic is logged, recorded on the context as a
/// [`HandlerPanic`] error, and answered with status 500 (unless a
/// status was already written, in which case the original status is
/// kept and the rejected override is recorded too). The panic never
/// escapes into the serving loop.
pub fn recover() -> impl Handler {
    |cx: &mut Context| {
        let outcome = catch_unwind(AssertUnwindSafe(|| cx.advance()));
        if let Err(payload) = outcome {
            let message = panic_message(payload);
            error!(
                method = %cx.request().method(),
                path = cx.request().path(),
                panic = %message,
                "handler panicked"
            );
            cx.record_error(HandlerPanic { message });
            cx.abort_with_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_owned(),
            Err(_) => "opaque panic payload".to_owned(),
        },
    }
}
