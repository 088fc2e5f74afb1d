//! Middleware built on the uniform [`Handler`] contract.
//!
//! Nothing in this module is special-cased by the router: every
//! middleware here is an ordinary handler that wraps, gates or
//! short-circuits the rest of its chain through
//! [`Context::advance`] and [`Context::abort`].
//!
//! [`Handler`]: crate::Handler
//! [`Context::advance`]: crate::Context::advance
//! [`Context::abort`]: crate::Context::abort

pub mod auth;
pub mod limit;
pub mod logger;
pub mod recovery;

pub use auth::{AUTH_USER, basic_auth};
pub use limit::{ConcurrencyGate, GatePermit, max_concurrent};
pub use logger::access_log;
pub use recovery::{HandlerPanic, recover};
