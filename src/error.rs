//! Error types for route registration and request execution.
//!
//! Registration errors ([`RegisterError`], [`RouteConflict`]) are fatal to
//! the caller: the router refuses to register an ambiguous route rather
//! than picking a resolution order, and startup is expected to abort on
//! them. Request-time errors ([`StatusRejected`], [`MissingKey`]) are
//! contained within the [`Context`] of the request that produced them.
//!
//! [`Context`]: crate::Context

use std::error::Error;
use std::fmt;

use http::StatusCode;

/// Alias for a type-erased error type.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// A conflict between a route being registered and the routes
/// already present in the tree of the same method.
///
/// Conflicts are detected at registration time, never at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteConflict {
    /// The exact pattern was already registered.
    Duplicate {
        /// The offending new pattern.
        pattern: String,
        /// The pattern already owning the node.
        existing: String,
    },
    /// A wild segment collides with a differently-named wild child
    /// at the same position (`:a` vs `:b`, or `:a` vs `*b`).
    WildcardMismatch {
        /// The offending new pattern.
        pattern: String,
        /// The wild token of the new pattern (`:name` or `*name`).
        segment: String,
        /// The wild token already present at this position.
        existing_segment: String,
        /// Canonical path of the conflicting node.
        prefix: String,
    },
    /// A catch-all segment cannot share its parent with any sibling.
    CatchAllSiblings {
        /// The offending new pattern.
        pattern: String,
        /// Canonical path of the parent node that already has children.
        prefix: String,
    },
    /// A catch-all segment must be the final segment of its pattern.
    CatchAllNotLast {
        /// The offending new pattern.
        pattern: String,
    },
}

impl RouteConflict {
    /// The pattern whose registration was rejected.
    #[must_use]
    pub fn pattern(&self) -> &str {
        match self {
            Self::Duplicate { pattern, .. }
            | Self::WildcardMismatch { pattern, .. }
            | Self::CatchAllSiblings { pattern, .. }
            | Self::CatchAllNotLast { pattern } => pattern,
        }
    }

    /// The pre-existing pattern or node prefix the new pattern collided
    /// with, if the conflict involves one.
    #[must_use]
    pub fn existing(&self) -> Option<&str> {
        match self {
            Self::Duplicate { existing, .. } => Some(existing),
            Self::WildcardMismatch { prefix, .. } | Self::CatchAllSiblings { prefix, .. } => {
                Some(prefix)
            }
            Self::CatchAllNotLast { .. } => None,
        }
    }
}

impl fmt::Display for RouteConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate { pattern, existing } => {
                write!(f, "new route {pattern} conflicts with existing route {existing}")
            }
            Self::WildcardMismatch {
                pattern,
                segment,
                existing_segment,
                prefix,
            } => write!(
                f,
                "{segment} in new route {pattern} conflicts with existing wildcard {existing_segment} in prefix {prefix}"
            ),
            Self::CatchAllSiblings { pattern, prefix } => write!(
                f,
                "catch-all in new route {pattern} conflicts with existing children of {prefix}"
            ),
            Self::CatchAllNotLast { pattern } => {
                write!(f, "catch-all is only allowed as the final segment of route {pattern}")
            }
        }
    }
}

impl Error for RouteConflict {}

/// Error returned by the route registration surface of
/// [`Router`] and [`RouteGroup`].
///
/// [`Router`]: crate::Router
/// [`RouteGroup`]: crate::RouteGroup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    /// The pattern conflicts with an already registered route.
    Conflict(RouteConflict),
    /// The combined middleware + handler chain exceeds the length
    /// that the execution cursor can address.
    TooManyHandlers {
        /// The pattern the chain was being registered for.
        pattern: String,
        /// The combined chain length that was rejected.
        count: usize,
    },
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict(conflict) => conflict.fmt(f),
            Self::TooManyHandlers { pattern, count } => {
                write!(f, "too many handlers ({count}) in chain for route {pattern}")
            }
        }
    }
}

impl Error for RegisterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Conflict(conflict) => Some(conflict),
            Self::TooManyHandlers { .. } => None,
        }
    }
}

impl From<RouteConflict> for RegisterError {
    fn from(conflict: RouteConflict) -> Self {
        Self::Conflict(conflict)
    }
}

/// Error returned by [`Context::require`] when no value is stored
/// under the requested key.
///
/// Absence of a required key is a contract violation by the handler
/// author; the caller decides whether to treat it as fatal.
///
/// [`Context::require`]: crate::Context::require
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingKey {
    name: &'static str,
}

impl MissingKey {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self { name }
    }

    /// Name of the key that was absent.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for MissingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no value stored in context for key {:?}", self.name)
    }
}

impl Error for MissingKey {}

/// Recorded as a [`Context`] error when a handler tries to overwrite an
/// already written response status with a different code.
///
/// The original status is kept; re-setting the same code is tolerated.
///
/// [`Context`]: crate::Context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRejected {
    /// The status that was already written.
    pub current: StatusCode,
    /// The status whose write was rejected.
    pub rejected: StatusCode,
}

impl fmt::Display for StatusRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status already written: rejected override of {} with {}",
            self.current, self.rejected
        )
    }
}

impl Error for StatusRejected {}
