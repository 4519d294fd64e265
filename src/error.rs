//! The rejection payload carried by a failed promise.
//!
//! A promise rejects with a [`Rejection`]: an opaque, caller-defined error
//! value (domain + code + message + optional nested cause). The core passes
//! rejections through unmodified; the only rejections it manufactures itself
//! are [`Rejection::from_panic`] (a fault caught inside a chain callback) and
//! [`Rejection::cancelled`] (a cancelled input occupying an error position in
//! a settle-all combinator).

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

/// Domain used for rejections manufactured from a caught panic.
pub const PANIC_DOMAIN: &str = "covenant.panic";

/// Domain used for the canonical cancellation rejection.
pub const CANCELLED_DOMAIN: &str = "covenant.cancelled";

/// Domain used for rejections manufactured by the core itself.
pub const CORE_DOMAIN: &str = "covenant";

/// The error value carried by a rejected promise.
///
/// Rejections are cheap to clone; the nested cause is shared behind an `Arc`.
/// Equality compares domain, code, message, and cause, which makes test
/// assertions on propagated errors straightforward.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{domain} ({code}): {message}")]
pub struct Rejection {
    domain: String,
    code: i64,
    message: String,
    #[source]
    cause: Option<Arc<Rejection>>,
}

impl Rejection {
    /// Creates a rejection with the given domain, code, and message.
    #[must_use]
    pub fn new(domain: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// Attaches a nested cause to this rejection.
    #[must_use]
    pub fn with_cause(mut self, cause: Rejection) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// The canonical rejection standing in for a cancelled operation.
    ///
    /// Cancellation is a terminal state of its own, not an error; this value
    /// exists only for the places that must fit a cancelled outcome into an
    /// error-shaped slot (`join_promises` positions, `Outcome::into_result`).
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(CANCELLED_DOMAIN, 0, "operation was cancelled")
    }

    /// Converts a caught panic payload into a rejection.
    ///
    /// Used by the chaining machinery: a fault inside a `then` transform
    /// becomes the derived promise's rejection instead of unwinding into the
    /// settling thread.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload.downcast_ref::<&str>().map_or_else(
            || {
                payload
                    .downcast_ref::<String>()
                    .map_or_else(|| "panic with non-string payload".to_owned(), Clone::clone)
            },
            |s| (*s).to_owned(),
        );
        Self::new(PANIC_DOMAIN, 0, message)
    }

    /// Returns the error domain.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the error code.
    #[must_use]
    pub const fn code(&self) -> i64 {
        self.code
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the nested cause, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&Rejection> {
        self.cause.as_deref()
    }

    /// Returns true if this is the canonical cancellation rejection.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.domain == CANCELLED_DOMAIN
    }
}
