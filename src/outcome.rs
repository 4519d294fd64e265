//! Three-valued terminal outcome of a promise.
//!
//! A settled promise is in exactly one of three terminal states:
//!
//! - `Fulfilled(T)`: success with a value
//! - `Rejected(Rejection)`: failure with an error
//! - `Cancelled`: the operation was abandoned before completion
//!
//! Cancellation is deliberately not an error: fulfillment and rejection
//! callbacks are suppressed for a cancelled promise while finally callbacks
//! still run. [`Outcome`] is the snapshot type returned by
//! [`Promise::try_outcome`](crate::Promise::try_outcome) and produced by
//! awaiting a promise.

use core::fmt;

use crate::error::Rejection;

/// A snapshot of a promise's terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The promise fulfilled with a value.
    Fulfilled(T),
    /// The promise rejected with an error.
    Rejected(Rejection),
    /// The promise was cancelled before settling.
    Cancelled,
}

impl<T> Outcome<T> {
    /// Returns true if this outcome is `Fulfilled`.
    #[must_use]
    pub const fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled(_))
    }

    /// Returns true if this outcome is `Rejected`.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Returns true if this outcome is `Cancelled`.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the fulfillment value, discarding the other variants.
    pub fn fulfilled(self) -> Option<T> {
        match self {
            Self::Fulfilled(value) => Some(value),
            _ => None,
        }
    }

    /// Maps the fulfillment value with the provided function.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Fulfilled(value) => Outcome::Fulfilled(f(value)),
            Self::Rejected(error) => Outcome::Rejected(error),
            Self::Cancelled => Outcome::Cancelled,
        }
    }

    /// Converts this outcome into a standard `Result`.
    ///
    /// Cancellation is mapped to the canonical
    /// [`Rejection::cancelled`] error. Useful at the boundary with code that
    /// only understands `Result`.
    ///
    /// # Errors
    ///
    /// Returns the rejection for `Rejected`, and `Rejection::cancelled()` for
    /// `Cancelled`.
    pub fn into_result(self) -> Result<T, Rejection> {
        match self {
            Self::Fulfilled(value) => Ok(value),
            Self::Rejected(error) => Err(error),
            Self::Cancelled => Err(Rejection::cancelled()),
        }
    }

    /// Returns the fulfillment value or panics.
    ///
    /// # Panics
    ///
    /// Panics if the outcome is not `Fulfilled`.
    #[track_caller]
    pub fn unwrap(self) -> T {
        match self {
            Self::Fulfilled(value) => value,
            Self::Rejected(error) => {
                panic!("called `Outcome::unwrap()` on a `Rejected` value: {error}")
            }
            Self::Cancelled => panic!("called `Outcome::unwrap()` on a `Cancelled` value"),
        }
    }
}

impl<T> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fulfilled(_) => write!(f, "fulfilled"),
            Self::Rejected(error) => write!(f, "rejected: {error}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
