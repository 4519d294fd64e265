//! The subscription record builder.
//!
//! The original consumer entry point takes four optional callbacks and an
//! optional delivery target; [`Observer`] is that bundle as a builder, so a
//! full subscription reads:
//!
//! ```
//! use covenant::{Observer, Promise};
//!
//! let promise = Promise::fulfilled(3);
//! promise.done_with(
//!     Observer::new()
//!         .on_fulfilled(|n| println!("got {n}"))
//!         .on_rejected(|error| eprintln!("failed: {error}"))
//!         .on_finally(|| println!("settled")),
//! );
//! ```
//!
//! Every omitted callback defaults to a no-op; an omitted context means
//! synchronous delivery on the settling (or, for late subscriptions, the
//! subscribing) thread.

use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::error::Rejection;
use crate::promise::state::Subscriber;

/// A bundle of settlement callbacks plus an optional delivery context.
///
/// Consumed by [`Promise::done_with`](crate::Promise::done_with).
#[must_use = "an observer does nothing until passed to `done_with`"]
pub struct Observer<T> {
    pub(crate) subscriber: Subscriber<T>,
}

impl<T> Observer<T> {
    /// Creates an empty observer; all callbacks default to no-ops.
    pub fn new() -> Self {
        Self {
            subscriber: Subscriber::empty(),
        }
    }

    /// Sets the fulfillment callback.
    pub fn on_fulfilled(mut self, callback: impl FnOnce(T) + Send + 'static) -> Self {
        self.subscriber.on_fulfilled = Some(Box::new(callback));
        self
    }

    /// Sets the secondary fulfillment callback.
    ///
    /// Runs in addition to (and after) `on_fulfilled`, for side-channel
    /// observation such as logging. It cannot alter settlement and carries no
    /// return value.
    pub fn on_observed(mut self, callback: impl FnOnce(T) + Send + 'static) -> Self {
        self.subscriber.on_observed = Some(Box::new(callback));
        self
    }

    /// Sets the rejection callback.
    pub fn on_rejected(mut self, callback: impl FnOnce(Rejection) + Send + 'static) -> Self {
        self.subscriber.on_rejected = Some(Box::new(callback));
        self
    }

    /// Sets the finally callback, which runs on every terminal state,
    /// including cancellation.
    pub fn on_finally(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.subscriber.on_finally = Some(Box::new(callback));
        self
    }

    /// Targets delivery of this subscription's callbacks at a context.
    pub fn on_context(mut self, context: Arc<dyn ExecutionContext>) -> Self {
        self.subscriber.context = Some(context);
        self
    }
}

impl<T> Default for Observer<T> {
    fn default() -> Self {
        Self::new()
    }
}
