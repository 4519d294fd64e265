//! The promise state machine and its capability views.
//!
//! One underlying settle-once cell backs three handle types:
//!
//! - [`Promise<T>`]: the full interface; producers settle it, consumers
//!   subscribe to it, and it can be chained and combined.
//! - [`CancelToken`]: a narrow, type-erased view granting only the right to
//!   request cancellation and to hear about it.
//! - [`Completion<T>`]: the privileged settle capability, for producers that
//!   want to hand out settle rights without subscribe rights.
//!
//! Cloning any handle clones the reference, never the state machine; there is
//! exactly one outcome no matter how many handles observe it.

mod chain;
mod observer;
pub(crate) mod state;

pub use chain::Chained;
pub use observer::Observer;

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use crate::context::ExecutionContext;
use crate::error::{Rejection, CORE_DOMAIN};
use crate::outcome::Outcome;
use crate::promise::state::{CancelCell, Shared, State};

/// A boxed fulfill capability handed to a resolver callback.
pub type FulfillFn<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// A boxed reject capability handed to a resolver callback.
pub type RejectFn = Box<dyn FnOnce(Rejection) + Send + 'static>;

/// A single-assignment container for the eventual outcome of an operation.
///
/// A promise starts `Pending` and transitions exactly once to `Fulfilled`,
/// `Rejected`, or `Cancelled`. Any number of consumers may subscribe before
/// or after that transition; late subscribers observe the identical payload.
///
/// The `Clone + Send` bound on the value is how one settled value reaches N
/// consumers: each delivery clones it.
pub struct Promise<T> {
    pub(crate) shared: Arc<Shared<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise").finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Creates a pending promise.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new(State::Pending)),
        }
    }

    /// Creates a promise already fulfilled with `value`; there is no pending
    /// window, so any subscription is delivered immediately.
    #[must_use]
    pub fn fulfilled(value: T) -> Self {
        Self {
            shared: Arc::new(Shared::new(State::Fulfilled(value))),
        }
    }

    /// Creates a promise already rejected with `error`.
    #[must_use]
    pub fn rejected(error: Rejection) -> Self {
        Self {
            shared: Arc::new(Shared::new(State::Rejected(error))),
        }
    }

    /// Creates a pending promise and synchronously invokes `setup` with the
    /// fulfill and reject capabilities bound to it.
    ///
    /// Purely an ergonomic alternate entry point to [`Promise::fulfill`] and
    /// [`Promise::reject`].
    #[must_use]
    pub fn from_resolver(setup: impl FnOnce(FulfillFn<T>, RejectFn)) -> Self {
        let promise = Self::new();
        let fulfill = {
            let shared = Arc::clone(&promise.shared);
            Box::new(move |value| shared.fulfill(value))
        };
        let reject = {
            let shared = Arc::clone(&promise.shared);
            Box::new(move |error| shared.reject(error))
        };
        setup(fulfill, reject);
        promise
    }

    // === producer API ===

    /// Fulfills the promise with `value`.
    ///
    /// A no-op if the promise has already settled or been cancelled:
    /// producers may race to settle and only the first write matters.
    pub fn fulfill(&self, value: T) {
        self.shared.fulfill(value);
    }

    /// Rejects the promise with `error`. Same first-write-wins policy as
    /// [`Promise::fulfill`].
    pub fn reject(&self, error: Rejection) {
        self.shared.reject(error);
    }

    /// Settles from a completion-handler-style pair; the error wins when both
    /// are supplied.
    ///
    /// Supplying neither rejects with a core-domain error, since a completion
    /// that produced nothing can never fulfill.
    pub fn fulfill_or_reject(&self, value: Option<T>, error: Option<Rejection>) {
        match (value, error) {
            (_, Some(error)) => self.shared.reject(error),
            (Some(value), None) => self.shared.fulfill(value),
            (None, None) => self.shared.reject(Rejection::new(
                CORE_DOMAIN,
                0,
                "completion produced neither a value nor an error",
            )),
        }
    }

    /// Returns the settle capability for this promise.
    #[must_use]
    pub fn completion(&self) -> Completion<T> {
        Completion {
            shared: Arc::clone(&self.shared),
        }
    }

    // === cancellation ===

    /// Cancels the promise if it is still pending.
    ///
    /// Runs every registered cancellation listener exactly once, in
    /// registration order, then delivers `on_finally` to every subscriber.
    /// Fulfillment and rejection callbacks are suppressed. A no-op on a
    /// settled promise.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// Registers a cancellation listener.
    ///
    /// Invoked immediately and synchronously if the promise is already
    /// cancelled; never invoked if the promise fulfills or rejects.
    pub fn cancelled(&self, callback: impl FnOnce() + Send + 'static) {
        self.shared.on_cancel(Box::new(callback));
    }

    /// Returns a [`CancelToken`] for this promise.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            cell: Arc::clone(&self.shared) as Arc<dyn CancelCell>,
        }
    }

    // === consumer API ===

    /// Registers a full subscription record and returns a token that can
    /// cancel the promise.
    ///
    /// Cancellation through the token is of the producer's work, not of this
    /// one subscription; there is only one state machine.
    pub fn done_with(&self, observer: Observer<T>) -> CancelToken {
        self.shared.subscribe(observer.subscriber);
        self.cancel_token()
    }

    /// Subscribes a fulfillment callback.
    pub fn done(&self, on_fulfilled: impl FnOnce(T) + Send + 'static) -> CancelToken {
        self.done_with(Observer::new().on_fulfilled(on_fulfilled))
    }

    /// Subscribes fulfillment and rejection callbacks.
    pub fn done_rejected(
        &self,
        on_fulfilled: impl FnOnce(T) + Send + 'static,
        on_rejected: impl FnOnce(Rejection) + Send + 'static,
    ) -> CancelToken {
        self.done_with(
            Observer::new()
                .on_fulfilled(on_fulfilled)
                .on_rejected(on_rejected),
        )
    }

    /// Subscribes a rejection callback only.
    pub fn rejected_callback(
        &self,
        on_rejected: impl FnOnce(Rejection) + Send + 'static,
    ) -> CancelToken {
        self.done_with(Observer::new().on_rejected(on_rejected))
    }

    /// Subscribes a finally callback, which runs on every terminal state
    /// including cancellation.
    pub fn finally(&self, on_finally: impl FnOnce() + Send + 'static) -> CancelToken {
        self.done_with(Observer::new().on_finally(on_finally))
    }

    /// Subscribes a fulfillment callback delivered on the given context.
    pub fn done_on(
        &self,
        context: Arc<dyn ExecutionContext>,
        on_fulfilled: impl FnOnce(T) + Send + 'static,
    ) -> CancelToken {
        self.done_with(
            Observer::new()
                .on_fulfilled(on_fulfilled)
                .on_context(context),
        )
    }

    /// Non-blocking snapshot of the terminal state, if the promise has
    /// settled.
    #[must_use]
    pub fn try_outcome(&self) -> Option<Outcome<T>> {
        self.shared.try_outcome()
    }

    /// Returns true if the promise has not yet settled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.shared.is_pending()
    }
}

impl<T: Clone + Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The capability to request cancellation and to observe it.
///
/// Logically the same identity as the promise it came from, restricted to the
/// cancellation surface: no access to the value, no way to settle. Obtained
/// from [`Promise::cancel_token`] or returned by the `done` family.
#[derive(Clone)]
pub struct CancelToken {
    cell: Arc<dyn CancelCell>,
}

impl CancelToken {
    /// Cancels the underlying promise if it is still pending.
    pub fn cancel(&self) {
        self.cell.cancel();
    }

    /// Registers a cancellation listener; same semantics as
    /// [`Promise::cancelled`].
    pub fn cancelled(&self, callback: impl FnOnce() + Send + 'static) {
        self.cell.on_cancel(Box::new(callback));
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken").finish_non_exhaustive()
    }
}

/// The privileged settle capability over one promise.
///
/// Lets a producer hand out the right to settle without the right to
/// subscribe, the inverse of [`CancelToken`]. Cloning shares the same
/// state machine; the first settle from any handle wins.
pub struct Completion<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> Completion<T> {
    /// Fulfills the underlying promise; first write wins.
    pub fn fulfill(&self, value: T) {
        self.shared.fulfill(value);
    }

    /// Rejects the underlying promise; first write wins.
    pub fn reject(&self, error: Rejection) {
        self.shared.reject(error);
    }

    /// Completion-handler-style settle; error wins when both are supplied.
    pub fn fulfill_or_reject(&self, value: Option<T>, error: Option<Rejection>) {
        match (value, error) {
            (_, Some(error)) => self.shared.reject(error),
            (Some(value), None) => self.shared.fulfill(value),
            (None, None) => self.shared.reject(Rejection::new(
                CORE_DOMAIN,
                0,
                "completion produced neither a value nor an error",
            )),
        }
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

/// Future returned by awaiting a [`Promise`]; resolves to the promise's
/// [`Outcome`].
pub struct PromiseFuture<T> {
    promise: Promise<T>,
    waker_slot: Option<Arc<Mutex<Option<Waker>>>>,
}

impl<T: Clone + Send + 'static> Future for PromiseFuture<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(outcome) = this.promise.try_outcome() {
            return Poll::Ready(outcome);
        }
        match &this.waker_slot {
            Some(slot) => {
                *slot.lock() = Some(cx.waker().clone());
            }
            None => {
                let slot = Arc::new(Mutex::new(Some(cx.waker().clone())));
                this.waker_slot = Some(Arc::clone(&slot));
                // finally runs on every terminal state, so one registration
                // covers fulfillment, rejection, and cancellation
                let _ = this.promise.finally(move || {
                    if let Some(waker) = slot.lock().take() {
                        waker.wake();
                    }
                });
            }
        }
        // settle may have raced the registration above
        match this.promise.try_outcome() {
            Some(outcome) => Poll::Ready(outcome),
            None => Poll::Pending,
        }
    }
}

impl<T: Clone + Send + 'static> IntoFuture for Promise<T> {
    type Output = Outcome<T>;
    type IntoFuture = PromiseFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        PromiseFuture {
            promise: self,
            waker_slot: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fulfill_twice_keeps_first_value() {
        let promise = Promise::new();
        promise.fulfill("first");
        promise.fulfill("second");
        assert_eq!(promise.try_outcome(), Some(Outcome::Fulfilled("first")));
    }

    #[test]
    fn done_on_fulfilled_promise_delivers_synchronously() {
        let seen = Arc::new(Mutex::new(None));
        let promise = Promise::fulfilled(5);
        {
            let seen = Arc::clone(&seen);
            promise.done(move |value| {
                *seen.lock() = Some(value);
            });
        }
        assert_eq!(*seen.lock(), Some(5));
    }

    #[test]
    fn subscribers_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let promise = Promise::new();
        for tag in ["s1", "s2", "s3"] {
            let order = Arc::clone(&order);
            promise.done(move |_: i32| {
                order.lock().push(tag);
            });
        }
        promise.fulfill(0);
        assert_eq!(*order.lock(), vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn observed_runs_after_fulfilled_with_same_value() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let promise = Promise::new();
        {
            let main = Arc::clone(&order);
            let side = Arc::clone(&order);
            promise.done_with(
                Observer::new()
                    .on_fulfilled(move |value: i32| main.lock().push(("fulfilled", value)))
                    .on_observed(move |value: i32| side.lock().push(("observed", value))),
            );
        }
        promise.fulfill(9);
        assert_eq!(*order.lock(), vec![("fulfilled", 9), ("observed", 9)]);
    }

    #[test]
    fn fulfill_or_reject_prefers_error() {
        let promise: Promise<i32> = Promise::new();
        let error = Rejection::new("net", 3, "failed");
        promise.fulfill_or_reject(Some(1), Some(error.clone()));
        assert_eq!(promise.try_outcome(), Some(Outcome::Rejected(error)));
    }

    #[test]
    fn fulfill_or_reject_with_neither_rejects() {
        let promise: Promise<i32> = Promise::new();
        promise.fulfill_or_reject(None, None);
        match promise.try_outcome() {
            Some(Outcome::Rejected(error)) => assert_eq!(error.domain(), CORE_DOMAIN),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn from_resolver_binds_capabilities() {
        let promise = Promise::from_resolver(|fulfill, _reject| {
            fulfill(31);
        });
        assert_eq!(promise.try_outcome(), Some(Outcome::Fulfilled(31)));
    }

    #[test]
    fn from_resolver_reject_capability() {
        let error = Rejection::new("setup", 2, "could not start");
        let promise: Promise<i32> = {
            let error = error.clone();
            Promise::from_resolver(move |_fulfill, reject| {
                reject(error);
            })
        };
        assert_eq!(promise.try_outcome(), Some(Outcome::Rejected(error)));
    }

    #[test]
    fn cancel_token_cancels_the_promise() {
        let promise: Promise<i32> = Promise::new();
        let token = promise.done(|_| {});
        token.cancel();
        assert_eq!(promise.try_outcome(), Some(Outcome::Cancelled));
        promise.fulfill(1);
        assert_eq!(promise.try_outcome(), Some(Outcome::Cancelled));
    }

    #[test]
    fn cancelled_listener_fires_exactly_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let promise: Promise<i32> = Promise::new();
        {
            let fired = Arc::clone(&fired);
            promise.cancelled(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }
        promise.cancel();
        promise.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancelled_listener_dropped_after_settle() {
        let fired = Arc::new(AtomicUsize::new(0));
        let promise = Promise::new();
        {
            let fired = Arc::clone(&fired);
            promise.cancelled(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }
        promise.fulfill(1);
        promise.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn completion_settles_observed_promise() {
        let seen = Arc::new(Mutex::new(None));
        let promise = Promise::new();
        {
            let seen = Arc::clone(&seen);
            promise.done(move |value: &str| {
                *seen.lock() = Some(value);
            });
        }
        let completion = promise.completion();
        completion.fulfill("done");
        assert_eq!(*seen.lock(), Some("done"));
    }

    #[test]
    fn finally_runs_for_every_terminal_state() {
        for settle in [
            (|p: &Promise<i32>| p.fulfill(1)) as fn(&Promise<i32>),
            |p| p.reject(Rejection::new("t", 1, "e")),
            |p| p.cancel(),
        ] {
            let fired = Arc::new(AtomicUsize::new(0));
            let promise: Promise<i32> = Promise::new();
            {
                let fired = Arc::clone(&fired);
                promise.finally(move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                });
            }
            settle(&promise);
            assert_eq!(fired.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn await_fulfilled_promise() {
        let outcome = futures::executor::block_on(Promise::fulfilled(8).into_future());
        assert_eq!(outcome, Outcome::Fulfilled(8));
    }

    #[test]
    fn await_promise_settled_from_another_thread() {
        let promise: Promise<i32> = Promise::new();
        let producer = {
            let promise = promise.clone();
            std::thread::spawn(move || {
                promise.fulfill(64);
            })
        };
        let outcome = futures::executor::block_on(promise.into_future());
        producer.join().expect("producer thread");
        assert_eq!(outcome, Outcome::Fulfilled(64));
    }

    #[test]
    fn await_cancelled_promise() {
        let promise: Promise<i32> = Promise::new();
        promise.cancel();
        let outcome = futures::executor::block_on(promise.into_future());
        assert_eq!(outcome, Outcome::Cancelled);
    }

    #[test]
    fn concurrent_settle_race_is_linearizable() {
        for _ in 0..64 {
            let promise: Promise<&str> = Promise::new();
            let fulfiller = {
                let promise = promise.clone();
                std::thread::spawn(move || promise.fulfill("a"))
            };
            let rejecter = {
                let promise = promise.clone();
                std::thread::spawn(move || promise.reject(Rejection::new("t", 1, "b")))
            };
            fulfiller.join().expect("fulfiller");
            rejecter.join().expect("rejecter");
            let outcome = promise.try_outcome().expect("settled");
            assert!(outcome.is_fulfilled() || outcome.is_rejected());
        }
    }
}
