//! Promise chaining: deriving a new promise from a transformation.
//!
//! `then` registers a transforming subscription on a parent promise and
//! returns a derived promise wired to the transformation's result:
//!
//! - the transform returns [`Chained::Value`]: the derived promise fulfills
//!   with it;
//! - it returns [`Chained::Promise`]: the derived promise adopts that inner
//!   promise's eventual outcome (one level of flattening);
//! - it returns [`Chained::Rejected`]: the derived promise rejects;
//! - it panics: the fault is caught and becomes the derived promise's
//!   rejection instead of unwinding into the settling thread.
//!
//! Without a rejection handler the parent's error propagates to the derived
//! promise unchanged; with one, the handler may recover (return a value or a
//! promise) or re-reject. The finally callback runs after either path and
//! before the derived promise settles, and still runs when the parent is
//! cancelled. A cancelled parent cancels the derived promise; cancelling the
//! derived promise does not reach back into the parent.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::ExecutionContext;
use crate::error::Rejection;
use crate::promise::state::{Hook, Shared, Subscriber};
use crate::promise::Promise;

/// The result of a chain transform: the next link in the chain.
///
/// `From` impls cover the common returns, so a transform can end with
/// `value.into()`, `promise.into()`, `rejection.into()`, or `result.into()`.
pub enum Chained<U> {
    /// Fulfill the derived promise with this value.
    Value(U),
    /// Make the derived promise adopt this promise's eventual outcome.
    Promise(Promise<U>),
    /// Reject the derived promise with this error.
    Rejected(Rejection),
}

impl<U> Chained<U> {
    /// Wraps a plain value.
    pub fn value(value: U) -> Self {
        Self::Value(value)
    }
}

impl<U> From<Promise<U>> for Chained<U> {
    fn from(promise: Promise<U>) -> Self {
        Self::Promise(promise)
    }
}

impl<U> From<Rejection> for Chained<U> {
    fn from(error: Rejection) -> Self {
        Self::Rejected(error)
    }
}

impl<U> From<Result<U, Rejection>> for Chained<U> {
    fn from(result: Result<U, Rejection>) -> Self {
        match result {
            Ok(value) => Self::Value(value),
            Err(error) => Self::Rejected(error),
        }
    }
}

/// The finally callback, shared between the three delivery paths; exactly one
/// path runs per record, and whichever does takes the hook.
type FinallySlot = Arc<Mutex<Option<Hook>>>;

fn run_finally(slot: &FinallySlot) {
    if let Some(finally) = slot.lock().take() {
        finally();
    }
}

/// Settles a derived promise from a transform's (possibly panicked) result.
fn settle<U: Clone + Send + 'static>(
    target: &Arc<Shared<U>>,
    result: Result<Chained<U>, Box<dyn Any + Send>>,
) {
    match result {
        Err(payload) => target.reject(Rejection::from_panic(payload.as_ref())),
        Ok(Chained::Value(value)) => target.fulfill(value),
        Ok(Chained::Rejected(error)) => target.reject(error),
        Ok(Chained::Promise(inner)) => adopt(Arc::clone(target), inner),
    }
}

/// Wires `target` to adopt `inner`'s eventual outcome, cancellation included.
pub(crate) fn adopt<U: Clone + Send + 'static>(target: Arc<Shared<U>>, inner: Promise<U>) {
    let on_ok = Arc::clone(&target);
    let on_err = Arc::clone(&target);
    inner.shared.subscribe(Subscriber {
        on_fulfilled: Some(Box::new(move |value| on_ok.fulfill(value))),
        on_rejected: Some(Box::new(move |error| on_err.reject(error))),
        on_cancelled: Some(Box::new(move || target.cancel())),
        ..Subscriber::empty()
    });
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Full-form chaining: transform, rejection handler, finally, and
    /// delivery context, each optional except the transform.
    ///
    /// The reduced-arity forms ([`Promise::then`], [`Promise::then_on`],
    /// [`Promise::then_finally`], [`Promise::then_rejected`]) default the
    /// omitted pieces to no-ops and keep identical semantics.
    pub fn then_with<U: Clone + Send + 'static>(
        &self,
        transform: impl FnOnce(T) -> Chained<U> + Send + 'static,
        rejected: Option<Box<dyn FnOnce(Rejection) -> Chained<U> + Send + 'static>>,
        finally: Option<Hook>,
        context: Option<Arc<dyn ExecutionContext>>,
    ) -> Promise<U> {
        let derived = Promise::new();
        let target = Arc::clone(&derived.shared);
        let finally_slot: FinallySlot = Arc::new(Mutex::new(finally));

        let on_fulfilled = {
            let target = Arc::clone(&target);
            let slot = Arc::clone(&finally_slot);
            move |value: T| {
                let result = catch_unwind(AssertUnwindSafe(|| transform(value)));
                run_finally(&slot);
                settle(&target, result);
            }
        };
        let on_rejected = {
            let target = Arc::clone(&target);
            let slot = Arc::clone(&finally_slot);
            move |error: Rejection| match rejected {
                Some(handler) => {
                    let result = catch_unwind(AssertUnwindSafe(|| handler(error)));
                    run_finally(&slot);
                    settle(&target, result);
                }
                None => {
                    run_finally(&slot);
                    target.reject(error);
                }
            }
        };
        let on_cancelled = {
            let slot = Arc::clone(&finally_slot);
            move || {
                run_finally(&slot);
                target.cancel();
            }
        };

        self.shared.subscribe(Subscriber {
            on_fulfilled: Some(Box::new(on_fulfilled)),
            on_rejected: Some(Box::new(on_rejected)),
            on_cancelled: Some(Box::new(on_cancelled)),
            context,
            ..Subscriber::empty()
        });
        derived
    }

    /// Chains a transformation of the fulfillment value.
    pub fn then<U: Clone + Send + 'static>(
        &self,
        transform: impl FnOnce(T) -> Chained<U> + Send + 'static,
    ) -> Promise<U> {
        self.then_with(transform, None, None, None)
    }

    /// Chains a transformation delivered on the given context.
    pub fn then_on<U: Clone + Send + 'static>(
        &self,
        context: Arc<dyn ExecutionContext>,
        transform: impl FnOnce(T) -> Chained<U> + Send + 'static,
    ) -> Promise<U> {
        self.then_with(transform, None, None, Some(context))
    }

    /// Chains a transformation plus a finally callback.
    pub fn then_finally<U: Clone + Send + 'static>(
        &self,
        transform: impl FnOnce(T) -> Chained<U> + Send + 'static,
        finally: impl FnOnce() + Send + 'static,
    ) -> Promise<U> {
        self.then_with(transform, None, Some(Box::new(finally)), None)
    }

    /// Rejection-only chaining: fulfillment passes through unchanged, a
    /// rejection runs the handler, which may recover or re-reject.
    pub fn then_rejected(
        &self,
        rejected: impl FnOnce(Rejection) -> Chained<T> + Send + 'static,
    ) -> Promise<T> {
        let derived = Promise::new();
        let target = Arc::clone(&derived.shared);

        let on_fulfilled = {
            let target = Arc::clone(&target);
            move |value: T| target.fulfill(value)
        };
        let on_rejected = {
            let target = Arc::clone(&target);
            move |error: Rejection| {
                let result = catch_unwind(AssertUnwindSafe(|| rejected(error)));
                settle(&target, result);
            }
        };
        let on_cancelled = move || target.cancel();

        self.shared.subscribe(Subscriber {
            on_fulfilled: Some(Box::new(on_fulfilled)),
            on_rejected: Some(Box::new(on_rejected)),
            on_cancelled: Some(Box::new(on_cancelled)),
            ..Subscriber::empty()
        });
        derived
    }
}
