//! The settle-once state machine behind every promise.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    PROMISE STATE MACHINE                     │
//! │                                                              │
//! │                 ┌──► Fulfilled(value)  ──┐                   │
//! │                 │                        │                   │
//! │    Pending ─────┼──► Rejected(error)   ──┼──► (terminal,     │
//! │                 │                        │     sticky)       │
//! │                 └──► Cancelled         ──┘                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Exactly one transition out of `Pending` wins; later attempts are silent
//! no-ops. The mutex guards the state and both callback lists and is never
//! held across a user callback: settlement drains the subscriber list into
//! locals under the lock, then delivers outside it.

use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::context::{ExecutionContext, Job};
use crate::error::Rejection;
use crate::outcome::Outcome;
use crate::tracing_compat::trace;

/// A boxed single-shot callback taking one argument.
pub(crate) type Callback<A> = Box<dyn FnOnce(A) + Send + 'static>;

/// A boxed single-shot callback taking no arguments.
pub(crate) type Hook = Box<dyn FnOnce() + Send + 'static>;

/// Terminal and non-terminal states of a promise.
pub(crate) enum State<T> {
    Pending,
    Fulfilled(T),
    Rejected(Rejection),
    Cancelled,
}

impl<T> State<T> {
    pub(crate) const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// One registered subscription: the callback bundle plus its delivery target.
///
/// A record is drained from the registry exactly once; delivery consumes it,
/// so no callback can run twice. `on_cancelled` is internal plumbing used by
/// chaining and the combinators to adopt a parent's cancellation; it is not
/// part of the public observer surface.
pub(crate) struct Subscriber<T> {
    pub(crate) on_fulfilled: Option<Callback<T>>,
    pub(crate) on_observed: Option<Callback<T>>,
    pub(crate) on_rejected: Option<Callback<Rejection>>,
    pub(crate) on_finally: Option<Hook>,
    pub(crate) on_cancelled: Option<Hook>,
    pub(crate) context: Option<Arc<dyn ExecutionContext>>,
}

impl<T> Subscriber<T> {
    pub(crate) fn empty() -> Self {
        Self {
            on_fulfilled: None,
            on_observed: None,
            on_rejected: None,
            on_finally: None,
            on_cancelled: None,
            context: None,
        }
    }
}

impl<T: Clone + Send + 'static> Subscriber<T> {
    /// Delivers the fulfillment path: `on_fulfilled`, `on_observed`, then
    /// `on_finally`, as one job so a context override keeps them adjacent.
    pub(crate) fn deliver_fulfilled(self, value: T) {
        let Self {
            on_fulfilled,
            on_observed,
            on_finally,
            context,
            ..
        } = self;
        let job = move || {
            match (on_fulfilled, on_observed) {
                (Some(main), Some(observe)) => {
                    let copy = value.clone();
                    main(value);
                    observe(copy);
                }
                (Some(main), None) => main(value),
                (None, Some(observe)) => observe(value),
                (None, None) => {}
            }
            if let Some(finally) = on_finally {
                finally();
            }
        };
        dispatch(context, Box::new(job));
    }

    /// Delivers the rejection path: `on_rejected` then `on_finally`.
    pub(crate) fn deliver_rejected(self, error: Rejection) {
        let Self {
            on_rejected,
            on_finally,
            context,
            ..
        } = self;
        let job = move || {
            if let Some(rejected) = on_rejected {
                rejected(error);
            }
            if let Some(finally) = on_finally {
                finally();
            }
        };
        dispatch(context, Box::new(job));
    }

    /// Delivers the cancellation path: `on_finally` then the internal
    /// cancellation hook. Fulfillment and rejection callbacks are suppressed.
    pub(crate) fn deliver_cancelled(self) {
        let Self {
            on_finally,
            on_cancelled,
            context,
            ..
        } = self;
        let job = move || {
            if let Some(finally) = on_finally {
                finally();
            }
            if let Some(cancelled) = on_cancelled {
                cancelled();
            }
        };
        dispatch(context, Box::new(job));
    }
}

fn dispatch(context: Option<Arc<dyn ExecutionContext>>, job: Job) {
    match context {
        Some(context) => context.schedule(job),
        None => job(),
    }
}

/// Mutable promise internals: the state plus both callback registries.
pub(crate) struct Inner<T> {
    pub(crate) state: State<T>,
    pub(crate) subscribers: SmallVec<[Subscriber<T>; 2]>,
    pub(crate) cancel_callbacks: SmallVec<[Hook; 1]>,
}

/// The shared cell behind `Promise`, `CancelToken`, and `Completion`.
///
/// All capability views hold an `Arc` to one `Shared`; there is exactly one
/// state machine no matter how many handles observe it.
pub(crate) struct Shared<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> Shared<T> {
    pub(crate) fn new(state: State<T>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state,
                subscribers: SmallVec::new(),
                cancel_callbacks: SmallVec::new(),
            }),
        }
    }
}

impl<T: Clone + Send + 'static> Shared<T> {
    /// Attempts the `Pending -> Fulfilled` transition.
    ///
    /// On the winning call: cancel callbacks are cleared (cancellation no
    /// longer applies), the subscriber registry is drained, and each record
    /// is delivered outside the lock in registration order.
    pub(crate) fn fulfill(&self, value: T) {
        let drained = {
            let mut inner = self.inner.lock();
            if !inner.state.is_pending() {
                return;
            }
            inner.state = State::Fulfilled(value.clone());
            inner.cancel_callbacks.clear();
            std::mem::take(&mut inner.subscribers)
        };
        trace!(subscribers = drained.len(), "promise fulfilled");
        for subscriber in drained {
            subscriber.deliver_fulfilled(value.clone());
        }
    }

    /// Attempts the `Pending -> Rejected` transition. Same drain discipline
    /// as [`Shared::fulfill`].
    pub(crate) fn reject(&self, error: Rejection) {
        let drained = {
            let mut inner = self.inner.lock();
            if !inner.state.is_pending() {
                return;
            }
            inner.state = State::Rejected(error.clone());
            inner.cancel_callbacks.clear();
            std::mem::take(&mut inner.subscribers)
        };
        trace!(subscribers = drained.len(), "promise rejected");
        for subscriber in drained {
            subscriber.deliver_rejected(error.clone());
        }
    }

    /// Attempts the `Pending -> Cancelled` transition.
    ///
    /// Cancellation callbacks run first, synchronously on the cancelling
    /// thread and in registration order; then each drained subscriber gets
    /// its cancellation delivery (finally only).
    pub(crate) fn cancel(&self) {
        let (cancel_callbacks, subscribers) = {
            let mut inner = self.inner.lock();
            if !inner.state.is_pending() {
                return;
            }
            inner.state = State::Cancelled;
            (
                std::mem::take(&mut inner.cancel_callbacks),
                std::mem::take(&mut inner.subscribers),
            )
        };
        trace!(
            listeners = cancel_callbacks.len(),
            subscribers = subscribers.len(),
            "promise cancelled"
        );
        for callback in cancel_callbacks {
            callback();
        }
        for subscriber in subscribers {
            subscriber.deliver_cancelled();
        }
    }

    /// Registers a subscription record, or delivers it immediately if the
    /// promise has already settled. Late delivery carries the same payload an
    /// early subscriber saw.
    pub(crate) fn subscribe(&self, subscriber: Subscriber<T>) {
        let settled = {
            let mut inner = self.inner.lock();
            let snapshot = match &inner.state {
                State::Pending => None,
                State::Fulfilled(value) => Some(Outcome::Fulfilled(value.clone())),
                State::Rejected(error) => Some(Outcome::Rejected(error.clone())),
                State::Cancelled => Some(Outcome::Cancelled),
            };
            match snapshot {
                None => {
                    inner.subscribers.push(subscriber);
                    return;
                }
                Some(outcome) => outcome,
            }
        };
        match settled {
            Outcome::Fulfilled(value) => subscriber.deliver_fulfilled(value),
            Outcome::Rejected(error) => subscriber.deliver_rejected(error),
            Outcome::Cancelled => subscriber.deliver_cancelled(),
        }
    }

    /// Registers a cancellation listener.
    ///
    /// Runs immediately (synchronously) if the promise is already Cancelled;
    /// is silently dropped if the promise already fulfilled or rejected.
    pub(crate) fn on_cancel(&self, callback: Hook) {
        let run_now = {
            let mut inner = self.inner.lock();
            match inner.state {
                State::Pending => {
                    inner.cancel_callbacks.push(callback);
                    return;
                }
                State::Cancelled => true,
                State::Fulfilled(_) | State::Rejected(_) => false,
            }
        };
        if run_now {
            callback();
        }
    }

    /// Non-blocking snapshot of the terminal state, if any.
    pub(crate) fn try_outcome(&self) -> Option<Outcome<T>> {
        let inner = self.inner.lock();
        match &inner.state {
            State::Pending => None,
            State::Fulfilled(value) => Some(Outcome::Fulfilled(value.clone())),
            State::Rejected(error) => Some(Outcome::Rejected(error.clone())),
            State::Cancelled => Some(Outcome::Cancelled),
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.inner.lock().state.is_pending()
    }
}

/// Type-erased cancellation capability over one [`Shared`] cell.
///
/// This is what a `CancelToken` holds: the right to request cancellation and
/// to hear about it, with no access to the value's type at all.
pub(crate) trait CancelCell: Send + Sync {
    fn cancel(&self);
    fn on_cancel(&self, callback: Hook);
}

impl<T: Clone + Send + 'static> CancelCell for Shared<T> {
    fn cancel(&self) {
        Shared::cancel(self);
    }

    fn on_cancel(&self, callback: Hook) {
        Shared::on_cancel(self, callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fulfilled_counter(counter: &Arc<AtomicUsize>) -> Subscriber<i32> {
        let counter = Arc::clone(counter);
        Subscriber {
            on_fulfilled: Some(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
            ..Subscriber::empty()
        }
    }

    #[test]
    fn first_transition_wins() {
        let shared = Shared::new(State::Pending);
        shared.fulfill(1);
        shared.fulfill(2);
        shared.reject(Rejection::new("t", 1, "late"));
        assert_eq!(shared.try_outcome(), Some(Outcome::Fulfilled(1)));
    }

    #[test]
    fn cancelled_is_sticky() {
        let shared = Shared::new(State::Pending);
        shared.cancel();
        shared.fulfill(1);
        assert_eq!(shared.try_outcome(), Some(Outcome::Cancelled));
    }

    #[test]
    fn subscriber_record_fires_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let shared = Shared::new(State::Pending);
        shared.subscribe(fulfilled_counter(&counter));
        shared.fulfill(10);
        shared.fulfill(11);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_subscriber_sees_stored_value() {
        let shared = Shared::new(State::Pending);
        shared.fulfill(42);

        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        shared.subscribe(Subscriber {
            on_fulfilled: Some(Box::new(move |value| {
                *slot.lock() = Some(value);
            })),
            ..Subscriber::empty()
        });
        assert_eq!(*seen.lock(), Some(42));
    }

    #[test]
    fn settle_clears_cancel_callbacks_without_running_them() {
        let fired = Arc::new(AtomicUsize::new(0));
        let shared = Shared::new(State::Pending);
        let slot = Arc::clone(&fired);
        shared.on_cancel(Box::new(move || {
            slot.fetch_add(1, Ordering::SeqCst);
        }));
        shared.fulfill(1);
        shared.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancellation_suppresses_value_paths_but_runs_finally() {
        let fulfilled = Arc::new(AtomicUsize::new(0));
        let finalized = Arc::new(AtomicUsize::new(0));
        let shared = Shared::new(State::Pending);

        let f = Arc::clone(&fulfilled);
        let fin = Arc::clone(&finalized);
        shared.subscribe(Subscriber {
            on_fulfilled: Some(Box::new(move |_: i32| {
                f.fetch_add(1, Ordering::SeqCst);
            })),
            on_finally: Some(Box::new(move || {
                fin.fetch_add(1, Ordering::SeqCst);
            })),
            ..Subscriber::empty()
        });

        shared.cancel();
        assert_eq!(fulfilled.load(Ordering::SeqCst), 0);
        assert_eq!(finalized.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_on_cancelled_cell_runs_synchronously() {
        let shared: Shared<i32> = Shared::new(State::Pending);
        shared.cancel();
        let fired = Arc::new(AtomicUsize::new(0));
        let slot = Arc::clone(&fired);
        shared.on_cancel(Box::new(move || {
            slot.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
