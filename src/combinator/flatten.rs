//! Fail-fast flattening of a mixed sequence of values and promises.

use std::sync::Arc;

use crate::combinator::Gather;
use crate::promise::state::Subscriber;
use crate::promise::Promise;
use crate::tracing_compat::debug;

/// One entry in a [`flatten_promises`] input: either a plain value that
/// passes through unchanged, or a promise to be replaced by its resolved
/// value.
pub enum Item<T> {
    /// A plain value, kept at its position as-is.
    Value(T),
    /// A promise whose resolved value takes this position.
    Promise(Promise<T>),
}

impl<T> From<T> for Item<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

impl<T> From<Promise<T>> for Item<T> {
    fn from(promise: Promise<T>) -> Self {
        Self::Promise(promise)
    }
}

/// Returns a promise that fulfills with a sequence of equal length where
/// every promise entry has been replaced by its own resolved value (one level
/// of unwrap) and every plain value passes through unchanged, preserving
/// position.
///
/// Rejection of any promise entry rejects the whole, fail-fast, exactly as
/// [`when_promises`](crate::when_promises); cancellation of any entry cancels
/// the whole. An empty input fulfills immediately with an empty vector.
#[must_use]
pub fn flatten_promises<T: Clone + Send + 'static>(
    items: impl IntoIterator<Item = Item<T>>,
) -> Promise<Vec<T>> {
    let items: Vec<Item<T>> = items.into_iter().collect();
    let derived = Promise::new();

    let gather = Gather::with_slots(items.len());

    // Plain values fill their slots up front; only promise entries count
    // toward `remaining` beyond that.
    let assembled = {
        let mut gather = gather.lock();
        let mut done = items.is_empty();
        for (index, item) in items.iter().enumerate() {
            if let Item::Value(value) = item {
                done = gather.fill(index, value.clone());
            }
        }
        done.then(|| gather.drain())
    };
    if let Some(values) = assembled {
        debug!(count = values.len(), "flatten_promises complete");
        derived.fulfill(values);
        return derived;
    }

    for (index, item) in items.into_iter().enumerate() {
        let Item::Promise(promise) = item else {
            continue;
        };
        let on_fulfilled = {
            let gather = Arc::clone(&gather);
            let derived = derived.clone();
            move |value: T| {
                let values = {
                    let mut gather = gather.lock();
                    gather.fill(index, value).then(|| gather.drain())
                };
                if let Some(values) = values {
                    derived.fulfill(values);
                }
            }
        };
        let on_rejected = {
            let derived = derived.clone();
            move |error| derived.reject(error)
        };
        let on_cancelled = {
            let derived = derived.clone();
            move || derived.cancel()
        };
        promise.shared.subscribe(Subscriber {
            on_fulfilled: Some(Box::new(on_fulfilled)),
            on_rejected: Some(Box::new(on_rejected)),
            on_cancelled: Some(Box::new(on_cancelled)),
            ..Subscriber::empty()
        });
    }
    derived
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Rejection;
    use crate::outcome::Outcome;

    #[test]
    fn empty_input_fulfills_immediately() {
        let combined: Promise<Vec<i32>> = flatten_promises(Vec::new());
        assert_eq!(combined.try_outcome(), Some(Outcome::Fulfilled(Vec::new())));
    }

    #[test]
    fn mixed_values_and_promise_preserve_positions() {
        let third = Promise::new();
        let combined = flatten_promises(vec![
            Item::from(1),
            Item::from(2),
            Item::from(third.clone()),
            Item::from(4),
        ]);

        assert!(combined.is_pending());
        third.fulfill(3);
        assert_eq!(
            combined.try_outcome(),
            Some(Outcome::Fulfilled(vec![1, 2, 3, 4]))
        );
    }

    #[test]
    fn all_plain_values_fulfill_immediately() {
        let combined = flatten_promises(vec![Item::from("a"), Item::from("b")]);
        assert_eq!(
            combined.try_outcome(),
            Some(Outcome::Fulfilled(vec!["a", "b"]))
        );
    }

    #[test]
    fn rejection_of_any_entry_rejects_the_whole() {
        let failing = Promise::<i32>::new();
        let combined = flatten_promises(vec![Item::from(1), Item::from(failing.clone())]);

        let error = Rejection::new("net", 1, "down");
        failing.reject(error.clone());
        assert_eq!(combined.try_outcome(), Some(Outcome::Rejected(error)));
    }

    #[test]
    fn cancellation_of_any_entry_cancels_the_whole() {
        let cancelled = Promise::<i32>::new();
        let combined = flatten_promises(vec![Item::from(1), Item::from(cancelled.clone())]);

        cancelled.cancel();
        assert_eq!(combined.try_outcome(), Some(Outcome::Cancelled));
    }

    #[test]
    fn already_settled_promise_entries_are_accepted() {
        let combined = flatten_promises(vec![Item::from(Promise::fulfilled(10)), Item::from(20)]);
        assert_eq!(combined.try_outcome(), Some(Outcome::Fulfilled(vec![10, 20])));
    }
}
