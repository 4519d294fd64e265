//! Fail-fast aggregation over a sequence of promises.

use std::sync::Arc;

use crate::combinator::Gather;
use crate::promise::state::Subscriber;
use crate::promise::Promise;
use crate::tracing_compat::debug;

/// Returns a promise that fulfills with every input's value, in input order,
/// once all inputs have fulfilled.
///
/// If any input rejects, the derived promise rejects immediately with that
/// error; the first rejection observed wins and the remaining inputs'
/// outcomes are ignored (they still settle independently). If any input is
/// cancelled, the derived promise is cancelled, fail-fast the same way. An
/// empty input fulfills immediately with an empty vector.
#[must_use]
pub fn when_promises<T: Clone + Send + 'static>(promises: &[Promise<T>]) -> Promise<Vec<T>> {
    let derived = Promise::new();
    if promises.is_empty() {
        derived.fulfill(Vec::new());
        return derived;
    }

    let gather = Gather::with_slots(promises.len());
    for (index, promise) in promises.iter().enumerate() {
        let on_fulfilled = {
            let gather = Arc::clone(&gather);
            let derived = derived.clone();
            move |value: T| {
                let values = {
                    let mut gather = gather.lock();
                    gather.fill(index, value).then(|| gather.drain())
                };
                if let Some(values) = values {
                    debug!(count = values.len(), "when_promises complete");
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
