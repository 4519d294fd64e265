//! Settle-all aggregation over a sequence of promises.

use std::sync::Arc;

use crate::combinator::Gather;
use crate::error::Rejection;
use crate::promise::state::Subscriber;
use crate::promise::Promise;
use crate::tracing_compat::debug;

/// Returns a promise that inspects the outcome of every input and fulfills
/// with one `Result` per input position: `Ok(value)` for a fulfilled input,
/// `Err(error)` for a rejected one.
///
/// A cancelled input occupies its position with the canonical
/// [`Rejection::cancelled`] error. The derived promise rejects only if every
/// input rejected, and then with the first rejection in input order (the
/// deterministic tie-break this crate commits to). Positions are never
/// reordered or coalesced. An empty input fulfills immediately with an empty
/// vector.
#[must_use]
pub fn join_promises<T: Clone + Send + 'static>(
    promises: &[Promise<T>],
) -> Promise<Vec<Result<T, Rejection>>> {
    let derived = Promise::new();
    if promises.is_empty() {
        derived.fulfill(Vec::new());
        return derived;
    }

    let gather = Gather::with_slots(promises.len());
    for (index, promise) in promises.iter().enumerate() {
        let settle = {
            let gather = Arc::clone(&gather);
            let derived = derived.clone();
            move |slot: Result<T, Rejection>| {
                let settled = {
                    let mut gather = gather.lock();
                    gather.fill(index, slot).then(|| gather.drain())
                };
                if let Some(settled) = settled {
                    finish(&derived, settled);
                }
            }
        };
        let on_fulfilled = {
            let settle = settle.clone();
            move |value: T| settle(Ok(value))
        };
        let on_rejected = {
            let settle = settle.clone();
            move |error: Rejection| settle(Err(error))
        };
        let on_cancelled = move || settle(Err(Rejection::cancelled()));
        promise.shared.subscribe(Subscriber {
            on_fulfilled: Some(Box::new(on_fulfilled)),
            on_rejected: Some(Box::new(on_rejected)),
            on_cancelled: Some(Box::new(on_cancelled)),
            ..Subscriber::empty()
        });
    }
    derived
}

fn finish<T: Clone + Send + 'static>(
    derived: &Promise<Vec<Result<T, Rejection>>>,
    settled: Vec<Result<T, Rejection>>,
) {
    let all_rejected = settled.iter().all(Result::is_err);
    debug!(count = settled.len(), all_rejected, "join_promises complete");
    if all_rejected {
        // every slot is an error, so the first rejection in input order is
        // simply the first slot
        if let Some(Err(error)) = settled.first() {
            derived.reject(error.clone());
            return;
        }
    }
    derived.fulfill(settled);
}
