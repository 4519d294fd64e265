//! Array combinators: aggregating many promises into one.
//!
//! - [`when_promises`]: fail-fast all; fulfills with every value in input
//!   order, rejects with the first rejection observed.
//! - [`join_promises`]: settle-all; every position holds its input's value or
//!   error, rejecting only if every input rejected.
//! - [`flatten_promises`]: a mixed sequence of plain values and promises,
//!   fail-fast, with promise entries replaced by their resolved values.
//!
//! Each combinator installs exactly one subscription per input and never
//! mutates the inputs beyond that. Ordering of the result always equals input
//! ordering, regardless of completion order.

mod flatten;
mod join;
mod when;

pub use flatten::{flatten_promises, Item};
pub use join::join_promises;
pub use when::when_promises;

use std::sync::Arc;

use parking_lot::Mutex;

/// Positional slot accumulator shared by the combinators.
///
/// `remaining` counts inputs that have not yet filled their slot; the input
/// whose delivery drops it to zero assembles the result. Settlement of the
/// derived promise is idempotent, so fail-fast paths simply settle early and
/// let stragglers no-op.
pub(crate) struct Gather<S> {
    pub(crate) slots: Vec<Option<S>>,
    pub(crate) remaining: usize,
}

impl<S> Gather<S> {
    pub(crate) fn with_slots(count: usize) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            slots: (0..count).map(|_| None).collect(),
            remaining: count,
        }))
    }

    /// Fills one slot; returns true when this was the last outstanding input.
    pub(crate) fn fill(&mut self, index: usize, slot: S) -> bool {
        self.slots[index] = Some(slot);
        self.remaining -= 1;
        self.remaining == 0
    }

    /// Drains the filled slots in input order. Only meaningful after `fill`
    /// has returned true.
    pub(crate) fn drain(&mut self) -> Vec<S> {
        self.slots.drain(..).flatten().collect()
    }
}
