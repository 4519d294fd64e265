//! Covenant: a single-assignment promise primitive.
//!
//! # Overview
//!
//! A [`Promise<T>`] is a container that transitions exactly once from
//! `Pending` to one of three terminal outcomes: `Fulfilled(T)`,
//! `Rejected(Rejection)`, or `Cancelled`. Any number of consumers may
//! subscribe before or after settlement; late subscribers observe the same
//! payload early ones did. Promises chain (`then` derives a new promise from
//! a transformation of the outcome, flattening one level of
//! promise-of-promise nesting) and aggregate (`when_promises`,
//! `join_promises`, `flatten_promises`).
//!
//! # Core Guarantees
//!
//! - **Settle once**: exactly one of fulfill/reject/cancel wins the race to
//!   leave `Pending`; later attempts are silent no-ops, observed consistently
//!   by every thread.
//! - **Exactly-once delivery**: a registered callback runs at most once;
//!   subscribers on one promise run in registration order.
//! - **No lock across callbacks**: the per-promise mutex is held only around
//!   state reads/writes and registry drains, never across user code.
//! - **Faults become rejections**: a panic inside a chain transform rejects
//!   the derived promise instead of unwinding into the settling thread.
//! - **Cancellation is not an error**: it is a third terminal state that
//!   suppresses fulfillment/rejection callbacks but still runs finally
//!   callbacks; it is cooperative and explicit, never preemptive.
//!
//! # Module Structure
//!
//! - [`promise`]: the state machine, capability views, chaining
//! - [`combinator`]: aggregation of promise sequences
//! - [`context`]: the execution-context abstraction for callback delivery
//! - [`error`]: the rejection payload
//! - [`outcome`]: terminal-state snapshots
//! - [`tracing_compat`]: feature-gated structured logging
//!
//! # Example
//!
//! ```
//! use covenant::{Chained, Promise, Rejection};
//!
//! let promise = Promise::new();
//! let chained = promise.then(|n: i32| Chained::value(n * 2));
//!
//! promise.fulfill(21);
//! assert_eq!(chained.try_outcome().and_then(|o| o.fulfilled()), Some(42));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]

pub mod combinator;
pub mod context;
pub mod error;
pub mod outcome;
pub mod promise;
pub mod tracing_compat;

pub use combinator::{flatten_promises, join_promises, when_promises, Item};
pub use context::{ExecutionContext, Job, WorkerContext};
pub use error::Rejection;
pub use outcome::Outcome;
pub use promise::{
    CancelToken, Chained, Completion, FulfillFn, Observer, Promise, PromiseFuture, RejectFn,
};
