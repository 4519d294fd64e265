//! Structured logging shim.
//!
//! With the `tracing-integration` feature enabled this re-exports the event
//! macros from the `tracing` crate; without it the same names expand to
//! nothing, so settlement and cancellation tracepoints cost nothing in the
//! default build.
//!
//! ```toml
//! covenant = { version = "0.1", features = ["tracing-integration"] }
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, trace};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    //! No-op macro expansions for the default build.

    /// No-op trace-level event macro.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op debug-level event macro.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    pub use crate::{debug, trace};
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::*;
