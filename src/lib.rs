//! # Sharedbreaker
//!
//! A distributed circuit breaker whose state is shared across processes
//! through a pluggable, lockable storage backend.
//!
//! ## Overview
//!
//! An ordinary circuit breaker protects one process. When many instances of
//! a service call the same dependency, each of them has to discover the
//! outage on its own. Sharedbreaker keeps the circuit's state in a backend
//! such as Redis, so that:
//!
//! - Every instance trips together once the shared failure count is reached
//! - Recovery is probed with a bounded number of requests across all instances
//! - Counters are cleared on a fixed cycle so old outcomes age out
//! - Each read-modify-write of the shared record happens under a distributed lock
//!
//! ## Quick Start
//!
//! ```rust
//! use sharedbreaker::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let factory = CircuitBreakerFactory::from_options([
//!         with_in_memory_backend(),
//!         with_failure_count_threshold(5),
//!         with_allow_after(Duration::from_secs(30)),
//!     ])?;
//!
//!     let mut breaker = factory.breaker_for("payments", CircuitContext::new());
//!     let execution = breaker
//!         .execute(|| async { Ok::<_, std::io::Error>("charged") })
//!         .await;
//!
//!     if let Some(err) = execution.circuit_error() {
//!         println!("circuit refused or failed: {err}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `redis` - Redis storage backend
//!
//! ## Architecture
//!
//! The library is organized into several layers:
//!
//! - **Core**: The persisted record, states, errors and the backend traits
//! - **Circuit Breaker**: The state machine, settings and factory
//! - **Backends**: Storage adapters
//! - **Logging**: The pluggable logger used on the hot path

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod backends;
pub mod circuit_breaker;
pub mod core;
pub mod logging;

// Re-export commonly used types at the crate root
pub use crate::core::{
    wrap_expected, BackendError, CircuitContext, CircuitError, CircuitInformation, CircuitState,
    ExecutionStatus, ExpectedCondition, IsExpected, LockHandle, SettingsError, StorageBackend,
};

pub use crate::circuit_breaker::{
    CircuitBreaker, CircuitBreakerFactory, Execution, FactorySettings, SettingsOption,
};
pub use crate::logging::{Logger, NoopLogger, TracingLogger};

/// Prelude module for convenient imports.
///
/// ```rust
/// use sharedbreaker::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backends::{with_in_memory_backend, InMemoryBackend};
    pub use crate::circuit_breaker::{
        with_allow_after, with_circuit_specific_error_matcher, with_close_threshold,
        with_cyclic_clear_after, with_failure_count_threshold, with_fallback_error_matcher,
        with_logger, with_name_fn, with_state_change_callback, with_storage_backend,
        with_trip_fn, CircuitBreaker, CircuitBreakerFactory, Execution, FactorySettings,
        SettingsOption,
    };
    pub use crate::core::{
        wrap_expected, BackendError, CircuitContext, CircuitError, CircuitInformation,
        CircuitState, ExecutionStatus, ExpectedCondition, IsExpected, LockHandle, SettingsError,
        StorageBackend,
    };
    pub use crate::logging::{Logger, NoopLogger, TracingLogger};
}
