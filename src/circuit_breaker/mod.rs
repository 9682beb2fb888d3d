//! Distributed circuit breaker.
//!
//! The circuit breaker pattern prevents cascading failures by temporarily
//! stopping traffic to a failing dependency and periodically probing it to
//! detect recovery. Here the circuit's state lives in a storage backend, so
//! every process calling the same dependency trips and recovers together.
//!
//! ## States
//!
//! - **Closed**: Normal operation; work passes through.
//! - **Open**: The dependency is failing; work is rejected immediately.
//! - **Half-Open**: A bounded number of probes decide whether to close.
//!
//! ## Usage
//!
//! ```rust
//! use sharedbreaker::backends::with_in_memory_backend;
//! use sharedbreaker::circuit_breaker::{
//!     with_allow_after, with_failure_count_threshold, CircuitBreakerFactory,
//! };
//! use sharedbreaker::core::CircuitContext;
//! use std::time::Duration;
//!
//! let factory = CircuitBreakerFactory::from_options([
//!     with_in_memory_backend(),
//!     with_failure_count_threshold(5),
//!     with_allow_after(Duration::from_secs(30)),
//! ])
//! .unwrap();
//!
//! let breaker = factory.breaker_for("payments", CircuitContext::new());
//! assert_eq!(breaker.name(), "payments");
//! ```

mod breaker;
mod config;
mod factory;
mod policy;
mod state;

pub use breaker::{CircuitBreaker, Execution};
pub use config::{
    with_allow_after, with_circuit_specific_error_matcher, with_close_threshold,
    with_cyclic_clear_after, with_default_fallback_error_matcher, with_default_name_fn,
    with_default_trip_fn, with_failure_count_threshold, with_fallback_error_matcher, with_logger,
    with_name_fn, with_shared_storage_backend, with_state_change_callback, with_storage_backend,
    with_trip_fn, FactorySettings, SettingsOption, DEFAULT_CLOSE_THRESHOLD,
};
pub use factory::CircuitBreakerFactory;
pub use policy::{
    capability_matcher, default_error_matcher, default_name_fn, default_trip_fn,
    is_expected_condition, ErrorMatcherFn, NameFn, StateChangeFn, TripFn,
};
