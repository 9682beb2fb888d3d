//! Core types and traits for the sharedbreaker library.
//!
//! This module provides the fundamental building blocks used throughout
//! the library:
//!
//! - [`types`] - Circuit state, execution status and the context map
//! - [`information`] - The persisted `CircuitInformation` record
//! - [`counters`] - Per-generation request and outcome counters
//! - [`traits`] - The `StorageBackend` and `LockHandle` traits
//! - [`error`] - Structured error types

pub mod counters;
pub mod error;
pub mod information;
pub mod traits;
pub mod types;

// Re-export commonly used types at the core level
pub use counters::Counters;
pub use error::{
    wrap_expected, BackendError, BackendResult, CircuitError, CircuitResult, ExpectedCondition,
    IsExpected, SettingsError, SettingsResult,
};
pub use information::CircuitInformation;
pub use traits::{ArcBackend, LockHandle, StorageBackend};
pub use types::{CircuitContext, CircuitState, ExecutionStatus, InvalidCircuitState};
