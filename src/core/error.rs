//! Error types for the sharedbreaker library.
//!
//! This module provides structured, typed errors for all failure scenarios.
//! The library never panics; all errors are returned as `Result` values.
//!
//! Errors fall into three families:
//!
//! - [`CircuitError`] - admission rejections and backend failures surfaced
//!   by a running circuit breaker
//! - [`BackendError`] - failures reported by a storage backend
//! - [`SettingsError`] - conflicts detected while building settings
//!
//! The error returned by protected work is never converted into any of
//! these; it is only classified and handed back unchanged.

use chrono::{DateTime, Utc};
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by a circuit breaker while admitting or recording work.
#[derive(Debug, Error)]
pub enum CircuitError {
    /// The breaker already holds the lock for an in-flight unit of work.
    #[error("circuit breaker '{name}' has already been started and is executing")]
    AlreadyStarted {
        /// Name of the circuit breaker.
        name: String,
    },

    /// `end` was called without a successful `start`.
    #[error("circuit breaker '{name}' has not been started")]
    NotStarted {
        /// Name of the circuit breaker.
        name: String,
    },

    /// The circuit is open and rejects work.
    #[error("circuit breaker '{name}' is open")]
    Open {
        /// Name of the circuit breaker.
        name: String,
        /// When the circuit becomes eligible for half-open probing, if known.
        retry_after: Option<DateTime<Utc>>,
    },

    /// The half-open probation slots of this generation are used up.
    #[error("too many requests with circuit breaker '{name}' in the half-open state")]
    TooManyRequests {
        /// Name of the circuit breaker.
        name: String,
    },

    /// The distributed lock could not be acquired.
    #[error("cannot start circuit breaker for {name} due to: {source}")]
    Lock {
        /// Name of the circuit breaker.
        name: String,
        /// The backend failure.
        #[source]
        source: BackendError,
    },

    /// The remote snapshot could not be read.
    #[error("cannot retrieve state of circuit breaker {name}: {source}")]
    Retrieve {
        /// Name of the circuit breaker.
        name: String,
        /// The backend failure.
        #[source]
        source: BackendError,
    },

    /// The snapshot could not be persisted.
    #[error("cannot store state of circuit breaker {name}: {source}")]
    Store {
        /// Name of the circuit breaker.
        name: String,
        /// The backend failure.
        #[source]
        source: BackendError,
    },

    /// The distributed lock could not be released cleanly.
    #[error("cannot release lock of circuit breaker {name}: {source}")]
    Unlock {
        /// Name of the circuit breaker.
        name: String,
        /// The backend failure.
        #[source]
        source: BackendError,
    },
}

impl CircuitError {
    /// Returns `true` if the work was rejected by the circuit itself.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Open { .. } | Self::TooManyRequests { .. } | Self::AlreadyStarted { .. }
        )
    }

    /// Returns `true` if the caller may retry later.
    ///
    /// Every circuit error is recoverable except misuse of the start/end
    /// protocol.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::NotStarted { .. })
    }

    /// Returns the underlying backend error, if any.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Self::Lock { source, .. }
            | Self::Retrieve { source, .. }
            | Self::Store { source, .. }
            | Self::Unlock { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns the name of the circuit breaker this error belongs to.
    pub fn name(&self) -> &str {
        match self {
            Self::AlreadyStarted { name }
            | Self::NotStarted { name }
            | Self::Open { name, .. }
            | Self::TooManyRequests { name }
            | Self::Lock { name, .. }
            | Self::Retrieve { name, .. }
            | Self::Store { name, .. }
            | Self::Unlock { name, .. } => name,
        }
    }
}

/// Errors reported by a storage backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be reached or refused the operation.
    #[error("backend unavailable: {reason}")]
    Unavailable {
        /// Human-readable reason.
        reason: String,
    },

    /// The lock is held elsewhere and the backend does not wait.
    #[error("lock for '{name}' is held by another owner")]
    LockUnavailable {
        /// Name of the circuit breaker.
        name: String,
    },

    /// Waiting for the lock exceeded the backend's own timeout.
    #[error("timed out after {elapsed:?} waiting for lock on '{name}'")]
    LockTimeout {
        /// Name of the circuit breaker.
        name: String,
        /// How long acquisition waited.
        elapsed: Duration,
    },

    /// The lock expired or was taken over before it was released.
    #[error("lock for '{name}' was lost before release")]
    LockLost {
        /// Name of the circuit breaker.
        name: String,
    },

    /// A record could not be encoded or decoded.
    #[error("cannot encode or decode circuit information: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A Redis command failed.
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl BackendError {
    /// Creates an `Unavailable` error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the failure concerns lock acquisition or release.
    pub fn is_lock_failure(&self) -> bool {
        matches!(
            self,
            Self::LockUnavailable { .. } | Self::LockTimeout { .. } | Self::LockLost { .. }
        )
    }
}

/// Errors raised while building [`FactorySettings`](crate::FactorySettings).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// A setting was configured twice.
    #[error("{setting} setting has already been configured via an option function, refusing to override")]
    Conflict {
        /// Name of the setting.
        setting: &'static str,
    },

    /// A per-circuit setting was configured twice for the same circuit.
    #[error("{setting} already registered for {circuit}: setting has already been configured via an option function, refusing to override")]
    CircuitSpecificConflict {
        /// Name of the setting.
        setting: &'static str,
        /// Name of the circuit.
        circuit: String,
    },

    /// A factory was requested from settings without a storage backend.
    #[error("no storage backend configured")]
    MissingStorageBackend,

    /// A backend could not be provisioned while applying an option.
    #[error("could not provision storage backend: {reason}")]
    ProvisioningStorageBackend {
        /// Human-readable reason.
        reason: String,
    },
}

impl SettingsError {
    /// Creates a `Conflict` error.
    pub fn conflict(setting: &'static str) -> Self {
        Self::Conflict { setting }
    }

    /// Returns `true` if this error reports an option applied twice.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::CircuitSpecificConflict { .. }
        )
    }

    /// Returns the name of the conflicting setting, if any.
    pub fn setting(&self) -> Option<&'static str> {
        match self {
            Self::Conflict { setting } | Self::CircuitSpecificConflict { setting, .. } => {
                Some(setting)
            }
            _ => None,
        }
    }
}

/// Capability for error types that know whether they are expected.
///
/// An expected error is returned to the caller as usual but does not count
/// as a failure against the circuit. See
/// [`capability_matcher`](crate::circuit_breaker::capability_matcher) for
/// wiring a custom type into the error matcher.
pub trait IsExpected {
    /// Returns `true` if the error is an expected condition.
    fn is_expected(&self) -> bool;
}

/// Wraps an error to mark it as an expected condition.
///
/// The default error matcher treats any error whose source chain contains an
/// `ExpectedCondition` as a successful execution.
#[derive(Debug, Error)]
#[error("{inner}")]
pub struct ExpectedCondition {
    #[source]
    inner: Box<dyn StdError + Send + Sync + 'static>,
}

impl ExpectedCondition {
    /// Wraps `err` as an expected condition.
    pub fn new(err: impl Into<Box<dyn StdError + Send + Sync + 'static>>) -> Self {
        Self { inner: err.into() }
    }

    /// Returns the wrapped error.
    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.inner.as_ref()
    }

    /// Unwraps the wrapped error.
    pub fn into_inner(self) -> Box<dyn StdError + Send + Sync + 'static> {
        self.inner
    }
}

impl IsExpected for ExpectedCondition {
    fn is_expected(&self) -> bool {
        true
    }
}

/// Wraps `err` so it does not count as a failure.
pub fn wrap_expected(err: impl Into<Box<dyn StdError + Send + Sync + 'static>>) -> ExpectedCondition {
    ExpectedCondition::new(err)
}

/// A specialized `Result` type for circuit operations.
pub type CircuitResult<T> = Result<T, CircuitError>;

/// A specialized `Result` type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// A specialized `Result` type for settings construction.
pub type SettingsResult<T> = Result<T, SettingsError>;
