//! Factory settings and the option functions that build them.
//!
//! Settings are assembled from a list of [`SettingsOption`]s. Each option
//! configures exactly one setting; applying two options for the same setting
//! fails with [`SettingsError::Conflict`] instead of silently overriding.
//! The open duration and cyclic clear period are the exception and always
//! take the last value given.

use crate::circuit_breaker::policy::{
    default_error_matcher, default_name_fn, default_trip_fn, ErrorMatcherFn, NameFn,
    StateChangeFn, TripFn,
};
use crate::circuit_breaker::state::Limits;
use crate::core::{
    ArcBackend, CircuitContext, CircuitInformation, CircuitState, ExecutionStatus, SettingsError,
    StorageBackend,
};
use crate::logging::{ArcLogger, Logger, NoopLogger};

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Close threshold used when none is configured.
pub const DEFAULT_CLOSE_THRESHOLD: u64 = 1;

type ApplyFn = Box<dyn FnOnce(&mut FactorySettings) -> Result<(), SettingsError> + Send>;

/// One configuration step applied to [`FactorySettings`].
pub struct SettingsOption {
    apply: ApplyFn,
}

impl SettingsOption {
    /// Wraps a custom configuration step.
    pub fn new<F>(apply: F) -> Self
    where
        F: FnOnce(&mut FactorySettings) -> Result<(), SettingsError> + Send + 'static,
    {
        Self {
            apply: Box::new(apply),
        }
    }

    fn apply(self, settings: &mut FactorySettings) -> Result<(), SettingsError> {
        (self.apply)(settings)
    }
}

impl fmt::Debug for SettingsOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsOption").finish_non_exhaustive()
    }
}

/// Shared configuration for every breaker produced by a factory.
#[derive(Clone, Default)]
pub struct FactorySettings {
    storage_backend: Option<ArcBackend>,
    name_fn: Option<NameFn>,
    fallback_error_matcher: Option<ErrorMatcherFn>,
    circuit_specific_error_matchers: HashMap<String, ErrorMatcherFn>,
    failure_count_threshold: Option<u64>,
    close_threshold: Option<u64>,
    allow_after: Duration,
    cyclic_clear_after: Duration,
    state_change_callback: Option<StateChangeFn>,
    trip_fn: Option<TripFn>,
    logger: Option<ArcLogger>,
}

impl FactorySettings {
    /// Applies `options` in order to empty settings.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an option, typically a conflict.
    pub fn new(options: impl IntoIterator<Item = SettingsOption>) -> Result<Self, SettingsError> {
        let mut settings = Self::default();
        for option in options {
            option.apply(&mut settings)?;
        }
        Ok(settings)
    }

    /// Returns the storage backend, if configured.
    pub fn storage_backend(&self) -> Option<&ArcBackend> {
        self.storage_backend.as_ref()
    }

    /// Failure count threshold passed to the trip function; zero when unset.
    pub fn failure_count_threshold(&self) -> u64 {
        self.failure_count_threshold.unwrap_or(0)
    }

    /// Half-open admissions and consecutive successes needed to close.
    ///
    /// Never zero; a configured zero is treated as one.
    pub fn close_threshold(&self) -> u64 {
        self.close_threshold.unwrap_or(DEFAULT_CLOSE_THRESHOLD).max(1)
    }

    /// How long an open circuit rejects work.
    pub fn allow_after(&self) -> Duration {
        self.allow_after
    }

    /// Period of cyclic counter clearing; `None` when disabled.
    pub fn cyclic_clear_after(&self) -> Option<Duration> {
        Some(self.cyclic_clear_after).filter(|d| !d.is_zero())
    }

    /// Returns the configured logger or a [`NoopLogger`].
    pub fn logger(&self) -> ArcLogger {
        self.logger
            .clone()
            .unwrap_or_else(|| Arc::new(NoopLogger::new()) as ArcLogger)
    }

    /// Returns the state change callback, if configured.
    pub fn state_change_callback(&self) -> Option<&StateChangeFn> {
        self.state_change_callback.as_ref()
    }

    /// Computes the storage key for a logical circuit and its context.
    pub fn generate_name(&self, circuit: &str, ctx: &CircuitContext) -> String {
        match &self.name_fn {
            Some(name_fn) => name_fn(circuit, ctx),
            None => default_name_fn(circuit, ctx),
        }
    }

    /// Resolves the error matcher for a logical circuit.
    ///
    /// Circuit-specific matchers win over the fallback matcher, which wins
    /// over [`default_error_matcher`].
    pub fn error_matcher_for(&self, circuit: &str) -> ErrorMatcherFn {
        self.circuit_specific_error_matchers
            .get(circuit)
            .or(self.fallback_error_matcher.as_ref())
            .cloned()
            .unwrap_or_else(|| Arc::new(default_error_matcher) as ErrorMatcherFn)
    }

    /// Returns the trip function or [`default_trip_fn`].
    pub fn trip_fn(&self) -> TripFn {
        self.trip_fn
            .clone()
            .unwrap_or_else(|| Arc::new(default_trip_fn) as TripFn)
    }

    pub(crate) fn limits(&self) -> Limits {
        Limits {
            failure_count_threshold: self.failure_count_threshold(),
            close_threshold: self.close_threshold(),
            allow_after: self.allow_after,
            cyclic_clear_after: self.cyclic_clear_after,
        }
    }
}

impl fmt::Debug for FactorySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactorySettings")
            .field("storage_backend", &self.storage_backend)
            .field("name_fn", &self.name_fn.is_some())
            .field("fallback_error_matcher", &self.fallback_error_matcher.is_some())
            .field(
                "circuit_specific_error_matchers",
                &self.circuit_specific_error_matchers.keys().collect::<Vec<_>>(),
            )
            .field("failure_count_threshold", &self.failure_count_threshold)
            .field("close_threshold", &self.close_threshold)
            .field("allow_after", &self.allow_after)
            .field("cyclic_clear_after", &self.cyclic_clear_after)
            .field("state_change_callback", &self.state_change_callback.is_some())
            .field("trip_fn", &self.trip_fn.is_some())
            .field("logger", &self.logger)
            .finish()
    }
}

fn set_once<T>(slot: &mut Option<T>, setting: &'static str, value: T) -> Result<(), SettingsError> {
    if slot.is_some() {
        return Err(SettingsError::conflict(setting));
    }
    *slot = Some(value);
    Ok(())
}

/// Uses `backend` to store circuit information and locks.
pub fn with_storage_backend(backend: impl StorageBackend + 'static) -> SettingsOption {
    with_shared_storage_backend(Arc::new(backend))
}

/// Uses an already shared backend.
pub fn with_shared_storage_backend(backend: ArcBackend) -> SettingsOption {
    SettingsOption::new(move |s| set_once(&mut s.storage_backend, "StorageBackend", backend))
}

/// Derives storage keys with `f` instead of the logical circuit name.
pub fn with_name_fn<F>(f: F) -> SettingsOption
where
    F: Fn(&str, &CircuitContext) -> String + Send + Sync + 'static,
{
    SettingsOption::new(move |s| set_once(&mut s.name_fn, "NameFn", Arc::new(f) as NameFn))
}

/// Explicitly selects [`default_name_fn`].
pub fn with_default_name_fn() -> SettingsOption {
    with_name_fn(default_name_fn)
}

/// Classifies work errors of every circuit without a specific matcher.
pub fn with_fallback_error_matcher<F>(f: F) -> SettingsOption
where
    F: Fn(Option<&(dyn StdError + 'static)>) -> ExecutionStatus + Send + Sync + 'static,
{
    SettingsOption::new(move |s| {
        set_once(
            &mut s.fallback_error_matcher,
            "FallbackErrorMatcher",
            Arc::new(f) as ErrorMatcherFn,
        )
    })
}

/// Explicitly selects [`default_error_matcher`] as the fallback.
pub fn with_default_fallback_error_matcher() -> SettingsOption {
    with_fallback_error_matcher(default_error_matcher)
}

/// Classifies work errors of the logical circuit `circuit` only.
pub fn with_circuit_specific_error_matcher<F>(circuit: impl Into<String>, f: F) -> SettingsOption
where
    F: Fn(Option<&(dyn StdError + 'static)>) -> ExecutionStatus + Send + Sync + 'static,
{
    let circuit = circuit.into();
    SettingsOption::new(move |s| {
        if s.circuit_specific_error_matchers.contains_key(&circuit) {
            return Err(SettingsError::CircuitSpecificConflict {
                setting: "CircuitSpecificErrorMatcher",
                circuit,
            });
        }
        s.circuit_specific_error_matchers
            .insert(circuit, Arc::new(f) as ErrorMatcherFn);
        Ok(())
    })
}

/// Sets the threshold handed to the trip function.
pub fn with_failure_count_threshold(threshold: u64) -> SettingsOption {
    SettingsOption::new(move |s| {
        set_once(&mut s.failure_count_threshold, "FailureCountThreshold", threshold)
    })
}

/// Sets how many half-open probes are admitted and must succeed to close.
pub fn with_close_threshold(threshold: u64) -> SettingsOption {
    SettingsOption::new(move |s| set_once(&mut s.close_threshold, "CloseThreshold", threshold))
}

/// Sets how long the circuit stays open.
pub fn with_allow_after(allow_after: Duration) -> SettingsOption {
    SettingsOption::new(move |s| {
        s.allow_after = allow_after;
        Ok(())
    })
}

/// Clears closed-state counters every `period`; zero disables clearing.
pub fn with_cyclic_clear_after(period: Duration) -> SettingsOption {
    SettingsOption::new(move |s| {
        s.cyclic_clear_after = period;
        Ok(())
    })
}

/// Calls `f` on every state transition observed while holding the lock.
pub fn with_state_change_callback<F>(f: F) -> SettingsOption
where
    F: Fn(&str, &CircuitContext, CircuitState, CircuitState) + Send + Sync + 'static,
{
    SettingsOption::new(move |s| {
        set_once(
            &mut s.state_change_callback,
            "StateChangeCallback",
            Arc::new(f) as StateChangeFn,
        )
    })
}

/// Decides with `f` whether a closed circuit opens after a failure.
pub fn with_trip_fn<F>(f: F) -> SettingsOption
where
    F: Fn(&str, u64, &CircuitInformation) -> bool + Send + Sync + 'static,
{
    SettingsOption::new(move |s| set_once(&mut s.trip_fn, "WillTripCircuit", Arc::new(f) as TripFn))
}

/// Explicitly selects [`default_trip_fn`].
pub fn with_default_trip_fn() -> SettingsOption {
    with_trip_fn(default_trip_fn)
}

/// Logs breaker activity through `logger`.
pub fn with_logger(logger: impl Logger + 'static) -> SettingsOption {
    let logger: ArcLogger = Arc::new(logger);
    SettingsOption::new(move |s| set_once(&mut s.logger, "Logger", logger))
}
