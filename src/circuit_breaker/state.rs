//! Circuit breaker state machine.
//!
//! A [`Snapshot`] is the breaker's working copy of one remote
//! [`CircuitInformation`]. All transition and expiry rules live here; the
//! breaker itself only moves snapshots between the backend and this module.

use crate::core::information::deadline;
use crate::core::{CircuitInformation, CircuitState, Counters};

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Thresholds and durations that drive transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Limits {
    /// Passed to the trip function after every closed-state failure.
    pub failure_count_threshold: u64,
    /// Half-open admissions per generation, and successes needed to close.
    pub close_threshold: u64,
    /// How long the circuit stays open.
    pub allow_after: Duration,
    /// Period of cyclic counter clearing while closed; zero disables it.
    pub cyclic_clear_after: Duration,
}

impl Limits {
    fn closed_expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.cyclic_clear_after.is_zero() {
            None
        } else {
            Some(deadline(now, self.cyclic_clear_after))
        }
    }

    fn open_expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        Some(deadline(now, self.allow_after))
    }
}

/// A state change that actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// What reconciling a freshly loaded snapshot changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Reconciled {
    pub transition: Option<Transition>,
    pub new_generation: bool,
}

impl Reconciled {
    pub fn changed(&self) -> bool {
        self.transition.is_some() || self.new_generation
    }
}

/// Why admission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejection {
    Open { retry_after: Option<DateTime<Utc>> },
    TooManyRequests,
}

/// The breaker's working copy of its remote state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Snapshot {
    pub state: CircuitState,
    pub generation: u64,
    pub counters: Counters,
    pub expiry: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Loads a remote record. A record never written by any breaker gets a
    /// fresh cyclic-clear expiry.
    pub fn load(info: &CircuitInformation, now: DateTime<Utc>, limits: &Limits) -> Self {
        let expiry = if info.is_pristine() {
            limits.closed_expiry(now)
        } else {
            info.expires_after
        };
        Self {
            state: info.state,
            generation: info.generation,
            counters: info.counters(),
            expiry,
        }
    }

    /// Applies time-based rules: cyclic clearing while closed, and the
    /// open to half-open move once the open period is over.
    pub fn reconcile(&mut self, now: DateTime<Utc>, limits: &Limits) -> Reconciled {
        match self.state {
            CircuitState::Closed if self.expiry.is_some_and(|at| at < now) => {
                self.new_generation(now, limits);
                Reconciled {
                    transition: None,
                    new_generation: true,
                }
            }
            CircuitState::Open if self.expiry.map_or(true, |at| at < now) => Reconciled {
                transition: self.transition(CircuitState::HalfOpen, now, limits),
                new_generation: false,
            },
            _ => Reconciled::default(),
        }
    }

    /// Admits one request, or explains why not.
    pub fn admit(&mut self, limits: &Limits) -> Result<(), Rejection> {
        match self.state {
            CircuitState::Open => Err(Rejection::Open {
                retry_after: self.expiry,
            }),
            CircuitState::HalfOpen if self.counters.total >= limits.close_threshold => {
                Err(Rejection::TooManyRequests)
            }
            _ => {
                self.counters.add_request();
                Ok(())
            }
        }
    }

    /// Records a successful execution.
    pub fn record_success(&mut self, now: DateTime<Utc>, limits: &Limits) -> Option<Transition> {
        match self.state {
            CircuitState::Closed => {
                self.counters.add_success();
                None
            }
            CircuitState::HalfOpen => {
                self.counters.add_success();
                if self.counters.consecutive_successes >= limits.close_threshold {
                    self.transition(CircuitState::Closed, now, limits)
                } else {
                    None
                }
            }
            CircuitState::Open => None,
        }
    }

    /// Records a failed execution. `trips` sees the post-failure record and
    /// decides whether a closed circuit opens.
    pub fn record_failure(
        &mut self,
        now: DateTime<Utc>,
        limits: &Limits,
        trips: impl FnOnce(&CircuitInformation) -> bool,
    ) -> Option<Transition> {
        match self.state {
            CircuitState::Closed => {
                self.counters.add_failure();
                if trips(&self.information()) {
                    self.transition(CircuitState::Open, now, limits)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => self.transition(CircuitState::Open, now, limits),
            CircuitState::Open => None,
        }
    }

    /// Moves to `to`, applying the expiry and generation side effects.
    /// Returns `None` when already in `to`.
    pub fn transition(
        &mut self,
        to: CircuitState,
        now: DateTime<Utc>,
        limits: &Limits,
    ) -> Option<Transition> {
        let from = self.state;
        if from == to {
            return None;
        }
        self.state = to;

        match to {
            CircuitState::Closed => self.new_generation(now, limits),
            CircuitState::Open => {
                // Probation counts for the coming half-open period start at zero.
                self.counters.reset();
                self.expiry = limits.open_expiry(now);
            }
            CircuitState::HalfOpen => self.expiry = None,
        }

        Some(Transition { from, to })
    }

    /// Starts a fresh counting cycle in the current state.
    pub fn new_generation(&mut self, now: DateTime<Utc>, limits: &Limits) {
        self.generation = self.generation.saturating_add(1);
        self.counters.reset();
        self.expiry = match self.state {
            CircuitState::Closed => limits.closed_expiry(now),
            CircuitState::Open => limits.open_expiry(now),
            CircuitState::HalfOpen => None,
        };
    }

    /// Returns the persisted form of this snapshot.
    pub fn information(&self) -> CircuitInformation {
        CircuitInformation::from_parts(self.state, self.generation, &self.counters, self.expiry)
    }
}
