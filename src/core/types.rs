//! Core types used throughout the sharedbreaker library.
//!
//! This module defines the circuit state tag, the execution status produced
//! by error matchers, and the context map handed to naming and state-change
//! policies.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Arbitrary key/value context bound to a circuit breaker.
///
/// The context is passed to the naming function and to the state-change
/// callback so that callers can, for example, derive per-tenant breaker
/// names from a shared logical circuit.
pub type CircuitContext = HashMap<String, serde_json::Value>;

/// The state of a circuit breaker.
///
/// The state is persisted as a small unsigned integer: `0` for closed, `1`
/// for open and `2` for half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CircuitState {
    /// Requests are admitted and outcomes count toward the trip threshold.
    #[default]
    Closed,

    /// Requests are rejected until the open period expires.
    Open,

    /// A bounded number of probe requests are admitted.
    HalfOpen,
}

impl CircuitState {
    /// Returns `true` if the circuit is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns `true` if the circuit is open.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` if the circuit is half-open.
    pub fn is_half_open(&self) -> bool {
        matches!(self, Self::HalfOpen)
    }

    /// Returns the name of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<CircuitState> for u8 {
    fn from(state: CircuitState) -> Self {
        match state {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

impl TryFrom<u8> for CircuitState {
    type Error = InvalidCircuitState;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Closed),
            1 => Ok(Self::Open),
            2 => Ok(Self::HalfOpen),
            other => Err(InvalidCircuitState(other)),
        }
    }
}

/// Returned when a persisted state value does not name a known state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid-state: {0}")]
pub struct InvalidCircuitState(pub u8);

/// The classification of a unit of work's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionStatus {
    /// The work succeeded, or failed in an expected way.
    Succeeded,
    /// The work failed and counts against the circuit.
    Failed,
}

impl ExecutionStatus {
    /// Returns `true` if the execution counts as a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "execution succeeded"),
            Self::Failed => write!(f, "execution failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(CircuitState::Closed.to_string(), "closed");
        assert_eq!(CircuitState::Open.to_string(), "open");
        assert_eq!(CircuitState::HalfOpen.to_string(), "half-open");
        assert!(CircuitState::default().is_closed());
    }

    #[test]
    fn test_state_integer_encoding() {
        assert_eq!(u8::from(CircuitState::HalfOpen), 2);
        assert_eq!(CircuitState::try_from(1), Ok(CircuitState::Open));

        let err = CircuitState::try_from(7).unwrap_err();
        assert_eq!(err.to_string(), "invalid-state: 7");

        assert_eq!(serde_json::to_string(&CircuitState::Open).unwrap(), "1");
        assert!(serde_json::from_str::<CircuitState>("3").is_err());
    }

    #[test]
    fn test_execution_status_display() {
        assert_eq!(ExecutionStatus::Succeeded.to_string(), "execution succeeded");
        assert_eq!(ExecutionStatus::Failed.to_string(), "execution failed");
        assert!(!ExecutionStatus::Failed.is_success());
    }
}
