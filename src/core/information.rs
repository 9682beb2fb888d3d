//! The persisted snapshot of a circuit breaker.
//!
//! [`CircuitInformation`] is the only thing a storage backend ever sees. Its
//! JSON form is stable: field names are snake_case, the state is an integer
//! and an unset expiry is written as the zero timestamp
//! `0001-01-01T00:00:00Z` so records written by other implementations of the
//! same format decode unchanged.

use crate::core::counters::Counters;
use crate::core::types::CircuitState;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The complete externally persisted state of one circuit breaker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitInformation {
    /// Current state of the circuit.
    pub state: CircuitState,

    /// Counting cycle of the circuit; advanced on cyclic clears and on
    /// half-open to closed transitions.
    pub generation: u64,

    /// Failures since the last success.
    pub consecutive_failures: u64,

    /// Successes since the last failure.
    pub consecutive_successes: u64,

    /// Admitted requests in this generation.
    pub total: u64,

    /// Failed requests in this generation.
    pub total_failures: u64,

    /// Successful requests in this generation.
    pub total_successes: u64,

    /// When closed, the time the counters are cyclically cleared; when open,
    /// the time the circuit may move to half-open. `None` when unset.
    #[serde(with = "zero_time")]
    pub expires_after: Option<DateTime<Utc>>,
}

impl CircuitInformation {
    /// Creates a closed record that expires `expires_in` from now.
    pub fn new_expiring(expires_in: Duration) -> Self {
        Self {
            expires_after: Some(deadline(Utc::now(), expires_in)),
            ..Self::default()
        }
    }

    /// Builds a record from counters and the remaining breaker fields.
    pub fn from_parts(
        state: CircuitState,
        generation: u64,
        counters: &Counters,
        expires_after: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            state,
            generation,
            consecutive_failures: counters.consecutive_failures,
            consecutive_successes: counters.consecutive_successes,
            total: counters.total,
            total_failures: counters.total_failures,
            total_successes: counters.total_successes,
            expires_after,
        }
    }

    /// Returns the counters carried by this record.
    pub fn counters(&self) -> Counters {
        Counters::from(self)
    }

    /// Returns `true` if this record has never been written by a breaker.
    pub fn is_pristine(&self) -> bool {
        self.expires_after.is_none() && self.generation == 0 && self.total == 0
    }

    /// Returns `true` if the expiry is set and lies before `now`.
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_after.is_some_and(|at| at < now)
    }
}

/// Adds a std duration to a timestamp, saturating at the maximum timestamp.
pub(crate) fn deadline(now: DateTime<Utc>, after: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(after)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Serde adapter mapping `None` to and from the zero timestamp.
mod zero_time {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// `0001-01-01T00:00:00Z`.
    pub(super) const ZERO: &str = "0001-01-01T00:00:00Z";

    /// Unix seconds of [`ZERO`].
    const ZERO_UNIX_SECONDS: i64 = -62_135_596_800;

    pub(super) fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(at) => serde::Serialize::serialize(at, serializer),
            None => serializer.serialize_str(ZERO),
        }
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let at = Option::<DateTime<Utc>>::deserialize(deserializer)?;
        Ok(at.filter(|at| !(at.timestamp() == ZERO_UNIX_SECONDS && at.timestamp_subsec_nanos() == 0)))
    }
}
