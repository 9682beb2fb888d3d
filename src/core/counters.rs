//! Request and outcome counters for a single breaker generation.

use crate::core::information::CircuitInformation;

/// Accumulates request and outcome counts for the current generation.
///
/// `total` counts admitted requests, so it runs ahead of
/// `total_successes + total_failures` while a request is in flight. At most
/// one of the consecutive counters is non-zero at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Failures since the last success.
    pub consecutive_failures: u64,
    /// Successes since the last failure.
    pub consecutive_successes: u64,
    /// Admitted requests.
    pub total: u64,
    /// Completed requests classified as failed.
    pub total_failures: u64,
    /// Completed requests classified as succeeded.
    pub total_successes: u64,
}

impl Counters {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an admitted request.
    pub fn add_request(&mut self) {
        self.total = self.total.saturating_add(1);
    }

    /// Records a success, ending any failure streak.
    pub fn add_success(&mut self) {
        self.consecutive_failures = 0;
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.total_successes = self.total_successes.saturating_add(1);
    }

    /// Records a failure, ending any success streak.
    pub fn add_failure(&mut self) {
        self.consecutive_successes = 0;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.total_failures = self.total_failures.saturating_add(1);
    }

    /// Clears every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns the number of requests whose outcome has been recorded.
    pub fn completed(&self) -> u64 {
        self.total_successes.saturating_add(self.total_failures)
    }
}

impl From<&CircuitInformation> for Counters {
    fn from(info: &CircuitInformation) -> Self {
        Self {
            consecutive_failures: info.consecutive_failures,
            consecutive_successes: info.consecutive_successes,
            total: info.total,
            total_failures: info.total_failures,
            total_successes: info.total_successes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_request_runs_ahead_of_outcomes() {
        let mut counters = Counters::new();
        counters.add_request();
        counters.add_request();
        counters.add_success();

        assert_eq!(counters.total, 2);
        assert_eq!(counters.completed(), 1);
    }

    #[test]
    fn test_streaks_reset_each_other() {
        let mut counters = Counters::new();
        counters.add_failure();
        counters.add_failure();
        assert_eq!(counters.consecutive_failures, 2);

        counters.add_success();
        assert_eq!(counters.consecutive_failures, 0);
        assert_eq!(counters.consecutive_successes, 1);
        assert_eq!(counters.total_failures, 2);

        counters.add_failure();
        assert_eq!(counters.consecutive_successes, 0);
        assert_eq!(counters.consecutive_failures, 1);
        assert_eq!(counters.total_successes, 1);
    }

    #[test]
    fn test_reset() {
        let mut counters = Counters {
            consecutive_failures: 3,
            consecutive_successes: 0,
            total: 4,
            total_failures: 3,
            total_successes: 1,
        };
        counters.reset();
        assert_eq!(counters, Counters::default());
    }

    #[test]
    fn test_counters_saturate_at_max() {
        let mut counters = Counters {
            consecutive_failures: u64::MAX,
            consecutive_successes: u64::MAX,
            total: u64::MAX,
            total_failures: u64::MAX,
            total_successes: u64::MAX,
        };
        counters.add_request();
        counters.add_success();
        counters.add_failure();

        assert_eq!(counters.total, u64::MAX);
        assert_eq!(counters.total_successes, u64::MAX);
        assert_eq!(counters.consecutive_failures, u64::MAX);
        assert_eq!(counters.completed(), u64::MAX);
    }
}
