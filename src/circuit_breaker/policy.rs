//! Pluggable policies and their defaults.
//!
//! Every policy is a shared closure so settings can be cloned into each
//! breaker cheaply.

use crate::core::{
    CircuitContext, CircuitInformation, CircuitState, ExecutionStatus, ExpectedCondition,
    IsExpected,
};

use std::error::Error as StdError;
use std::sync::Arc;

/// Maps a logical circuit name and its context to the storage key.
pub type NameFn = Arc<dyn Fn(&str, &CircuitContext) -> String + Send + Sync>;

/// Classifies the error returned by protected work.
pub type ErrorMatcherFn =
    Arc<dyn Fn(Option<&(dyn StdError + 'static)>) -> ExecutionStatus + Send + Sync>;

/// Decides whether a closed circuit opens after a failure.
///
/// Receives the generated circuit name, the configured failure count
/// threshold and the record including the failure just counted.
pub type TripFn = Arc<dyn Fn(&str, u64, &CircuitInformation) -> bool + Send + Sync>;

/// Observes state transitions: generated name, context, old state, new state.
pub type StateChangeFn =
    Arc<dyn Fn(&str, &CircuitContext, CircuitState, CircuitState) + Send + Sync>;

/// Uses the logical circuit name unchanged.
pub fn default_name_fn(circuit: &str, _ctx: &CircuitContext) -> String {
    circuit.to_string()
}

/// Opens once consecutive failures exceed the threshold.
pub fn default_trip_fn(_name: &str, threshold: u64, info: &CircuitInformation) -> bool {
    info.consecutive_failures > threshold
}

/// Treats any error as a failure unless it is marked as expected.
///
/// An error counts as expected when it, or any error in its source chain,
/// is an [`ExpectedCondition`].
pub fn default_error_matcher(err: Option<&(dyn StdError + 'static)>) -> ExecutionStatus {
    match err {
        None => ExecutionStatus::Succeeded,
        Some(err) if is_expected_condition(err) => ExecutionStatus::Succeeded,
        Some(_) => ExecutionStatus::Failed,
    }
}

/// Returns `true` if `err` or one of its sources is an [`ExpectedCondition`].
pub fn is_expected_condition(err: &(dyn StdError + 'static)) -> bool {
    source_chain(err).any(|link| link.is::<ExpectedCondition>())
}

/// Builds a matcher that asks errors of type `E` whether they are expected.
///
/// Links of the source chain that downcast to `E` are consulted through
/// [`IsExpected`]; anything else falls through to
/// [`default_error_matcher`].
///
/// # Example
///
/// ```rust
/// use sharedbreaker::circuit_breaker::capability_matcher;
/// use sharedbreaker::core::{ExecutionStatus, IsExpected};
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("row not found")]
/// struct NotFound;
///
/// impl IsExpected for NotFound {
///     fn is_expected(&self) -> bool {
///         true
///     }
/// }
///
/// let matcher = capability_matcher::<NotFound>();
/// assert_eq!(matcher(Some(&NotFound)), ExecutionStatus::Succeeded);
/// ```
pub fn capability_matcher<E>() -> ErrorMatcherFn
where
    E: StdError + IsExpected + 'static,
{
    Arc::new(|err: Option<&(dyn StdError + 'static)>| {
        let expected = err.is_some_and(|err| {
            source_chain(err).any(|link| link.downcast_ref::<E>().is_some_and(E::is_expected))
        });
        if expected {
            ExecutionStatus::Succeeded
        } else {
            default_error_matcher(err)
        }
    })
}

fn source_chain<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&err| err.source())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::wrap_expected;
    use std::fmt;

    #[derive(Debug)]
    struct Outer(Box<dyn StdError + Send + Sync>);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "outer")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(self.0.as_ref())
        }
    }

    #[derive(Debug)]
    struct Throttled {
        expected: bool,
    }

    impl fmt::Display for Throttled {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "throttled")
        }
    }

    impl StdError for Throttled {}

    impl IsExpected for Throttled {
        fn is_expected(&self) -> bool {
            self.expected
        }
    }

    fn io(msg: &str) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::Other, msg.to_string())
    }

    #[test]
    fn test_default_name_fn_is_identity() {
        let mut ctx = CircuitContext::new();
        ctx.insert("tenant".into(), serde_json::json!("acme"));
        assert_eq!(default_name_fn("payments", &ctx), "payments");
    }

    #[test]
    fn test_default_trip_fn_is_strictly_greater() {
        let mut info = CircuitInformation {
            consecutive_failures: 3,
            ..CircuitInformation::default()
        };
        assert!(!default_trip_fn("payments", 3, &info));
        info.consecutive_failures = 4;
        assert!(default_trip_fn("payments", 3, &info));
    }

    #[test]
    fn test_default_error_matcher() {
        assert_eq!(default_error_matcher(None), ExecutionStatus::Succeeded);
        assert_eq!(
            default_error_matcher(Some(&io("boom"))),
            ExecutionStatus::Failed
        );
        assert_eq!(
            default_error_matcher(Some(&wrap_expected(io("missing")))),
            ExecutionStatus::Succeeded
        );
    }

    #[test]
    fn test_expected_condition_found_in_source_chain() {
        let nested = Outer(Box::new(wrap_expected(io("missing"))));
        assert!(is_expected_condition(&nested));
        assert_eq!(
            default_error_matcher(Some(&nested)),
            ExecutionStatus::Succeeded
        );

        let plain = Outer(Box::new(io("boom")));
        assert!(!is_expected_condition(&plain));
    }

    #[test]
    fn test_capability_matcher_consults_is_expected() {
        let matcher = capability_matcher::<Throttled>();

        assert_eq!(
            matcher(Some(&Throttled { expected: true })),
            ExecutionStatus::Succeeded
        );
        assert_eq!(
            matcher(Some(&Throttled { expected: false })),
            ExecutionStatus::Failed
        );
        assert_eq!(
            matcher(Some(&Outer(Box::new(Throttled { expected: true })))),
            ExecutionStatus::Succeeded
        );
        assert_eq!(matcher(Some(&io("boom"))), ExecutionStatus::Failed);
        assert_eq!(
            matcher(Some(&wrap_expected(io("missing")))),
            ExecutionStatus::Succeeded
        );
        assert_eq!(matcher(None), ExecutionStatus::Succeeded);
    }
}
