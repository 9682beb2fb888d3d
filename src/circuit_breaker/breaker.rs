//! Circuit breaker implementation.

use crate::circuit_breaker::config::FactorySettings;
use crate::circuit_breaker::policy::{ErrorMatcherFn, StateChangeFn, TripFn};
use crate::circuit_breaker::state::{Limits, Rejection, Snapshot, Transition};
use crate::core::{
    ArcBackend, CircuitContext, CircuitError, CircuitInformation, CircuitState, ExecutionStatus,
    LockHandle,
};
use crate::logging::{ArcLogger, Fields};

use chrono::Utc;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;

/// A circuit breaker whose state lives in a shared storage backend.
///
/// Every breaker with the same generated name, in this process or any
/// other, shares one circuit. A unit of work is bracketed by
/// [`start`](Self::start) and [`end`](Self::end), which hold the backend's
/// lock for that name in between. [`execute`](Self::execute) does both.
///
/// # States
///
/// - **Closed**: Normal operation. Work runs and outcomes are counted.
/// - **Open**: Work is rejected until the open period is over.
/// - **Half-Open**: A bounded number of probes run. Enough consecutive
///   successes close the circuit; any failure opens it again.
///
/// # Example
///
/// ```rust
/// use sharedbreaker::backends::with_in_memory_backend;
/// use sharedbreaker::circuit_breaker::CircuitBreakerFactory;
/// use sharedbreaker::core::CircuitContext;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let factory = CircuitBreakerFactory::from_options([with_in_memory_backend()])?;
/// let mut breaker = factory.breaker_for("payments", CircuitContext::new());
///
/// let execution = breaker
///     .execute(|| async { Ok::<_, std::io::Error>("charged") })
///     .await;
/// assert!(execution.was_admitted());
/// # Ok(())
/// # }
/// ```
pub struct CircuitBreaker {
    name: String,
    circuit: String,
    context: CircuitContext,
    storage: ArcBackend,
    limits: Limits,
    error_matcher: ErrorMatcherFn,
    trip_fn: TripFn,
    state_change_callback: Option<StateChangeFn>,
    logger: ArcLogger,
    snapshot: Snapshot,
    lock: Option<Box<dyn LockHandle>>,
}

impl CircuitBreaker {
    pub(crate) fn new(
        settings: &FactorySettings,
        storage: ArcBackend,
        circuit: &str,
        context: CircuitContext,
    ) -> Self {
        let name = settings.generate_name(circuit, &context);
        let logger = settings
            .logger()
            .with_field("circuit_name", serde_json::Value::String(name.clone()));

        Self {
            circuit: circuit.to_string(),
            context,
            storage,
            limits: settings.limits(),
            error_matcher: settings.error_matcher_for(circuit),
            trip_fn: settings.trip_fn(),
            state_change_callback: settings.state_change_callback().cloned(),
            logger,
            snapshot: Snapshot::default(),
            lock: None,
            name,
        }
    }

    /// Returns the generated name under which state is stored.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the logical circuit name this breaker was created for.
    pub fn circuit(&self) -> &str {
        &self.circuit
    }

    /// Returns the context this breaker was created with.
    pub fn context(&self) -> &CircuitContext {
        &self.context
    }

    /// Returns `true` between a successful `start` and the matching `end`.
    pub fn is_started(&self) -> bool {
        self.lock.is_some()
    }

    /// Acquires the lock and decides whether work may run.
    ///
    /// On `Ok` the lock stays held until [`end`](Self::end). On any error
    /// the lock has already been released.
    ///
    /// # Errors
    ///
    /// - [`CircuitError::AlreadyStarted`] if this breaker holds the lock
    /// - [`CircuitError::Lock`], [`CircuitError::Retrieve`] or
    ///   [`CircuitError::Store`] on backend failure
    /// - [`CircuitError::Open`] or [`CircuitError::TooManyRequests`] if the
    ///   circuit rejects the work
    pub async fn start(&mut self) -> Result<(), CircuitError> {
        if self.lock.is_some() {
            return Err(CircuitError::AlreadyStarted {
                name: self.name.clone(),
            });
        }

        let mut lock = match self.storage.lock(&self.name).await {
            Ok(lock) => lock,
            Err(source) => {
                self.logger
                    .with_error(&source)
                    .error("cannot acquire circuit breaker lock");
                return Err(CircuitError::Lock {
                    name: self.name.clone(),
                    source,
                });
            }
        };

        if let Err(source) = lock.lock().await {
            self.logger
                .with_error(&source)
                .error("cannot acquire circuit breaker lock");
            let _ = self.release(lock.as_mut()).await;
            return Err(CircuitError::Lock {
                name: self.name.clone(),
                source,
            });
        }

        match self.admit().await {
            Ok(()) => {
                self.lock = Some(lock);
                self.logger.info("starting circuit breaker");
                Ok(())
            }
            Err(err) => {
                let _ = self.release(lock.as_mut()).await;
                Err(err)
            }
        }
    }

    /// Records the outcome of the work and releases the lock.
    ///
    /// `work_err` is the error returned by the work, if any; the configured
    /// error matcher decides whether it counts as a failure. The lock is
    /// released even when storing the outcome fails.
    ///
    /// # Errors
    ///
    /// - [`CircuitError::NotStarted`] without a preceding successful `start`
    /// - [`CircuitError::Store`] if the outcome could not be persisted
    /// - [`CircuitError::Unlock`] if only the release failed
    pub fn end<'a>(
        &'a mut self,
        work_err: Option<&(dyn StdError + 'static)>,
    ) -> impl Future<Output = Result<(), CircuitError>> + Send + 'a {
        let status = (self.error_matcher)(work_err);
        if self.lock.is_some() {
            let mut fields = Fields::new();
            fields.insert(
                "work_err".into(),
                work_err.map_or(serde_json::Value::Null, |err| err.to_string().into()),
            );
            fields.insert(
                "error_matcher_status".into(),
                status.to_string().into(),
            );
            self.logger.with_fields(fields).info("circuit breaker ended");
        }
        self.record(status)
    }

    /// Runs `work` between [`start`](Self::start) and [`end`](Self::end).
    ///
    /// The work runs only if the circuit admits it. Its result is returned
    /// untouched in [`Execution::work`], next to the circuit's own outcome.
    pub async fn execute<F, Fut, T, E>(&mut self, work: F) -> Execution<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        if let Err(err) = self.start().await {
            return Execution {
                work: None,
                circuit: Err(err),
            };
        }

        let result = work().await;
        let ending = self.end(result.as_ref().err().map(|err| err as &(dyn StdError + 'static)));
        let circuit = ending.await;

        Execution {
            work: Some(result),
            circuit,
        }
    }

    /// Returns the current state of the circuit.
    ///
    /// Reads without locking and never writes or fires callbacks. Time-based
    /// transitions that are due are reflected in the result.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitError::Retrieve`] if the backend cannot be read.
    /// Callers should treat the circuit as open in that case; see
    /// [`state_or_open`](Self::state_or_open).
    pub async fn state(&self) -> Result<CircuitState, CircuitError> {
        Ok(self.information().await?.state)
    }

    /// Returns the current state, or [`CircuitState::Open`] if it cannot be
    /// read.
    pub async fn state_or_open(&self) -> CircuitState {
        self.state().await.unwrap_or(CircuitState::Open)
    }

    /// Returns the circuit's record as the next `start` would see it.
    ///
    /// Reads without locking and never writes or fires callbacks.
    pub async fn information(&self) -> Result<CircuitInformation, CircuitError> {
        let info = self.fetch().await?;
        let now = Utc::now();
        let mut snapshot = Snapshot::load(&info, now, &self.limits);
        snapshot.reconcile(now, &self.limits);
        Ok(snapshot.information())
    }

    async fn admit(&mut self) -> Result<(), CircuitError> {
        let info = self.fetch().await?;
        let now = Utc::now();
        self.snapshot = Snapshot::load(&info, now, &self.limits);

        let reconciled = self.snapshot.reconcile(now, &self.limits);
        if reconciled.changed() {
            self.persist().await?;
        }
        if reconciled.new_generation {
            self.logger.debug("cleared circuit breaker counts");
        }
        if let Some(transition) = reconciled.transition {
            self.notify(transition);
        }

        self.snapshot.admit(&self.limits).map_err(|rejection| {
            self.logger.debug("circuit breaker rejected work");
            match rejection {
                Rejection::Open { retry_after } => CircuitError::Open {
                    name: self.name.clone(),
                    retry_after,
                },
                Rejection::TooManyRequests => CircuitError::TooManyRequests {
                    name: self.name.clone(),
                },
            }
        })
    }

    async fn record(&mut self, status: ExecutionStatus) -> Result<(), CircuitError> {
        let Some(mut lock) = self.lock.take() else {
            return Err(CircuitError::NotStarted {
                name: self.name.clone(),
            });
        };

        let now = Utc::now();
        let transition = match status {
            ExecutionStatus::Succeeded => self.snapshot.record_success(now, &self.limits),
            ExecutionStatus::Failed => {
                let trip_fn = &self.trip_fn;
                let name = self.name.as_str();
                let threshold = self.limits.failure_count_threshold;
                self.snapshot
                    .record_failure(now, &self.limits, |info| trip_fn(name, threshold, info))
            }
        };
        let stored = self.persist().await;
        if let (Ok(()), Some(transition)) = (&stored, transition) {
            self.notify(transition);
        }
        let released = self.release(lock.as_mut()).await;
        stored.and(released)
    }

    async fn fetch(&self) -> Result<CircuitInformation, CircuitError> {
        self.storage.retrieve(&self.name).await.map_err(|source| {
            self.logger
                .with_error(&source)
                .warn("cannot retrieve circuit breaker state");
            CircuitError::Retrieve {
                name: self.name.clone(),
                source,
            }
        })
    }

    async fn persist(&self) -> Result<(), CircuitError> {
        let info = self.snapshot.information();
        self.storage.store(&self.name, &info).await.map_err(|source| {
            self.logger
                .with_error(&source)
                .error("cannot store circuit breaker state");
            CircuitError::Store {
                name: self.name.clone(),
                source,
            }
        })
    }

    async fn release(&self, lock: &mut dyn LockHandle) -> Result<(), CircuitError> {
        lock.unlock().await.map_err(|source| {
            self.logger
                .with_error(&source)
                .warn("cannot release circuit breaker lock");
            CircuitError::Unlock {
                name: self.name.clone(),
                source,
            }
        })
    }

    fn notify(&self, transition: Transition) {
        let mut fields = Fields::new();
        fields.insert("from".into(), transition.from.name().into());
        fields.insert("to".into(), transition.to.name().into());
        self.logger
            .with_fields(fields)
            .info("circuit breaker state changed");

        if let Some(callback) = &self.state_change_callback {
            callback(&self.name, &self.context, transition.from, transition.to);
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("circuit", &self.circuit)
            .field("context", &self.context)
            .field("storage", &self.storage)
            .field("limits", &self.limits)
            .field("snapshot", &self.snapshot)
            .field("started", &self.lock.is_some())
            .finish_non_exhaustive()
    }
}

/// Outcome of [`CircuitBreaker::execute`].
#[derive(Debug)]
#[must_use = "the work result is only available through the execution"]
pub struct Execution<T, E> {
    /// The work's own result; `None` if the circuit did not admit the work.
    pub work: Option<Result<T, E>>,
    /// The circuit's outcome: the rejection or backend failure from `start`,
    /// or the failure recording the result in `end`.
    pub circuit: Result<(), CircuitError>,
}

impl<T, E> Execution<T, E> {
    /// Returns `true` if the work ran.
    pub fn was_admitted(&self) -> bool {
        self.work.is_some()
    }

    /// Returns the circuit error, if any.
    pub fn circuit_error(&self) -> Option<&CircuitError> {
        self.circuit.as_ref().err()
    }

    /// Splits into the work's value, the work's error and the circuit error.
    pub fn into_parts(self) -> (Option<T>, Option<E>, Option<CircuitError>) {
        let (value, work_err) = match self.work {
            Some(Ok(value)) => (Some(value), None),
            Some(Err(err)) => (None, Some(err)),
            None => (None, None),
        };
        (value, work_err, self.circuit.err())
    }
}
