//! Process-local storage backend.
//!
//! Suitable for tests and for sharing circuits between tasks of a single
//! process. Nothing survives a restart.

use crate::circuit_breaker::SettingsOption;
use crate::core::{BackendError, CircuitInformation, LockHandle, StorageBackend};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// How [`InMemoryBackend::lock`](StorageBackend::lock) behaves when the
/// lock is already held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockMode {
    /// Wait until the lock is released.
    #[default]
    Wait,
    /// Fail immediately with [`BackendError::LockUnavailable`].
    FailFast,
    /// Wait at most the given duration, then fail with
    /// [`BackendError::LockTimeout`].
    Timeout(Duration),
}

#[derive(Debug, Default)]
struct Shared {
    records: HashMap<String, CircuitInformation>,
    locks: HashMap<String, Arc<AsyncMutex<()>>>,
}

/// A storage backend backed by process memory.
///
/// Clones share the same records and locks.
///
/// # Example
///
/// ```rust
/// use sharedbreaker::backends::InMemoryBackend;
/// use std::time::Duration;
///
/// let backend = InMemoryBackend::new().with_lock_timeout(Duration::from_secs(1));
/// assert!(backend.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    shared: Arc<Mutex<Shared>>,
    mode: LockMode,
}

impl InMemoryBackend {
    /// Creates an empty backend whose locks wait indefinitely.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails lock acquisition immediately when the lock is held.
    pub fn fail_fast(mut self) -> Self {
        self.mode = LockMode::FailFast;
        self
    }

    /// Bounds how long lock acquisition waits.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.mode = LockMode::Timeout(timeout);
        self
    }

    /// Returns the lock acquisition mode.
    pub fn lock_mode(&self) -> LockMode {
        self.mode
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> usize {
        self.shared().records.len()
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the lock for `name` is currently held.
    pub fn is_locked(&self, name: &str) -> bool {
        self.shared()
            .locks
            .get(name)
            .is_some_and(|mutex| mutex.try_lock().is_err())
    }

    /// Removes every record. Held locks are unaffected.
    pub fn clear(&self) {
        self.shared().records.clear();
    }

    fn shared(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mutex_for(&self, name: &str) -> Arc<AsyncMutex<()>> {
        Arc::clone(self.shared().locks.entry(name.to_string()).or_default())
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn store(&self, name: &str, info: &CircuitInformation) -> Result<(), BackendError> {
        self.shared().records.insert(name.to_string(), *info);
        Ok(())
    }

    async fn retrieve(&self, name: &str) -> Result<CircuitInformation, BackendError> {
        Ok(self.shared().records.get(name).copied().unwrap_or_default())
    }

    async fn lock(&self, name: &str) -> Result<Box<dyn LockHandle>, BackendError> {
        let mutex = self.mutex_for(name);
        let guard = match self.mode {
            LockMode::Wait => mutex.lock_owned().await,
            LockMode::FailFast => {
                mutex
                    .try_lock_owned()
                    .map_err(|_| BackendError::LockUnavailable {
                        name: name.to_string(),
                    })?
            }
            LockMode::Timeout(limit) => tokio::time::timeout(limit, mutex.lock_owned())
                .await
                .map_err(|_| BackendError::LockTimeout {
                    name: name.to_string(),
                    elapsed: limit,
                })?,
        };

        Ok(Box::new(MemoryLock { guard: Some(guard) }))
    }
}

/// Lock handle of [`InMemoryBackend`]; releases on unlock or drop.
#[derive(Debug)]
pub struct MemoryLock {
    guard: Option<OwnedMutexGuard<()>>,
}

#[async_trait]
impl LockHandle for MemoryLock {
    async fn unlock(&mut self) -> Result<(), BackendError> {
        self.guard.take();
        Ok(())
    }
}

/// Stores circuits in a fresh [`InMemoryBackend`].
pub fn with_in_memory_backend() -> SettingsOption {
    crate::circuit_breaker::with_storage_backend(InMemoryBackend::new())
}
