//! Mock storage backend for testing.
//!
//! This module provides a backend that stores records in memory and can be
//! told to fail any of its operations. It also counts how many locks it has
//! handed out, how many are still held and how many were dropped without
//! an explicit unlock, which makes lock leaks visible.

use crate::backends::memory::InMemoryBackend;
use crate::core::{BackendError, CircuitInformation, LockHandle, StorageBackend};

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// A storage backend for testing purposes.
///
/// # Examples
///
/// ```rust
/// use sharedbreaker::backends::MockBackend;
///
/// // A backend that behaves like the in-memory one
/// let backend = MockBackend::new();
///
/// // A backend whose lock always fails
/// let backend = MockBackend::new().with_lock_error("lock service down");
///
/// // Failures can also be toggled at runtime
/// backend.set_lock_error(None::<String>);
/// assert_eq!(backend.held_locks(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MockBackend {
    inner: InMemoryBackend,
    lock_error: RwLock<Option<String>>,
    retrieve_error: RwLock<Option<String>>,
    store_error: RwLock<Option<String>>,
    unlock_error: RwLock<Option<String>>,
    retrieve_delay: RwLock<Option<Duration>>,
    lock_count: AtomicU64,
    retrieve_count: AtomicU64,
    store_count: AtomicU64,
    held: Arc<AtomicU64>,
    unreleased_drops: Arc<AtomicU64>,
}

impl MockBackend {
    /// Creates a mock backend that never fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing in-memory backend, sharing its records and locks.
    pub fn wrapping(inner: InMemoryBackend) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Makes every lock acquisition fail.
    pub fn with_lock_error(self, reason: impl Into<String>) -> Self {
        self.set_lock_error(Some(reason));
        self
    }

    /// Makes every retrieve fail.
    pub fn with_retrieve_error(self, reason: impl Into<String>) -> Self {
        self.set_retrieve_error(Some(reason));
        self
    }

    /// Makes every store fail.
    pub fn with_store_error(self, reason: impl Into<String>) -> Self {
        self.set_store_error(Some(reason));
        self
    }

    /// Makes every unlock report failure. The lock is still released.
    pub fn with_unlock_error(self, reason: impl Into<String>) -> Self {
        self.set_unlock_error(Some(reason));
        self
    }

    /// Delays every retrieve by `delay` before it runs.
    pub fn with_retrieve_delay(self, delay: Duration) -> Self {
        self.set_retrieve_delay(Some(delay));
        self
    }

    /// Sets or clears the lock failure.
    pub fn set_lock_error(&self, reason: Option<impl Into<String>>) {
        set(&self.lock_error, reason);
    }

    /// Sets or clears the retrieve failure.
    pub fn set_retrieve_error(&self, reason: Option<impl Into<String>>) {
        set(&self.retrieve_error, reason);
    }

    /// Sets or clears the store failure.
    pub fn set_store_error(&self, reason: Option<impl Into<String>>) {
        set(&self.store_error, reason);
    }

    /// Sets or clears the unlock failure.
    pub fn set_unlock_error(&self, reason: Option<impl Into<String>>) {
        set(&self.unlock_error, reason);
    }

    /// Sets or clears the retrieve delay.
    pub fn set_retrieve_delay(&self, delay: Option<Duration>) {
        *self
            .retrieve_delay
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = delay;
    }

    /// Returns the wrapped in-memory backend.
    pub fn inner(&self) -> &InMemoryBackend {
        &self.inner
    }

    /// Returns the number of successful lock acquisitions.
    pub fn lock_count(&self) -> u64 {
        self.lock_count.load(Ordering::SeqCst)
    }

    /// Returns the number of retrieve calls, failed ones included.
    pub fn retrieve_count(&self) -> u64 {
        self.retrieve_count.load(Ordering::SeqCst)
    }

    /// Returns the number of store calls, failed ones included.
    pub fn store_count(&self) -> u64 {
        self.store_count.load(Ordering::SeqCst)
    }

    /// Returns the number of locks acquired and not yet released.
    pub fn held_locks(&self) -> u64 {
        self.held.load(Ordering::SeqCst)
    }

    /// Returns the number of lock handles dropped without a call to `unlock`.
    ///
    /// A backend whose locks only expire on a TTL keeps such locks held, so a
    /// breaker should never produce one outside of cancellation.
    pub fn unreleased_drops(&self) -> u64 {
        self.unreleased_drops.load(Ordering::SeqCst)
    }
}

fn set(slot: &RwLock<Option<String>>, reason: Option<impl Into<String>>) {
    *slot.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = reason.map(Into::into);
}

fn check(slot: &RwLock<Option<String>>) -> Result<(), BackendError> {
    match &*slot.read().unwrap_or_else(|poisoned| poisoned.into_inner()) {
        Some(reason) => Err(BackendError::unavailable(reason.clone())),
        None => Ok(()),
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    async fn store(&self, name: &str, info: &CircuitInformation) -> Result<(), BackendError> {
        self.store_count.fetch_add(1, Ordering::SeqCst);
        check(&self.store_error)?;
        self.inner.store(name, info).await
    }

    async fn retrieve(&self, name: &str) -> Result<CircuitInformation, BackendError> {
        self.retrieve_count.fetch_add(1, Ordering::SeqCst);
        let delay = *self
            .retrieve_delay
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        check(&self.retrieve_error)?;
        self.inner.retrieve(name).await
    }

    async fn lock(&self, name: &str) -> Result<Box<dyn LockHandle>, BackendError> {
        check(&self.lock_error)?;
        let inner = self.inner.lock(name).await?;

        self.lock_count.fetch_add(1, Ordering::SeqCst);
        self.held.fetch_add(1, Ordering::SeqCst);
        let unlock_error = self
            .unlock_error
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        Ok(Box::new(MockLock {
            inner,
            held: Arc::clone(&self.held),
            unreleased_drops: Arc::clone(&self.unreleased_drops),
            released: false,
            unlock_error,
        }))
    }
}

/// Lock handle of [`MockBackend`].
#[derive(Debug)]
pub struct MockLock {
    inner: Box<dyn LockHandle>,
    held: Arc<AtomicU64>,
    unreleased_drops: Arc<AtomicU64>,
    released: bool,
    unlock_error: Option<String>,
}

impl MockLock {
    fn mark_released(&mut self) {
        if !self.released {
            self.released = true;
            self.held.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl LockHandle for MockLock {
    async fn unlock(&mut self) -> Result<(), BackendError> {
        self.inner.unlock().await?;
        self.mark_released();
        match &self.unlock_error {
            Some(reason) => Err(BackendError::unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

impl Drop for MockLock {
    fn drop(&mut self) {
        if !self.released {
            self.unreleased_drops.fetch_add(1, Ordering::SeqCst);
        }
        self.mark_released();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_behaves_like_memory() {
        let backend = MockBackend::new();
        let info = CircuitInformation {
            generation: 2,
            ..CircuitInformation::default()
        };

        backend.store("payments", &info).await.unwrap();
        assert_eq!(backend.retrieve("payments").await.unwrap(), info);
        assert_eq!(backend.store_count(), 1);
        assert_eq!(backend.retrieve_count(), 1);
    }

    #[tokio::test]
    async fn test_configured_errors() {
        let backend = MockBackend::new()
            .with_retrieve_error("read replica down")
            .with_store_error("disk full");

        let err = backend.retrieve("payments").await.unwrap_err();
        assert_eq!(err.to_string(), "backend unavailable: read replica down");
        assert!(backend.store("payments", &CircuitInformation::default()).await.is_err());

        backend.set_retrieve_error(None::<String>);
        assert!(backend.retrieve("payments").await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_error_acquires_nothing() {
        let backend = MockBackend::new().with_lock_error("lock service down");
        assert!(backend.lock("payments").await.is_err());
        assert_eq!(backend.lock_count(), 0);
        assert_eq!(backend.held_locks(), 0);
        assert!(!backend.inner().is_locked("payments"));
    }

    #[tokio::test]
    async fn test_held_locks_tracks_unlock_and_drop() {
        let backend = MockBackend::new();

        let mut first = backend.lock("payments").await.unwrap();
        let second = backend.lock("billing").await.unwrap();
        assert_eq!(backend.held_locks(), 2);

        first.unlock().await.unwrap();
        first.unlock().await.unwrap();
        assert_eq!(backend.held_locks(), 1);

        drop(second);
        assert_eq!(backend.held_locks(), 0);
        assert_eq!(backend.lock_count(), 2);
        assert_eq!(backend.unreleased_drops(), 1);

        drop(first);
        assert_eq!(backend.unreleased_drops(), 1);
    }

    #[tokio::test]
    async fn test_unlock_error_still_releases() {
        let backend = MockBackend::new().with_unlock_error("lock expired");
        let mut lock = backend.lock("payments").await.unwrap();

        assert!(lock.unlock().await.is_err());
        assert_eq!(backend.held_locks(), 0);
        assert!(!backend.inner().is_locked("payments"));

        drop(lock);
        assert_eq!(backend.unreleased_drops(), 0);
    }

    #[tokio::test]
    async fn test_retrieve_delay() {
        let backend = MockBackend::new().with_retrieve_delay(Duration::from_millis(200));
        let slow = tokio::time::timeout(Duration::from_millis(20), backend.retrieve("payments"));
        assert!(slow.await.is_err());

        backend.set_retrieve_delay(None);
        assert!(backend.retrieve("payments").await.is_ok());
    }
}
