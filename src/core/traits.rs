//! Core traits for the sharedbreaker library.
//!
//! This module defines the `StorageBackend` trait that every storage
//! adapter must implement, and the `LockHandle` returned by its lock
//! operation.

use crate::core::error::BackendError;
use crate::core::information::CircuitInformation;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Durable, lockable storage for circuit breaker snapshots.
///
/// Circuit breakers sharing a name across processes coordinate exclusively
/// through this trait: the lock serializes read-modify-write cycles, and the
/// store holds the only durable copy of each [`CircuitInformation`].
///
/// # Implementation Notes
///
/// - Implementations must be `Send + Sync`; one backend is shared by every
///   breaker a factory produces.
/// - `retrieve` must return `CircuitInformation::default()` for names that
///   have never been stored or that the backend has evicted. A missing record
///   is not an error.
/// - `lock` must either fail or wait no longer than the backend's own
///   timeout. The breaker imposes no timeout of its own.
/// - Dropping any returned future cancels the operation. Implementations
///   should not leave a lock held when `lock` is cancelled mid-flight.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use sharedbreaker::core::{BackendError, CircuitInformation, LockHandle, StorageBackend};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct MyBackend;
///
/// #[async_trait]
/// impl StorageBackend for MyBackend {
///     async fn store(&self, name: &str, info: &CircuitInformation) -> Result<(), BackendError> {
///         todo!()
///     }
///
///     async fn retrieve(&self, name: &str) -> Result<CircuitInformation, BackendError> {
///         todo!()
///     }
///
///     async fn lock(&self, name: &str) -> Result<Box<dyn LockHandle>, BackendError> {
///         todo!()
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    /// Persists the full snapshot for `name`, overwriting any previous one.
    ///
    /// Called only while the caller holds the lock for `name`.
    async fn store(&self, name: &str, info: &CircuitInformation) -> Result<(), BackendError>;

    /// Returns the current snapshot for `name`, or the default record if
    /// none exists.
    async fn retrieve(&self, name: &str) -> Result<CircuitInformation, BackendError>;

    /// Acquires the mutual-exclusion handle scoped to `name`.
    async fn lock(&self, name: &str) -> Result<Box<dyn LockHandle>, BackendError>;
}

/// A held distributed lock.
///
/// Acquisition normally completes inside [`StorageBackend::lock`], which
/// makes [`lock`](LockHandle::lock) a no-op for most backends. `unlock` must
/// be idempotent.
#[async_trait]
pub trait LockHandle: Send + Sync + Debug {
    /// Completes acquisition if the backend defers it.
    async fn lock(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Releases the lock.
    async fn unlock(&mut self) -> Result<(), BackendError>;
}

/// An arc-wrapped backend for shared ownership.
pub type ArcBackend = Arc<dyn StorageBackend>;

#[async_trait]
impl<B: StorageBackend + ?Sized> StorageBackend for Arc<B> {
    async fn store(&self, name: &str, info: &CircuitInformation) -> Result<(), BackendError> {
        (**self).store(name, info).await
    }

    async fn retrieve(&self, name: &str) -> Result<CircuitInformation, BackendError> {
        (**self).retrieve(name).await
    }

    async fn lock(&self, name: &str) -> Result<Box<dyn LockHandle>, BackendError> {
        (**self).lock(name).await
    }
}
