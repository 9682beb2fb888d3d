//! Storage backend implementations.
//!
//! This module contains implementations of the `StorageBackend` trait that
//! circuit breakers use to share state.
//!
//! ## Available Backends
//!
//! - [`memory`] - Process-local storage
//! - [`mock`] - A failure-injecting backend for testing
//! - [`redis`] - Redis with token-checked locks (requires `redis` feature)
//!
//! ## Implementing a Custom Backend
//!
//! To share circuits through another store, implement `StorageBackend`:
//!
//! ```rust,ignore
//! use sharedbreaker::core::{BackendError, CircuitInformation, LockHandle, StorageBackend};
//! use async_trait::async_trait;
//!
//! #[derive(Debug)]
//! pub struct MyBackend {
//!     // Your client
//! }
//!
//! #[async_trait]
//! impl StorageBackend for MyBackend {
//!     async fn store(&self, name: &str, info: &CircuitInformation) -> Result<(), BackendError> {
//!         // Overwrite the record for `name`
//!         todo!()
//!     }
//!
//!     async fn retrieve(&self, name: &str) -> Result<CircuitInformation, BackendError> {
//!         // Return CircuitInformation::default() when `name` is unknown
//!         todo!()
//!     }
//!
//!     async fn lock(&self, name: &str) -> Result<Box<dyn LockHandle>, BackendError> {
//!         // Acquire a lock scoped to `name`
//!         todo!()
//!     }
//! }
//! ```

pub mod memory;
pub mod mock;

#[cfg(feature = "redis")]
pub mod redis;

// Re-exports
pub use memory::{with_in_memory_backend, InMemoryBackend, LockMode};
pub use mock::MockBackend;

#[cfg(feature = "redis")]
pub use self::redis::RedisBackend;
