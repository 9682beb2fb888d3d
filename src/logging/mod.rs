//! Pluggable logging for circuit breakers.
//!
//! Circuit breakers log through the [`Logger`] trait rather than calling a
//! logging framework directly, so applications decide where breaker
//! diagnostics go. Two implementations are provided:
//!
//! - [`NoopLogger`] - discards everything; the default
//! - [`TracingLogger`] - forwards to the `tracing` ecosystem
//!
//! Structured fields are attached with [`Logger::with_field`] and friends,
//! each of which returns a new logger scoped with the extra fields.

mod noop;
mod tracing_logger;

pub use noop::NoopLogger;
pub use tracing_logger::TracingLogger;

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt::Debug;
use std::sync::Arc;

/// Structured fields attached to a logger.
pub type Fields = BTreeMap<String, serde_json::Value>;

/// A shared, type-erased logger.
pub type ArcLogger = Arc<dyn Logger>;

/// Leveled logging with structured field attachment.
pub trait Logger: Send + Sync + Debug {
    /// Logs a message at debug level.
    fn debug(&self, msg: &str);

    /// Logs a message at info level.
    fn info(&self, msg: &str);

    /// Logs a message at warn level.
    fn warn(&self, msg: &str);

    /// Logs a message at error level.
    fn error(&self, msg: &str);

    /// Returns a logger that also records `err` under the `err` field.
    fn with_error(&self, err: &dyn StdError) -> ArcLogger {
        self.with_field("err", serde_json::Value::String(err.to_string()))
    }

    /// Returns a logger that also records `key = value`.
    fn with_field(&self, key: &str, value: serde_json::Value) -> ArcLogger;

    /// Returns a logger that also records every entry of `fields`.
    fn with_fields(&self, fields: Fields) -> ArcLogger;
}
