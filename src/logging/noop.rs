//! Logger that discards everything.

use crate::logging::{ArcLogger, Fields, Logger};

use std::error::Error as StdError;
use std::sync::Arc;

/// A no-op logger.
///
/// Used whenever no logger is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl NoopLogger {
    /// Creates a new no-op logger.
    pub fn new() -> Self {
        Self
    }
}

impl Logger for NoopLogger {
    fn debug(&self, _msg: &str) {}

    fn info(&self, _msg: &str) {}

    fn warn(&self, _msg: &str) {}

    fn error(&self, _msg: &str) {}

    fn with_error(&self, _err: &dyn StdError) -> ArcLogger {
        Arc::new(Self)
    }

    fn with_field(&self, _key: &str, _value: serde_json::Value) -> ArcLogger {
        Arc::new(Self)
    }

    fn with_fields(&self, _fields: Fields) -> ArcLogger {
        Arc::new(Self)
    }
}
