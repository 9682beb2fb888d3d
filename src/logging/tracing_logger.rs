//! Logger adapter for the `tracing` ecosystem.

use crate::logging::{ArcLogger, Fields, Logger};

use std::sync::Arc;

/// Forwards breaker diagnostics to `tracing`.
///
/// Events are emitted under the `sharedbreaker` target. Attached fields are
/// rendered as a single JSON object in the `fields` event field, since
/// `tracing` field names must be known at compile time.
///
/// # Example
///
/// ```rust
/// use sharedbreaker::logging::{Logger, TracingLogger};
///
/// let logger = TracingLogger::new().with_field("circuit_name", "payments".into());
/// logger.info("starting circuit breaker");
/// ```
#[derive(Debug, Default, Clone)]
pub struct TracingLogger {
    fields: Fields,
}

impl TracingLogger {
    /// Creates a logger with no attached fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fields attached to this logger.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    fn rendered_fields(&self) -> String {
        serde_json::to_string(&self.fields).unwrap_or_default()
    }

    fn scoped(&self, extra: impl IntoIterator<Item = (String, serde_json::Value)>) -> Self {
        let mut fields = self.fields.clone();
        fields.extend(extra);
        Self { fields }
    }
}

impl Logger for TracingLogger {
    fn debug(&self, msg: &str) {
        tracing::debug!(target: "sharedbreaker", fields = %self.rendered_fields(), "{}", msg);
    }

    fn info(&self, msg: &str) {
        tracing::info!(target: "sharedbreaker", fields = %self.rendered_fields(), "{}", msg);
    }

    fn warn(&self, msg: &str) {
        tracing::warn!(target: "sharedbreaker", fields = %self.rendered_fields(), "{}", msg);
    }

    fn error(&self, msg: &str) {
        tracing::error!(target: "sharedbreaker", fields = %self.rendered_fields(), "{}", msg);
    }

    fn with_field(&self, key: &str, value: serde_json::Value) -> ArcLogger {
        Arc::new(self.scoped([(key.to_string(), value)]))
    }

    fn with_fields(&self, fields: Fields) -> ArcLogger {
        Arc::new(self.scoped(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let writer = CaptureWriter::default();
        let buffer = writer.0.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buffer.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_with_field_scopes_a_new_logger() {
        let base = TracingLogger::new();
        let scoped = base.scoped([("circuit_name".to_string(), serde_json::json!("payments"))]);

        assert!(base.fields().is_empty());
        assert_eq!(scoped.fields()["circuit_name"], "payments");
    }

    #[test]
    fn test_with_fields_merges() {
        let mut fields = Fields::new();
        fields.insert("from".into(), serde_json::json!("closed"));
        fields.insert("to".into(), serde_json::json!("open"));

        let logger = TracingLogger::new().scoped(fields);
        let rendered = logger.rendered_fields();
        assert_eq!(rendered, r#"{"from":"closed","to":"open"}"#);
    }

    #[test]
    fn test_levels_are_emitted() {
        let output = capture(|| {
            let logger = TracingLogger::new().with_field("circuit_name", serde_json::json!("payments"));
            logger.debug("debug message");
            logger.info("info message");
            logger.warn("warn message");
            logger.error("error message");
        });

        assert!(output.contains("DEBUG"));
        assert!(output.contains("info message"));
        assert!(output.contains("WARN"));
        assert!(output.contains("ERROR"));
        assert!(output.contains("circuit_name"));
        assert!(output.contains("payments"));
    }

    #[test]
    fn test_with_error_records_message() {
        let output = capture(|| {
            let err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
            TracingLogger::new().with_error(&err).error("work failed");
        });

        assert!(output.contains("work failed"));
        assert!(output.contains("disk on fire"));
    }
}
