//! Factory producing circuit breakers that share settings and storage.

use crate::circuit_breaker::breaker::CircuitBreaker;
use crate::circuit_breaker::config::{FactorySettings, SettingsOption};
use crate::core::{ArcBackend, CircuitContext, SettingsError};

use std::sync::Arc;

/// Produces circuit breakers from one set of [`FactorySettings`].
///
/// Cloning a factory is cheap; clones share settings and backend.
#[derive(Debug, Clone)]
pub struct CircuitBreakerFactory {
    settings: Arc<FactorySettings>,
    storage: ArcBackend,
}

impl CircuitBreakerFactory {
    /// Creates a factory from finished settings.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::MissingStorageBackend`] if no backend was
    /// configured.
    pub fn new(settings: FactorySettings) -> Result<Self, SettingsError> {
        let storage = settings
            .storage_backend()
            .cloned()
            .ok_or(SettingsError::MissingStorageBackend)?;
        Ok(Self {
            settings: Arc::new(settings),
            storage,
        })
    }

    /// Builds settings from `options` and creates a factory from them.
    pub fn from_options(
        options: impl IntoIterator<Item = SettingsOption>,
    ) -> Result<Self, SettingsError> {
        Self::new(FactorySettings::new(options)?)
    }

    /// Returns the factory's settings.
    pub fn settings(&self) -> &FactorySettings {
        &self.settings
    }

    /// Returns the shared storage backend.
    pub fn storage_backend(&self) -> &ArcBackend {
        &self.storage
    }

    /// Creates a breaker for the logical circuit `circuit`.
    ///
    /// The breaker's storage name comes from the configured name function,
    /// while error matchers are looked up by `circuit` itself.
    pub fn breaker_for(&self, circuit: &str, ctx: CircuitContext) -> CircuitBreaker {
        CircuitBreaker::new(&self.settings, Arc::clone(&self.storage), circuit, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::with_in_memory_backend;
    use crate::circuit_breaker::with_name_fn;

    #[test]
    fn test_missing_backend_is_rejected() {
        let err = CircuitBreakerFactory::from_options([]).unwrap_err();
        assert_eq!(err, SettingsError::MissingStorageBackend);
    }

    #[test]
    fn test_breaker_for_generates_name() {
        let factory = CircuitBreakerFactory::from_options([
            with_in_memory_backend(),
            with_name_fn(|circuit, ctx| {
                let tenant = ctx
                    .get("tenant")
                    .and_then(|v| v.as_str())
                    .unwrap_or("shared");
                format!("{tenant}:{circuit}")
            }),
        ])
        .unwrap();

        let mut ctx = CircuitContext::new();
        ctx.insert("tenant".into(), serde_json::json!("acme"));
        let breaker = factory.breaker_for("payments", ctx);

        assert_eq!(breaker.name(), "acme:payments");
        assert_eq!(breaker.circuit(), "payments");
        assert!(!breaker.is_started());

        let breaker = factory.breaker_for("payments", CircuitContext::new());
        assert_eq!(breaker.name(), "shared:payments");
    }

    #[test]
    fn test_clones_share_backend() {
        let factory = CircuitBreakerFactory::from_options([with_in_memory_backend()]).unwrap();
        let clone = factory.clone();
        assert!(Arc::ptr_eq(factory.storage_backend(), clone.storage_backend()));
    }
}
