//! Valida Providers - built-in validation providers
//!
//! Linking this crate registers its providers with the compile-time
//! registry, so discovery in the module context finds them without any
//! further setup.
//!
//! - `noop`: accepts every value; useful as a default and in tests
//!
//! Copyright (c) 2025 Valida Team
//! Licensed under the Apache-2.0 license

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use valida_core::{ConfigurationState, ProviderHandle, ValidationProvider, ValidatorFactory};

/// Registration name of [`NoopProvider`]
pub const NOOP_PROVIDER: &str = "noop";

valida_core::submit_provider!(NOOP_PROVIDER, noop_factory);

fn noop_factory() -> anyhow::Result<ProviderHandle> {
    Ok(ProviderHandle::new(NoopProvider::new()))
}

/// Provider whose validators never report a violation
#[derive(Debug, Default)]
pub struct NoopProvider;

impl NoopProvider {
    pub fn new() -> Self {
        Self
    }
}

impl ValidationProvider for NoopProvider {
    fn name(&self) -> &str {
        NOOP_PROVIDER
    }

    fn build_validator_factory(
        &self,
        state: &ConfigurationState,
    ) -> anyhow::Result<Box<dyn ValidatorFactory>> {
        if let Some(value) = state.property("fail_fast") {
            value
                .parse::<bool>()
                .map_err(|_| anyhow::anyhow!("fail_fast must be true or false, got '{}'", value))?;
        }
        tracing::debug!(properties = state.properties.len(), "Building noop validator factory");
        Ok(Box::new(NoopValidatorFactory {
            properties: state.properties.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Factory produced by [`NoopProvider`]
#[derive(Debug)]
pub struct NoopValidatorFactory {
    properties: BTreeMap<String, String>,
    closed: AtomicBool,
}

impl NoopValidatorFactory {
    /// Whether [`ValidatorFactory::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl ValidatorFactory for NoopValidatorFactory {
    fn provider_name(&self) -> &str {
        NOOP_PROVIDER
    }

    fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_keeps_properties() {
        let mut state = ConfigurationState::default();
        state.properties.insert("fail_fast".to_string(), "true".to_string());

        let factory = NoopProvider::new().build_validator_factory(&state).unwrap();
        assert_eq!(factory.provider_name(), "noop");
        assert_eq!(factory.properties().get("fail_fast").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_invalid_fail_fast_is_rejected() {
        let mut state = ConfigurationState::default();
        state.properties.insert("fail_fast".to_string(), "maybe".to_string());

        let err = NoopProvider::new().build_validator_factory(&state).err().unwrap();
        assert!(err.to_string().contains("maybe"));
    }

    #[test]
    fn test_close() {
        let factory = NoopValidatorFactory {
            properties: BTreeMap::new(),
            closed: AtomicBool::new(false),
        };
        assert!(!factory.is_closed());
        factory.close();
        assert!(factory.is_closed());
    }
}
