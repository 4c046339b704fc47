//! Bootstrap entry points
//!
//! Two ways in:
//! - [`by_default_provider`] uses whichever provider discovery lists first
//! - [`by_provider`] insists on one concrete provider type
//!
//! Both consult the process-wide [`DiscoveryResolver`] unless a custom
//! [`ProviderResolver`] is supplied, and both end in a [`Configuration`]
//! that builds the provider's validator factory.
//!
//! ```no_run
//! use valida_core::Result;
//!
//! fn example() -> Result<()> {
//!     let factory = valida_core::by_default_provider()
//!         .configure()?
//!         .add_property("fail_fast", "true")
//!         .build_validator_factory()?;
//!     println!("validating with {}", factory.provider_name());
//!     Ok(())
//! }
//! ```
//!
//! Copyright (c) 2025 Valida Team
//! Licensed under the Apache-2.0 license

use crate::error::{Error, Result};
use crate::provider::{ConfigurationState, ProviderHandle, ValidationProvider, ValidatorFactory};
use crate::provider_discovery::DiscoveryResolver;
use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Supplies the list of available providers to a bootstrap
pub trait ProviderResolver: Send + Sync {
    /// Available providers; the first one is the default
    fn validation_providers(&self) -> Result<Vec<ProviderHandle>>;
}

/// First provider of the sequence, or [`Error::NoProviderFound`]
pub fn select_default(providers: &[ProviderHandle]) -> Result<ProviderHandle> {
    providers.first().cloned().ok_or(Error::NoProviderFound)
}

/// First provider whose concrete type is `P`
pub fn select_by_type<P: ValidationProvider>(providers: &[ProviderHandle]) -> Result<Arc<P>> {
    providers
        .iter()
        .find_map(|p| p.downcast::<P>())
        .ok_or_else(|| Error::ProviderNotFound {
            requested: type_name::<P>().to_string(),
            available: available_names(providers),
        })
}

/// First provider reporting `name`
pub fn select_by_name(providers: &[ProviderHandle], name: &str) -> Result<ProviderHandle> {
    providers
        .iter()
        .find(|p| p.name() == name)
        .cloned()
        .ok_or_else(|| Error::ProviderNotFound {
            requested: name.to_string(),
            available: available_names(providers),
        })
}

fn available_names(providers: &[ProviderHandle]) -> Vec<String> {
    providers.iter().map(|p| p.name().to_string()).collect()
}

fn resolve_with(resolver: Option<&Arc<dyn ProviderResolver>>) -> Result<Vec<ProviderHandle>> {
    match resolver {
        Some(resolver) => resolver.validation_providers(),
        None => DiscoveryResolver::global().resolve_providers(),
    }
}

/// Bootstrap using the default provider
pub fn by_default_provider() -> GenericBootstrap {
    GenericBootstrap::default()
}

/// Bootstrap using the provider of concrete type `P`
pub fn by_provider<P: ValidationProvider>() -> ProviderSpecificBootstrap<P> {
    ProviderSpecificBootstrap::default()
}

/// Default provider, default configuration, built factory
pub fn build_default_validator_factory() -> Result<Box<dyn ValidatorFactory>> {
    by_default_provider().configure()?.build_validator_factory()
}

/// Bootstrap that picks the first available provider
#[derive(Default, Clone)]
pub struct GenericBootstrap {
    resolver: Option<Arc<dyn ProviderResolver>>,
}

impl GenericBootstrap {
    /// Use `resolver` instead of the process-wide discovery resolver
    pub fn provider_resolver(mut self, resolver: Arc<dyn ProviderResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Select the default provider and start configuring it
    pub fn configure(&self) -> Result<Configuration> {
        let providers = resolve_with(self.resolver.as_ref())?;
        let provider = select_default(&providers)?;
        tracing::debug!(provider = %provider.name(), "Selected default provider");
        Ok(Configuration::new(provider))
    }
}

impl fmt::Debug for GenericBootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericBootstrap")
            .field("custom_resolver", &self.resolver.is_some())
            .finish()
    }
}

/// Bootstrap restricted to providers of concrete type `P`
pub struct ProviderSpecificBootstrap<P> {
    resolver: Option<Arc<dyn ProviderResolver>>,
    _provider: PhantomData<fn() -> P>,
}

impl<P> Default for ProviderSpecificBootstrap<P> {
    fn default() -> Self {
        Self {
            resolver: None,
            _provider: PhantomData,
        }
    }
}

impl<P> Clone for ProviderSpecificBootstrap<P> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            _provider: PhantomData,
        }
    }
}

impl<P: ValidationProvider> ProviderSpecificBootstrap<P> {
    /// Use `resolver` instead of the process-wide discovery resolver
    pub fn provider_resolver(mut self, resolver: Arc<dyn ProviderResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// The discovered instance of `P`
    pub fn provider(&self) -> Result<Arc<P>> {
        let providers = resolve_with(self.resolver.as_ref())?;
        select_by_type::<P>(&providers)
    }

    /// Select the provider of type `P` and start configuring it
    pub fn configure(&self) -> Result<Configuration> {
        let provider = self.provider()?;
        tracing::debug!(provider = %provider.name(), "Selected provider by type");
        Ok(Configuration::new(ProviderHandle::from_arc(provider)))
    }
}

impl<P> fmt::Debug for ProviderSpecificBootstrap<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSpecificBootstrap")
            .field("provider", &type_name::<P>())
            .field("custom_resolver", &self.resolver.is_some())
            .finish()
    }
}

/// A selected provider plus the settings it will be built with
#[derive(Debug, Clone)]
pub struct Configuration {
    provider: ProviderHandle,
    state: ConfigurationState,
}

impl Configuration {
    /// Configure a provider that was selected by other means
    pub fn new(provider: ProviderHandle) -> Self {
        Self {
            provider,
            state: ConfigurationState::default(),
        }
    }

    /// Set a provider property
    pub fn add_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.state.properties.insert(key.into(), value.into());
        self
    }

    pub fn provider(&self) -> &ProviderHandle {
        &self.provider
    }

    pub fn state(&self) -> &ConfigurationState {
        &self.state
    }

    /// Hand the configuration to the provider
    pub fn build_validator_factory(&self) -> Result<Box<dyn ValidatorFactory>> {
        self.provider
            .provider()
            .build_validator_factory(&self.state)
            .map_err(|source| Error::Configuration {
                provider: self.provider.name().to_string(),
                message: source.to_string(),
                source: Some(source),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct Alpha;
    struct Beta;
    struct Absent;

    struct Factory {
        provider: &'static str,
        properties: BTreeMap<String, String>,
    }

    impl ValidatorFactory for Factory {
        fn provider_name(&self) -> &str {
            self.provider
        }

        fn properties(&self) -> &BTreeMap<String, String> {
            &self.properties
        }
    }

    impl ValidationProvider for Alpha {
        fn name(&self) -> &str {
            "alpha"
        }

        fn build_validator_factory(
            &self,
            state: &ConfigurationState,
        ) -> anyhow::Result<Box<dyn ValidatorFactory>> {
            Ok(Box::new(Factory {
                provider: "alpha",
                properties: state.properties.clone(),
            }))
        }
    }

    impl ValidationProvider for Beta {
        fn name(&self) -> &str {
            "beta"
        }

        fn build_validator_factory(
            &self,
            _state: &ConfigurationState,
        ) -> anyhow::Result<Box<dyn ValidatorFactory>> {
            anyhow::bail!("beta is misconfigured")
        }
    }

    impl ValidationProvider for Absent {
        fn name(&self) -> &str {
            "absent"
        }

        fn build_validator_factory(
            &self,
            _state: &ConfigurationState,
        ) -> anyhow::Result<Box<dyn ValidatorFactory>> {
            anyhow::bail!("never discovered")
        }
    }

    struct Fixed(Vec<ProviderHandle>);

    impl ProviderResolver for Fixed {
        fn validation_providers(&self) -> Result<Vec<ProviderHandle>> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl ProviderResolver for Failing {
        fn validation_providers(&self) -> Result<Vec<ProviderHandle>> {
            Err(Error::resolver(anyhow::anyhow!("resolver exploded")))
        }
    }

    fn fixed(providers: Vec<ProviderHandle>) -> Arc<dyn ProviderResolver> {
        Arc::new(Fixed(providers))
    }

    #[test]
    fn test_default_picks_first() {
        let config = by_default_provider()
            .provider_resolver(fixed(vec![ProviderHandle::new(Beta), ProviderHandle::new(Alpha)]))
            .configure()
            .unwrap();
        assert_eq!(config.provider().name(), "beta");
    }

    #[test]
    fn test_default_on_empty_is_no_provider_found() {
        let err = by_default_provider()
            .provider_resolver(fixed(Vec::new()))
            .configure()
            .unwrap_err();
        assert!(err.is_no_provider_found());
    }

    #[test]
    fn test_by_type_skips_other_providers() {
        let config = by_provider::<Alpha>()
            .provider_resolver(fixed(vec![ProviderHandle::new(Beta), ProviderHandle::new(Alpha)]))
            .configure()
            .unwrap();
        assert!(config.provider().is::<Alpha>());
    }

    #[test]
    fn test_by_type_missing_names_type() {
        let err = by_provider::<Absent>()
            .provider_resolver(fixed(vec![ProviderHandle::new(Alpha)]))
            .configure()
            .unwrap_err();
        match err {
            Error::ProviderNotFound { requested, available } => {
                assert!(requested.ends_with("Absent"));
                assert_eq!(available, vec!["alpha".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_select_by_name() {
        let providers = vec![ProviderHandle::new(Alpha), ProviderHandle::new(Beta)];
        assert_eq!(select_by_name(&providers, "beta").unwrap().name(), "beta");
        assert!(matches!(
            select_by_name(&providers, "gamma"),
            Err(Error::ProviderNotFound { .. })
        ));
    }

    #[test]
    fn test_resolver_failure_propagates() {
        let err = by_default_provider()
            .provider_resolver(Arc::new(Failing))
            .configure()
            .unwrap_err();
        assert!(matches!(err, Error::Resolver { .. }));
    }

    #[test]
    fn test_properties_reach_factory() {
        let factory = by_provider::<Alpha>()
            .provider_resolver(fixed(vec![ProviderHandle::new(Alpha)]))
            .configure()
            .unwrap()
            .add_property("fail_fast", "true")
            .build_validator_factory()
            .unwrap();
        assert_eq!(factory.provider_name(), "alpha");
        assert_eq!(factory.properties().len(), 1);
    }

    #[test]
    fn test_factory_failure_is_configuration_error() {
        let err = by_default_provider()
            .provider_resolver(fixed(vec![ProviderHandle::new(Beta)]))
            .configure()
            .unwrap()
            .build_validator_factory()
            .err()
            .unwrap();
        match err {
            Error::Configuration { provider, message, .. } => {
                assert_eq!(provider, "beta");
                assert_eq!(message, "beta is misconfigured");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
