//! The provider contract implemented by validation engines
//!
//! A provider is discovered at runtime, never linked by name. Everything the
//! bootstrap layer needs from it is here: a stable name and the ability to
//! turn a finished configuration into a [`ValidatorFactory`].
//!
//! Copyright (c) 2025 Valida Team
//! Licensed under the Apache-2.0 license

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A validation engine implementation
pub trait ValidationProvider: Any + Send + Sync {
    /// Stable provider name, e.g. `"noop"`
    fn name(&self) -> &str;

    /// Build a validator factory from the accumulated configuration state
    fn build_validator_factory(
        &self,
        state: &ConfigurationState,
    ) -> anyhow::Result<Box<dyn ValidatorFactory>>;
}

/// Entry point to the validators of one configured provider
pub trait ValidatorFactory: Send + Sync {
    /// Name of the provider that built this factory
    fn provider_name(&self) -> &str;

    /// Properties the factory was built with
    fn properties(&self) -> &BTreeMap<String, String>;

    /// Release resources held by the factory
    fn close(&self) {}
}

/// Settings collected by a [`Configuration`](crate::Configuration) before
/// the provider builds its factory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationState {
    /// Free-form provider properties
    pub properties: BTreeMap<String, String>,
}

impl ConfigurationState {
    /// Look up a property
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// A discovered provider instance
///
/// Clones share the same instance. Two handles are equal when they point to
/// the same instance.
#[derive(Clone)]
pub struct ProviderHandle {
    provider: Arc<dyn ValidationProvider>,
    any: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ProviderHandle {
    /// Wrap a freshly constructed provider
    pub fn new<P: ValidationProvider>(provider: P) -> Self {
        Self::from_arc(Arc::new(provider))
    }

    /// Wrap a provider that is already shared
    pub fn from_arc<P: ValidationProvider>(provider: Arc<P>) -> Self {
        Self {
            provider: provider.clone(),
            any: provider,
            type_name: type_name::<P>(),
        }
    }

    /// Provider name
    pub fn name(&self) -> &str {
        self.provider.name()
    }

    /// Fully qualified Rust type of the provider
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the provider as a trait object
    pub fn provider(&self) -> &Arc<dyn ValidationProvider> {
        &self.provider
    }

    /// True when the concrete provider type is `P`
    pub fn is<P: ValidationProvider>(&self) -> bool {
        self.any.is::<P>()
    }

    /// Recover the concrete provider type
    pub fn downcast<P: ValidationProvider>(&self) -> Option<Arc<P>> {
        self.any.clone().downcast::<P>().ok()
    }
}

impl PartialEq for ProviderHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.any, &other.any)
    }
}

impl Eq for ProviderHandle {}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("name", &self.name())
            .field("type_name", &self.type_name)
            .finish()
    }
}
