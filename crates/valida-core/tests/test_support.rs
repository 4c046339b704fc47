//! Shared test support utilities for integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use valida_core::context::FixedContextAccessor;
use valida_core::provider_discovery::RegistryError;
use valida_core::registry::Candidate;
use valida_core::{
    ConfigurationState, DiscoveryResolver, IsolationContext, ProviderHandle, ResolverConfig,
    ServiceRegistry, ValidationProvider, ValidatorFactory,
};

/// Provider identified only by its name
pub struct NamedProvider(pub String);

impl ValidationProvider for NamedProvider {
    fn name(&self) -> &str {
        &self.0
    }

    fn build_validator_factory(
        &self,
        state: &ConfigurationState,
    ) -> anyhow::Result<Box<dyn ValidatorFactory>> {
        Ok(Box::new(RecordingFactory {
            provider: self.0.clone(),
            properties: state.properties.clone(),
        }))
    }
}

/// Distinct provider types for selection tests
pub struct ProviderA;
pub struct ProviderB;
pub struct ProviderC;
pub struct ProviderT;

macro_rules! typed_provider {
    ($ty:ident, $name:expr) => {
        impl ValidationProvider for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn build_validator_factory(
                &self,
                state: &ConfigurationState,
            ) -> anyhow::Result<Box<dyn ValidatorFactory>> {
                Ok(Box::new(RecordingFactory {
                    provider: $name.to_string(),
                    properties: state.properties.clone(),
                }))
            }
        }
    };
}

typed_provider!(ProviderA, "a");
typed_provider!(ProviderB, "b");
typed_provider!(ProviderC, "c");
typed_provider!(ProviderT, "t");

/// Factory that just remembers what it was built with
pub struct RecordingFactory {
    pub provider: String,
    pub properties: BTreeMap<String, String>,
}

impl ValidatorFactory for RecordingFactory {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

/// Registry that counts how often it is scanned
#[derive(Default)]
pub struct CountingRegistry {
    candidates: Vec<Candidate>,
    scans: AtomicUsize,
}

impl CountingRegistry {
    /// Healthy candidates named `names`
    pub fn named(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            candidates: names.iter().map(|n| named_candidate(n)).collect(),
            scans: AtomicUsize::new(0),
        })
    }

    pub fn from_candidates(candidates: Vec<Candidate>) -> Arc<Self> {
        Arc::new(Self {
            candidates,
            scans: AtomicUsize::new(0),
        })
    }

    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

impl ServiceRegistry for CountingRegistry {
    fn candidates(&self) -> Result<Vec<Candidate>, RegistryError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        Ok(self.candidates.clone())
    }
}

/// Registry whose enumeration always fails
pub struct FailingRegistry;

impl ServiceRegistry for FailingRegistry {
    fn candidates(&self) -> Result<Vec<Candidate>, RegistryError> {
        Err(RegistryError::Unavailable {
            reason: "registry index corrupted".to_string(),
        })
    }
}

/// A candidate that instantiates a [`NamedProvider`]
pub fn named_candidate(name: &str) -> Candidate {
    let owned = name.to_string();
    Candidate::new(name, move || Ok(ProviderHandle::new(NamedProvider(owned.clone()))))
}

/// A candidate whose factory fails
pub fn failing_candidate(name: &str) -> Candidate {
    let owned = name.to_string();
    Candidate::new(name, move || anyhow::bail!("cannot load {}", owned))
}

/// Resolver with explicit primary and secondary contexts
pub fn resolver_for(
    primary: Option<Arc<IsolationContext>>,
    secondary: Arc<IsolationContext>,
) -> DiscoveryResolver {
    DiscoveryResolver::with_accessor(
        ResolverConfig::default(),
        Arc::new(FixedContextAccessor::new(primary, secondary)),
    )
}

pub fn names(providers: &[ProviderHandle]) -> Vec<String> {
    providers.iter().map(|p| p.name().to_string()).collect()
}
