//! Provider discovery with per-context caching
//!
//! [`DiscoveryResolver`] finds the validation providers visible to the
//! caller. It asks the calling thread's isolation context first and, when
//! that context sees nothing, the module context that loaded this crate.
//! Every sequence it produces, empty ones included, is cached against the
//! context that produced it.
//!
//! Copyright (c) 2025 Valida Team
//! Licensed under the Apache-2.0 license

mod cache;
mod error;

pub use cache::{CacheConfig, CacheEntryInfo, CacheStats, ProviderCache};
pub use error::{CandidateError, RegistryError};

use crate::bootstrap::ProviderResolver;
use crate::config::ResolverConfig;
use crate::context::{ContextAccessor, ContextId, IsolationContext, ThreadContextAccessor};
use crate::error::{Error, Result};
use crate::provider::ProviderHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::instrument;

static GLOBAL: OnceLock<Arc<DiscoveryResolver>> = OnceLock::new();

/// Default provider resolver
pub struct DiscoveryResolver {
    config: ResolverConfig,
    accessor: Arc<dyn ContextAccessor>,
    cache: Mutex<ProviderCache>,
    /// One gate per context so concurrent first calls share a single scan
    gates: Mutex<HashMap<ContextId, Arc<Mutex<()>>>>,
    scans: AtomicU64,
}

impl DiscoveryResolver {
    /// Resolver over the thread-local context and this crate's module context
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_accessor(config, Arc::new(ThreadContextAccessor::default()))
    }

    /// Resolver reading its contexts from `accessor`
    pub fn with_accessor(config: ResolverConfig, accessor: Arc<dyn ContextAccessor>) -> Self {
        let cache = ProviderCache::with_config(config.cache.clone());
        Self {
            config,
            accessor,
            cache: Mutex::new(cache),
            gates: Mutex::new(HashMap::new()),
            scans: AtomicU64::new(0),
        }
    }

    /// Process-wide default instance, configured from the environment
    pub fn global() -> Arc<DiscoveryResolver> {
        GLOBAL
            .get_or_init(|| Arc::new(DiscoveryResolver::new(ResolverConfig::from_env())))
            .clone()
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// All providers visible to the caller, in registry order
    ///
    /// An empty result means nothing is installed; it is not an error.
    #[instrument(skip(self), level = "debug")]
    pub fn resolve_providers(&self) -> Result<Vec<ProviderHandle>> {
        let primary = self.accessor.thread_context();

        if let Some(context) = &primary {
            let providers = self.providers_for(context)?;
            if !providers.is_empty() || !self.config.module_fallback {
                return Ok(providers.to_vec());
            }
        }

        let secondary = self.accessor.module_context();
        if primary.as_ref().map(|p| p.id()) == Some(secondary.id()) {
            return Ok(Vec::new());
        }

        tracing::debug!(context = %secondary.name(), "Falling back to module context");
        Ok(self.providers_for(&secondary)?.to_vec())
    }

    /// Drop every cached result; the next call rescans
    ///
    /// A scan already in flight may still store its own result afterwards.
    pub fn clear_cache(&self) {
        self.lock_cache().clear();
        tracing::debug!("Provider cache cleared");
    }

    /// Forget the cached result of a context that is being torn down
    pub fn release_context(&self, context: &IsolationContext) -> bool {
        let removed = self.lock_cache().invalidate(context);
        lock(&self.gates).remove(&context.id());
        removed
    }

    /// Release cached sequences while keeping their keys
    pub fn reclaim_cached(&self) -> usize {
        self.lock_cache().reclaim()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.lock_cache().stats()
    }

    pub fn cache_snapshot(&self) -> Vec<CacheEntryInfo> {
        self.lock_cache().snapshot()
    }

    /// Number of registry scans performed so far
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    fn providers_for(&self, context: &Arc<IsolationContext>) -> Result<Arc<[ProviderHandle]>> {
        if let Some(hit) = self.lock_cache().get(context) {
            tracing::debug!(context = %context.name(), providers = hit.len(), "Provider cache hit");
            return Ok(hit);
        }

        let gate = self.gate_for(context.id());
        let _scan = lock(&gate);

        // Another caller may have finished the scan while we waited
        if let Some(hit) = self.lock_cache().get(context) {
            return Ok(hit);
        }

        let providers: Arc<[ProviderHandle]> = match self.discover(context) {
            Ok(providers) => providers.into(),
            Err(e) => {
                lock(&self.gates).remove(&context.id());
                return Err(e);
            }
        };
        // Store before dropping the gate so late arrivals see the entry
        self.lock_cache().put(context, providers.clone());
        lock(&self.gates).remove(&context.id());
        Ok(providers)
    }

    #[instrument(skip_all, fields(context = %context.name(), id = %context.id()))]
    fn discover(&self, context: &IsolationContext) -> Result<Vec<ProviderHandle>> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        let registry = context.registry();
        tracing::debug!(registry = %registry.describe(), "Scanning provider registry");

        let candidates = registry.candidates().map_err(|source| Error::ProviderResolution {
            context: context.name().to_string(),
            source,
        })?;

        let mut providers = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match candidate.instantiate() {
                Ok(provider) => {
                    tracing::debug!(
                        candidate = %candidate.name(),
                        provider = %provider.name(),
                        "Provider discovered"
                    );
                    providers.push(provider);
                }
                Err(e) => {
                    tracing::warn!(
                        candidate = %candidate.name(),
                        error = %e,
                        "Skipping provider candidate"
                    );
                }
            }
        }

        tracing::debug!(found = providers.len(), "Registry scan finished");
        Ok(providers)
    }

    fn gate_for(&self, id: ContextId) -> Arc<Mutex<()>> {
        lock(&self.gates).entry(id).or_default().clone()
    }

    fn lock_cache(&self) -> MutexGuard<'_, ProviderCache> {
        lock(&self.cache)
    }
}

impl Default for DiscoveryResolver {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

impl ProviderResolver for DiscoveryResolver {
    fn validation_providers(&self) -> Result<Vec<ProviderHandle>> {
        self.resolve_providers()
    }
}

// Cache updates are single assignments, so a poisoned lock still holds
// consistent state.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FixedContextAccessor;
    use crate::provider::{ConfigurationState, ValidationProvider, ValidatorFactory};
    use crate::registry::{ServiceRegistry, StaticRegistry};

    struct Named(&'static str);

    impl ValidationProvider for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn build_validator_factory(
            &self,
            _state: &ConfigurationState,
        ) -> anyhow::Result<Box<dyn ValidatorFactory>> {
            anyhow::bail!("unused")
        }
    }

    struct Offline;

    impl ServiceRegistry for Offline {
        fn candidates(
            &self,
        ) -> std::result::Result<Vec<crate::registry::Candidate>, RegistryError> {
            Err(RegistryError::Unavailable {
                reason: "offline".to_string(),
            })
        }
    }

    fn registry(names: &[&'static str]) -> Arc<dyn ServiceRegistry> {
        let mut registry = StaticRegistry::new();
        for name in names {
            let name: &'static str = *name;
            registry = registry.with(name, move || Ok(ProviderHandle::new(Named(name))));
        }
        Arc::new(registry)
    }

    fn resolver(thread: Option<&[&'static str]>, module: &[&'static str]) -> DiscoveryResolver {
        let thread = thread.map(|names| IsolationContext::new("thread", registry(names)));
        let module = IsolationContext::new("module", registry(module));
        DiscoveryResolver::with_accessor(
            ResolverConfig::default(),
            Arc::new(FixedContextAccessor::new(thread, module)),
        )
    }

    fn names(providers: &[ProviderHandle]) -> Vec<&str> {
        providers.iter().map(|p| p.name()).collect()
    }

    #[test]
    fn test_thread_context_wins() {
        let resolver = resolver(Some(&["a", "b"]), &["m"]);
        assert_eq!(names(&resolver.resolve_providers().unwrap()), vec!["a", "b"]);
        assert_eq!(resolver.scan_count(), 1);
    }

    #[test]
    fn test_no_thread_context_uses_module() {
        let resolver = resolver(None, &["m"]);
        assert_eq!(names(&resolver.resolve_providers().unwrap()), vec!["m"]);
    }

    #[test]
    fn test_fallback_disabled() {
        let thread = IsolationContext::new("thread", registry(&[]));
        let module = IsolationContext::new("module", registry(&["m"]));
        let config = ResolverConfig {
            module_fallback: false,
            ..ResolverConfig::default()
        };
        let resolver = DiscoveryResolver::with_accessor(
            config,
            Arc::new(FixedContextAccessor::new(Some(thread), module)),
        );
        assert!(resolver.resolve_providers().unwrap().is_empty());
    }

    #[test]
    fn test_same_context_is_not_scanned_twice() {
        let shared = IsolationContext::new("shared", registry(&[]));
        let resolver = DiscoveryResolver::with_accessor(
            ResolverConfig::default(),
            Arc::new(FixedContextAccessor::new(Some(shared.clone()), shared)),
        );
        assert!(resolver.resolve_providers().unwrap().is_empty());
        assert_eq!(resolver.scan_count(), 1);
    }

    #[test]
    fn test_systemic_failure_is_wrapped() {
        let thread = IsolationContext::new("broken", Arc::new(Offline));
        let module = IsolationContext::new("module", registry(&["m"]));
        let resolver = DiscoveryResolver::with_accessor(
            ResolverConfig::default(),
            Arc::new(FixedContextAccessor::new(Some(thread), module)),
        );
        match resolver.resolve_providers() {
            Err(Error::ProviderResolution { context, .. }) => assert_eq!(context, "broken"),
            other => panic!("expected resolution failure, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_scan_releases_gate() {
        let thread = IsolationContext::new("broken", Arc::new(Offline));
        let module = IsolationContext::new("module", registry(&["m"]));
        let resolver = DiscoveryResolver::with_accessor(
            ResolverConfig::default(),
            Arc::new(FixedContextAccessor::new(Some(thread), module)),
        );
        for _ in 0..3 {
            assert!(resolver.resolve_providers().is_err());
        }
        assert!(lock(&resolver.gates).is_empty());
        assert_eq!(resolver.cache_stats().total_entries, 0);
    }

    #[test]
    fn test_successful_scan_releases_gate() {
        let resolver = resolver(Some(&["a"]), &[]);
        resolver.resolve_providers().unwrap();
        assert!(lock(&resolver.gates).is_empty());
    }

    #[test]
    fn test_clear_cache_forces_rescan() {
        let resolver = resolver(Some(&["a"]), &[]);
        resolver.resolve_providers().unwrap();
        resolver.resolve_providers().unwrap();
        assert_eq!(resolver.scan_count(), 1);

        resolver.clear_cache();
        resolver.resolve_providers().unwrap();
        assert_eq!(resolver.scan_count(), 2);
    }

    #[test]
    fn test_reclaimed_values_are_rediscovered() {
        let resolver = resolver(Some(&["a"]), &[]);
        let first = resolver.resolve_providers().unwrap();
        assert_eq!(resolver.reclaim_cached(), 1);

        let second = resolver.resolve_providers().unwrap();
        assert_eq!(resolver.scan_count(), 2);
        assert_eq!(names(&first), names(&second));
    }

    #[test]
    fn test_release_context() {
        let thread = IsolationContext::new("thread", registry(&["a"]));
        let module = IsolationContext::new("module", registry(&[]));
        let resolver = DiscoveryResolver::with_accessor(
            ResolverConfig::default(),
            Arc::new(FixedContextAccessor::new(Some(thread.clone()), module)),
        );
        resolver.resolve_providers().unwrap();
        assert!(resolver.release_context(&thread));
        assert!(!resolver.release_context(&thread));
        resolver.resolve_providers().unwrap();
        assert_eq!(resolver.scan_count(), 2);
    }

    #[test]
    fn test_snapshot_lists_both_contexts() {
        let resolver = resolver(Some(&[]), &["m"]);
        resolver.resolve_providers().unwrap();
        let snapshot = resolver.cache_snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].context_name, "thread");
        assert_eq!(snapshot[0].providers, Some(Vec::new()));
        assert_eq!(snapshot[1].providers, Some(vec!["m".to_string()]));
    }
}
