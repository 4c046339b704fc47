//! Valida Core - validation provider discovery and bootstrap
//!
//! This crate locates a validation engine ("provider") at runtime and hands
//! the caller a configuration for it. It contains no validation engine of
//! its own.
//!
//! # Main Components
//!
//! - **Provider contract**: [`ValidationProvider`] and [`ValidatorFactory`]
//! - **Isolation contexts**: which registrations a discovery pass can see
//! - **Registries**: compile-time, static and manifest-based provider lists
//! - **Discovery**: [`DiscoveryResolver`] with a per-context cache
//! - **Bootstrap**: [`by_default_provider`], [`by_provider`] and
//!   [`build_default_validator_factory`]
//!
//! # Example
//!
//! ```no_run
//! use valida_core::{DiscoveryResolver, Result};
//!
//! fn example() -> Result<()> {
//!     for provider in DiscoveryResolver::global().resolve_providers()? {
//!         println!("{} ({})", provider.name(), provider.type_name());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Copyright (c) 2025 Valida Team
//! Licensed under the Apache-2.0 license

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod provider;
pub mod provider_discovery;
pub mod registry;

#[doc(hidden)]
pub use inventory;

pub use bootstrap::{
    build_default_validator_factory, by_default_provider, by_provider, select_by_name,
    select_by_type, select_default, Configuration, GenericBootstrap, ProviderResolver,
    ProviderSpecificBootstrap,
};
pub use config::ResolverConfig;
pub use context::{ContextAccessor, IsolationContext};
pub use error::{Error, Result};
pub use provider::{ConfigurationState, ProviderHandle, ValidationProvider, ValidatorFactory};
pub use provider_discovery::{CacheConfig, CacheStats, DiscoveryResolver};
pub use registry::{ManifestRegistry, ServiceRegistry, StaticRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Providers visible to the caller through the process-wide resolver
pub fn resolve_providers() -> Result<Vec<ProviderHandle>> {
    DiscoveryResolver::global().resolve_providers()
}

/// Force the process-wide resolver to rediscover providers
pub fn clear_cache() {
    DiscoveryResolver::global().clear_cache();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_global_resolver_is_shared() {
        let a = DiscoveryResolver::global();
        let b = DiscoveryResolver::global();
        assert!(std::sync::Arc::ptr_eq(&a, &b));
    }
}
