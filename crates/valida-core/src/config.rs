//! Resolver configuration
//!
//! Loaded from defaults, then optionally overridden from `VALIDA_*`
//! environment variables. Embedders may also deserialize it from their own
//! configuration files.
//!
//! Copyright (c) 2025 Valida Team
//! Licensed under the Apache-2.0 license

use crate::provider_discovery::CacheConfig;
use serde::{Deserialize, Serialize};

/// Configuration of a [`DiscoveryResolver`](crate::DiscoveryResolver)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Cache settings
    pub cache: CacheConfig,
    /// Retry discovery in the module context when the thread context finds nothing
    pub module_fallback: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            module_fallback: true,
        }
    }
}

impl ResolverConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.merge_with_env();
        config
    }

    /// Apply `VALIDA_*` environment overrides in place
    pub fn merge_with_env(&mut self) {
        self.merge_with(|key| std::env::var(key).ok());
    }

    fn merge_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(enabled) = lookup("VALIDA_CACHE_ENABLED").and_then(|v| parse_bool(&v)) {
            self.cache.enabled = enabled;
        }

        if let Some(value) = lookup("VALIDA_CACHE_MAX_ENTRIES") {
            match value.parse() {
                Ok(max_entries) => self.cache.max_entries = max_entries,
                Err(_) => tracing::warn!(
                    value = %value,
                    "Invalid VALIDA_CACHE_MAX_ENTRIES, using default"
                ),
            }
        }

        if let Some(value) = lookup("VALIDA_CACHE_MAX_AGE_SECS") {
            if value.is_empty() || value == "none" {
                self.cache.max_age_secs = None;
            } else {
                match value.parse() {
                    Ok(secs) => self.cache.max_age_secs = Some(secs),
                    Err(_) => tracing::warn!(
                        value = %value,
                        "Invalid VALIDA_CACHE_MAX_AGE_SECS, using default"
                    ),
                }
            }
        }

        if let Some(fallback) = lookup("VALIDA_MODULE_FALLBACK").and_then(|v| parse_bool(&v)) {
            self.module_fallback = fallback;
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(value = %value, "Ignoring invalid boolean setting");
            None
        }
    }
}
