//! Per-context cache of discovered providers
//!
//! Keys are held weakly: an entry whose context has been dropped is a miss
//! and is expunged on the next read or write. Values are reclaimable: they can be
//! dropped by [`ProviderCache::reclaim`], by age, or by LRU eviction while
//! the key stays alive, and a reclaimed value is a miss as well.
//!
//! Copyright (c) 2025 Valida Team
//! Licensed under the Apache-2.0 license

use crate::context::{ContextId, IsolationContext};
use crate::provider::ProviderHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Configuration for cache behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of contexts with a cached value
    pub max_entries: usize,
    /// Maximum age of a cached value in seconds; unlimited when unset
    pub max_age_secs: Option<u64>,
    /// Whether to cache at all
    pub enabled: bool,
}

impl CacheConfig {
    pub fn max_age(&self) -> Option<Duration> {
        self.max_age_secs.map(Duration::from_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 64,
            max_age_secs: None,
            enabled: true,
        }
    }
}

/// One cached discovery result
#[derive(Debug)]
struct CacheEntry {
    key: Weak<IsolationContext>,
    context_name: String,
    providers: Option<Arc<[ProviderHandle]>>,
    cached_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(context: &Arc<IsolationContext>, providers: Arc<[ProviderHandle]>) -> Self {
        Self {
            key: Arc::downgrade(context),
            context_name: context.name().to_string(),
            providers: Some(providers),
            cached_at: Utc::now(),
        }
    }

    fn key_alive(&self) -> bool {
        self.key.strong_count() > 0
    }

    fn matches(&self, context: &Arc<IsolationContext>) -> bool {
        self.key
            .upgrade()
            .map(|live| Arc::ptr_eq(&live, context))
            .unwrap_or(false)
    }

    fn is_expired(&self, max_age: Option<Duration>) -> bool {
        let Some(max_age) = max_age else {
            return false;
        };
        let age = Utc::now().signed_duration_since(self.cached_at);
        age.to_std().map(|age| age > max_age).unwrap_or(false)
    }
}

/// In-memory cache of provider sequences keyed by isolation context
#[derive(Debug)]
pub struct ProviderCache {
    entries: HashMap<ContextId, CacheEntry>,
    config: CacheConfig,
    access_order: Vec<ContextId>, // For LRU eviction
}

impl ProviderCache {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
            access_order: Vec::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Cached providers for `context`, if the entry is still live
    pub fn get(&mut self, context: &Arc<IsolationContext>) -> Option<Arc<[ProviderHandle]>> {
        if !self.config.enabled {
            return None;
        }

        self.expunge_stale();

        let id = context.id();
        let max_age = self.config.max_age();
        let state = self
            .entries
            .get(&id)
            .map(|entry| (entry.matches(context), entry.is_expired(max_age)));

        let hit = match state {
            None => None,
            // Same id but a different (or dead) context: never reuse
            Some((false, _)) => {
                self.remove_id(id);
                None
            }
            Some((true, true)) => {
                if let Some(entry) = self.entries.get_mut(&id) {
                    entry.providers = None;
                }
                self.access_order.retain(|p| *p != id);
                None
            }
            Some((true, false)) => self.entries.get(&id).and_then(|e| e.providers.clone()),
        };

        if hit.is_some() {
            self.update_access_order(id);
        }
        hit
    }

    /// Cache `providers` for `context`
    pub fn put(&mut self, context: &Arc<IsolationContext>, providers: Arc<[ProviderHandle]>) {
        if !self.config.enabled {
            return;
        }

        self.expunge_stale();

        let id = context.id();
        if !self.entries.contains_key(&id) && self.live_values() >= self.config.max_entries {
            self.evict_lru();
        }

        self.entries.insert(id, CacheEntry::new(context, providers));
        self.update_access_order(id);
    }

    /// Forget everything cached for `context`
    pub fn invalidate(&mut self, context: &IsolationContext) -> bool {
        self.remove_id(context.id())
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.access_order.clear();
    }

    /// Drop all cached values but keep their keys, as under memory pressure.
    /// Returns how many values were released.
    pub fn reclaim(&mut self) -> usize {
        let mut released = 0;
        for entry in self.entries.values_mut() {
            if entry.providers.take().is_some() {
                released += 1;
            }
        }
        self.access_order.clear();
        released
    }

    /// Remove entries whose context is gone. Returns how many were removed.
    pub fn expunge_stale(&mut self) -> usize {
        let stale: Vec<ContextId> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.key_alive())
            .map(|(id, _)| *id)
            .collect();

        for id in &stale {
            self.remove_id(*id);
        }
        stale.len()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let live_keys = self.entries.values().filter(|e| e.key_alive()).count();
        CacheStats {
            total_entries: self.entries.len(),
            live_keys,
            cached_values: self.live_values(),
            max_entries: self.config.max_entries,
            enabled: self.config.enabled,
        }
    }

    /// Per-entry view for diagnostics
    pub fn snapshot(&self) -> Vec<CacheEntryInfo> {
        let mut entries: Vec<CacheEntryInfo> = self
            .entries
            .iter()
            .map(|(id, entry)| CacheEntryInfo {
                context_id: id.as_u64(),
                context_name: entry.context_name.clone(),
                key_alive: entry.key_alive(),
                providers: entry
                    .providers
                    .as_ref()
                    .map(|providers| providers.iter().map(|p| p.name().to_string()).collect()),
                cached_at: entry.cached_at,
            })
            .collect();
        entries.sort_by_key(|e| e.context_id);
        entries
    }

    fn live_values(&self) -> usize {
        self.entries.values().filter(|e| e.providers.is_some()).count()
    }

    fn evict_lru(&mut self) {
        if let Some(oldest) = self.access_order.first().copied() {
            if let Some(entry) = self.entries.get_mut(&oldest) {
                entry.providers = None;
            }
            self.access_order.retain(|id| *id != oldest);
        }
    }

    fn update_access_order(&mut self, id: ContextId) {
        self.access_order.retain(|p| *p != id);
        self.access_order.push(id);
    }

    fn remove_id(&mut self, id: ContextId) -> bool {
        self.access_order.retain(|p| *p != id);
        self.entries.remove(&id).is_some()
    }
}

impl Default for ProviderCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics for monitoring and debugging
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub live_keys: usize,
    pub cached_values: usize,
    pub max_entries: usize,
    pub enabled: bool,
}

impl CacheStats {
    /// Calculate cache utilization as a percentage
    pub fn utilization(&self) -> f64 {
        if self.max_entries == 0 {
            0.0
        } else {
            (self.cached_values as f64 / self.max_entries as f64) * 100.0
        }
    }
}

/// Diagnostic view of one cache entry
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntryInfo {
    pub context_id: u64,
    pub context_name: String,
    pub key_alive: bool,
    /// Cached provider names; `None` once the value was reclaimed
    pub providers: Option<Vec<String>>,
    pub cached_at: DateTime<Utc>,
}
