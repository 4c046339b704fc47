//! Provider registries
//!
//! A registry enumerates the provider registrations visible inside one
//! isolation context. Enumeration is the systemic step: if it fails, the
//! whole discovery pass for that context fails. Each enumerated
//! [`Candidate`] is instantiated separately, so one broken registration
//! never hides the others.
//!
//! Three registries are provided:
//! - [`InventoryRegistry`]: providers linked into the binary and submitted
//!   with [`submit_provider!`](crate::submit_provider)
//! - [`StaticRegistry`]: an explicit in-memory list
//! - [`ManifestRegistry`]: a directory of JSON manifests naming providers
//!
//! Copyright (c) 2025 Valida Team
//! Licensed under the Apache-2.0 license

use crate::provider::ProviderHandle;
use crate::provider_discovery::{CandidateError, RegistryError};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Enumerates provider registrations for one isolation context
pub trait ServiceRegistry: Send + Sync {
    /// List every registered candidate, in registration order
    fn candidates(&self) -> Result<Vec<Candidate>, RegistryError>;

    /// Short human-readable description, used in logs
    fn describe(&self) -> String {
        "registry".to_string()
    }
}

type Factory = Arc<dyn Fn() -> Result<ProviderHandle, CandidateError> + Send + Sync>;

/// One registered provider, not yet instantiated
#[derive(Clone)]
pub struct Candidate {
    name: String,
    factory: Factory,
}

impl Candidate {
    /// A candidate built by `factory`
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<ProviderHandle> + Send + Sync + 'static,
    {
        let name = name.into();
        let owned = name.clone();
        Self {
            name,
            factory: Arc::new(move || {
                factory().map_err(|source| CandidateError::Instantiation {
                    name: owned.clone(),
                    source,
                })
            }),
        }
    }

    /// A candidate that is known to be broken; instantiating it yields `error`
    pub fn broken(
        name: impl Into<String>,
        error: impl Fn() -> CandidateError + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            factory: Arc::new(move || Err(error())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Construct the provider
    pub fn instantiate(&self) -> Result<ProviderHandle, CandidateError> {
        (self.factory)()
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate").field("name", &self.name).finish_non_exhaustive()
    }
}

/// A provider linked into the binary
///
/// Submitted with [`submit_provider!`](crate::submit_provider) and collected
/// by [`InventoryRegistry`].
pub struct ProviderRegistration {
    pub name: &'static str,
    pub factory: fn() -> anyhow::Result<ProviderHandle>,
}

inventory::collect!(ProviderRegistration);

/// Register a provider type with the compile-time registry
///
/// ```ignore
/// valida_core::submit_provider!("noop", || Ok(ProviderHandle::new(NoopProvider::new())));
/// ```
#[macro_export]
macro_rules! submit_provider {
    ($name:expr, $factory:expr) => {
        $crate::inventory::submit! {
            $crate::registry::ProviderRegistration {
                name: $name,
                factory: $factory,
            }
        }
    };
}

/// Providers submitted with [`submit_provider!`](crate::submit_provider),
/// enumerated by name
#[derive(Debug, Default, Clone, Copy)]
pub struct InventoryRegistry;

impl InventoryRegistry {
    /// All linked registrations, sorted by name
    pub fn registrations() -> Vec<&'static ProviderRegistration> {
        let mut registrations: Vec<_> = inventory::iter::<ProviderRegistration>().collect();
        registrations.sort_by_key(|r| r.name);
        registrations
    }
}

impl ServiceRegistry for InventoryRegistry {
    fn candidates(&self) -> Result<Vec<Candidate>, RegistryError> {
        Ok(Self::registrations()
            .into_iter()
            .map(|r| Candidate::new(r.name, r.factory))
            .collect())
    }

    fn describe(&self) -> String {
        "linked providers".to_string()
    }
}

/// An explicit ordered list of candidates
#[derive(Debug, Default, Clone)]
pub struct StaticRegistry {
    candidates: Vec<Candidate>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a candidate built by `factory`
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<ProviderHandle> + Send + Sync + 'static,
    {
        self.candidates.push(Candidate::new(name, factory));
        self
    }

    /// Append a prepared candidate
    pub fn with_candidate(mut self, candidate: Candidate) -> Self {
        self.candidates.push(candidate);
        self
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl ServiceRegistry for StaticRegistry {
    fn candidates(&self) -> Result<Vec<Candidate>, RegistryError> {
        Ok(self.candidates.clone())
    }

    fn describe(&self) -> String {
        format!("{} static candidate(s)", self.candidates.len())
    }
}

/// Named provider factories a manifest can refer to
#[derive(Clone, Default)]
pub struct FactoryTable {
    factories: HashMap<String, Candidate>,
}

impl FactoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every provider submitted with [`submit_provider!`](crate::submit_provider)
    pub fn linked() -> Self {
        let mut table = Self::new();
        for registration in InventoryRegistry::registrations() {
            table.insert(Candidate::new(registration.name, registration.factory));
        }
        table
    }

    /// Add or replace a factory; the candidate name is the lookup key
    pub fn insert(&mut self, candidate: Candidate) {
        self.factories.insert(candidate.name().to_string(), candidate);
    }

    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<ProviderHandle> + Send + Sync + 'static,
    {
        self.insert(Candidate::new(name, factory));
        self
    }

    fn resolve(&self, name: &str) -> Candidate {
        match self.factories.get(name) {
            Some(candidate) => candidate.clone(),
            None => {
                let owned = name.to_string();
                Candidate::broken(name, move || CandidateError::UnknownProvider {
                    name: owned.clone(),
                })
            }
        }
    }
}

/// On-disk manifest listing provider names
#[derive(Debug, Deserialize)]
struct Manifest {
    providers: Vec<String>,
}

/// Providers named by `*.json` manifests in a directory
///
/// Manifests are read in file-name order and each lists names in order, so
/// enumeration is stable for a given directory. A missing directory means
/// nothing is registered.
#[derive(Clone)]
pub struct ManifestRegistry {
    dir: PathBuf,
    factories: FactoryTable,
}

impl ManifestRegistry {
    /// Resolve manifest names against the linked providers
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_factories(dir, FactoryTable::linked())
    }

    pub fn with_factories(dir: impl Into<PathBuf>, factories: FactoryTable) -> Self {
        Self {
            dir: dir.into(),
            factories,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn manifest_paths(&self) -> Result<Vec<PathBuf>, RegistryError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %self.dir.display(), "Manifest directory not found");
                return Ok(Vec::new());
            }
            Err(e) => return Err(RegistryError::io_error(self.dir.clone(), e)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| RegistryError::io_error(self.dir.clone(), e))?;
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Parsed manifest, or the reason it could not be read
    fn read_manifest(path: &Path) -> Result<Manifest, String> {
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        serde_json::from_str(&content).map_err(|e| e.to_string())
    }
}

impl ServiceRegistry for ManifestRegistry {
    fn candidates(&self) -> Result<Vec<Candidate>, RegistryError> {
        let mut candidates = Vec::new();

        for path in self.manifest_paths()? {
            match Self::read_manifest(&path) {
                Ok(manifest) => {
                    for name in manifest.providers {
                        let name = name.trim();
                        if !name.is_empty() {
                            candidates.push(self.factories.resolve(name));
                        }
                    }
                }
                Err(reason) => {
                    // Surfaced as a failing candidate so discovery logs and skips it
                    let label = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("manifest")
                        .to_string();
                    candidates.push(Candidate::broken(label, move || CandidateError::Malformed {
                        path: path.clone(),
                        reason: reason.clone(),
                    }));
                }
            }
        }

        Ok(candidates)
    }

    fn describe(&self) -> String {
        format!("manifests in {}", self.dir.display())
    }
}
