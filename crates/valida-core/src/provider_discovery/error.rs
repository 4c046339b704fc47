//! Error types for provider discovery

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a registry as a whole. Aborts discovery for the context.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The registry location could not be read
    #[error("Failed to read provider registry at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The registry refused to enumerate its candidates
    #[error("Provider registry unavailable: {reason}")]
    Unavailable { reason: String },
}

impl RegistryError {
    /// Create an I/O error with path context
    pub fn io_error(path: PathBuf, error: std::io::Error) -> Self {
        Self::Io {
            path,
            source: error,
        }
    }
}

/// Failure of one registered candidate. Never surfaced to bootstrap callers.
#[derive(Error, Debug)]
pub enum CandidateError {
    /// The registration names a provider nobody can construct
    #[error("No factory registered for provider '{name}'")]
    UnknownProvider { name: String },

    /// A registration entry could not be parsed
    #[error("Malformed registration in '{}': {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    /// The provider factory failed
    #[error("Failed to instantiate provider '{name}': {source}")]
    Instantiation {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}
