//! Error types for the Valida core library
//!
//! Bootstrap failures are surfaced as a single [`Error`] enum so callers can
//! tell "nothing installed" apart from "discovery broke" and from "the
//! provider you asked for is not here".
//!
//! Copyright (c) 2025 Valida Team
//! Licensed under the Apache-2.0 license

use crate::provider_discovery::RegistryError;
use thiserror::Error;

/// Main error type for bootstrap operations
#[derive(Error, Debug)]
pub enum Error {
    /// Discovery finished without finding any provider, and a default
    /// provider was requested
    #[error(
        "Unable to create a configuration, because no validation provider could be found. \
         Add a provider such as valida-providers to your build"
    )]
    NoProviderFound,

    /// A specific provider type was requested but none of the discovered
    /// providers has that type
    #[error("Unable to find provider: {requested} (available: {})", format_available(.available))]
    ProviderNotFound {
        requested: String,
        available: Vec<String>,
    },

    /// The registry of an isolation context failed as a whole
    #[error("Unable to get available providers from context '{context}': {source}")]
    ProviderResolution {
        context: String,
        #[source]
        source: RegistryError,
    },

    /// A custom provider resolver failed
    #[error("Provider resolver failed: {message}")]
    Resolver {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// The selected provider could not build its validator factory
    #[error("Configuration error for provider '{provider}': {message}")]
    Configuration {
        provider: String,
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a failure raised by a custom [`ProviderResolver`](crate::ProviderResolver)
    pub fn resolver(source: impl Into<anyhow::Error>) -> Self {
        let source = source.into();
        Self::Resolver {
            message: source.to_string(),
            source,
        }
    }

    /// True when the failure means no provider is installed at all
    pub fn is_no_provider_found(&self) -> bool {
        matches!(self, Self::NoProviderFound)
    }
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}
