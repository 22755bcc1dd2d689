//! Configuration error types

use thiserror::Error;

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or shape error
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A section failed validation; the worker it describes must not start
    #[error("invalid configuration for `{section}`: {reason}")]
    Invalid { section: String, reason: String },
}

impl ConfigError {
    /// Shorthand for a validation failure in a named section
    pub fn invalid(section: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            section: section.into(),
            reason: reason.into(),
        }
    }
}
