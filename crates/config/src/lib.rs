//! Dnsflow Configuration
//!
//! TOML-based configuration with sensible defaults - a minimal config
//! only names its workers and routes. Validation happens once at load
//! time; anything that would make a worker refuse to start (bad TLS
//! version, bad QoS, unknown text directive) is a fatal error here, so
//! the process exits before any traffic flows.
//!
//! # Example
//!
//! ```toml
//! [collectors.tap]
//! type = "replay"
//! path = "queries.jsonl"
//! forward = ["console", "archive"]
//!
//! [loggers.console]
//! type = "stdout"
//! mode = "text"
//!
//! [loggers.archive]
//! type = "file"
//! file-path = "/var/log/dns/queries.log"
//! mode = "flat-json"
//! ```

mod collectors;
mod error;
mod global;
mod loggers;
mod tls;
mod transforms;

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub use collectors::{CollectorEntry, CollectorKind, ReplayCollectorConfig};
pub use error::ConfigError;
pub use global::GlobalConfig;
pub use loggers::{
    BulkHttpLoggerConfig, FileLoggerConfig, LoggerEntry, LoggerKind, MqttLoggerConfig,
    SerializationMode, StdoutLoggerConfig, TcpLoggerConfig,
};
pub use tls::TlsClientOptions;
pub use transforms::{
    ATagsConfig, ExtractConfig, FilteringConfig, MachineLearningConfig, PublicSuffixConfig,
    ReducerConfig, RelabelRuleConfig, RelabelingConfig, SuspiciousConfig, TransformsConfig,
};

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root configuration
///
/// Worker sections are maps of instance name to entry; the name is the
/// route target other workers refer to.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Defaults shared by all workers
    pub global: GlobalConfig,

    /// Ingress workers, by name
    pub collectors: HashMap<String, CollectorEntry>,

    /// Egress workers, by name
    pub loggers: HashMap<String, LoggerEntry>,
}

impl Config {
    /// Load and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        raw.parse()
    }

    /// Validate every section
    ///
    /// Fatal config errors (invalid TLS min version, invalid QoS,
    /// invalid protocol version, unknown text directive, bad relabel
    /// pattern) surface here and must abort startup.
    pub fn validate(&self) -> Result<()> {
        self.global.validate()?;
        for (name, entry) in &self.collectors {
            entry.validate(name)?;
        }
        for (name, entry) in &self.loggers {
            entry.validate(name)?;
        }
        Ok(())
    }

    /// Effective input queue size for a worker
    ///
    /// Per-worker override when positive, global default otherwise.
    pub fn channel_buffer_size(&self, per_worker: Option<usize>) -> usize {
        match per_worker {
            Some(size) if size > 0 => size,
            _ => self.global.channel_buffer_size,
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
