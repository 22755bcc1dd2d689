//! Collector (ingress worker) configuration

use std::path::PathBuf;

use serde::Deserialize;

use crate::transforms::TransformsConfig;
use crate::{ConfigError, Result};

/// One named collector instance
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CollectorEntry {
    #[serde(flatten)]
    pub kind: CollectorKind,

    /// Workers receiving messages this collector accepts
    #[serde(default)]
    pub forward: Vec<String>,

    /// Workers receiving messages the transform chain dropped
    #[serde(default)]
    pub dropped: Vec<String>,

    /// Transforms applied before forwarding
    #[serde(default)]
    pub transforms: TransformsConfig,

    /// Input queue capacity override
    #[serde(default)]
    pub channel_buffer_size: Option<usize>,
}

impl CollectorEntry {
    pub fn validate(&self, name: &str) -> Result<()> {
        let section = format!("collectors.{name}");
        match &self.kind {
            CollectorKind::Replay(cfg) => cfg.validate(&section)?,
        }
        self.transforms.validate(&section)?;
        if self.forward.is_empty() && self.dropped.is_empty() {
            return Err(ConfigError::invalid(section, "collector has no routes"));
        }
        Ok(())
    }
}

/// Collector implementations, selected by `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CollectorKind {
    /// Replay newline-delimited JSON observations from a file
    Replay(ReplayCollectorConfig),
}

/// Replay collector settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReplayCollectorConfig {
    /// File of newline-delimited JSON `DnsMessage` records
    pub path: PathBuf,

    /// Messages per second; 0 replays as fast as possible
    #[serde(default)]
    pub rate: u32,

    /// Re-read the file forever instead of stopping at EOF
    #[serde(default)]
    pub repeat: bool,
}

impl ReplayCollectorConfig {
    pub fn validate(&self, section: &str) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::invalid(section, "path must not be empty"));
        }
        Ok(())
    }
}
