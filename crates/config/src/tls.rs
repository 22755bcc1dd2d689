//! TLS client options shared by network loggers

use std::path::PathBuf;

use serde::Deserialize;

use crate::{ConfigError, Result};

/// TLS settings for an outbound connection
///
/// The rustls backend supports TLS 1.2 and 1.3; anything else in
/// `min-version` is a fatal config error. When `insecure-skip-verify`
/// is set the server certificate is not validated - test setups only.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct TlsClientOptions {
    /// Enable TLS for this connection
    pub enable: bool,

    /// Minimum accepted protocol version: `1.2` or `1.3`
    pub min_version: String,

    /// PEM bundle of trusted roots; required unless skipping verification
    pub ca_file: Option<PathBuf>,

    /// Client certificate (PEM), enables mutual TLS together with `key-file`
    pub cert_file: Option<PathBuf>,

    /// Client private key (PEM)
    pub key_file: Option<PathBuf>,

    /// Disable server certificate validation
    pub insecure_skip_verify: bool,
}

impl Default for TlsClientOptions {
    fn default() -> Self {
        Self {
            enable: false,
            min_version: "1.2".to_string(),
            ca_file: None,
            cert_file: None,
            key_file: None,
            insecure_skip_verify: false,
        }
    }
}

impl TlsClientOptions {
    pub fn validate(&self, section: &str) -> Result<()> {
        if !matches!(self.min_version.as_str(), "1.2" | "1.3") {
            return Err(ConfigError::invalid(
                section,
                format!(
                    "invalid tls min version `{}`, must be 1.2 or 1.3",
                    self.min_version
                ),
            ));
        }
        if self.enable && !self.insecure_skip_verify && self.ca_file.is_none() {
            return Err(ConfigError::invalid(
                section,
                "tls requires a ca-file unless insecure-skip-verify is set",
            ));
        }
        if self.cert_file.is_some() != self.key_file.is_some() {
            return Err(ConfigError::invalid(
                section,
                "cert-file and key-file must be set together",
            ));
        }
        Ok(())
    }
}
