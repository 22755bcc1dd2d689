//! Logger (egress worker) configuration
//!
//! Each logger type carries its own table; shared concerns (routes,
//! transforms, queue size) live on the entry. Validation here is the
//! startup gate: a logger whose config fails validation never runs.

use std::path::PathBuf;

use dnsflow_protocol::TextDirective;
use serde::Deserialize;

use crate::tls::TlsClientOptions;
use crate::transforms::TransformsConfig;
use crate::{ConfigError, Result};

/// One named logger instance
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggerEntry {
    #[serde(flatten)]
    pub kind: LoggerKind,

    /// Downstream workers that also receive accepted messages
    #[serde(default)]
    pub forward: Vec<String>,

    /// Workers receiving messages the transform chain dropped
    #[serde(default)]
    pub dropped: Vec<String>,

    /// Transforms applied before logging
    #[serde(default)]
    pub transforms: TransformsConfig,

    /// Input queue capacity override
    #[serde(default)]
    pub channel_buffer_size: Option<usize>,
}

impl LoggerEntry {
    pub fn validate(&self, name: &str) -> Result<()> {
        let section = format!("loggers.{name}");
        match &self.kind {
            LoggerKind::Stdout(cfg) => cfg.validate(&section)?,
            LoggerKind::File(cfg) => cfg.validate(&section)?,
            LoggerKind::Tcp(cfg) => cfg.validate(&section)?,
            LoggerKind::BulkHttp(cfg) => cfg.validate(&section)?,
            LoggerKind::Mqtt(cfg) => cfg.validate(&section)?,
        }
        self.transforms.validate(&section)
    }
}

/// Logger implementations, selected by `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LoggerKind {
    Stdout(StdoutLoggerConfig),
    File(FileLoggerConfig),
    Tcp(TcpLoggerConfig),
    BulkHttp(BulkHttpLoggerConfig),
    Mqtt(MqttLoggerConfig),
}

/// Serialization chosen by a logger's `mode`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SerializationMode {
    #[default]
    Text,
    Json,
    FlatJson,
}

fn validate_text_format(format: &Option<String>, section: &str) -> Result<()> {
    if let Some(format) = format {
        TextDirective::parse_format(format)
            .map_err(|e| ConfigError::invalid(section, e.to_string()))?;
    }
    Ok(())
}

/// Stdout logger settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StdoutLoggerConfig {
    pub mode: SerializationMode,
    /// Overrides the global text format in text mode
    pub text_format: Option<String>,
}

impl StdoutLoggerConfig {
    pub fn validate(&self, section: &str) -> Result<()> {
        validate_text_format(&self.text_format, section)
    }
}

/// File logger settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileLoggerConfig {
    /// Destination file; rotated siblings are `<path>.<n>`
    pub file_path: PathBuf,

    #[serde(default)]
    pub mode: SerializationMode,

    #[serde(default)]
    pub text_format: Option<String>,

    /// Rotate after this many megabytes; 0 disables size rotation
    #[serde(default = "default_max_size")]
    pub max_size: u64,

    /// Rotated files kept before the oldest is deleted
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Rotate every this many seconds; 0 disables interval rotation
    #[serde(default)]
    pub rotation_interval: u64,

    /// Seconds between buffered-write flushes; 0 flushes per message
    #[serde(default = "default_file_flush")]
    pub flush_interval: u64,
}

fn default_max_size() -> u64 {
    100
}

fn default_max_files() -> usize {
    10
}

fn default_file_flush() -> u64 {
    10
}

impl FileLoggerConfig {
    pub fn validate(&self, section: &str) -> Result<()> {
        if self.file_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid(section, "file-path must not be empty"));
        }
        if self.max_files == 0 {
            return Err(ConfigError::invalid(
                section,
                "max-files must be greater than zero",
            ));
        }
        validate_text_format(&self.text_format, section)
    }
}

/// TCP publisher settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TcpLoggerConfig {
    pub remote_address: String,
    pub remote_port: u16,
    pub mode: SerializationMode,
    pub text_format: Option<String>,

    /// Messages buffered before a size-triggered flush
    pub buffer_size: usize,

    /// Seconds between time-triggered flushes
    pub flush_interval: u64,

    /// Bound for one connection attempt, seconds
    pub connect_timeout: u64,

    /// Wait between reconnection attempts, seconds
    pub retry_interval: u64,

    pub tls: TlsClientOptions,
}

impl Default for TcpLoggerConfig {
    fn default() -> Self {
        Self {
            remote_address: "127.0.0.1".to_string(),
            remote_port: 9999,
            mode: SerializationMode::FlatJson,
            text_format: None,
            buffer_size: 100,
            flush_interval: 30,
            connect_timeout: 5,
            retry_interval: 10,
            tls: TlsClientOptions::default(),
        }
    }
}

impl TcpLoggerConfig {
    pub fn validate(&self, section: &str) -> Result<()> {
        if self.remote_address.is_empty() {
            return Err(ConfigError::invalid(section, "remote-address must not be empty"));
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::invalid(
                section,
                "buffer-size must be greater than zero",
            ));
        }
        if self.flush_interval == 0 {
            return Err(ConfigError::invalid(
                section,
                "flush-interval must be greater than zero",
            ));
        }
        self.tls.validate(section)?;
        validate_text_format(&self.text_format, section)
    }
}

/// Bulk HTTP logger settings (search-backend bulk shape)
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BulkHttpLoggerConfig {
    /// Base URL of the receiver
    pub server: String,

    /// Target index name
    pub index: String,

    /// Bytes of payload buffered before a size-triggered flush
    pub bulk_size: usize,

    /// Pending bulk bodies between the buffer loop and the HTTP loop
    pub bulk_channel_size: usize,

    /// Seconds between time-triggered flushes
    pub flush_interval: u64,

    /// Per-request timeout, seconds
    pub connect_timeout: u64,

    pub basic_auth_enabled: bool,
    pub basic_auth_login: String,
    pub basic_auth_pwd: String,
}

impl Default for BulkHttpLoggerConfig {
    fn default() -> Self {
        Self {
            server: "http://127.0.0.1:9200/".to_string(),
            index: "dnsflow".to_string(),
            bulk_size: 1_048_576,
            bulk_channel_size: 10,
            flush_interval: 10,
            connect_timeout: 5,
            basic_auth_enabled: false,
            basic_auth_login: String::new(),
            basic_auth_pwd: String::new(),
        }
    }
}

impl BulkHttpLoggerConfig {
    pub fn validate(&self, section: &str) -> Result<()> {
        if !self.server.starts_with("http://") && !self.server.starts_with("https://") {
            return Err(ConfigError::invalid(
                section,
                "server must be an http:// or https:// URL",
            ));
        }
        if self.index.is_empty() {
            return Err(ConfigError::invalid(section, "index must not be empty"));
        }
        if self.bulk_size == 0 {
            return Err(ConfigError::invalid(section, "bulk-size must be greater than zero"));
        }
        if self.basic_auth_enabled && self.basic_auth_login.is_empty() {
            return Err(ConfigError::invalid(
                section,
                "basic-auth-login must be set when basic auth is enabled",
            ));
        }
        Ok(())
    }
}

/// MQTT publisher settings
///
/// Validated like every other logger so a broken broker config refuses
/// to start; the broker client itself is provided by the sink layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MqttLoggerConfig {
    pub remote_address: String,
    pub remote_port: u16,
    pub topic: String,

    /// Delivery quality of service: 0, 1 or 2
    pub qos: u8,

    /// Broker protocol: `v3`, `v5` or `auto`
    pub protocol_version: String,

    pub mode: SerializationMode,
    pub text_format: Option<String>,
    pub buffer_size: usize,
    pub flush_interval: u64,
    pub connect_timeout: u64,
    pub retry_interval: u64,
    pub username: String,
    pub password: String,
    pub tls: TlsClientOptions,
}

impl Default for MqttLoggerConfig {
    fn default() -> Self {
        Self {
            remote_address: "127.0.0.1".to_string(),
            remote_port: 1883,
            topic: "dnsflow".to_string(),
            qos: 0,
            protocol_version: "auto".to_string(),
            mode: SerializationMode::Text,
            text_format: None,
            buffer_size: 100,
            flush_interval: 30,
            connect_timeout: 5,
            retry_interval: 10,
            username: String::new(),
            password: String::new(),
            tls: TlsClientOptions::default(),
        }
    }
}

impl MqttLoggerConfig {
    pub fn validate(&self, section: &str) -> Result<()> {
        if self.qos > 2 {
            return Err(ConfigError::invalid(
                section,
                "invalid qos value, must be 0, 1, or 2",
            ));
        }
        let protocol = self.protocol_version.to_lowercase();
        if !matches!(protocol.as_str(), "v3" | "v5" | "auto") {
            return Err(ConfigError::invalid(
                section,
                "invalid protocol version, must be v3, v5, or auto",
            ));
        }
        self.tls.validate(section)?;
        validate_text_format(&self.text_format, section)
    }
}
