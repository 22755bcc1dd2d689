//! Global defaults shared by all workers

use dnsflow_protocol::TextDirective;
use serde::Deserialize;

use crate::{ConfigError, Result};

/// Default text format, matching the historical wire-log layout
pub const DEFAULT_TEXT_FORMAT: &str = "timestamp-rfc3339ns identity operation rcode queryip \
                                       queryport family protocol length-unit qname qtype latency";

/// Settings every worker inherits unless it overrides them
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default directive list for text-mode serialization
    pub text_format: String,

    /// Token separator for text mode
    pub text_format_delimiter: String,

    /// Quote character for tokens containing the delimiter
    pub text_format_boundary: String,

    /// Default input queue capacity per worker
    pub channel_buffer_size: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            text_format: DEFAULT_TEXT_FORMAT.to_string(),
            text_format_delimiter: " ".to_string(),
            text_format_boundary: "\"".to_string(),
            channel_buffer_size: 4096,
        }
    }
}

impl GlobalConfig {
    pub fn validate(&self) -> Result<()> {
        TextDirective::parse_format(&self.text_format)
            .map_err(|e| ConfigError::invalid("global", e.to_string()))?;
        if self.channel_buffer_size == 0 {
            return Err(ConfigError::invalid(
                "global",
                "channel-buffer-size must be greater than zero",
            ));
        }
        Ok(())
    }
}
