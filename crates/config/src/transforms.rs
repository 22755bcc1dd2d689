//! Transform chain configuration
//!
//! Each processor family has its own sub-table. Processors run in a
//! fixed order (filtering first, relabeling last); the chain only
//! instantiates the ones that are enabled.

use dnsflow_protocol::{RelabelRule, RelabelRules};
use serde::Deserialize;

use crate::{ConfigError, Result};

/// Per-worker transform configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct TransformsConfig {
    pub filtering: FilteringConfig,
    pub extract: ExtractConfig,
    pub public_suffix: PublicSuffixConfig,
    pub suspicious: SuspiciousConfig,
    pub reducer: ReducerConfig,
    pub machine_learning: MachineLearningConfig,
    pub atags: ATagsConfig,
    pub relabeling: RelabelingConfig,
}

impl TransformsConfig {
    pub fn validate(&self, section: &str) -> Result<()> {
        self.reducer.validate(section)?;
        self.relabeling.validate(section)?;
        Ok(())
    }

    /// Whether any processor is enabled
    pub fn any_enabled(&self) -> bool {
        self.filtering.enable
            || self.extract.enable
            || self.public_suffix.enable
            || self.suspicious.enable
            || self.reducer.enable
            || self.machine_learning.enable
            || self.atags.enable
            || self.relabeling.enable
    }
}

/// Drop or sample messages before they reach the sink
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FilteringConfig {
    pub enable: bool,
    /// Drop query-side messages
    pub drop_queries: bool,
    /// Drop response-side messages
    pub drop_replies: bool,
    /// Qnames to drop (exact match, case-insensitive)
    pub drop_qnames: Vec<String>,
    /// Keep one message in N; 0 disables sampling
    pub sample_rate: i32,
}

/// Attach the base64-encoded raw payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ExtractConfig {
    pub enable: bool,
}

/// Effective TLD extraction
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct PublicSuffixConfig {
    pub enable: bool,
    /// ICANN-managed suffixes (e.g. `co.uk`); the qname's last label is
    /// used when no rule matches
    pub suffixes: Vec<String>,
    /// Privately-managed suffixes (e.g. `github.io`)
    pub private_suffixes: Vec<String>,
}

/// Suspicious-traffic scoring thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SuspiciousConfig {
    pub enable: bool,
    /// Packets larger than this are scored
    pub threshold_packet_len: i32,
    /// Qnames longer than this are scored
    pub threshold_qname_len: usize,
    /// Latency above this (seconds) marks a slow domain
    pub threshold_slow: f64,
    /// Qnames with more labels than this are scored
    pub threshold_max_labels: usize,
    /// Qtypes not in this list are scored
    pub common_qtypes: Vec<String>,
    /// Character sequences that mark a qname suspicious
    pub unallowed_chars: Vec<String>,
}

impl Default for SuspiciousConfig {
    fn default() -> Self {
        Self {
            enable: false,
            threshold_packet_len: 1000,
            threshold_qname_len: 100,
            threshold_slow: 1.0,
            threshold_max_labels: 10,
            common_qtypes: [
                "A", "AAAA", "CNAME", "TXT", "PTR", "NAPTR", "DNSKEY", "SRV", "SOA", "NS", "MX",
                "DS", "HTTPS",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            unallowed_chars: ["\"", "==", "/", ":"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Collapse repeated observations inside a watch interval
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReducerConfig {
    pub enable: bool,
    /// Window length in seconds
    pub watch_interval: u64,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            enable: false,
            watch_interval: 5,
        }
    }
}

impl ReducerConfig {
    pub fn validate(&self, section: &str) -> Result<()> {
        if self.enable && self.watch_interval == 0 {
            return Err(ConfigError::invalid(
                section,
                "reducer watch-interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Qname character statistics for model pipelines
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct MachineLearningConfig {
    pub enable: bool,
}

/// Append operator-defined tags
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ATagsConfig {
    pub enable: bool,
    #[serde(rename = "add-tags")]
    pub tags: Vec<String>,
}

/// One relabeling rule as written in config
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RelabelRuleConfig {
    pub regex: String,
    pub replacement: String,
}

/// Rename or drop keys of the flat projection
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RelabelingConfig {
    pub enable: bool,
    pub rename: Vec<RelabelRuleConfig>,
    pub remove: Vec<RelabelRuleConfig>,
}

impl RelabelingConfig {
    pub fn validate(&self, section: &str) -> Result<()> {
        if self.enable {
            self.compile()
                .map_err(|e| ConfigError::invalid(section, e.to_string()))?;
        }
        Ok(())
    }

    /// Compile the configured rules; rename rules run before remove rules
    pub fn compile(&self) -> dnsflow_protocol::Result<RelabelRules> {
        let mut rules = Vec::with_capacity(self.rename.len() + self.remove.len());
        for rule in &self.rename {
            rules.push(RelabelRule::rename(&rule.regex, &rule.replacement)?);
        }
        for rule in &self.remove {
            rules.push(RelabelRule::remove(&rule.regex)?);
        }
        Ok(RelabelRules::new(rules))
    }
}
