//! Relabeling processor - attach flatten-time key rules
//!
//! Rules are compiled once when the chain is built and shared across
//! messages through an `Arc`; the actual rename/remove work happens in
//! `DnsMessage::flatten`.

use std::sync::Arc;

use dnsflow_config::RelabelingConfig;
use dnsflow_protocol::{DnsMessage, RelabelRules};

use crate::{Processor, Result, Verdict};

pub struct RelabelingProcessor {
    rules: Arc<RelabelRules>,
}

impl RelabelingProcessor {
    pub fn new(config: &RelabelingConfig) -> Result<Self> {
        Ok(Self {
            rules: Arc::new(config.compile()?),
        })
    }
}

impl Processor for RelabelingProcessor {
    fn process(&self, dm: &mut DnsMessage) -> Verdict {
        if !self.rules.is_empty() {
            dm.relabeling = Some(Arc::clone(&self.rules));
        }
        Verdict::Keep
    }

    fn name(&self) -> &'static str {
        "relabeling"
    }
}
