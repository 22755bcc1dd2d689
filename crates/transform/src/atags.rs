//! ATags processor - append operator-defined tags

use dnsflow_config::ATagsConfig;
use dnsflow_protocol::{ATags, DnsMessage};

use crate::{Processor, Verdict};

pub struct ATagsProcessor {
    tags: Vec<String>,
}

impl ATagsProcessor {
    pub fn new(config: &ATagsConfig) -> Self {
        Self {
            tags: config.tags.clone(),
        }
    }
}

impl Processor for ATagsProcessor {
    fn process(&self, dm: &mut DnsMessage) -> Verdict {
        let atags = dm.atags.get_or_insert_with(ATags::default);
        atags.tags.extend(self.tags.iter().cloned());
        Verdict::Keep
    }

    fn name(&self) -> &'static str {
        "atags"
    }
}
