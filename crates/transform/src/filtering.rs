//! Filtering processor - drop or sample messages
//!
//! Checks run cheapest-first: query/reply side, qname drop list, then
//! sampling. Sampling keeps one message in N using a shared counter, so
//! the kept set is deterministic for a given message sequence.

use std::sync::atomic::{AtomicU64, Ordering};

use dnsflow_config::FilteringConfig;
use dnsflow_protocol::{DnsMessage, Filtering};

use crate::{Processor, Verdict};

pub struct FilteringProcessor {
    drop_queries: bool,
    drop_replies: bool,
    /// Lowercased for case-insensitive matching
    drop_qnames: Vec<String>,
    sample_rate: i32,
    seen: AtomicU64,
}

impl FilteringProcessor {
    pub fn new(config: &FilteringConfig) -> Self {
        Self {
            drop_queries: config.drop_queries,
            drop_replies: config.drop_replies,
            drop_qnames: config.drop_qnames.iter().map(|q| q.to_lowercase()).collect(),
            sample_rate: config.sample_rate,
            seen: AtomicU64::new(0),
        }
    }
}

impl Processor for FilteringProcessor {
    fn process(&self, dm: &mut DnsMessage) -> Verdict {
        if self.drop_queries && !dm.dns.flags.qr {
            return Verdict::Drop;
        }
        if self.drop_replies && dm.dns.flags.qr {
            return Verdict::Drop;
        }

        if !self.drop_qnames.is_empty() {
            let qname = dm.dns.qname.to_lowercase();
            if self.drop_qnames.iter().any(|q| q == &qname) {
                return Verdict::Drop;
            }
        }

        if self.sample_rate > 1 {
            let n = self.seen.fetch_add(1, Ordering::Relaxed);
            if n % self.sample_rate as u64 != 0 {
                return Verdict::Drop;
            }
            dm.filtering = Some(Filtering {
                sample_rate: self.sample_rate,
            });
        }

        Verdict::Keep
    }

    fn name(&self) -> &'static str {
        "filtering"
    }

    fn reset(&self) {
        self.seen.store(0, Ordering::Relaxed);
    }
}
