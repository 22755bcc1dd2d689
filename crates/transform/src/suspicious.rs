//! Suspicious processor - heuristic traffic scoring
//!
//! Each triggered heuristic adds one point to the score and sets its
//! flag. The thresholds come from configuration so operators can tune
//! them per deployment.

use dnsflow_config::SuspiciousConfig;
use dnsflow_protocol::{DnsMessage, Suspicious};

use crate::{Processor, Verdict};

pub struct SuspiciousProcessor {
    threshold_packet_len: i32,
    threshold_qname_len: usize,
    threshold_slow: f64,
    threshold_max_labels: usize,
    common_qtypes: Vec<String>,
    unallowed_chars: Vec<String>,
}

impl SuspiciousProcessor {
    pub fn new(config: &SuspiciousConfig) -> Self {
        Self {
            threshold_packet_len: config.threshold_packet_len,
            threshold_qname_len: config.threshold_qname_len,
            threshold_slow: config.threshold_slow,
            threshold_max_labels: config.threshold_max_labels,
            common_qtypes: config.common_qtypes.clone(),
            unallowed_chars: config.unallowed_chars.clone(),
        }
    }
}

impl Processor for SuspiciousProcessor {
    fn process(&self, dm: &mut DnsMessage) -> Verdict {
        let mut suspicious = Suspicious::default();

        if dm.dns.malformed_packet {
            suspicious.malformed_packet = true;
            suspicious.score += 1.0;
        }
        if dm.dns.length > self.threshold_packet_len {
            suspicious.large_packet = true;
            suspicious.score += 1.0;
        }
        if dm.dns.qname.len() > self.threshold_qname_len {
            suspicious.long_domain = true;
            suspicious.score += 1.0;
        }
        if dm.dnstap.latency > self.threshold_slow {
            suspicious.slow_domain = true;
            suspicious.score += 1.0;
        }
        if self
            .unallowed_chars
            .iter()
            .any(|chars| dm.dns.qname.contains(chars.as_str()))
        {
            suspicious.unallowed_chars = true;
            suspicious.score += 1.0;
        }
        if !self.common_qtypes.iter().any(|qt| qt == &dm.dns.qtype) {
            suspicious.uncommon_qtypes = true;
            suspicious.score += 1.0;
        }
        if dm.dns.qname.split('.').count() > self.threshold_max_labels {
            suspicious.excessive_number_labels = true;
            suspicious.score += 1.0;
        }

        if suspicious.score > 0.0 {
            suspicious.domain = dm.dns.qname.clone();
        }
        dm.suspicious = Some(suspicious);
        Verdict::Keep
    }

    fn name(&self) -> &'static str {
        "suspicious"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor() -> SuspiciousProcessor {
        SuspiciousProcessor::new(&SuspiciousConfig::default())
    }

    #[test]
    fn clean_message_scores_zero() {
        let mut dm = DnsMessage::fake();
        processor().process(&mut dm);

        let s = dm.suspicious.unwrap();
        assert_eq!(s.score, 0.0);
        assert!(s.domain.is_empty());
        assert!(!s.uncommon_qtypes);
    }

    #[test]
    fn uncommon_qtype_is_scored() {
        let mut dm = DnsMessage::fake();
        dm.dns.qtype = "NULL".into();
        processor().process(&mut dm);

        let s = dm.suspicious.unwrap();
        assert!(s.uncommon_qtypes);
        assert_eq!(s.score, 1.0);
        assert_eq!(s.domain, "dns.collector");
    }

    #[test]
    fn heuristics_accumulate() {
        let mut dm = DnsMessage::fake();
        dm.dns.malformed_packet = true;
        dm.dns.length = 2000;
        dm.dns.qname = format!("{}.example.com", "a".repeat(120));
        dm.dnstap.latency = 3.0;
        processor().process(&mut dm);

        let s = dm.suspicious.unwrap();
        assert!(s.malformed_packet);
        assert!(s.large_packet);
        assert!(s.long_domain);
        assert!(s.slow_domain);
        assert_eq!(s.score, 4.0);
    }

    #[test]
    fn excessive_labels_detected() {
        let mut dm = DnsMessage::fake();
        dm.dns.qname = "a.b.c.d.e.f.g.h.i.j.k.example.com".into();
        processor().process(&mut dm);
        assert!(dm.suspicious.unwrap().excessive_number_labels);
    }
}
