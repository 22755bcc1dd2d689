//! Public-suffix processor - effective TLD extraction
//!
//! Matches the qname against operator-supplied suffix rules, longest
//! rule first. Rules from `suffixes` are treated as ICANN-managed,
//! rules from `private-suffixes` as privately managed. When no rule
//! matches, the qname's last label is taken as the suffix and marked
//! unmanaged.

use dnsflow_config::PublicSuffixConfig;
use dnsflow_protocol::{DnsMessage, PublicSuffix};

use crate::{Processor, Verdict};

struct SuffixRule {
    /// Labels of the suffix, e.g. `["co", "uk"]`
    labels: Vec<String>,
    icann: bool,
}

pub struct PublicSuffixProcessor {
    /// Sorted by label count, longest first
    rules: Vec<SuffixRule>,
}

impl PublicSuffixProcessor {
    pub fn new(config: &PublicSuffixConfig) -> Self {
        let mut rules: Vec<SuffixRule> = config
            .suffixes
            .iter()
            .map(|s| (s, true))
            .chain(config.private_suffixes.iter().map(|s| (s, false)))
            .map(|(suffix, icann)| SuffixRule {
                labels: suffix
                    .trim_matches('.')
                    .to_lowercase()
                    .split('.')
                    .map(str::to_string)
                    .collect(),
                icann,
            })
            .collect();
        rules.sort_by(|a, b| b.labels.len().cmp(&a.labels.len()));
        Self { rules }
    }

    fn lookup(&self, labels: &[&str]) -> (usize, bool) {
        for rule in &self.rules {
            if rule.labels.len() > labels.len() {
                continue;
            }
            let tail = &labels[labels.len() - rule.labels.len()..];
            if tail
                .iter()
                .zip(&rule.labels)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
            {
                return (rule.labels.len(), rule.icann);
            }
        }
        // no rule: the last label is the suffix
        (1, false)
    }
}

impl Processor for PublicSuffixProcessor {
    fn process(&self, dm: &mut DnsMessage) -> Verdict {
        let qname = dm.dns.qname.trim_end_matches('.');
        if qname.is_empty() || qname == "-" {
            return Verdict::Keep;
        }

        let labels: Vec<&str> = qname.split('.').collect();
        let (suffix_len, icann) = self.lookup(&labels);

        let suffix = labels[labels.len() - suffix_len..].join(".");
        let etld_plus_one = if labels.len() > suffix_len {
            labels[labels.len() - suffix_len - 1..].join(".")
        } else {
            suffix.clone()
        };

        dm.public_suffix = Some(PublicSuffix {
            public_suffix: suffix,
            etld_plus_one,
            managed_by_icann: icann,
        });
        Verdict::Keep
    }

    fn name(&self) -> &'static str {
        "public-suffix"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor(suffixes: &[&str], private: &[&str]) -> PublicSuffixProcessor {
        PublicSuffixProcessor::new(&PublicSuffixConfig {
            enable: true,
            suffixes: suffixes.iter().map(|s| s.to_string()).collect(),
            private_suffixes: private.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn longest_rule_wins() {
        let p = processor(&["uk", "co.uk"], &[]);
        let mut dm = DnsMessage::fake();
        dm.dns.qname = "www.example.co.uk".into();
        p.process(&mut dm);

        let ps = dm.public_suffix.unwrap();
        assert_eq!(ps.public_suffix, "co.uk");
        assert_eq!(ps.etld_plus_one, "example.co.uk");
        assert!(ps.managed_by_icann);
    }

    #[test]
    fn private_rules_are_unmanaged() {
        let p = processor(&["io"], &["github.io"]);
        let mut dm = DnsMessage::fake();
        dm.dns.qname = "user.github.io".into();
        p.process(&mut dm);

        let ps = dm.public_suffix.unwrap();
        assert_eq!(ps.public_suffix, "github.io");
        assert_eq!(ps.etld_plus_one, "user.github.io");
        assert!(!ps.managed_by_icann);
    }

    #[test]
    fn fallback_uses_last_label() {
        let p = processor(&[], &[]);
        let mut dm = DnsMessage::fake();
        p.process(&mut dm);

        let ps = dm.public_suffix.unwrap();
        assert_eq!(ps.public_suffix, "collector");
        assert_eq!(ps.etld_plus_one, "dns.collector");
        assert!(!ps.managed_by_icann);
    }

    #[test]
    fn bare_suffix_has_no_larger_etld() {
        let p = processor(&["com"], &[]);
        let mut dm = DnsMessage::fake();
        dm.dns.qname = "com".into();
        p.process(&mut dm);

        let ps = dm.public_suffix.unwrap();
        assert_eq!(ps.public_suffix, "com");
        assert_eq!(ps.etld_plus_one, "com");
    }

    #[test]
    fn placeholder_qname_is_skipped() {
        let p = processor(&["com"], &[]);
        let mut dm = DnsMessage::init();
        p.process(&mut dm);
        assert!(dm.public_suffix.is_none());
    }
}
