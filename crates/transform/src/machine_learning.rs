//! Machine-learning processor - qname character statistics
//!
//! Derives the feature vector consumed by model pipelines: entropy,
//! per-class character counts and ratios, and consecutive-run counts.
//! Runs late in the chain so it can observe the reducer's occurrence
//! count when both are enabled.

use std::collections::HashMap;

use dnsflow_protocol::{DnsMessage, MachineLearning};

use crate::{Processor, Verdict};

const COMMON_QTYPES: &[&str] = &[
    "A", "AAAA", "CNAME", "TXT", "PTR", "NAPTR", "DNSKEY", "SRV", "SOA", "NS", "MX", "DS", "HTTPS",
];

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

fn is_consonant(c: char) -> bool {
    c.is_ascii_alphabetic() && !is_vowel(c)
}

fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_insert(0) += 1;
    }
    let total = s.chars().count() as f64;
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum()
}

pub struct MachineLearningProcessor;

impl MachineLearningProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MachineLearningProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for MachineLearningProcessor {
    fn process(&self, dm: &mut DnsMessage) -> Verdict {
        let qname = dm.dns.qname.trim_end_matches('.');

        let mut digits = 0;
        let mut lowers = 0;
        let mut uppers = 0;
        let mut specials = 0;
        let mut others = 0;
        let mut consecutive_chars = 0;
        let mut consecutive_vowels = 0;
        let mut consecutive_digits = 0;
        let mut consecutive_consonants = 0;

        let mut prev: Option<char> = None;
        for c in qname.chars() {
            if c.is_ascii_digit() {
                digits += 1;
            } else if c.is_ascii_lowercase() {
                lowers += 1;
            } else if c.is_ascii_uppercase() {
                uppers += 1;
            } else if matches!(c, '.' | '-' | '_') {
                specials += 1;
            } else {
                others += 1;
            }

            if let Some(p) = prev {
                if p == c {
                    consecutive_chars += 1;
                }
                if is_vowel(p) && is_vowel(c) {
                    consecutive_vowels += 1;
                }
                if p.is_ascii_digit() && c.is_ascii_digit() {
                    consecutive_digits += 1;
                }
                if is_consonant(p) && is_consonant(c) {
                    consecutive_consonants += 1;
                }
            }
            prev = Some(c);
        }

        let length = qname.chars().count() as i32;
        let letters = lowers + uppers;
        let ratio = |count: i32| {
            if length == 0 {
                0.0
            } else {
                count as f32 / length as f32
            }
        };

        dm.machine_learning = Some(MachineLearning {
            entropy: shannon_entropy(qname),
            length,
            labels: if qname.is_empty() {
                0
            } else {
                qname.split('.').count() as i32
            },
            digits,
            lowers,
            uppers,
            specials,
            others,
            ratio_digits: ratio(digits),
            ratio_letters: ratio(letters),
            ratio_specials: ratio(specials),
            ratio_others: ratio(others),
            consecutive_chars,
            consecutive_vowels,
            consecutive_digits,
            consecutive_consonants,
            size: dm.dns.length,
            occurrences: dm.reducer.map(|r| r.occurrences as i32).unwrap_or(0),
            uncommon_qtypes: i32::from(!COMMON_QTYPES.contains(&dm.dns.qtype.as_str())),
        });
        Verdict::Keep
    }

    fn name(&self) -> &'static str {
        "machine-learning"
    }
}
