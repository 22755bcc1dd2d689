//! Extract processor - attach the base64-encoded raw payload

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dnsflow_protocol::{DnsMessage, Extracted};

use crate::{Processor, Verdict};

pub struct ExtractProcessor;

impl ExtractProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExtractProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for ExtractProcessor {
    fn process(&self, dm: &mut DnsMessage) -> Verdict {
        dm.extracted = Some(Extracted {
            base64_payload: STANDARD.encode(&dm.dns.payload),
        });
        Verdict::Keep
    }

    fn name(&self) -> &'static str {
        "extract"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_base64_encoded() {
        let processor = ExtractProcessor::new();
        let mut dm = DnsMessage::fake();
        dm.dns.payload = vec![0xde, 0xad, 0xbe, 0xef];

        assert_eq!(processor.process(&mut dm), Verdict::Keep);
        assert_eq!(dm.extracted.unwrap().base64_payload, "3q2+7w==");
    }

    #[test]
    fn empty_payload_encodes_to_empty_string() {
        let processor = ExtractProcessor::new();
        let mut dm = DnsMessage::fake();
        processor.process(&mut dm);
        assert_eq!(dm.extracted.unwrap().base64_payload, "");
    }
}
