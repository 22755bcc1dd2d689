//! Tests for the message model

use super::*;
use crate::DnsMessage;

#[test]
fn fake_message_is_populated() {
    let dm = DnsMessage::fake();
    assert_eq!(dm.dns.qname, "dns.collector");
    assert_eq!(dm.dns.qtype, "A");
    assert_eq!(dm.dns.qclass, "IN");
    assert_eq!(dm.network_info.family, "INET");
    assert_eq!(dm.network_info.protocol, "UDP");
    assert_eq!(dm.dnstap.identity, "collector");
}

#[test]
fn json_contains_canonical_field_names() {
    let dm = DnsMessage::fake();
    let json = dm.to_json();
    assert!(json.contains("\"qname\":\"dns.collector\""));
    assert!(json.contains("\"query-ip\":\"1.2.3.4\""));
    assert!(json.contains("\"malformed-packet\":false"));
}

#[test]
fn absent_subrecords_are_omitted_from_json() {
    let dm = DnsMessage::fake();
    let json = dm.to_json();
    for section in [
        "geoip",
        "suspicious",
        "publicsuffix",
        "powerdns",
        "extracted",
        "reducer",
        "ml",
        "filtering",
        "atags",
    ] {
        assert!(
            !json.contains(&format!("\"{section}\"")),
            "unexpected section {section} in {json}"
        );
    }
}

#[test]
fn present_subrecords_are_serialized() {
    let mut dm = DnsMessage::fake();
    dm.atags = Some(ATags {
        tags: vec!["tag1".into()],
    });
    dm.reducer = Some(Reducer {
        occurrences: 2,
        cumulative_length: 110,
    });
    let json = dm.to_json();
    assert!(json.contains("\"atags\":{\"tags\":[\"tag1\"]}"));
    assert!(json.contains("\"occurrences\":2"));
}

#[test]
fn json_round_trip() {
    let mut dm = DnsMessage::fake();
    dm.dns.resource_records.answers.push(DnsRr {
        name: "dns.collector".into(),
        rdatatype: "A".into(),
        class: "IN".into(),
        ttl: 300,
        rdata: "10.0.0.1".into(),
    });
    dm.public_suffix = Some(PublicSuffix {
        public_suffix: "collector".into(),
        etld_plus_one: "dns.collector".into(),
        managed_by_icann: false,
    });

    let parsed: DnsMessage = serde_json::from_str(&dm.to_json()).unwrap();
    assert_eq!(parsed, dm);
}

#[test]
fn compute_timestamps_formats_rfc3339_nanos() {
    let mut dm = DnsMessage::fake();
    dm.dnstap.time_sec = 1_700_000_000;
    dm.dnstap.time_nsec = 123_456_789;
    dm.compute_timestamps();

    assert_eq!(dm.dnstap.timestamp, 1_700_000_000_123_456_789);
    assert!(dm.dnstap.timestamp_rfc3339.starts_with("2023-11-14T"));
    assert!(dm.dnstap.timestamp_rfc3339.contains(".123456789"));
    assert!(dm.dnstap.timestamp_rfc3339.ends_with('Z'));
}

#[test]
fn init_uses_placeholder_fields() {
    let dm = DnsMessage::init();
    assert_eq!(dm.dns.qname, "-");
    assert_eq!(dm.network_info.query_ip, "-");
    assert!(!dm.dns.malformed_packet);
}
