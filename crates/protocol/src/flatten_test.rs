//! Tests for the flat projection

use std::sync::Arc;

use serde_json::Value;

use crate::message::{
    ATags, DnsMessage, DnsRr, EdnsOption, Extracted, Filtering, Geo, MachineLearning, PowerDns,
    PublicSuffix, Reducer, Suspicious,
};
use crate::{RelabelRule, RelabelRules};

fn fully_populated() -> DnsMessage {
    let mut dm = DnsMessage::fake();
    dm.dns.resource_records.answers.push(DnsRr {
        name: "dns.collector".into(),
        rdatatype: "A".into(),
        class: "IN".into(),
        ttl: 300,
        rdata: "10.0.0.1".into(),
    });
    dm.edns.options.push(EdnsOption {
        code: 10,
        name: "COOKIE".into(),
        data: "aaaa".into(),
    });
    dm.geo = Some(Geo::default());
    dm.suspicious = Some(Suspicious::default());
    dm.public_suffix = Some(PublicSuffix::default());
    dm.extracted = Some(Extracted::default());
    dm.reducer = Some(Reducer::default());
    dm.filtering = Some(Filtering::default());
    dm.machine_learning = Some(MachineLearning::default());
    dm.atags = Some(ATags {
        tags: vec!["tag1".into(), "tag2".into()],
    });
    let mut pdns = PowerDns::default();
    pdns.tags = vec!["pd1".into()];
    pdns.metadata.insert("client".into(), "cache".into());
    dm.powerdns = Some(pdns);
    dm
}

#[test]
fn core_keys_always_present() {
    let flat = DnsMessage::fake().flatten().unwrap();
    for key in [
        "dns.qname",
        "dns.qtype",
        "dns.flags.qr",
        "dns.malformed-packet",
        "dnstap.identity",
        "dnstap.timestamp-rfc3339ns",
        "edns.optionscount",
        "edns.options.codes",
        "network.family",
        "network.query-ip",
        "dns.resource-records.an.names",
        "dns.resource-records.ns.rdatas",
        "dns.resource-records.ar.ttls",
    ] {
        assert!(flat.contains_key(key), "missing {key}");
    }
    assert_eq!(flat["dns.qname"], Value::from("dns.collector"));
}

#[test]
fn optional_sections_contribute_keys_only_when_present() {
    let bare = DnsMessage::fake().flatten().unwrap();
    let full = fully_populated().flatten().unwrap();

    for key in [
        "geoip.city",
        "suspicious.score",
        "publicsuffix.tld",
        "publicsuffix.etld+1",
        "extracted.dns_payload",
        "reducer.occurrences",
        "filtering.sample-rate",
        "ml.entropy",
        "atags.tags.0",
        "powerdns.tags.0",
        "powerdns.metadata.client",
        "powerdns.applied-policy",
    ] {
        assert!(!bare.contains_key(key), "unexpected {key} on bare message");
        assert!(full.contains_key(key), "missing {key} on full message");
    }

    // presence of optional sections must not disturb the core key set
    for key in bare.keys() {
        assert!(full.contains_key(key), "core key {key} lost");
    }
}

#[test]
fn empty_lists_render_as_dash() {
    let flat = DnsMessage::fake().flatten().unwrap();
    assert_eq!(flat["dns.resource-records.an.names"], Value::from("-"));
    assert_eq!(flat["edns.options.codes"], Value::from("-"));
}

#[test]
fn lists_join_with_pipe_without_trailing_separator() {
    let mut dm = DnsMessage::fake();
    for (name, rdata) in [("a.example.com", "1.1.1.1"), ("b.example.com", "2.2.2.2")] {
        dm.dns.resource_records.answers.push(DnsRr {
            name: name.into(),
            rdatatype: "A".into(),
            class: "IN".into(),
            ttl: 60,
            rdata: rdata.into(),
        });
    }
    let flat = dm.flatten().unwrap();
    assert_eq!(
        flat["dns.resource-records.an.names"],
        Value::from("a.example.com|b.example.com")
    );
    assert_eq!(flat["dns.resource-records.an.rdatas"], Value::from("1.1.1.1|2.2.2.2"));
    assert_eq!(flat["dns.resource-records.an.ttls"], Value::from("60|60"));
}

#[test]
fn empty_tag_lists_emit_single_dash_key() {
    let mut dm = DnsMessage::fake();
    dm.atags = Some(ATags::default());
    let flat = dm.flatten().unwrap();
    assert_eq!(flat["atags.tags"], Value::from("-"));
    assert!(!flat.contains_key("atags.tags.0"));
}

#[test]
fn tag_lists_emit_indexed_keys() {
    let mut dm = DnsMessage::fake();
    dm.atags = Some(ATags {
        tags: vec!["malware".into(), "sinkholed".into()],
    });
    let flat = dm.flatten().unwrap();
    assert!(!flat.contains_key("atags.tags"));
    assert_eq!(flat["atags.tags.0"], Value::from("malware"));
    assert_eq!(flat["atags.tags.1"], Value::from("sinkholed"));
}

#[test]
fn relabeling_renames_and_removes() {
    let mut dm = DnsMessage::fake();
    dm.relabeling = Some(Arc::new(RelabelRules::new(vec![
        RelabelRule::rename(r"^dns\.qname$", "query.name").unwrap(),
        RelabelRule::remove(r"^dnstap\.").unwrap(),
    ])));
    let flat = dm.flatten().unwrap();
    assert_eq!(flat["query.name"], Value::from("dns.collector"));
    assert!(!flat.contains_key("dns.qname"));
    assert!(!flat.contains_key("dnstap.identity"));
    assert!(flat.contains_key("network.family"));
}

#[test]
fn relabeling_error_aborts_flatten() {
    let mut dm = DnsMessage::fake();
    dm.relabeling = Some(Arc::new(RelabelRules::new(vec![RelabelRule::rename(
        r"^(x*)dns\.id$",
        "$1",
    )
    .unwrap()])));
    assert!(dm.flatten().is_err());
}

#[test]
fn flat_json_line_contains_dotted_keys() {
    let dm = DnsMessage::fake();
    let line = dm.to_flat_json().unwrap();
    assert!(line.contains("\"dns.qname\":\"dns.collector\""));
    assert!(line.contains("\"network.query-ip\":\"1.2.3.4\""));
}
