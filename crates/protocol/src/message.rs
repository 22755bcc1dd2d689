//! The canonical DNS observation record
//!
//! `DnsMessage` is a flat aggregate of sub-records. The fixed sections
//! (`dns`, `dnstap`, `edns`, `network`) are always present; enrichment
//! sections are `Option` and only exist once a transform populated them.
//!
//! Field names in the JSON serialization are part of the external
//! contract consumed by log pipelines - renames here are schema changes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::relabel::RelabelRules;

/// DNS header flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsFlags {
    pub qr: bool,
    pub tc: bool,
    pub aa: bool,
    pub ra: bool,
    pub ad: bool,
    pub rd: bool,
    pub cd: bool,
}

/// One decoded resource record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsRr {
    pub name: String,
    pub rdatatype: String,
    pub class: String,
    pub ttl: u32,
    pub rdata: String,
}

/// Resource records split by message section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsRrs {
    #[serde(rename = "an")]
    pub answers: Vec<DnsRr>,
    #[serde(rename = "ns")]
    pub nameservers: Vec<DnsRr>,
    #[serde(rename = "ar")]
    pub records: Vec<DnsRr>,
}

/// The DNS section of an observation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dns {
    pub id: u16,
    pub opcode: i32,
    pub qname: String,
    pub qtype: String,
    pub qclass: String,
    pub rcode: String,
    pub qdcount: i32,
    pub ancount: i32,
    pub nscount: i32,
    pub arcount: i32,
    pub length: i32,
    #[serde(rename = "malformed-packet")]
    pub malformed_packet: bool,
    pub flags: DnsFlags,
    #[serde(rename = "resource-records")]
    pub resource_records: DnsRrs,
    /// Raw wire payload; never serialized
    #[serde(skip)]
    pub payload: Vec<u8>,
}

/// Transport-level metadata from the tap point
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsTap {
    pub identity: String,
    pub version: String,
    pub operation: String,
    #[serde(rename = "peer-name")]
    pub peer_name: String,
    #[serde(rename = "query-zone")]
    pub query_zone: String,
    /// Capture time, seconds part. Not serialized; `timestamp` and the
    /// pre-formatted RFC3339 string are derived from it.
    #[serde(skip)]
    pub time_sec: i64,
    #[serde(skip)]
    pub time_nsec: u32,
    /// Unix timestamp in nanoseconds
    pub timestamp: i64,
    #[serde(rename = "timestamp-rfc3339ns")]
    pub timestamp_rfc3339: String,
    /// Query/response latency in seconds
    pub latency: f64,
    #[serde(rename = "policy-rule")]
    pub policy_rule: String,
    #[serde(rename = "policy-type")]
    pub policy_type: String,
    #[serde(rename = "policy-action")]
    pub policy_action: String,
    #[serde(rename = "policy-match")]
    pub policy_match: String,
    #[serde(rename = "policy-value")]
    pub policy_value: String,
    pub extra: String,
}

/// One EDNS option
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdnsOption {
    pub code: i32,
    pub name: String,
    pub data: String,
}

/// EDNS(0) section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Edns {
    #[serde(rename = "udp-size")]
    pub udp_size: i32,
    #[serde(rename = "rcode")]
    pub extended_rcode: i32,
    pub version: i32,
    #[serde(rename = "dnssec-ok")]
    pub do_flag: i32,
    pub options: Vec<EdnsOption>,
}

/// Network 5-tuple and reassembly state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkInfo {
    pub family: String,
    pub protocol: String,
    #[serde(rename = "query-ip")]
    pub query_ip: String,
    #[serde(rename = "query-port")]
    pub query_port: String,
    #[serde(rename = "response-ip")]
    pub response_ip: String,
    #[serde(rename = "response-port")]
    pub response_port: String,
    #[serde(rename = "ip-defragmented")]
    pub ip_defragmented: bool,
    #[serde(rename = "tcp-reassembled")]
    pub tcp_reassembled: bool,
}

/// Geo enrichment, set by the geo transform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geo {
    pub city: String,
    pub continent: String,
    #[serde(rename = "country-isocode")]
    pub country_iso_code: String,
    #[serde(rename = "as-number")]
    pub as_number: String,
    #[serde(rename = "as-owner")]
    pub as_owner: String,
}

/// Suspicious-traffic scoring, set by the suspicious transform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Suspicious {
    pub score: f32,
    #[serde(rename = "malformed-pkt")]
    pub malformed_packet: bool,
    #[serde(rename = "large-pkt")]
    pub large_packet: bool,
    #[serde(rename = "long-domain")]
    pub long_domain: bool,
    #[serde(rename = "slow-domain")]
    pub slow_domain: bool,
    #[serde(rename = "unallowed-chars")]
    pub unallowed_chars: bool,
    #[serde(rename = "uncommon-qtypes")]
    pub uncommon_qtypes: bool,
    #[serde(rename = "excessive-number-labels")]
    pub excessive_number_labels: bool,
    pub domain: String,
}

/// Effective TLD extraction, set by the public-suffix transform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicSuffix {
    #[serde(rename = "tld")]
    pub public_suffix: String,
    #[serde(rename = "etld+1")]
    pub etld_plus_one: String,
    #[serde(rename = "managed-icann")]
    pub managed_by_icann: bool,
}

/// Base64 copy of the raw payload, set by the extract transform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Extracted {
    #[serde(rename = "dns_payload")]
    pub base64_payload: String,
}

/// Aggregation counters, set by the reducer transform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reducer {
    pub occurrences: i64,
    #[serde(rename = "cumulative-length")]
    pub cumulative_length: i64,
}

/// Sampling metadata, set by the filtering transform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filtering {
    #[serde(rename = "sample-rate")]
    pub sample_rate: i32,
}

/// Qname character statistics, set by the machine-learning transform
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineLearning {
    pub entropy: f64,
    pub length: i32,
    pub labels: i32,
    pub digits: i32,
    pub lowers: i32,
    pub uppers: i32,
    pub specials: i32,
    pub others: i32,
    #[serde(rename = "ratio-digits")]
    pub ratio_digits: f32,
    #[serde(rename = "ratio-letters")]
    pub ratio_letters: f32,
    #[serde(rename = "ratio-specials")]
    pub ratio_specials: f32,
    #[serde(rename = "ratio-others")]
    pub ratio_others: f32,
    #[serde(rename = "consecutive-chars")]
    pub consecutive_chars: i32,
    #[serde(rename = "consecutive-vowels")]
    pub consecutive_vowels: i32,
    #[serde(rename = "consecutive-digits")]
    pub consecutive_digits: i32,
    #[serde(rename = "consecutive-consonants")]
    pub consecutive_consonants: i32,
    pub size: i32,
    pub occurrences: i32,
    #[serde(rename = "uncommon-qtypes")]
    pub uncommon_qtypes: i32,
}

/// Ordered string tags, set by the atags transform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ATags {
    pub tags: Vec<String>,
}

/// PowerDNS protobuf extras, set by the powerdns collector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerDns {
    pub tags: Vec<String>,
    #[serde(rename = "original-request-subnet")]
    pub original_request_subnet: String,
    #[serde(rename = "applied-policy")]
    pub applied_policy: String,
    #[serde(rename = "applied-policy-hit")]
    pub applied_policy_hit: String,
    #[serde(rename = "applied-policy-kind")]
    pub applied_policy_kind: String,
    #[serde(rename = "applied-policy-trigger")]
    pub applied_policy_trigger: String,
    #[serde(rename = "applied-policy-type")]
    pub applied_policy_type: String,
    pub metadata: HashMap<String, String>,
    #[serde(rename = "http-version")]
    pub http_version: String,
    #[serde(rename = "message-id")]
    pub message_id: String,
    #[serde(rename = "requestor-id")]
    pub requestor_id: String,
    #[serde(rename = "device-id")]
    pub device_id: String,
    #[serde(rename = "device-name")]
    pub device_name: String,
    #[serde(rename = "initial-requestor-id")]
    pub initial_requestor_id: String,
}

/// The record flowing on every pipeline edge
///
/// Created by a collector, mutated only by transforms, read-only inside
/// sinks. Cloned per destination on fan-out - routing is pass-by-value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsMessage {
    #[serde(rename = "network")]
    pub network_info: NetworkInfo,
    pub dns: Dns,
    pub edns: Edns,
    pub dnstap: DnsTap,
    #[serde(rename = "geoip", skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,
    #[serde(rename = "publicsuffix", skip_serializing_if = "Option::is_none")]
    pub public_suffix: Option<PublicSuffix>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspicious: Option<Suspicious>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub powerdns: Option<PowerDns>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted: Option<Extracted>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reducer: Option<Reducer>,
    #[serde(rename = "ml", skip_serializing_if = "Option::is_none")]
    pub machine_learning: Option<MachineLearning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtering: Option<Filtering>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atags: Option<ATags>,
    /// Compiled relabeling rules applied at flatten time; shared, not
    /// part of the wire schema
    #[serde(skip)]
    pub relabeling: Option<Arc<RelabelRules>>,
}

impl DnsMessage {
    /// Create an empty message with sane placeholders
    ///
    /// Collectors call this before filling in decoded fields, so string
    /// fields start as `-` rather than empty.
    pub fn init() -> Self {
        let mut dm = Self::default();
        dm.network_info.family = "-".into();
        dm.network_info.protocol = "-".into();
        dm.network_info.query_ip = "-".into();
        dm.network_info.query_port = "-".into();
        dm.network_info.response_ip = "-".into();
        dm.network_info.response_port = "-".into();
        dm.dns.qname = "-".into();
        dm.dns.qtype = "-".into();
        dm.dns.qclass = "-".into();
        dm.dns.rcode = "-".into();
        dm.dnstap.identity = "-".into();
        dm.dnstap.version = "-".into();
        dm.dnstap.operation = "-".into();
        dm.dnstap.peer_name = "-".into();
        dm
    }

    /// The canonical synthetic message used by tests and the demo
    /// generator: an A query for `dns.collector` over UDP
    pub fn fake() -> Self {
        let mut dm = Self::init();
        dm.network_info.family = "INET".into();
        dm.network_info.protocol = "UDP".into();
        dm.network_info.query_ip = "1.2.3.4".into();
        dm.network_info.query_port = "1234".into();
        dm.network_info.response_ip = "4.3.2.1".into();
        dm.network_info.response_port = "4321".into();
        dm.dns.rcode = "NOERROR".into();
        dm.dns.qtype = "A".into();
        dm.dns.qclass = "IN".into();
        dm.dns.qname = "dns.collector".into();
        dm.dnstap.identity = "collector".into();
        dm.dnstap.operation = "CLIENT_QUERY".into();
        dm
    }

    /// Fill `timestamp` and the pre-formatted RFC3339 string from
    /// `time_sec` / `time_nsec`
    pub fn compute_timestamps(&mut self) {
        self.dnstap.timestamp =
            self.dnstap.time_sec * 1_000_000_000 + i64::from(self.dnstap.time_nsec);
        self.dnstap.timestamp_rfc3339 = match Utc
            .timestamp_opt(self.dnstap.time_sec, self.dnstap.time_nsec)
            .single()
        {
            Some(ts) => ts.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
            None => String::new(),
        };
    }

    /// Serialize the nested record as one JSON line
    pub fn to_json(&self) -> String {
        // serialization of a plain struct tree cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Serialize the flat projection as one JSON line
    pub fn to_flat_json(&self) -> crate::Result<String> {
        let flat = self.flatten()?;
        Ok(serde_json::to_string(&flat).unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "message_test.rs"]
mod message_test;
