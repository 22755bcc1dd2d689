//! Flat projection of a `DnsMessage`
//!
//! Maps the nested record onto dotted string keys. The key set is the
//! stable external schema consumed by log pipelines: fixed sections
//! always contribute their keys, optional sub-records contribute theirs
//! only when present, list-valued fields collapse to `|`-joined strings
//! with `-` for empty lists, and ordered tag lists emit indexed keys.

use serde_json::{Map, Value};

use crate::message::{DnsMessage, DnsRr};
use crate::{Result, EMPTY_FIELD, LIST_SEPARATOR};

/// Join a list into one string, `-` when empty
fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        EMPTY_FIELD.to_string()
    } else {
        items.join(LIST_SEPARATOR)
    }
}

/// Collapse one resource-record section into its five summary strings
fn rr_summaries(rrs: &[DnsRr]) -> (String, String, String, String, String) {
    let names: Vec<String> = rrs.iter().map(|rr| rr.name.clone()).collect();
    let types: Vec<String> = rrs.iter().map(|rr| rr.rdatatype.clone()).collect();
    let datas: Vec<String> = rrs.iter().map(|rr| rr.rdata.clone()).collect();
    let ttls: Vec<String> = rrs.iter().map(|rr| rr.ttl.to_string()).collect();
    let classes: Vec<String> = rrs.iter().map(|rr| rr.class.clone()).collect();
    (
        join_or_dash(&names),
        join_or_dash(&types),
        join_or_dash(&datas),
        join_or_dash(&ttls),
        join_or_dash(&classes),
    )
}

impl DnsMessage {
    /// Produce the flat projection
    ///
    /// Purely derived - the record itself is never mutated. When
    /// relabeling rules are attached they are applied to the produced
    /// map; a rule error aborts the whole projection.
    pub fn flatten(&self) -> Result<Map<String, Value>> {
        let mut fields = Map::new();
        let mut put = |key: &str, value: Value| {
            fields.insert(key.to_string(), value);
        };

        put("dns.flags.qr", Value::Bool(self.dns.flags.qr));
        put("dns.flags.tc", Value::Bool(self.dns.flags.tc));
        put("dns.flags.aa", Value::Bool(self.dns.flags.aa));
        put("dns.flags.ra", Value::Bool(self.dns.flags.ra));
        put("dns.flags.ad", Value::Bool(self.dns.flags.ad));
        put("dns.flags.rd", Value::Bool(self.dns.flags.rd));
        put("dns.flags.cd", Value::Bool(self.dns.flags.cd));
        put("dns.length", Value::from(self.dns.length));
        put("dns.malformed-packet", Value::Bool(self.dns.malformed_packet));
        put("dns.id", Value::from(self.dns.id));
        put("dns.opcode", Value::from(self.dns.opcode));
        put("dns.qname", Value::from(self.dns.qname.clone()));
        put("dns.qtype", Value::from(self.dns.qtype.clone()));
        put("dns.qclass", Value::from(self.dns.qclass.clone()));
        put("dns.rcode", Value::from(self.dns.rcode.clone()));
        put("dns.qdcount", Value::from(self.dns.qdcount));
        put("dns.ancount", Value::from(self.dns.ancount));
        put("dns.nscount", Value::from(self.dns.nscount));
        put("dns.arcount", Value::from(self.dns.arcount));

        put("dnstap.identity", Value::from(self.dnstap.identity.clone()));
        put("dnstap.version", Value::from(self.dnstap.version.clone()));
        put("dnstap.operation", Value::from(self.dnstap.operation.clone()));
        put("dnstap.peer-name", Value::from(self.dnstap.peer_name.clone()));
        put("dnstap.query-zone", Value::from(self.dnstap.query_zone.clone()));
        put(
            "dnstap.timestamp-rfc3339ns",
            Value::from(self.dnstap.timestamp_rfc3339.clone()),
        );
        put("dnstap.latency", Value::from(self.dnstap.latency));
        put("dnstap.extra", Value::from(self.dnstap.extra.clone()));
        put("dnstap.policy-rule", Value::from(self.dnstap.policy_rule.clone()));
        put("dnstap.policy-type", Value::from(self.dnstap.policy_type.clone()));
        put(
            "dnstap.policy-action",
            Value::from(self.dnstap.policy_action.clone()),
        );
        put("dnstap.policy-match", Value::from(self.dnstap.policy_match.clone()));
        put("dnstap.policy-value", Value::from(self.dnstap.policy_value.clone()));

        put("edns.optionscount", Value::from(self.edns.options.len()));
        put("edns.dnssec-ok", Value::from(self.edns.do_flag));
        put("edns.rcode", Value::from(self.edns.extended_rcode));
        put("edns.udp-size", Value::from(self.edns.udp_size));
        put("edns.version", Value::from(self.edns.version));

        let codes: Vec<String> = self.edns.options.iter().map(|o| o.code.to_string()).collect();
        let names: Vec<String> = self.edns.options.iter().map(|o| o.name.clone()).collect();
        let datas: Vec<String> = self.edns.options.iter().map(|o| o.data.clone()).collect();
        put("edns.options.codes", Value::from(join_or_dash(&codes)));
        put("edns.options.names", Value::from(join_or_dash(&names)));
        put("edns.options.datas", Value::from(join_or_dash(&datas)));

        put("network.family", Value::from(self.network_info.family.clone()));
        put("network.protocol", Value::from(self.network_info.protocol.clone()));
        put("network.query-ip", Value::from(self.network_info.query_ip.clone()));
        put("network.query-port", Value::from(self.network_info.query_port.clone()));
        put(
            "network.response-ip",
            Value::from(self.network_info.response_ip.clone()),
        );
        put(
            "network.response-port",
            Value::from(self.network_info.response_port.clone()),
        );
        put(
            "network.ip-defragmented",
            Value::Bool(self.network_info.ip_defragmented),
        );
        put(
            "network.tcp-reassembled",
            Value::Bool(self.network_info.tcp_reassembled),
        );

        for (section, rrs) in [
            ("an", &self.dns.resource_records.answers),
            ("ns", &self.dns.resource_records.nameservers),
            ("ar", &self.dns.resource_records.records),
        ] {
            let (names, types, datas, ttls, classes) = rr_summaries(rrs);
            put(
                &format!("dns.resource-records.{section}.names"),
                Value::from(names),
            );
            put(
                &format!("dns.resource-records.{section}.rdatatypes"),
                Value::from(types),
            );
            put(
                &format!("dns.resource-records.{section}.rdatas"),
                Value::from(datas),
            );
            put(
                &format!("dns.resource-records.{section}.ttls"),
                Value::from(ttls),
            );
            put(
                &format!("dns.resource-records.{section}.classes"),
                Value::from(classes),
            );
        }

        if let Some(geo) = &self.geo {
            put("geoip.city", Value::from(geo.city.clone()));
            put("geoip.continent", Value::from(geo.continent.clone()));
            put("geoip.country-isocode", Value::from(geo.country_iso_code.clone()));
            put("geoip.as-number", Value::from(geo.as_number.clone()));
            put("geoip.as-owner", Value::from(geo.as_owner.clone()));
        }

        if let Some(susp) = &self.suspicious {
            put("suspicious.score", Value::from(susp.score));
            put("suspicious.malformed-pkt", Value::Bool(susp.malformed_packet));
            put("suspicious.large-pkt", Value::Bool(susp.large_packet));
            put("suspicious.long-domain", Value::Bool(susp.long_domain));
            put("suspicious.slow-domain", Value::Bool(susp.slow_domain));
            put("suspicious.unallowed-chars", Value::Bool(susp.unallowed_chars));
            put("suspicious.uncommon-qtypes", Value::Bool(susp.uncommon_qtypes));
            put(
                "suspicious.excessive-number-labels",
                Value::Bool(susp.excessive_number_labels),
            );
            put("suspicious.domain", Value::from(susp.domain.clone()));
        }

        if let Some(ps) = &self.public_suffix {
            put("publicsuffix.tld", Value::from(ps.public_suffix.clone()));
            put("publicsuffix.etld+1", Value::from(ps.etld_plus_one.clone()));
            put("publicsuffix.managed-icann", Value::Bool(ps.managed_by_icann));
        }

        if let Some(extracted) = &self.extracted {
            put(
                "extracted.dns_payload",
                Value::from(extracted.base64_payload.clone()),
            );
        }

        if let Some(reducer) = &self.reducer {
            put("reducer.occurrences", Value::from(reducer.occurrences));
            put(
                "reducer.cumulative-length",
                Value::from(reducer.cumulative_length),
            );
        }

        if let Some(filtering) = &self.filtering {
            put("filtering.sample-rate", Value::from(filtering.sample_rate));
        }

        if let Some(ml) = &self.machine_learning {
            put("ml.entropy", Value::from(ml.entropy));
            put("ml.length", Value::from(ml.length));
            put("ml.labels", Value::from(ml.labels));
            put("ml.digits", Value::from(ml.digits));
            put("ml.lowers", Value::from(ml.lowers));
            put("ml.uppers", Value::from(ml.uppers));
            put("ml.specials", Value::from(ml.specials));
            put("ml.others", Value::from(ml.others));
            put("ml.ratio-digits", Value::from(ml.ratio_digits));
            put("ml.ratio-letters", Value::from(ml.ratio_letters));
            put("ml.ratio-specials", Value::from(ml.ratio_specials));
            put("ml.ratio-others", Value::from(ml.ratio_others));
            put("ml.consecutive-chars", Value::from(ml.consecutive_chars));
            put("ml.consecutive-vowels", Value::from(ml.consecutive_vowels));
            put("ml.consecutive-digits", Value::from(ml.consecutive_digits));
            put(
                "ml.consecutive-consonants",
                Value::from(ml.consecutive_consonants),
            );
            put("ml.size", Value::from(ml.size));
            put("ml.occurrences", Value::from(ml.occurrences));
            put("ml.uncommon-qtypes", Value::from(ml.uncommon_qtypes));
        }

        if let Some(atags) = &self.atags {
            if atags.tags.is_empty() {
                put("atags.tags", Value::from(EMPTY_FIELD));
            }
            for (i, tag) in atags.tags.iter().enumerate() {
                put(&format!("atags.tags.{i}"), Value::from(tag.clone()));
            }
        }

        if let Some(pdns) = &self.powerdns {
            if pdns.tags.is_empty() {
                put("powerdns.tags", Value::from(EMPTY_FIELD));
            }
            for (i, tag) in pdns.tags.iter().enumerate() {
                put(&format!("powerdns.tags.{i}"), Value::from(tag.clone()));
            }
            put(
                "powerdns.original-request-subnet",
                Value::from(pdns.original_request_subnet.clone()),
            );
            put("powerdns.applied-policy", Value::from(pdns.applied_policy.clone()));
            put(
                "powerdns.applied-policy-hit",
                Value::from(pdns.applied_policy_hit.clone()),
            );
            put(
                "powerdns.applied-policy-kind",
                Value::from(pdns.applied_policy_kind.clone()),
            );
            put(
                "powerdns.applied-policy-trigger",
                Value::from(pdns.applied_policy_trigger.clone()),
            );
            put(
                "powerdns.applied-policy-type",
                Value::from(pdns.applied_policy_type.clone()),
            );
            for (key, value) in &pdns.metadata {
                put(&format!("powerdns.metadata.{key}"), Value::from(value.clone()));
            }
            put("powerdns.http-version", Value::from(pdns.http_version.clone()));
            put("powerdns.message-id", Value::from(pdns.message_id.clone()));
            put("powerdns.requestor-id", Value::from(pdns.requestor_id.clone()));
            put("powerdns.device-id", Value::from(pdns.device_id.clone()));
            put("powerdns.device-name", Value::from(pdns.device_name.clone()));
            put(
                "powerdns.initial-requestor-id",
                Value::from(pdns.initial_requestor_id.clone()),
            );
        }

        match &self.relabeling {
            Some(rules) if !rules.is_empty() => {
                let mut relabeled = Map::new();
                for (key, value) in fields {
                    if let Some(new_key) = rules.apply(&key)? {
                        relabeled.insert(new_key, value);
                    }
                }
                Ok(relabeled)
            }
            _ => Ok(fields),
        }
    }
}

#[cfg(test)]
#[path = "flatten_test.rs"]
mod flatten_test;
