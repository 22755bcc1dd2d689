//! Text serialization
//!
//! Renders a message as delimiter-separated tokens selected by an
//! ordered list of directives. The directive list comes from
//! configuration and is parsed once at startup; an unknown directive is
//! a fatal config error. Fields containing the delimiter are wrapped in
//! the boundary character.

use std::fmt::Write;
use std::str::FromStr;

use crate::message::DnsMessage;
use crate::{ProtocolError, Result, EMPTY_FIELD};

/// One token of the text format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDirective {
    TimestampRfc3339Ns,
    TimestampUnixMs,
    Identity,
    Version,
    PeerName,
    Operation,
    Rcode,
    Opcode,
    Id,
    QueryIp,
    QueryPort,
    ResponseIp,
    ResponsePort,
    Family,
    Protocol,
    Length,
    LengthUnit,
    Qname,
    Qtype,
    Qclass,
    Latency,
    Ttl,
    Answer,
    AnswerCount,
    Malformed,
    QdCount,
    QueryZone,
    Extra,
    FlagQr,
    FlagTc,
    FlagAa,
    FlagRa,
    FlagAd,
    Defragmented,
    Reassembled,
}

impl FromStr for TextDirective {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "timestamp-rfc3339ns" | "timestamp" => Self::TimestampRfc3339Ns,
            "timestamp-unixms" => Self::TimestampUnixMs,
            "identity" => Self::Identity,
            "version" => Self::Version,
            "peer-name" => Self::PeerName,
            "operation" => Self::Operation,
            "rcode" => Self::Rcode,
            "opcode" => Self::Opcode,
            "id" => Self::Id,
            "queryip" | "query-ip" => Self::QueryIp,
            "queryport" | "query-port" => Self::QueryPort,
            "responseip" | "response-ip" => Self::ResponseIp,
            "responseport" | "response-port" => Self::ResponsePort,
            "family" => Self::Family,
            "protocol" => Self::Protocol,
            "length" => Self::Length,
            "length-unit" => Self::LengthUnit,
            "qname" => Self::Qname,
            "qtype" => Self::Qtype,
            "qclass" => Self::Qclass,
            "latency" => Self::Latency,
            "ttl" => Self::Ttl,
            "answer" => Self::Answer,
            "answercount" => Self::AnswerCount,
            "malformed" => Self::Malformed,
            "qdcount" => Self::QdCount,
            "query-zone" => Self::QueryZone,
            "extra" => Self::Extra,
            "qr" => Self::FlagQr,
            "tc" => Self::FlagTc,
            "aa" => Self::FlagAa,
            "ra" => Self::FlagRa,
            "ad" => Self::FlagAd,
            "df" => Self::Defragmented,
            "tr" => Self::Reassembled,
            other => return Err(ProtocolError::UnknownDirective(other.to_string())),
        })
    }
}

impl TextDirective {
    /// Parse a whitespace-separated format string into directives
    pub fn parse_format(format: &str) -> Result<Vec<Self>> {
        format.split_whitespace().map(Self::from_str).collect()
    }
}

/// Two-state flag token, e.g. `TC` when set and `-` otherwise
fn flag(set: bool, label: &str) -> String {
    if set {
        label.to_string()
    } else {
        EMPTY_FIELD.to_string()
    }
}

fn or_dash(s: &str) -> String {
    if s.is_empty() {
        EMPTY_FIELD.to_string()
    } else {
        s.to_string()
    }
}

impl DnsMessage {
    /// Render one directive to its token
    fn directive_value(&self, directive: TextDirective) -> String {
        match directive {
            TextDirective::TimestampRfc3339Ns => or_dash(&self.dnstap.timestamp_rfc3339),
            TextDirective::TimestampUnixMs => (self.dnstap.timestamp / 1_000_000).to_string(),
            TextDirective::Identity => or_dash(&self.dnstap.identity),
            TextDirective::Version => or_dash(&self.dnstap.version),
            TextDirective::PeerName => or_dash(&self.dnstap.peer_name),
            TextDirective::Operation => or_dash(&self.dnstap.operation),
            TextDirective::Rcode => or_dash(&self.dns.rcode),
            TextDirective::Opcode => self.dns.opcode.to_string(),
            TextDirective::Id => self.dns.id.to_string(),
            TextDirective::QueryIp => or_dash(&self.network_info.query_ip),
            TextDirective::QueryPort => or_dash(&self.network_info.query_port),
            TextDirective::ResponseIp => or_dash(&self.network_info.response_ip),
            TextDirective::ResponsePort => or_dash(&self.network_info.response_port),
            TextDirective::Family => or_dash(&self.network_info.family),
            TextDirective::Protocol => or_dash(&self.network_info.protocol),
            TextDirective::Length => self.dns.length.to_string(),
            TextDirective::LengthUnit => format!("{}b", self.dns.length),
            TextDirective::Qname => or_dash(&self.dns.qname),
            TextDirective::Qtype => or_dash(&self.dns.qtype),
            TextDirective::Qclass => or_dash(&self.dns.qclass),
            TextDirective::Latency => format!("{:.6}", self.dnstap.latency),
            TextDirective::Ttl => self
                .dns
                .resource_records
                .answers
                .first()
                .map(|rr| rr.ttl.to_string())
                .unwrap_or_else(|| EMPTY_FIELD.to_string()),
            TextDirective::Answer => self
                .dns
                .resource_records
                .answers
                .first()
                .map(|rr| rr.rdata.clone())
                .unwrap_or_else(|| EMPTY_FIELD.to_string()),
            TextDirective::AnswerCount => self.dns.resource_records.answers.len().to_string(),
            TextDirective::Malformed => flag(self.dns.malformed_packet, "MALFORMED"),
            TextDirective::QdCount => self.dns.qdcount.to_string(),
            TextDirective::QueryZone => or_dash(&self.dnstap.query_zone),
            TextDirective::Extra => or_dash(&self.dnstap.extra),
            TextDirective::FlagQr => {
                if self.dns.flags.qr {
                    "R".to_string()
                } else {
                    "Q".to_string()
                }
            }
            TextDirective::FlagTc => flag(self.dns.flags.tc, "TC"),
            TextDirective::FlagAa => flag(self.dns.flags.aa, "AA"),
            TextDirective::FlagRa => flag(self.dns.flags.ra, "RA"),
            TextDirective::FlagAd => flag(self.dns.flags.ad, "AD"),
            TextDirective::Defragmented => flag(self.network_info.ip_defragmented, "DF"),
            TextDirective::Reassembled => flag(self.network_info.tcp_reassembled, "TR"),
        }
    }

    /// Render the message as one text line (without trailing newline)
    ///
    /// Tokens containing the delimiter are wrapped in `boundary`, with
    /// embedded boundary characters backslash-escaped first.
    pub fn to_text(&self, format: &[TextDirective], delimiter: &str, boundary: &str) -> String {
        let mut line = String::with_capacity(128);
        for (i, directive) in format.iter().enumerate() {
            let mut token = self.directive_value(*directive);
            if !delimiter.is_empty() && token.contains(delimiter) && !boundary.is_empty() {
                if token.contains(boundary) {
                    token = token.replace(boundary, &format!("\\{boundary}"));
                }
                token = format!("{boundary}{token}{boundary}");
            }
            if i > 0 {
                line.push_str(delimiter);
            }
            let _ = write!(&mut line, "{token}");
        }
        line
    }
}

#[cfg(test)]
#[path = "text_test.rs"]
mod text_test;
