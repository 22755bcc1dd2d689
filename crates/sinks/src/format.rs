//! Shared serialization front-end for sinks
//!
//! Resolves a logger's `mode` and text format against the global
//! defaults once, so the per-message path is a single dispatch.

use dnsflow_config::{GlobalConfig, SerializationMode};
use dnsflow_protocol::{DnsMessage, TextDirective};

use crate::Result;

/// Renders messages in the sink's configured serialization
pub struct Serializer {
    mode: SerializationMode,
    text_format: Vec<TextDirective>,
    delimiter: String,
    boundary: String,
}

impl Serializer {
    /// Resolve mode and format against global defaults
    ///
    /// `text_format` overrides the global directive list when set.
    /// Config validation has already checked both, so an error here
    /// means the serializer was built from an unvalidated config.
    pub fn new(
        mode: SerializationMode,
        text_format: Option<&str>,
        global: &GlobalConfig,
    ) -> Result<Self> {
        let format = text_format.unwrap_or(&global.text_format);
        Ok(Self {
            mode,
            text_format: TextDirective::parse_format(format)?,
            delimiter: global.text_format_delimiter.clone(),
            boundary: global.text_format_boundary.clone(),
        })
    }

    /// Active serialization mode
    pub fn mode(&self) -> SerializationMode {
        self.mode
    }

    /// Render one message, without trailing newline
    ///
    /// Flat-JSON can fail when attached relabeling rules reject a key;
    /// callers skip that single message and keep the loop alive.
    pub fn render(&self, dm: &DnsMessage) -> dnsflow_protocol::Result<String> {
        match self.mode {
            SerializationMode::Text => {
                Ok(dm.to_text(&self.text_format, &self.delimiter, &self.boundary))
            }
            SerializationMode::Json => Ok(dm.to_json()),
            SerializationMode::FlatJson => dm.to_flat_json(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_render_their_serialization() {
        let global = GlobalConfig::default();
        let dm = DnsMessage::fake();

        let text = Serializer::new(SerializationMode::Text, Some("qname qtype"), &global).unwrap();
        assert_eq!(text.render(&dm).unwrap(), "dns.collector A");

        let json = Serializer::new(SerializationMode::Json, None, &global).unwrap();
        assert!(json.render(&dm).unwrap().contains("\"qname\":\"dns.collector\""));

        let flat = Serializer::new(SerializationMode::FlatJson, None, &global).unwrap();
        assert!(flat
            .render(&dm)
            .unwrap()
            .contains("\"dns.qname\":\"dns.collector\""));
    }

    #[test]
    fn per_sink_format_overrides_global() {
        let mut global = GlobalConfig::default();
        global.text_format = "qname".into();
        let dm = DnsMessage::fake();

        let inherited = Serializer::new(SerializationMode::Text, None, &global).unwrap();
        assert_eq!(inherited.render(&dm).unwrap(), "dns.collector");

        let overridden =
            Serializer::new(SerializationMode::Text, Some("qtype qclass"), &global).unwrap();
        assert_eq!(overridden.render(&dm).unwrap(), "A IN");
    }
}
