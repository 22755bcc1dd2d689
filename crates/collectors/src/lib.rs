//! Dnsflow - Collectors
//!
//! Ingress workers. A collector owns an external data source, decodes
//! observations into `DnsMessage` values and feeds them through its own
//! input queue, so the uniform worker loop - transforms, routes,
//! metrics, reload - applies to ingress exactly as it does to egress.
//!
//! Wire decoders (dnstap framing, protobuf streams, packet capture)
//! live outside this crate and hand the pipeline finished records; the
//! replay collector is the in-tree exemplar, reading newline-delimited
//! JSON observations from a file.

mod builder;
mod replay;

pub use builder::build_collector;
pub use replay::ReplayCollector;

/// Result type for collector construction
pub type Result<T> = std::result::Result<T, CollectorError>;

/// Errors from building a collector worker
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// Transform chain construction failed
    #[error("transform chain rejected: {0}")]
    Transform(#[from] dnsflow_transform::TransformError),

    /// Source file is missing or unreadable
    #[error("cannot open {path}: {source}")]
    OpenSource {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
