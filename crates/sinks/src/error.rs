//! Sink error types
//!
//! Only construction errors are represented - a sink that is already
//! running keeps its failures internal (logged and counted).

use thiserror::Error;

/// Errors from building a sink worker
#[derive(Debug, Error)]
pub enum SinkError {
    /// Text format or serialization setup failed
    #[error("serializer setup failed: {0}")]
    Serializer(#[from] dnsflow_protocol::ProtocolError),

    /// Transform chain construction failed
    #[error("transform chain rejected: {0}")]
    Transform(#[from] dnsflow_transform::TransformError),

    /// TLS client material could not be loaded
    #[error("tls setup failed: {0}")]
    Tls(String),

    /// Destination file could not be opened
    #[error("failed to open {path}: {source}")]
    OpenFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// HTTP client construction failed
    #[error("http client setup failed: {0}")]
    HttpClient(String),

    /// The logger type has no sink implementation in this build
    #[error("logger type `{kind}` is not available: {reason}")]
    Unsupported {
        kind: &'static str,
        reason: &'static str,
    },
}
