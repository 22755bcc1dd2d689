//! Protocol error types

use thiserror::Error;

/// Errors from message serialization and relabeling
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A relabeling rename rule has no replacement
    #[error("relabeling rule for `{pattern}` has an empty replacement")]
    EmptyReplacement { pattern: String },

    /// A relabeling rule pattern failed to compile
    #[error("invalid relabeling pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A relabeling rename resolved to an empty key at apply time
    #[error("relabeling produced an empty key from `{original}`")]
    EmptyKey { original: String },

    /// A text-format directive is not recognized
    #[error("unknown text directive `{0}`")]
    UnknownDirective(String),
}
