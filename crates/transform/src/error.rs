//! Transform error types

use thiserror::Error;

/// Errors from building or reloading a chain
///
/// Verdicts are not errors - a processor that wants to discard a
/// message returns `Verdict::Drop`. Errors here mean the chain itself
/// could not be constructed from its configuration.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Relabeling rules failed to compile
    #[error("relabeling rules rejected: {0}")]
    Relabeling(#[from] dnsflow_protocol::ProtocolError),
}
