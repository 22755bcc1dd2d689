//! Dnsflow - Transform
//!
//! Ordered processors applied to every message between a worker's input
//! queue and its routes.
//!
//! # Overview
//!
//! Processors may:
//! - Enrich a message (public suffix, character statistics, tags)
//! - Drop it ([`Verdict::Drop`] short-circuits the chain and sends the
//!   message to the worker's dropped routes)
//! - Attach state consumed later (relabeling rules applied at flatten)
//!
//! # Design Principles
//!
//! - **Fast**: processors add microseconds, never block on I/O
//! - **Deterministic**: same input and config, same verdict
//! - **Ordered**: configuration order is execution order; late
//!   processors observe sub-records populated by earlier ones
//! - **Reloadable**: [`Chain::reload`] swaps the processor list between
//!   messages, never mid-message

mod atags;
mod chain;
mod error;
mod extract;
mod filtering;
mod machine_learning;
mod public_suffix;
mod reducer;
mod relabeling;
mod suspicious;

pub use atags::ATagsProcessor;
pub use chain::Chain;
pub use error::TransformError;
pub use extract::ExtractProcessor;
pub use filtering::FilteringProcessor;
pub use machine_learning::MachineLearningProcessor;
pub use public_suffix::PublicSuffixProcessor;
pub use reducer::ReducerProcessor;
pub use relabeling::RelabelingProcessor;
pub use suspicious::SuspiciousProcessor;

use dnsflow_protocol::DnsMessage;

/// Result type for transform operations
pub type Result<T> = std::result::Result<T, TransformError>;

/// The chain's decision for one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Forward to default routes
    Keep,
    /// Send to dropped routes and discard
    Drop,
}

/// One in-process stage of the chain
///
/// Implementations must be `Send + Sync`; stateful processors use
/// interior mutability (atomics or a short-lived lock) so `process`
/// stays `&self`.
pub trait Processor: Send + Sync {
    /// Inspect and possibly mutate the message, returning the verdict
    fn process(&self, dm: &mut DnsMessage) -> Verdict;

    /// Name for logging and chain introspection
    fn name(&self) -> &'static str;

    /// Clear accumulated state (reducer windows, sampling counters)
    ///
    /// Called when the owning worker stops. Default is a no-op.
    fn reset(&self) {}
}
