//! Dnsflow - Protocol
//!
//! The canonical DNS observation record (`DnsMessage`) and its
//! serializations. Every edge of the pipeline carries `DnsMessage`
//! values; collectors create them, transforms mutate them, sinks
//! render them.
//!
//! # Serializations
//!
//! - **Text**: delimiter-separated tokens selected by an ordered list of
//!   [`TextDirective`]s, with an optional boundary character for quoting
//! - **JSON**: the nested record, one object per line; absent optional
//!   sub-records are omitted
//! - **Flat JSON**: the dotted-key projection produced by
//!   [`DnsMessage::flatten`], optionally relabeled
//!
//! # Design
//!
//! - Optional sub-records are `Option<T>` - either fully absent or fully
//!   populated, never zero-valued stand-ins
//! - The flat projection is derived; it never mutates the record
//! - Relabeling rules are compiled once and attached to messages as
//!   shared state; they apply at flatten time

mod error;
mod flatten;
mod message;
mod relabel;
mod text;

pub use error::ProtocolError;
pub use message::{
    ATags, Dns, DnsFlags, DnsMessage, DnsRr, DnsRrs, DnsTap, Edns, EdnsOption, Extracted,
    Filtering, Geo, MachineLearning, NetworkInfo, PowerDns, PublicSuffix, Reducer, Suspicious,
};
pub use relabel::{RelabelAction, RelabelRule, RelabelRules};
pub use text::TextDirective;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Placeholder rendered for empty or absent text fields
pub const EMPTY_FIELD: &str = "-";

/// Separator used when list-valued fields are collapsed into one string
pub const LIST_SEPARATOR: &str = "|";
