//! Dnsflow - Sinks
//!
//! Egress workers. Every sink drives the same two-loop pattern:
//!
//! - the **collect loop** implements the worker contract - transform
//!   chain, default/dropped routes, metrics - and hands accepted
//!   messages to an internal output queue;
//! - the **logging loop** owns the buffer and the writer, flushing on
//!   size and on a timer.
//!
//! Network sinks add a **connection loop** that owns reconnection: it
//! signals `ready` when a writer is available and is woken by
//! `reconnect` when one dies. The writer-ready gauge is the only state
//! shared between loops, next to the connection slot itself.
//!
//! Transient I/O failures never cross a sink's boundary: they are
//! logged (rate-limited), counted, and drive reconnection.

mod builder;
mod bulk;
mod error;
mod file;
mod format;
mod stdout;
mod tcp;
mod tls;
mod util;

pub use builder::build_logger;
pub use bulk::BulkHttpSink;
pub use error::SinkError;
pub use file::FileSink;
pub use format::Serializer;
pub use stdout::StdoutSink;
pub use tcp::TcpSink;
pub use tls::client_config;
pub use util::RateLimitedLogger;

/// Result type for sink construction
pub type Result<T> = std::result::Result<T, SinkError>;

/// Per-message bound on one publish attempt
pub const PUBLISH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
