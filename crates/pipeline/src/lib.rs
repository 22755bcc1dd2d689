//! Dnsflow - Pipeline
//!
//! The worker runtime every pipeline node is built on.
//!
//! # Architecture
//!
//! ```text
//! [Collectors]                      [Loggers]
//!    replay ──┐                  ┌──→ file
//!             ├──→ DnsMessage ───┼──→ tcp
//!    ...    ──┘    (mpsc edges)  └──→ bulk-http
//! ```
//!
//! Every node - collector or logger - follows the same contract:
//! one bounded input queue, a transform chain, a set of default routes
//! followed on `Keep`, a set of dropped routes followed on `Drop`, and
//! a single `select!` demultiplexer observing stop / reload / input.
//!
//! # Key Design
//!
//! - **Channel-based**: `tokio::sync::mpsc` on every edge, exactly one
//!   consumer per queue
//! - **Pass-by-value fan-out**: each destination receives its own clone
//! - **Backpressure by drop**: `try_send` per destination; a full queue
//!   drops for that destination only and increments its drop counter -
//!   the pipeline never blocks globally on one slow sink
//! - **Copy-on-replace config**: hot reloads install a new `Arc` between
//!   messages
//! - **Cascading shutdown**: stopping a worker cancels its token; the
//!   topology stops collectors first so loggers drain naturally

mod error;
mod route;
mod topology;
mod worker;

pub use error::PipelineError;
pub use route::{BroadcastOutcome, RouteHandle, RouteSet};
pub use topology::{RunningTopology, Topology};
pub use worker::{CollectChannels, CollectEvent, Worker, WorkerCore, WorkerHandle};

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Bound for per-worker graceful shutdown, from `Stop` to task exit
pub const SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
