//! Dnsflow - Metrics
//!
//! Lock-free per-worker counters and the periodic reporter.
//!
//! # Design
//!
//! - Counters are plain atomics updated from the hot path with
//!   `Ordering::Relaxed`; no locks anywhere
//! - Workers hand out `Arc`-backed handles implementing
//!   [`WorkerMetricsProvider`], which stay valid after the worker task
//!   consumes the worker itself
//! - The reporter runs as its own task and logs one structured line per
//!   worker per interval; queue-full drops are only ever reported here,
//!   never per event

mod reporter;
mod worker;

pub use reporter::{MetricsReporter, ReporterHandle};
pub use worker::{WorkerMetrics, WorkerMetricsProvider, WorkerMetricsSnapshot};
