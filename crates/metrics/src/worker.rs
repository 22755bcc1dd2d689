//! Per-worker metric counters

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Counters every worker maintains
///
/// All fields use atomics for lock-free updates from the worker loops.
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    /// Messages read from the input queue
    pub ingress: AtomicU64,

    /// Messages that passed the transform chain
    pub egress: AtomicU64,

    /// Deliveries to default routes
    pub forwarded: AtomicU64,

    /// Messages dropped by a transform verdict
    pub policy_dropped: AtomicU64,

    /// Messages lost because a destination queue was full
    pub overflow_dropped: AtomicU64,

    /// Whether the worker's remote writer is currently connected;
    /// meaningless for workers without remote state
    pub writer_ready: AtomicBool,
}

impl WorkerMetrics {
    /// Create new metrics with all counters at zero
    pub const fn new() -> Self {
        Self {
            ingress: AtomicU64::new(0),
            egress: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            policy_dropped: AtomicU64::new(0),
            overflow_dropped: AtomicU64::new(0),
            writer_ready: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn count_ingress(&self) {
        self.ingress.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn count_egress(&self) {
        self.egress.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn count_forwarded(&self, destinations: u64) {
        self.forwarded.fetch_add(destinations, Ordering::Relaxed);
    }

    #[inline]
    pub fn count_policy_dropped(&self) {
        self.policy_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn count_overflow_dropped(&self, destinations: u64) {
        self.overflow_dropped.fetch_add(destinations, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_writer_ready(&self, ready: bool) {
        self.writer_ready.store(ready, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_writer_ready(&self) -> bool {
        self.writer_ready.load(Ordering::Relaxed)
    }

    /// Take a snapshot of current values
    #[inline]
    pub fn snapshot(&self) -> WorkerMetricsSnapshot {
        WorkerMetricsSnapshot {
            ingress: self.ingress.load(Ordering::Relaxed),
            egress: self.egress.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            policy_dropped: self.policy_dropped.load(Ordering::Relaxed),
            overflow_dropped: self.overflow_dropped.load(Ordering::Relaxed),
            writer_ready: self.writer_ready.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of worker metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct WorkerMetricsSnapshot {
    pub ingress: u64,
    pub egress: u64,
    pub forwarded: u64,
    pub policy_dropped: u64,
    pub overflow_dropped: u64,
    pub writer_ready: bool,
}

/// Trait for workers to expose metrics to the reporter
///
/// The `snapshot()` method is the main requirement - implementations
/// copy their current counters into the common snapshot struct.
pub trait WorkerMetricsProvider: Send + Sync {
    /// Stable worker name from the topology
    fn worker_name(&self) -> &str;

    /// Worker type (e.g. `replay`, `file`, `tcp`)
    fn worker_type(&self) -> &str;

    /// Get a snapshot of current metrics
    fn snapshot(&self) -> WorkerMetricsSnapshot;
}
