//! Worker runtime - the uniform lifecycle every node implements
//!
//! `WorkerCore` carries the state shared by all workers: the input
//! queue, the two route sets, the stop and logger-stop signals, the
//! reload channel and the metric counters. Concrete workers embed a
//! core and drive their own collect loop through [`CollectChannels`],
//! which is the single `select!` demultiplexer required by the runtime
//! contract.
//!
//! # Lifecycle
//!
//! ```text
//! idle --spawn--> running --stop--> draining --> stopped
//!                    |
//!                    +--reload--> (stays running, new config installed)
//! ```

use std::sync::Arc;

use dnsflow_config::Config;
use dnsflow_metrics::{WorkerMetrics, WorkerMetricsProvider, WorkerMetricsSnapshot};
use dnsflow_protocol::DnsMessage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::route::{RouteHandle, RouteSet};

/// Capacity of the per-worker reload channel
const RELOAD_QUEUE: usize = 1;

/// One event observed by a worker's collect loop
#[derive(Debug)]
pub enum CollectEvent {
    /// Graceful shutdown was requested
    Stop,
    /// A new configuration arrived
    Reload(Arc<Config>),
    /// A message arrived on the input queue
    Message(Box<DnsMessage>),
    /// All producers dropped the input queue
    InputClosed,
}

/// The collect loop's receiving ends, taken once per worker
///
/// Wraps the stop signal, reload channel and input queue into a single
/// multi-way wait so no blocking point can miss a stop request.
pub struct CollectChannels {
    input: mpsc::Receiver<DnsMessage>,
    reload: mpsc::Receiver<Arc<Config>>,
    stop: CancellationToken,
}

impl CollectChannels {
    /// Wait for the next event
    ///
    /// Stop wins over pending input so shutdown stays bounded even with
    /// a full queue.
    pub async fn next(&mut self) -> CollectEvent {
        tokio::select! {
            biased;
            _ = self.stop.cancelled() => CollectEvent::Stop,
            Some(config) = self.reload.recv() => CollectEvent::Reload(config),
            message = self.input.recv() => match message {
                Some(dm) => CollectEvent::Message(Box::new(dm)),
                None => CollectEvent::InputClosed,
            },
        }
    }
}

/// Control-plane handle retained by the topology after spawn
#[derive(Clone)]
pub struct WorkerHandle {
    name: String,
    kind: &'static str,
    reload_tx: mpsc::Sender<Arc<Config>>,
    stop: CancellationToken,
    metrics: Arc<WorkerMetrics>,
}

impl WorkerHandle {
    /// Request graceful shutdown
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Deliver a new configuration
    ///
    /// Returns false when the worker is gone or still busy installing a
    /// previous reload; the caller keeps the old config in that case.
    pub fn reload(&self, config: Arc<Config>) -> bool {
        self.reload_tx.try_send(config).is_ok()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl WorkerMetricsProvider for WorkerHandle {
    fn worker_name(&self) -> &str {
        &self.name
    }

    fn worker_type(&self) -> &str {
        self.kind
    }

    fn snapshot(&self) -> WorkerMetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Shared state embedded by every worker
pub struct WorkerCore {
    name: String,
    input_tx: mpsc::Sender<DnsMessage>,
    input_rx: Option<mpsc::Receiver<DnsMessage>>,
    reload_tx: mpsc::Sender<Arc<Config>>,
    reload_rx: Option<mpsc::Receiver<Arc<Config>>>,
    stop: CancellationToken,
    logger_stop: CancellationToken,
    default_routes: RouteSet,
    dropped_routes: RouteSet,
    metrics: Arc<WorkerMetrics>,
}

impl WorkerCore {
    /// Create a core with a bounded input queue
    pub fn new(name: impl Into<String>, queue_size: usize) -> Self {
        let (input_tx, input_rx) = mpsc::channel(queue_size);
        let (reload_tx, reload_rx) = mpsc::channel(RELOAD_QUEUE);
        Self {
            name: name.into(),
            input_tx,
            input_rx: Some(input_rx),
            reload_tx,
            reload_rx: Some(reload_rx),
            stop: CancellationToken::new(),
            logger_stop: CancellationToken::new(),
            default_routes: RouteSet::new(),
            dropped_routes: RouteSet::new(),
            metrics: Arc::new(WorkerMetrics::new()),
        }
    }

    /// Stable worker name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Producer-facing handle to the input queue
    #[inline]
    pub fn input(&self) -> mpsc::Sender<DnsMessage> {
        self.input_tx.clone()
    }

    /// Route handle other workers use to reach this one
    pub fn route_handle(&self) -> RouteHandle {
        RouteHandle::new(self.name.as_str(), self.input_tx.clone())
    }

    /// Control handle for the topology
    pub fn handle(&self, kind: &'static str) -> WorkerHandle {
        WorkerHandle {
            name: self.name.clone(),
            kind,
            reload_tx: self.reload_tx.clone(),
            stop: self.stop.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Take the collect loop's receiving ends
    ///
    /// # Panics
    ///
    /// Panics when called twice - the runtime contract is one collect
    /// loop per worker.
    pub fn collect_channels(&mut self) -> CollectChannels {
        CollectChannels {
            input: self
                .input_rx
                .take()
                .expect("collect loop started twice"),
            reload: self
                .reload_rx
                .take()
                .expect("collect loop started twice"),
            stop: self.stop.clone(),
        }
    }

    /// Request graceful shutdown
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Token observed by auxiliary tasks (connection loops)
    #[inline]
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Signal the logging loop to finish
    pub fn stop_logger(&self) {
        self.logger_stop.cancel();
    }

    /// Token observed by the logging loop
    #[inline]
    pub fn logger_stop_token(&self) -> CancellationToken {
        self.logger_stop.clone()
    }

    pub fn add_default_route(&mut self, route: RouteHandle) {
        self.default_routes.add(route);
    }

    pub fn add_dropped_route(&mut self, route: RouteHandle) {
        self.dropped_routes.add(route);
    }

    #[inline]
    pub fn default_routes(&self) -> &RouteSet {
        &self.default_routes
    }

    #[inline]
    pub fn dropped_routes(&self) -> &RouteSet {
        &self.dropped_routes
    }

    #[inline]
    pub fn metrics(&self) -> &WorkerMetrics {
        &self.metrics
    }

    /// Shared counters, for loops that outlive the borrow of the core
    #[inline]
    pub fn metrics_arc(&self) -> Arc<WorkerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Count one accepted message
    #[inline]
    pub fn count_ingress(&self) {
        self.metrics.count_ingress();
    }

    /// Forward an accepted message to every default route
    ///
    /// Counts egress once and forwarded/overflow per destination. The
    /// caller still owns `dm` for its own egress path.
    pub fn send_forwarded(&self, dm: &DnsMessage) {
        self.metrics.count_egress();
        if self.default_routes.is_empty() {
            return;
        }
        let outcome = self.default_routes.broadcast(dm);
        self.metrics.count_forwarded(outcome.delivered);
        if outcome.dropped > 0 {
            self.metrics.count_overflow_dropped(outcome.dropped);
        }
    }

    /// Send a policy-dropped message to every dropped route and discard it
    pub fn send_dropped(&self, dm: &DnsMessage) {
        self.metrics.count_policy_dropped();
        if self.dropped_routes.is_empty() {
            return;
        }
        let outcome = self.dropped_routes.broadcast(dm);
        if outcome.dropped > 0 {
            self.metrics.count_overflow_dropped(outcome.dropped);
        }
    }
}

/// The capability set every pipeline node implements
///
/// Workers are stored as trait objects in the topology map; `spawn`
/// consumes the worker and runs its collect loop as a task.
pub trait Worker: Send {
    /// Stable identifier used in routes and logs
    fn name(&self) -> &str {
        self.core().name()
    }

    /// Worker type for metrics and diagnostics
    fn worker_type(&self) -> &'static str;

    /// Whether this worker's input belongs to the outside world
    fn is_collector(&self) -> bool {
        false
    }

    fn core(&self) -> &WorkerCore;

    fn core_mut(&mut self) -> &mut WorkerCore;

    /// Start the collect loop; must be called exactly once
    fn spawn(self: Box<Self>) -> JoinHandle<()>;
}

impl std::fmt::Debug for dyn Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name())
            .field("worker_type", &self.worker_type())
            .finish()
    }
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod worker_test;
