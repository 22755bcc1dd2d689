//! Periodic metrics reporter
//!
//! Collects snapshots from all registered workers at a fixed interval
//! and emits one structured log line per worker. Deltas are computed
//! against the previous tick so the lines read as rates, with the
//! lifetime totals alongside.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::{WorkerMetricsProvider, WorkerMetricsSnapshot};

/// Handle for stopping a running reporter
#[derive(Clone)]
pub struct ReporterHandle {
    cancel: CancellationToken,
}

impl ReporterHandle {
    /// Ask the reporter task to exit after its current tick
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

/// Aggregating reporter over all pipeline workers
pub struct MetricsReporter {
    providers: Vec<Arc<dyn WorkerMetricsProvider>>,
    interval: Duration,
    cancel: CancellationToken,
}

impl MetricsReporter {
    pub fn new(interval: Duration) -> Self {
        Self {
            providers: Vec::new(),
            interval,
            cancel: CancellationToken::new(),
        }
    }

    /// Register a worker's metrics handle
    pub fn register(&mut self, provider: Arc<dyn WorkerMetricsProvider>) {
        self.providers.push(provider);
    }

    pub fn handle(&self) -> ReporterHandle {
        ReporterHandle {
            cancel: self.cancel.clone(),
        }
    }

    /// Run until stopped, logging one line per worker per tick
    pub async fn run(self) {
        let mut previous: Vec<WorkerMetricsSnapshot> =
            vec![WorkerMetricsSnapshot::default(); self.providers.len()];
        let mut ticker = interval(self.interval);
        // the first tick fires immediately; skip it so the first report
        // covers a full interval
        ticker.tick().await;

        tracing::debug!(
            workers = self.providers.len(),
            interval_secs = self.interval.as_secs(),
            "metrics reporter starting"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    for (i, provider) in self.providers.iter().enumerate() {
                        let current = provider.snapshot();
                        let last = previous[i];
                        tracing::info!(
                            worker = provider.worker_name(),
                            kind = provider.worker_type(),
                            ingress = current.ingress - last.ingress,
                            egress = current.egress - last.egress,
                            forwarded = current.forwarded - last.forwarded,
                            policy_dropped = current.policy_dropped - last.policy_dropped,
                            overflow_dropped = current.overflow_dropped - last.overflow_dropped,
                            total_ingress = current.ingress,
                            total_overflow_dropped = current.overflow_dropped,
                            ready = current.writer_ready,
                            "worker metrics"
                        );
                        previous[i] = current;
                    }
                }
            }
        }

        tracing::debug!("metrics reporter stopped");
    }
}
