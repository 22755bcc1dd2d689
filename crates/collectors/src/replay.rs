//! Replay collector - file-based observation ingestion
//!
//! Reads newline-delimited JSON `DnsMessage` records and injects them
//! into the pipeline, optionally rate-limited and optionally in a loop.
//! The reader task produces into the collector's own input queue, so
//! backpressure and shutdown behave exactly like any other edge.

use std::path::PathBuf;
use std::time::Duration;

use dnsflow_config::{Config, ReplayCollectorConfig};
use dnsflow_pipeline::{CollectEvent, Worker, WorkerCore};
use dnsflow_protocol::DnsMessage;
use dnsflow_transform::{Chain, Verdict};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{CollectorError, Result};

pub struct ReplayCollector {
    core: WorkerCore,
    chain: Chain,
    cfg: ReplayCollectorConfig,
}

impl ReplayCollector {
    pub fn new(
        name: &str,
        cfg: &ReplayCollectorConfig,
        transforms: &dnsflow_config::TransformsConfig,
        queue_size: usize,
    ) -> Result<Self> {
        // catch a missing file at startup rather than in the reader task
        std::fs::metadata(&cfg.path).map_err(|source| CollectorError::OpenSource {
            path: cfg.path.display().to_string(),
            source,
        })?;
        Ok(Self {
            core: WorkerCore::new(name, queue_size),
            chain: Chain::build(transforms)?,
            cfg: cfg.clone(),
        })
    }

    fn apply_reload(&mut self, config: &Config) {
        let name = self.core.name().to_string();
        let Some(entry) = config.collectors.get(&name) else {
            tracing::warn!(worker = %name, "reload has no entry for this worker, keeping config");
            return;
        };
        if let Err(e) = self.chain.reload(&entry.transforms) {
            tracing::warn!(worker = %name, error = %e, "transform reload rejected, keeping chain");
            return;
        }
        tracing::info!(worker = %name, "config reloaded");
    }
}

impl Worker for ReplayCollector {
    fn worker_type(&self) -> &'static str {
        "replay"
    }

    fn is_collector(&self) -> bool {
        true
    }

    fn core(&self) -> &WorkerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut WorkerCore {
        &mut self.core
    }

    fn spawn(mut self: Box<Self>) -> JoinHandle<()> {
        let mut channels = self.core.collect_channels();
        tokio::spawn(async move {
            let name = self.core.name().to_string();
            tracing::info!(
                worker = %name,
                path = %self.cfg.path.display(),
                rate = self.cfg.rate,
                repeat = self.cfg.repeat,
                "replay collector starting"
            );

            let reader = tokio::spawn(read_source(
                name.clone(),
                self.cfg.path.clone(),
                self.cfg.rate,
                self.cfg.repeat,
                self.core.input(),
                self.core.stop_token(),
            ));

            loop {
                match channels.next().await {
                    CollectEvent::Stop => break,
                    CollectEvent::InputClosed => break,
                    CollectEvent::Reload(config) => self.apply_reload(&config),
                    CollectEvent::Message(mut dm) => {
                        self.core.count_ingress();
                        if self.chain.process(&mut dm) == Verdict::Drop {
                            self.core.send_dropped(&dm);
                            continue;
                        }
                        self.core.send_forwarded(&dm);
                    }
                }
            }

            self.chain.reset();
            let _ = reader.await;
            tracing::info!(worker = %name, "replay collector stopped");
        })
    }
}

/// Read the source file and feed parsed observations into the queue
async fn read_source(
    worker: String,
    path: PathBuf,
    rate: u32,
    repeat: bool,
    input: mpsc::Sender<DnsMessage>,
    stop: CancellationToken,
) {
    let pacing = (rate > 0).then(|| Duration::from_secs(1) / rate);
    let mut parse_errors = 0u64;

    loop {
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(worker = %worker, path = %path.display(), error = %e, "replay open failed");
                return;
            }
        };

        let mut lines = BufReader::new(file).lines();
        loop {
            let line = tokio::select! {
                _ = stop.cancelled() => return,
                line = lines.next_line() => line,
            };
            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(worker = %worker, error = %e, "replay read failed");
                    return;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let mut dm: DnsMessage = match serde_json::from_str(&line) {
                Ok(dm) => dm,
                Err(e) => {
                    parse_errors += 1;
                    if parse_errors <= 5 {
                        tracing::warn!(worker = %worker, error = %e, "unparseable observation skipped");
                    }
                    continue;
                }
            };
            if dm.dnstap.timestamp_rfc3339.is_empty() {
                // capture-time fields do not travel in JSON; recover
                // them from the unix timestamp when it is present
                if dm.dnstap.time_sec == 0 && dm.dnstap.timestamp > 0 {
                    dm.dnstap.time_sec = dm.dnstap.timestamp / 1_000_000_000;
                    dm.dnstap.time_nsec = (dm.dnstap.timestamp % 1_000_000_000) as u32;
                }
                dm.compute_timestamps();
            }

            tokio::select! {
                _ = stop.cancelled() => return,
                result = input.send(dm) => {
                    if result.is_err() {
                        return;
                    }
                }
            }

            if let Some(pause) = pacing {
                tokio::select! {
                    _ = stop.cancelled() => return,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        if !repeat {
            tracing::info!(worker = %worker, parse_errors, "replay finished");
            return;
        }
    }
}

#[cfg(test)]
#[path = "replay_test.rs"]
mod replay_test;
